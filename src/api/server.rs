//! Sheet CRUD API server implementation
//!
//! HTTP JSON API over the tables of one configured workbook.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::config::AppConfig;
use crate::crud::RecordStore;
use crate::error::CrudResult;
use crate::store::Backend;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub config_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            config_path: PathBuf::from("sheet-crud.yaml"),
        }
    }
}

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub version: String,
    pub config: AppConfig,
    /// One lock for the whole store; handlers run one at a time
    pub records: Mutex<RecordStore<Backend>>,
}

impl AppState {
    /// Open the configured backend and provision missing tables and headers
    pub fn new(config: AppConfig) -> CrudResult<Self> {
        let mut records = config.open()?;
        let written = config.provision(&mut records)?;
        if !written.is_empty() {
            info!(tables = ?written, "header rows written");
        }
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            records: Mutex::new(records),
        })
    }
}

/// Routes without middleware
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Record endpoints
        .route("/api/v1/keys", get(handlers::keys))
        .route("/api/v1/tables/:table/rows", get(handlers::rows))
        .route("/api/v1/tables/:table/tail", get(handlers::tail))
        .route("/api/v1/tables/:table/search", get(handlers::search))
        .route("/api/v1/tables/:table/records", post(handlers::create))
        .route(
            "/api/v1/tables/:table/records/:key",
            get(handlers::get_record)
                .put(handlers::update)
                .delete(handlers::delete),
        )
        .with_state(state)
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_crud=info,tower_http=info".into()),
        )
        .init();

    let app_config = AppConfig::load(&config.config_path)?;
    let state = Arc::new(AppState::new(app_config)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(Arc::clone(&state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📒 Sheet CRUD API Server starting on http://{}", addr);
    info!(
        "   Workbook: {} ({} tables)",
        state.config.workbook,
        state.config.tables.len()
    );
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sheet CRUD API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
