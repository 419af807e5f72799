//! API request handlers
//!
//! Every table handler takes the store lock for the whole operation on the
//! blocking pool, so requests are applied one at a time without stalling the
//! async workers. Read endpoints answer with empty data when the store cannot
//! be read; write endpoints report the failure.

use std::sync::{Arc, MutexGuard, PoisonError};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TableConfig;
use crate::crud::{KeyLookup, ReadFallback, RecordStore};
use crate::error::{CrudError, CrudResult};
use crate::store::{Backend, TableRef};
use crate::types::{CellValue, FieldMap, RecordValues, Row};

use super::server::AppState;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_result(result: CrudResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

fn lock_records(state: &AppState) -> MutexGuard<'_, RecordStore<Backend>> {
    state.records.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run store work on the blocking pool.
///
/// The xlsx backend reads and rewrites whole files, and the store lock
/// serialises requests, so neither may stall the async workers.
async fn with_store<T, F>(state: Arc<AppState>, work: F) -> CrudResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> CrudResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(state.as_ref()))
        .await
        .map_err(|e| CrudError::unavailable(format!("store task failed: {}", e)))?
}

fn resolve<'a>(state: &'a AppState, alias: &str) -> CrudResult<(&'a TableConfig, TableRef)> {
    Ok((state.config.table(alias)?, state.config.table_ref(alias)?))
}

//==============================================================================
// Info endpoints
//==============================================================================

/// Root endpoint response
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tables: Vec<String>,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> Json<ApiResponse<RootResponse>> {
    let response = RootResponse {
        name: "Sheet CRUD API Server".to_string(),
        version: state.version.clone(),
        description: "Keyed record access over workbook tables".to_string(),
        tables: state.config.tables.keys().cloned().collect(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint("GET", "/api/v1/keys", "Generate record keys"),
            endpoint("GET", "/api/v1/tables/:table/rows", "Read a table"),
            endpoint("GET", "/api/v1/tables/:table/tail", "Last N records"),
            endpoint("GET", "/api/v1/tables/:table/search", "Substring search"),
            endpoint("POST", "/api/v1/tables/:table/records", "Create a record"),
            endpoint("GET", "/api/v1/tables/:table/records/:key", "Look up a record"),
            endpoint("PUT", "/api/v1/tables/:table/records/:key", "Update a record"),
            endpoint("DELETE", "/api/v1/tables/:table/records/:key", "Delete a record"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub workbook: String,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        workbook: state.config.workbook.clone(),
    }))
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> Json<ApiResponse<VersionResponse>> {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["create", "read", "tail", "get", "update", "delete", "search"]
            .iter()
            .map(ToString::to_string)
            .collect(),
    }))
}

//==============================================================================
// Record endpoints
//==============================================================================

#[derive(Debug, Deserialize)]
pub struct KeysQuery {
    #[serde(default = "default_key_count")]
    pub count: usize,
}

fn default_key_count() -> usize {
    1
}

/// GET /api/v1/keys - Fresh record keys
pub async fn keys(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeysQuery>,
) -> Json<ApiResponse<Vec<String>>> {
    if query.count > 1000 {
        return Json(ApiResponse::err("count must be at most 1000"));
    }
    let records = lock_records(&state);
    Json(ApiResponse::ok(
        (0..query.count).map(|_| records.generate_key()).collect(),
    ))
}

/// Rows of one table
#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub table: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    #[serde(default)]
    pub header: bool,
}

/// GET /api/v1/tables/:table/rows
pub async fn rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(query): Query<RowsQuery>,
) -> Json<ApiResponse<RowsResponse>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let span = settings.span()?;
            let rows = lock_records(&state)
                .read_range(&table_ref, query.header, &span)
                .or_empty();
            Ok(RowsResponse { table, rows })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

#[derive(Debug, Deserialize)]
pub struct TailQuery {
    pub n: Option<String>,
}

/// GET /api/v1/tables/:table/tail?n=
pub async fn tail(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(query): Query<TailQuery>,
) -> Json<ApiResponse<RowsResponse>> {
    let n = CellValue::parse_input(query.n.as_deref().unwrap_or("10"));
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let span = settings.span()?;
            let rows = match lock_records(&state).get_tail_rows(&table_ref, n, &span) {
                Err(e @ CrudError::InvalidArgument(_)) => return Err(e),
                other => other.or_empty(),
            };
            Ok(RowsResponse { table, rows })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub from: usize,
}

/// GET /api/v1/tables/:table/search?q=&from=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Json<ApiResponse<RowsResponse>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let span = settings.span()?;
            let rows = lock_records(&state)
                .find_rows_containing(&table_ref, &span, &query.q, query.from)
                .or_empty();
            Ok(RowsResponse { table, rows })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

/// GET /api/v1/tables/:table/records/:key
///
/// A missing key is a successful response carrying the miss sentinel.
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((table, key)): Path<(String, String)>,
) -> Json<ApiResponse<KeyLookup>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let (key_column, span) = (settings.key()?, settings.span()?);
            Ok(lock_records(&state)
                .search_by_key(&table_ref, &key, key_column, &span)
                .or_empty())
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

/// Create request: a row in column order or a field mapping
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub values: RecordValues,
    /// Generate a key and write it first
    #[serde(default)]
    pub auto_key: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// POST /api/v1/tables/:table/records
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(req): Json<CreateRequest>,
) -> Json<ApiResponse<CreateResponse>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let mut records = lock_records(&state);
            let (values, key) = if req.auto_key {
                let key = records.generate_key();
                let schema = settings.schema(&*records, &table_ref)?;
                (RecordValues::Ordered(schema.keyed_row(req.values, &key)?), Some(key))
            } else {
                (req.values, None)
            };
            let row = records.create(&table_ref, values)?;
            Ok(CreateResponse { row, key })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

/// Update request: the fields to change
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub fields: FieldMap,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub key: String,
    pub fields: usize,
}

/// PUT /api/v1/tables/:table/records/:key
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((table, key)): Path<(String, String)>,
    Json(req): Json<UpdateRequest>,
) -> Json<ApiResponse<UpdateResponse>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let mut records = lock_records(&state);
            let schema = settings.schema(&*records, &table_ref)?;
            if !records.update_by_key(&table_ref, &schema, &key, &req.fields)? {
                return Err(CrudError::invalid(format!(
                    "no record with key '{}' in {}",
                    key, table_ref
                )));
            }
            Ok(UpdateResponse {
                key,
                fields: req.fields.len(),
            })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    pub deleted: usize,
}

/// DELETE /api/v1/tables/:table/records/:key
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((table, key)): Path<(String, String)>,
) -> Json<ApiResponse<DeleteResponse>> {
    let result = with_store(state, move |state| {
        resolve(state, &table).and_then(|(settings, table_ref)| {
            let deleted = lock_records(&state).delete_by_key(&table_ref, &key, settings.key()?)?;
            Ok(DeleteResponse { key, deleted })
        })
    })
    .await;
    Json(ApiResponse::from_result(result))
}
