//! Sheet CRUD API Server binary
//!
//! HTTP JSON API over the tables of one configured workbook.

use clap::Parser;
use sheet_crud::api::{run_api_server, ApiConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheet-crud-server")]
#[command(version)]
#[command(about = "Sheet CRUD API Server - keyed records over workbook tables")]
#[command(long_about = r#"
Sheet CRUD API Server - HTTP JSON API

Record endpoints (":table" is a table alias from the config):
  - GET    /api/v1/keys?count=N                   - Fresh record keys
  - GET    /api/v1/tables/:table/rows?header=     - Read a table
  - GET    /api/v1/tables/:table/tail?n=N         - Last N records
  - GET    /api/v1/tables/:table/search?q=&from=  - Substring search
  - POST   /api/v1/tables/:table/records          - Create a record
  - GET    /api/v1/tables/:table/records/:key     - Look up a record
  - PUT    /api/v1/tables/:table/records/:key     - Update a record
  - DELETE /api/v1/tables/:table/records/:key     - Delete a record

Additional endpoints:
  - GET  /health           - Health check
  - GET  /version          - Server version info
  - GET  /                 - API documentation

Requests are applied one at a time. Every response is a JSON envelope
with success, request_id, data and error.

Example usage:
  sheet-crud-server --config erp.yaml
  sheet-crud-server --host 0.0.0.0 --port 3000

  curl -X POST http://localhost:8080/api/v1/tables/customers/records \
    -H "Content-Type: application/json" \
    -d '{"values": {"NAME": "Acme"}, "auto_key": true}'
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEET_CRUD_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SHEET_CRUD_PORT")]
    port: u16,

    /// Path to the workbook config (YAML)
    #[arg(
        short,
        long,
        default_value = "sheet-crud.yaml",
        env = "SHEET_CRUD_CONFIG"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        config_path: args.config,
    };

    run_api_server(config).await
}
