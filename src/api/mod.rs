//! Sheet CRUD API server module
//!
//! HTTP JSON API exposing the record operations of one configured
//! workbook. Run with `sheet-crud-server`.

pub mod handlers;
pub mod server;

pub use server::{router, run_api_server, ApiConfig, AppState};
