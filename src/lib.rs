//! Sheet CRUD - spreadsheet tables as a keyed record store
//!
//! This library treats a 2-D grid (rows × lettered columns) as a table of
//! records: row 1 holds header labels, one column holds a unique key, and
//! records are created, looked up, updated and deleted by key.
//!
//! # Features
//!
//! - Column-span reads that stop at the first fully blank row
//! - Key lookups with a not-found sentinel instead of an error
//! - Tail-N reads for "latest records" views
//! - Row handles that go stale once a row of their table is deleted
//! - In-memory and .xlsx file backends behind one `GridStore` trait
//!
//! # Example
//!
//! ```
//! use sheet_crud::{CellValue, ColumnSpan, MemoryStore, RecordStore, TableRef};
//!
//! let store = MemoryStore::new().with_table(
//!     "sales",
//!     "People",
//!     vec![vec!["ID".into(), "FIRST".into(), "LAST".into()]],
//! );
//! let mut records = RecordStore::new(store);
//! let people = TableRef::new("sales", "People");
//! let span = ColumnSpan::parse("A", "C")?;
//!
//! let row: Vec<CellValue> = vec!["k1".into(), "John".into(), "Doe".into()];
//! records.create(&people, row)?;
//! let lookup = records.search_by_key(&people, "k1", span.first(), &span)?;
//! assert_eq!(lookup.row_index, 2);
//! # Ok::<(), sheet_crud::CrudError>(())
//! ```

pub mod address;
pub mod api;
pub mod cli;
pub mod config;
pub mod crud;
pub mod error;
pub mod grid;
pub mod keys;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use address::{CellRange, Column, ColumnSpan};
pub use crud::{KeyLookup, MissingFieldPolicy, ReadFallback, RecordSchema, RecordStore, RowHandle};
pub use error::{CrudError, CrudResult};
pub use store::{Backend, GridStore, MemoryStore, TableRef, XlsxStore};
pub use types::{CellValue, FieldMap, RecordValues, Row};
