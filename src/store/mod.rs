//! Grid store adapters
//!
//! A store opens a named table inside a named workbook and moves raw cell
//! values in and out of it. Everything above this layer only speaks
//! `GridStore`, so the backing service can be swapped (in-memory grids for
//! tests, .xlsx files on disk).

mod memory;
mod xlsx;

pub use memory::MemoryStore;
pub use xlsx::XlsxStore;

use crate::address::CellRange;
use crate::error::CrudResult;
use crate::grid::{Extent, Grid};
use crate::types::{CellValue, Row};
use serde::Serialize;
use std::fmt;

/// Workbook id + table name. Every operation names its table explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub workbook: String,
    pub table: String,
}

impl TableRef {
    pub fn new(workbook: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            workbook: workbook.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workbook, self.table)
    }
}

/// Raw rectangular access to workbook tables.
///
/// Unreachable workbooks or tables fail with `StoreUnavailable`. Writes are
/// not atomic: a failed `set_cells` may leave part of the rectangle written.
pub trait GridStore {
    /// Read a rectangle. Column-only ranges return every physical row up to
    /// the table's extent, blank rows included.
    fn get_cells(&self, table: &TableRef, range: &CellRange) -> CrudResult<Vec<Row>>;

    /// Overwrite exactly the addressed rectangle. `values` must match the
    /// range's dimensions.
    fn set_cells(&mut self, table: &TableRef, range: &CellRange, values: &[Row])
        -> CrudResult<()>;

    /// Add a row after the last occupied row and return its row number
    fn append_row(&mut self, table: &TableRef, values: &[CellValue]) -> CrudResult<usize>;

    /// Remove a 1-based row; rows below shift up by one
    fn delete_row(&mut self, table: &TableRef, row: usize) -> CrudResult<()>;

    fn extent(&self, table: &TableRef) -> CrudResult<Extent>;

    /// Counter bumped on every row deletion in the table
    fn revision(&self, table: &TableRef) -> CrudResult<u64>;
}

/// Named grid inside a workbook
#[derive(Debug, Clone, Default)]
pub(crate) struct Sheet {
    pub(crate) name: String,
    pub(crate) grid: Grid,
    pub(crate) revision: u64,
}

impl Sheet {
    pub(crate) fn new(name: impl Into<String>, grid: Grid) -> Self {
        Self {
            name: name.into(),
            grid,
            revision: 0,
        }
    }
}

/// Store chosen at runtime from configuration
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    Xlsx(XlsxStore),
}

impl GridStore for Backend {
    fn get_cells(&self, table: &TableRef, range: &CellRange) -> CrudResult<Vec<Row>> {
        match self {
            Backend::Memory(store) => store.get_cells(table, range),
            Backend::Xlsx(store) => store.get_cells(table, range),
        }
    }

    fn set_cells(
        &mut self,
        table: &TableRef,
        range: &CellRange,
        values: &[Row],
    ) -> CrudResult<()> {
        match self {
            Backend::Memory(store) => store.set_cells(table, range, values),
            Backend::Xlsx(store) => store.set_cells(table, range, values),
        }
    }

    fn append_row(&mut self, table: &TableRef, values: &[CellValue]) -> CrudResult<usize> {
        match self {
            Backend::Memory(store) => store.append_row(table, values),
            Backend::Xlsx(store) => store.append_row(table, values),
        }
    }

    fn delete_row(&mut self, table: &TableRef, row: usize) -> CrudResult<()> {
        match self {
            Backend::Memory(store) => store.delete_row(table, row),
            Backend::Xlsx(store) => store.delete_row(table, row),
        }
    }

    fn extent(&self, table: &TableRef) -> CrudResult<Extent> {
        match self {
            Backend::Memory(store) => store.extent(table),
            Backend::Xlsx(store) => store.extent(table),
        }
    }

    fn revision(&self, table: &TableRef) -> CrudResult<u64> {
        match self {
            Backend::Memory(store) => store.revision(table),
            Backend::Xlsx(store) => store.revision(table),
        }
    }
}
