use super::{GridStore, Sheet, TableRef};
use crate::address::CellRange;
use crate::error::{CrudError, CrudResult};
use crate::grid::{Extent, Grid};
use crate::types::{CellValue, Row};
use std::collections::HashMap;
use tracing::debug;

/// Workbooks held in process memory. Used by tests and by the `memory`
/// backend, which starts empty on every run.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    workbooks: HashMap<String, Vec<Sheet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty workbook. Existing workbooks are left alone.
    pub fn add_workbook(&mut self, workbook: &str) {
        self.workbooks.entry(workbook.to_string()).or_default();
    }

    /// Add a table (creating its workbook if needed), replacing any table
    /// of the same name.
    pub fn add_table(&mut self, workbook: &str, table: &str, rows: Vec<Row>) {
        let sheets = self.workbooks.entry(workbook.to_string()).or_default();
        let sheet = Sheet::new(table, Grid::from_rows(rows));
        match sheets.iter_mut().find(|s| s.name == table) {
            Some(existing) => *existing = sheet,
            None => sheets.push(sheet),
        }
    }

    /// Builder form of [`MemoryStore::add_table`]
    pub fn with_table(mut self, workbook: &str, table: &str, rows: Vec<Row>) -> Self {
        self.add_table(workbook, table, rows);
        self
    }

    pub fn table_names(&self, workbook: &str) -> CrudResult<Vec<String>> {
        let sheets = self
            .workbooks
            .get(workbook)
            .ok_or_else(|| CrudError::unavailable(format!("workbook '{}' not found", workbook)))?;
        Ok(sheets.iter().map(|s| s.name.clone()).collect())
    }

    fn sheet(&self, table: &TableRef) -> CrudResult<&Sheet> {
        self.workbooks
            .get(&table.workbook)
            .ok_or_else(|| {
                CrudError::unavailable(format!("workbook '{}' not found", table.workbook))
            })?
            .iter()
            .find(|s| s.name == table.table)
            .ok_or_else(|| CrudError::unavailable(format!("table '{}' not found", table)))
    }

    fn sheet_mut(&mut self, table: &TableRef) -> CrudResult<&mut Sheet> {
        self.workbooks
            .get_mut(&table.workbook)
            .ok_or_else(|| {
                CrudError::unavailable(format!("workbook '{}' not found", table.workbook))
            })?
            .iter_mut()
            .find(|s| s.name == table.table)
            .ok_or_else(|| CrudError::unavailable(format!("table '{}' not found", table)))
    }
}

impl GridStore for MemoryStore {
    fn get_cells(&self, table: &TableRef, range: &CellRange) -> CrudResult<Vec<Row>> {
        debug!(%table, %range, "memory get_cells");
        Ok(self.sheet(table)?.grid.read(range))
    }

    fn set_cells(
        &mut self,
        table: &TableRef,
        range: &CellRange,
        values: &[Row],
    ) -> CrudResult<()> {
        debug!(%table, %range, rows = values.len(), "memory set_cells");
        self.sheet_mut(table)?.grid.write(range, values)
    }

    fn append_row(&mut self, table: &TableRef, values: &[CellValue]) -> CrudResult<usize> {
        let row = self.sheet_mut(table)?.grid.append(values);
        debug!(%table, row, "memory append_row");
        Ok(row)
    }

    fn delete_row(&mut self, table: &TableRef, row: usize) -> CrudResult<()> {
        debug!(%table, row, "memory delete_row");
        let sheet = self.sheet_mut(table)?;
        sheet.grid.delete(row)?;
        sheet.revision += 1;
        Ok(())
    }

    fn extent(&self, table: &TableRef) -> CrudResult<Extent> {
        Ok(self.sheet(table)?.grid.extent())
    }

    fn revision(&self, table: &TableRef) -> CrudResult<u64> {
        Ok(self.sheet(table)?.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRef {
        TableRef::new("wb", "People")
    }

    #[test]
    fn test_missing_workbook_and_table() {
        let store = MemoryStore::new().with_table("wb", "People", vec![]);
        let range = CellRange::parse("A:B").unwrap();
        let err = store
            .get_cells(&TableRef::new("other", "People"), &range)
            .unwrap_err();
        assert!(matches!(err, CrudError::StoreUnavailable(_)));
        let err = store
            .get_cells(&TableRef::new("wb", "Nope"), &range)
            .unwrap_err();
        assert!(matches!(err, CrudError::StoreUnavailable(_)));
    }

    #[test]
    fn test_delete_bumps_revision() {
        let mut store = MemoryStore::new().with_table(
            "wb",
            "People",
            vec![vec!["ID".into()], vec!["k1".into()]],
        );
        assert_eq!(store.revision(&table()).unwrap(), 0);
        store.delete_row(&table(), 2).unwrap();
        assert_eq!(store.revision(&table()).unwrap(), 1);
        assert!(store.delete_row(&table(), 5).is_err());
        assert_eq!(store.revision(&table()).unwrap(), 1);
    }

    #[test]
    fn test_table_order_preserved() {
        let mut store = MemoryStore::new();
        store.add_workbook("wb");
        store.add_table("wb", "B", vec![]);
        store.add_table("wb", "A", vec![]);
        store.add_table("wb", "B", vec![vec!["x".into()]]);
        assert_eq!(store.table_names("wb").unwrap(), vec!["B", "A"]);
    }
}
