//! Workbooks stored as .xlsx files
//!
//! A workbook id resolves to `<data_dir>/<id>.xlsx`. Reads load the file with
//! calamine; writes load it, change the grid, and rewrite the whole file with
//! rust_xlsxwriter. Cell formatting other than dates is not preserved.

use super::{GridStore, Sheet, TableRef};
use crate::address::CellRange;
use crate::error::{CrudError, CrudResult};
use crate::grid::{Extent, Grid};
use crate::types::{CellValue, Row};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Excel's day zero for the 1900 date system
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    excel_epoch().checked_add_signed(Duration::milliseconds(millis))
}

fn datetime_to_serial(value: &NaiveDateTime) -> f64 {
    let delta = *value - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn grid_from_range(range: &Range<Data>) -> Grid {
    let mut grid = Grid::new();
    if let Some((start_row, start_col)) = range.start() {
        for (row, col, data) in range.used_cells() {
            grid.set_cell(
                start_row as usize + row,
                start_col as usize + col,
                cell_from_data(data),
            );
        }
    }
    grid
}

/// .xlsx-backed store rooted at a data directory
#[derive(Debug, Clone)]
pub struct XlsxStore {
    data_dir: PathBuf,
    /// In-process deletion counters per (workbook, table)
    revisions: HashMap<(String, String), u64>,
}

impl XlsxStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            revisions: HashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File backing a workbook id
    pub fn workbook_path(&self, workbook: &str) -> CrudResult<PathBuf> {
        if workbook.is_empty()
            || workbook.contains(['/', '\\'])
            || workbook == "."
            || workbook == ".."
        {
            return Err(CrudError::invalid(format!(
                "'{}' is not a valid workbook id",
                workbook
            )));
        }
        Ok(self.data_dir.join(format!("{}.xlsx", workbook)))
    }

    /// Create the workbook file with the given tables. If the file already
    /// exists, only the missing tables are added. Returns the names of the
    /// tables that were created.
    pub fn create_workbook(&self, workbook: &str, tables: &[&str]) -> CrudResult<Vec<String>> {
        let path = self.workbook_path(workbook)?;
        let mut sheets = if path.exists() {
            self.load(workbook)?
        } else {
            std::fs::create_dir_all(&self.data_dir)?;
            Vec::new()
        };

        let mut created = Vec::new();
        for name in tables {
            if !sheets.iter().any(|s| s.name == *name) {
                sheets.push(Sheet::new(*name, Grid::new()));
                created.push(name.to_string());
            }
        }

        if !created.is_empty() || !path.exists() {
            self.save(workbook, &sheets)?;
            info!(workbook, tables = ?created, "provisioned workbook");
        }
        Ok(created)
    }

    pub fn table_names(&self, workbook: &str) -> CrudResult<Vec<String>> {
        Ok(self.load(workbook)?.into_iter().map(|s| s.name).collect())
    }

    fn load(&self, workbook: &str) -> CrudResult<Vec<Sheet>> {
        let path = self.workbook_path(workbook)?;
        if !path.exists() {
            return Err(CrudError::unavailable(format!(
                "workbook '{}' not found at {}",
                workbook,
                path.display()
            )));
        }

        let mut reader: Xlsx<_> = open_workbook(&path).map_err(|e| {
            CrudError::unavailable(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mut sheets = Vec::new();
        for name in reader.sheet_names().to_vec() {
            let range = reader.worksheet_range(&name).map_err(|e| {
                CrudError::unavailable(format!("failed to read sheet '{}': {}", name, e))
            })?;
            sheets.push(Sheet::new(name, grid_from_range(&range)));
        }
        Ok(sheets)
    }

    fn save(&self, workbook: &str, sheets: &[Sheet]) -> CrudResult<()> {
        let path = self.workbook_path(workbook)?;
        let mut book = Workbook::new();
        let date_format = Format::new().set_num_format(DATE_FORMAT);

        for sheet in sheets {
            let worksheet = book.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(|e| {
                CrudError::invalid(format!("invalid table name '{}': {}", sheet.name, e))
            })?;

            for (row_idx, row) in sheet.grid.rows().iter().enumerate() {
                let row_num = u32::try_from(row_idx)
                    .map_err(|_| CrudError::invalid(format!("row {} is too large", row_idx + 1)))?;
                for (col_idx, cell) in row.iter().enumerate() {
                    let col_num = u16::try_from(col_idx).map_err(|_| {
                        CrudError::invalid(format!("column {} is too large", col_idx + 1))
                    })?;
                    let written = match cell {
                        CellValue::Empty => continue,
                        CellValue::Text(s) if s.is_empty() => continue,
                        CellValue::Text(s) => worksheet.write_string(row_num, col_num, s),
                        CellValue::Number(n) => worksheet.write_number(row_num, col_num, *n),
                        CellValue::Bool(b) => worksheet.write_boolean(row_num, col_num, *b),
                        CellValue::DateTime(dt) => worksheet.write_number_with_format(
                            row_num,
                            col_num,
                            datetime_to_serial(dt),
                            &date_format,
                        ),
                    };
                    written.map_err(|e| {
                        CrudError::unavailable(format!(
                            "failed to write cell {}{} of '{}': {}",
                            crate::address::column_index_to_letter(col_idx),
                            row_idx + 1,
                            sheet.name,
                            e
                        ))
                    })?;
                }
            }
        }

        book.save(&path).map_err(|e| {
            CrudError::unavailable(format!("failed to save {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Load, change one table's grid, and write the workbook back
    fn modify<T>(
        &self,
        table: &TableRef,
        change: impl FnOnce(&mut Grid) -> CrudResult<T>,
    ) -> CrudResult<T> {
        let mut sheets = self.load(&table.workbook)?;
        let sheet = sheets
            .iter_mut()
            .find(|s| s.name == table.table)
            .ok_or_else(|| CrudError::unavailable(format!("table '{}' not found", table)))?;
        let result = change(&mut sheet.grid)?;
        self.save(&table.workbook, &sheets)?;
        Ok(result)
    }

    fn grid(&self, table: &TableRef) -> CrudResult<Grid> {
        self.load(&table.workbook)?
            .into_iter()
            .find(|s| s.name == table.table)
            .map(|s| s.grid)
            .ok_or_else(|| CrudError::unavailable(format!("table '{}' not found", table)))
    }

    fn revision_key(table: &TableRef) -> (String, String) {
        (table.workbook.clone(), table.table.clone())
    }
}

impl GridStore for XlsxStore {
    fn get_cells(&self, table: &TableRef, range: &CellRange) -> CrudResult<Vec<Row>> {
        debug!(%table, %range, "xlsx get_cells");
        Ok(self.grid(table)?.read(range))
    }

    fn set_cells(
        &mut self,
        table: &TableRef,
        range: &CellRange,
        values: &[Row],
    ) -> CrudResult<()> {
        debug!(%table, %range, rows = values.len(), "xlsx set_cells");
        self.modify(table, |grid| grid.write(range, values))
    }

    fn append_row(&mut self, table: &TableRef, values: &[CellValue]) -> CrudResult<usize> {
        let row = self.modify(table, |grid| Ok(grid.append(values)))?;
        debug!(%table, row, "xlsx append_row");
        Ok(row)
    }

    fn delete_row(&mut self, table: &TableRef, row: usize) -> CrudResult<()> {
        debug!(%table, row, "xlsx delete_row");
        self.modify(table, |grid| grid.delete(row))?;
        *self.revisions.entry(Self::revision_key(table)).or_insert(0) += 1;
        Ok(())
    }

    fn extent(&self, table: &TableRef) -> CrudResult<Extent> {
        Ok(self.grid(table)?.extent())
    }

    /// Revisions live in this process only; another process deleting rows
    /// from the same file is not detected.
    fn revision(&self, table: &TableRef) -> CrudResult<u64> {
        Ok(self
            .revisions
            .get(&Self::revision_key(table))
            .copied()
            .unwrap_or(0))
    }
}
