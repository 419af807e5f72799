//! In-memory cell grid shared by the store backends

use crate::address::CellRange;
use crate::error::{CrudError, CrudResult};
use crate::types::{CellValue, Row};
use serde::Serialize;

/// Occupied size of a table: the last row and column holding a non-blank cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub rows: usize,
    pub columns: usize,
}

/// Ragged 2-D grid. `rows[0]` is physical row 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Row>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows physically present, blank ones included
    pub fn physical_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn extent(&self) -> Extent {
        let rows = self
            .rows
            .iter()
            .rposition(|row| row.iter().any(|cell| !cell.is_blank()))
            .map_or(0, |idx| idx + 1);
        let columns = self
            .rows
            .iter()
            .filter_map(|row| row.iter().rposition(|cell| !cell.is_blank()))
            .max()
            .map_or(0, |idx| idx + 1);
        Extent { rows, columns }
    }

    /// Cell at 0-based coordinates, `Empty` outside the stored area
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(EMPTY)
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, CellValue::Empty);
        }
        cells[column] = value;
    }

    /// Read a rectangle. Column-only ranges run from row 1 to the extent,
    /// keeping embedded blank rows. Every row is padded to the range width.
    pub fn read(&self, range: &CellRange) -> Vec<Row> {
        let (first_row, last_row) = match range.rows() {
            Some(bounds) => bounds,
            None => (1, self.extent().rows),
        };
        if last_row == 0 {
            return Vec::new();
        }

        let columns = range.columns();
        (first_row..=last_row)
            .map(|row| {
                (columns.first().index()..=columns.last().index())
                    .map(|col| self.cell(row - 1, col).clone())
                    .collect()
            })
            .collect()
    }

    /// Overwrite exactly the addressed rectangle
    pub fn write(&mut self, range: &CellRange, values: &[Row]) -> CrudResult<()> {
        let (first_row, _) = range.rows().ok_or_else(|| {
            CrudError::invalid(format!(
                "writes need explicit row bounds, got column range {}",
                range
            ))
        })?;
        check_shape(range, values)?;

        let first_column = range.columns().first().index();
        for (row_offset, row) in values.iter().enumerate() {
            for (col_offset, value) in row.iter().enumerate() {
                self.set_cell(
                    first_row - 1 + row_offset,
                    first_column + col_offset,
                    value.clone(),
                );
            }
        }
        Ok(())
    }

    /// Write a row right after the last occupied row; returns its row number
    pub fn append(&mut self, values: &[CellValue]) -> usize {
        let row = self.extent().rows;
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        self.rows[row] = values.to_vec();
        row + 1
    }

    /// Remove a 1-based row; later rows move up by one
    pub fn delete(&mut self, row: usize) -> CrudResult<()> {
        if row == 0 || row > self.rows.len() {
            return Err(CrudError::invalid(format!(
                "row {} is out of bounds (table has {} rows)",
                row,
                self.rows.len()
            )));
        }
        self.rows.remove(row - 1);
        Ok(())
    }
}

fn check_shape(range: &CellRange, values: &[Row]) -> CrudResult<()> {
    let expected_rows = range.height().unwrap_or(0);
    let expected_columns = range.width();
    let actual_columns = values
        .iter()
        .map(Vec::len)
        .find(|len| *len != expected_columns)
        .unwrap_or(expected_columns);

    if values.len() != expected_rows || actual_columns != expected_columns {
        return Err(CrudError::ShapeMismatch {
            expected_rows,
            expected_columns,
            actual_rows: values.len(),
            actual_columns,
        });
    }
    Ok(())
}
