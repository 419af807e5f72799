//! Record access over a grid store
//!
//! Tables are read as records: row 1 holds header labels, rows 2.. hold data,
//! and one column (usually `A`) holds a unique key per record. Row addresses
//! are positional, so a deletion anywhere in a table shifts every later
//! record up by one. Lookups therefore hand out a [`RowHandle`] stamped with
//! the table's revision, and `update` refuses handles that predate a
//! deletion.

use crate::address::{CellRange, Column, ColumnSpan};
use crate::error::{CrudError, CrudResult};
use crate::keys::{self, KeyGenerator, UuidKeys};
use crate::store::{GridStore, TableRef};
use crate::types::{CellValue, FieldMap, RecordValues, Row};
use serde::Serialize;
use tracing::{debug, info, warn};

//==============================================================================
// Lookup results
//==============================================================================

/// A single-row range resolved at a known table revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    range: CellRange,
    revision: u64,
}

impl RowHandle {
    pub fn range(&self) -> &CellRange {
        &self.range
    }

    /// 1-based physical row
    pub fn row(&self) -> usize {
        self.range.rows().map_or(0, |(first, _)| first)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Result of a key lookup.
///
/// A miss is not an error: it is the sentinel
/// `{ row_data: None, row_index: -1, range: None }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyLookup {
    pub row_data: Option<Row>,
    pub row_index: i64,
    pub range: Option<CellRange>,
    #[serde(skip)]
    revision: u64,
}

impl KeyLookup {
    pub fn missing() -> Self {
        Self {
            row_data: None,
            row_index: -1,
            range: None,
            revision: 0,
        }
    }

    pub fn is_found(&self) -> bool {
        self.row_index != -1
    }

    /// Handle for `update`, `None` for the sentinel
    pub fn handle(&self) -> Option<RowHandle> {
        self.range.as_ref().map(|range| RowHandle {
            range: range.clone(),
            revision: self.revision,
        })
    }
}

impl Default for KeyLookup {
    fn default() -> Self {
        Self::missing()
    }
}

//==============================================================================
// Policies
//==============================================================================

/// What `update` does with a header label the value mapping lacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingFieldPolicy {
    /// Write the cell blank
    #[default]
    Blank,
    /// Fail with `InvalidArgument` before writing
    Reject,
}

/// Read paths degrade to an empty result instead of failing.
///
/// Use at call sites that show data to a user: the failure is logged once
/// and the caller gets `T::default()` (empty rows, `false`, or the lookup
/// sentinel). Write paths should keep propagating with `?`.
pub trait ReadFallback<T> {
    fn or_empty(self) -> T;
}

impl<T: Default> ReadFallback<T> for CrudResult<T> {
    fn or_empty(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "read failed, returning empty result");
                T::default()
            }
        }
    }
}

//==============================================================================
// Record schema
//==============================================================================

/// Header labels, key column and column span of a table
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub headers: Vec<String>,
    pub key_column: Column,
    pub span: ColumnSpan,
}

impl RecordSchema {
    pub fn new(headers: Vec<String>, key_column: Column, span: ColumnSpan) -> CrudResult<Self> {
        if span.offset_of(key_column).is_none() {
            return Err(CrudError::invalid(format!(
                "key column {} lies outside {}",
                key_column, span
            )));
        }
        if headers.len() != span.width() {
            return Err(CrudError::invalid(format!(
                "{} header labels for a {}-column span {}",
                headers.len(),
                span.width(),
                span
            )));
        }
        Ok(Self {
            headers,
            key_column,
            span,
        })
    }

    /// Position of the key column within the span
    pub fn key_offset(&self) -> usize {
        self.span.offset_of(self.key_column).unwrap_or(0)
    }

    /// Key column label
    pub fn key_field(&self) -> &str {
        self.span
            .offset_of(self.key_column)
            .and_then(|idx| self.headers.get(idx))
            .map_or("", String::as_str)
    }

    /// Row for a new record with `key` in the key column.
    ///
    /// Ordered values fill the remaining columns left to right. A mapping is
    /// aligned to the headers; the key replaces any value given for the key
    /// field, and labels outside the headers are rejected.
    pub fn keyed_row(&self, values: RecordValues, key: &str) -> CrudResult<Row> {
        let offset = self.key_offset();
        match values {
            RecordValues::Ordered(mut row) => {
                if row.len() < offset {
                    row.resize(offset, CellValue::Empty);
                }
                row.insert(offset, CellValue::from(key));
                if row.len() > self.span.width() {
                    return Err(CrudError::invalid(format!(
                        "{} values do not fit the {}-column span {}",
                        row.len(),
                        self.span.width(),
                        self.span
                    )));
                }
                Ok(row)
            }
            RecordValues::Fields(map) => {
                if let Some(unknown) = map
                    .fields()
                    .find(|f| !self.headers.iter().any(|h| h.as_str() == *f))
                {
                    return Err(CrudError::invalid(format!("'{}' is not a column", unknown)));
                }
                Ok(self
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(idx, label)| {
                        if idx == offset {
                            CellValue::from(key)
                        } else {
                            map.get(label).cloned().unwrap_or_default()
                        }
                    })
                    .collect())
            }
        }
    }

    pub fn record(&self, row: &[CellValue]) -> FieldMap {
        FieldMap::from_row(&self.headers, row)
    }

    pub fn key_of<'a>(&self, row: &'a [CellValue]) -> Option<&'a str> {
        self.span
            .offset_of(self.key_column)
            .and_then(|idx| row.get(idx))
            .and_then(CellValue::as_text)
            .filter(|key| !key.is_empty())
    }
}

fn key_matches(cell: &CellValue, key: &str) -> bool {
    cell.as_text() == Some(key)
}

fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

//==============================================================================
// RecordStore
//==============================================================================

/// Keyed CRUD over the tables of a [`GridStore`]
pub struct RecordStore<S> {
    store: S,
    keys: Box<dyn KeyGenerator>,
    missing_fields: MissingFieldPolicy,
}

impl<S: std::fmt::Debug> std::fmt::Debug for RecordStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("store", &self.store)
            .field("missing_fields", &self.missing_fields)
            .finish_non_exhaustive()
    }
}

impl<S: GridStore> RecordStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            keys: Box::new(UuidKeys),
            missing_fields: MissingFieldPolicy::default(),
        }
    }

    pub fn with_key_generator(mut self, keys: impl KeyGenerator + 'static) -> Self {
        self.keys = Box::new(keys);
        self
    }

    pub fn with_missing_fields(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_fields = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Append one record; returns the row it landed on.
    ///
    /// Mappings are written in insertion order, not aligned to headers.
    /// Key uniqueness is the caller's job (see [`RecordStore::generate_key`]).
    pub fn create(&mut self, table: &TableRef, values: impl Into<RecordValues>) -> CrudResult<usize> {
        let row = values.into().into_row();
        let written = self.store.append_row(table, &row)?;
        info!(%table, row = written, "record created");
        Ok(written)
    }

    /// Read a column span from row 1 down to the first fully blank row.
    ///
    /// A blank row inside the data ends the read: rows after it are not
    /// returned. Row 1 is dropped unless `include_header`.
    pub fn read_range(
        &self,
        table: &TableRef,
        include_header: bool,
        span: &ColumnSpan,
    ) -> CrudResult<Vec<Row>> {
        let mut rows = self.store.get_cells(table, &span.range())?;
        if let Some(end) = rows.iter().position(|row| is_blank_row(row)) {
            rows.truncate(end);
        }
        if !include_header && !rows.is_empty() {
            rows.remove(0);
        }
        debug!(%table, %span, rows = rows.len(), "read_range");
        Ok(rows)
    }

    /// Read an explicit rectangle as-is (no blank-row termination). The
    /// first row of the rectangle is dropped unless `include_header`.
    pub fn read_address(
        &self,
        table: &TableRef,
        range: &CellRange,
        include_header: bool,
    ) -> CrudResult<Vec<Row>> {
        if let Some(sheet) = range.sheet() {
            if sheet != table.table {
                return Err(CrudError::invalid(format!(
                    "range {} does not address table '{}'",
                    range, table.table
                )));
            }
        }
        let mut rows = self.store.get_cells(table, &range.without_sheet())?;
        if !include_header && !rows.is_empty() {
            rows.remove(0);
        }
        Ok(rows)
    }

    /// Header labels of a span, as displayed text
    pub fn header_labels(&self, table: &TableRef, span: &ColumnSpan) -> CrudResult<Vec<String>> {
        let rows = self.store.get_cells(table, &span.row(1)?)?;
        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    pub fn generate_key(&self) -> String {
        self.keys.generate()
    }

    /// Whether `key` appears verbatim in the key column (header excluded)
    pub fn is_valid_key(&self, table: &TableRef, key: &str, key_column: Column) -> CrudResult<bool> {
        let keys = self.read_range(table, false, &key_column.span())?;
        Ok(keys.iter().any(|row| row.first().is_some_and(|cell| key_matches(cell, key))))
    }

    /// Find the first record whose key equals `key`.
    ///
    /// Returns the sentinel [`KeyLookup::missing`] when nothing matches.
    pub fn search_by_key(
        &self,
        table: &TableRef,
        key: &str,
        key_column: Column,
        span: &ColumnSpan,
    ) -> CrudResult<KeyLookup> {
        let keys = self.read_range(table, false, &key_column.span())?;
        let Some(position) = keys
            .iter()
            .position(|row| row.first().is_some_and(|cell| key_matches(cell, key)))
        else {
            debug!(%table, key, "key not found");
            return Ok(KeyLookup::missing());
        };

        let row_index = position + 2;
        let revision = self.store.revision(table)?;
        let range = span.row(row_index)?;
        let row_data = self.store.get_cells(table, &range)?.into_iter().next();

        Ok(KeyLookup {
            row_data,
            row_index: row_index as i64,
            range: Some(range),
            revision,
        })
    }

    /// Stamp a range the caller knows to be current with the table revision.
    pub fn handle_for(&self, table: &TableRef, range: &CellRange) -> CrudResult<RowHandle> {
        if range.height() != Some(1) {
            return Err(CrudError::invalid(format!(
                "a row handle needs a single-row range, got {}",
                range
            )));
        }
        Ok(RowHandle {
            range: range.without_sheet(),
            revision: self.store.revision(table)?,
        })
    }

    /// Last `n` data rows in original order.
    ///
    /// `n` may arrive as a number or numeric text; anything that is not a
    /// non-negative integer fails with `InvalidArgument`. Asking for more
    /// rows than exist returns them all.
    pub fn get_tail_rows(
        &self,
        table: &TableRef,
        n: impl Into<CellValue>,
        span: &ColumnSpan,
    ) -> CrudResult<Vec<Row>> {
        let n = keys::row_count(&n.into())?;
        let mut rows = self.read_range(table, false, span)?;
        let start = rows.len() - n.min(rows.len());
        Ok(rows.split_off(start))
    }

    /// Overwrite the handle's row with `values` projected onto `headers`.
    pub fn update<H: AsRef<str>>(
        &mut self,
        table: &TableRef,
        headers: &[H],
        handle: &RowHandle,
        values: &FieldMap,
    ) -> CrudResult<()> {
        let table_revision = self.store.revision(table)?;
        if table_revision != handle.revision {
            return Err(CrudError::StaleRowHandle {
                range: handle.range.to_string(),
                handle_revision: handle.revision,
                table_revision,
            });
        }

        if self.missing_fields == MissingFieldPolicy::Reject {
            let missing: Vec<&str> = headers
                .iter()
                .map(AsRef::as_ref)
                .filter(|label| !values.contains(label))
                .collect();
            if !missing.is_empty() {
                return Err(CrudError::invalid(format!(
                    "update is missing fields: {}",
                    missing.join(", ")
                )));
            }
        }

        let row: Row = headers
            .iter()
            .map(|label| values.get(label.as_ref()).cloned().unwrap_or_default())
            .collect();
        self.store.set_cells(table, &handle.range, &[row])?;
        info!(%table, range = %handle.range, "record updated");
        Ok(())
    }

    /// Resolve `key`, merge `changes` into the stored record and write it
    /// back. Returns `false` when the key does not exist.
    pub fn update_by_key(
        &mut self,
        table: &TableRef,
        schema: &RecordSchema,
        key: &str,
        changes: &FieldMap,
    ) -> CrudResult<bool> {
        if let Some(unknown) = changes
            .fields()
            .find(|f| !schema.headers.iter().any(|h| h.as_str() == *f))
        {
            return Err(CrudError::invalid(format!(
                "'{}' is not a column of {}",
                unknown, table
            )));
        }

        let lookup = self.search_by_key(table, key, schema.key_column, &schema.span)?;
        let (Some(row), Some(handle)) = (lookup.row_data.as_deref(), lookup.handle()) else {
            return Ok(false);
        };

        let mut record = schema.record(row);
        for (field, value) in changes.iter() {
            record.insert(field, value.clone());
        }
        self.update(table, &schema.headers, &handle, &record)?;
        Ok(true)
    }

    /// Delete every data row whose key equals `key`; returns how many.
    ///
    /// Scans all physical rows (no blank-row termination) from the bottom
    /// up so earlier row numbers stay valid while rows are removed.
    pub fn delete_by_key(&mut self, table: &TableRef, key: &str, key_column: Column) -> CrudResult<usize> {
        let extent = self.store.extent(table)?;
        if extent.rows < 2 {
            return Ok(0);
        }

        let cells = self
            .store
            .get_cells(table, &key_column.span().rows(1, extent.rows)?)?;
        let mut deleted = 0;
        for (idx, row) in cells.iter().enumerate().skip(1).rev() {
            if row.first().is_some_and(|cell| key_matches(cell, key)) {
                self.store.delete_row(table, idx + 1)?;
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(%table, key, deleted, "records deleted");
        }
        Ok(deleted)
    }

    /// Rows with a cell at or after `from_column` (offset within the span)
    /// whose text contains `needle`, ignoring case. Each row appears once.
    pub fn find_rows_containing(
        &self,
        table: &TableRef,
        span: &ColumnSpan,
        needle: &str,
        from_column: usize,
    ) -> CrudResult<Vec<Row>> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let needle = needle.to_lowercase();
        let rows = self.read_range(table, false, span)?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.iter()
                    .skip(from_column)
                    .any(|cell| cell.to_string().to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Read the table, change the records `select` picks, and write each one
    /// back through a fresh key lookup. Records whose key disappeared between
    /// the read and the write are skipped. Returns the number rewritten.
    pub fn rewrite_where<P, M>(
        &mut self,
        table: &TableRef,
        schema: &RecordSchema,
        mut select: P,
        mut change: M,
    ) -> CrudResult<usize>
    where
        P: FnMut(&FieldMap) -> bool,
        M: FnMut(&mut FieldMap),
    {
        let rows = self.read_range(table, false, &schema.span)?;
        let mut pending = Vec::new();
        for row in &rows {
            let Some(key) = schema.key_of(row) else {
                continue;
            };
            let mut record = schema.record(row);
            if select(&record) {
                change(&mut record);
                pending.push((key.to_string(), record));
            }
        }

        let mut rewritten = 0;
        for (key, record) in pending {
            let lookup = self.search_by_key(table, &key, schema.key_column, &schema.span)?;
            match lookup.handle() {
                Some(handle) => {
                    self.update(table, &schema.headers, &handle, &record)?;
                    rewritten += 1;
                }
                None => warn!(%table, key, "record vanished before rewrite, skipping"),
            }
        }
        Ok(rewritten)
    }
}
