//! A1-style addressing: column letters, column spans and cell ranges.
//!
//! Rows are 1-based physical row numbers (row 1 holds the header labels).
//! Columns are stored as 0-based indexes and rendered as letters.

use crate::error::{CrudError, CrudResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Widest sheet an .xlsx file can hold (column XFD)
pub const MAX_COLUMNS: usize = 16_384;

/// Convert a 0-based column index to its letter form
///
/// Examples:
/// - 0 → A
/// - 25 → Z
/// - 26 → AA
pub fn column_index_to_letter(index: usize) -> String {
    let mut result = String::new();
    let mut idx = index;

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Convert column letters (case-insensitive) to a 0-based index
pub fn column_letter_to_index(letters: &str) -> CrudResult<usize> {
    if letters.is_empty() {
        return Err(CrudError::invalid("column letter is required"));
    }

    let mut index = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(CrudError::invalid(format!(
                "'{}' is not a column letter",
                letters
            )));
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index * 26 + digit;
        if index > MAX_COLUMNS {
            return Err(CrudError::invalid(format!(
                "column '{}' is beyond the last sheet column",
                letters
            )));
        }
    }

    Ok(index - 1)
}

//==============================================================================
// Column
//==============================================================================

/// A single lettered column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(usize);

impl Column {
    pub fn from_index(index: usize) -> CrudResult<Self> {
        if index >= MAX_COLUMNS {
            return Err(CrudError::invalid(format!(
                "column index {} is beyond the last sheet column",
                index
            )));
        }
        Ok(Column(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn letters(self) -> String {
        column_index_to_letter(self.0)
    }

    /// Span covering only this column
    pub fn span(self) -> ColumnSpan {
        ColumnSpan {
            first: self,
            last: self,
        }
    }
}

impl FromStr for Column {
    type Err = CrudError;

    fn from_str(s: &str) -> CrudResult<Self> {
        column_letter_to_index(s.trim()).map(Column)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

//==============================================================================
// ColumnSpan
//==============================================================================

/// Inclusive span of columns, e.g. `A:G`. Rows are implicitly bounded by
/// the table's data extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpan {
    first: Column,
    last: Column,
}

impl ColumnSpan {
    pub fn new(first: Column, last: Column) -> CrudResult<Self> {
        if first > last {
            return Err(CrudError::invalid(format!(
                "first column {} is after last column {}",
                first, last
            )));
        }
        Ok(Self { first, last })
    }

    /// Build from letters; both bounds are required
    pub fn parse(first: &str, last: &str) -> CrudResult<Self> {
        if first.trim().is_empty() || last.trim().is_empty() {
            return Err(CrudError::invalid(
                "both first and last column are required for a column read",
            ));
        }
        Self::new(first.parse()?, last.parse()?)
    }

    pub fn first(&self) -> Column {
        self.first
    }

    pub fn last(&self) -> Column {
        self.last
    }

    pub fn width(&self) -> usize {
        self.last.0 - self.first.0 + 1
    }

    pub fn contains(&self, column: Column) -> bool {
        self.first <= column && column <= self.last
    }

    /// Offset of `column` inside this span
    pub fn offset_of(&self, column: Column) -> Option<usize> {
        self.contains(column).then(|| column.0 - self.first.0)
    }

    /// Column-only range (`A:G`)
    pub fn range(&self) -> CellRange {
        CellRange {
            sheet: None,
            first_column: self.first,
            last_column: self.last,
            rows: None,
        }
    }

    /// Single-row range (`A5:G5`)
    pub fn row(&self, row: usize) -> CrudResult<CellRange> {
        self.rows(row, row)
    }

    /// Explicit row range; rows are 1-based and must not be reversed
    pub fn rows(&self, first_row: usize, last_row: usize) -> CrudResult<CellRange> {
        if first_row == 0 {
            return Err(CrudError::invalid("row numbers start at 1"));
        }
        if first_row > last_row {
            return Err(CrudError::invalid(format!(
                "rows {}..{} are reversed",
                first_row, last_row
            )));
        }
        Ok(CellRange {
            sheet: None,
            first_column: self.first,
            last_column: self.last,
            rows: Some((first_row, last_row)),
        })
    }
}

impl FromStr for ColumnSpan {
    type Err = CrudError;

    fn from_str(s: &str) -> CrudResult<Self> {
        match s.split_once(':') {
            Some((first, last)) => Self::parse(first, last),
            None => Ok(s.parse::<Column>()?.span()),
        }
    }
}

impl fmt::Display for ColumnSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.last)
    }
}

//==============================================================================
// CellRange
//==============================================================================

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?:'((?:[^']|'')+)'|([^!':]+))!)?([A-Za-z]+)(\d*)(?::([A-Za-z]+)(\d*))?$")
            .expect("hardcoded range pattern")
    })
}

/// Rectangular region of a table: either an explicit span (`A2:G2`) or a
/// column-only span (`A:G`), optionally prefixed with a sheet name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    sheet: Option<String>,
    first_column: Column,
    last_column: Column,
    /// Inclusive 1-based row bounds; `None` means "to the data extent"
    rows: Option<(usize, usize)>,
}

impl CellRange {
    pub fn parse(input: &str) -> CrudResult<Self> {
        let input = input.trim();
        let captures = range_pattern()
            .captures(input)
            .ok_or_else(|| CrudError::invalid(format!("invalid range '{}'", input)))?;

        let sheet = captures
            .get(1)
            .map(|m| m.as_str().replace("''", "'"))
            .or_else(|| captures.get(2).map(|m| m.as_str().to_string()));

        let first_column: Column = captures[3].parse()?;
        let first_row = captures.get(4).map(|m| m.as_str()).unwrap_or("");
        let (last_column, last_row) = match captures.get(5) {
            Some(m) => (
                m.as_str().parse::<Column>()?,
                captures.get(6).map(|m| m.as_str()).unwrap_or(""),
            ),
            None => (first_column, first_row),
        };

        let rows = match (first_row.is_empty(), last_row.is_empty()) {
            (true, true) => None,
            (false, false) => Some((parse_row(first_row)?, parse_row(last_row)?)),
            _ => {
                return Err(CrudError::invalid(format!(
                    "range '{}' mixes bounded and open rows",
                    input
                )))
            }
        };

        if first_column > last_column {
            return Err(CrudError::invalid(format!(
                "range '{}' has its columns reversed",
                input
            )));
        }
        if let Some((first, last)) = rows {
            if first > last {
                return Err(CrudError::invalid(format!(
                    "range '{}' has its rows reversed",
                    input
                )));
            }
        }

        Ok(Self {
            sheet,
            first_column,
            last_column,
            rows,
        })
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Same cells without the sheet prefix
    pub fn without_sheet(&self) -> Self {
        Self {
            sheet: None,
            ..self.clone()
        }
    }

    pub fn columns(&self) -> ColumnSpan {
        ColumnSpan {
            first: self.first_column,
            last: self.last_column,
        }
    }

    pub fn rows(&self) -> Option<(usize, usize)> {
        self.rows
    }

    pub fn is_column_only(&self) -> bool {
        self.rows.is_none()
    }

    pub fn width(&self) -> usize {
        self.columns().width()
    }

    /// Row count for explicit ranges
    pub fn height(&self) -> Option<usize> {
        self.rows.map(|(first, last)| last - first + 1)
    }
}

fn parse_row(digits: &str) -> CrudResult<usize> {
    let row: usize = digits
        .parse()
        .map_err(|_| CrudError::invalid(format!("invalid row number '{}'", digits)))?;
    if row == 0 {
        return Err(CrudError::invalid("row numbers start at 1"));
    }
    Ok(row)
}

impl FromStr for CellRange {
    type Err = CrudError;

    fn from_str(s: &str) -> CrudResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                write!(f, "{}!", sheet)?;
            } else {
                write!(f, "'{}'!", sheet.replace('\'', "''"))?;
            }
        }
        match self.rows {
            Some((first, last)) => write!(
                f,
                "{}{}:{}{}",
                self.first_column, first, self.last_column, last
            ),
            None => write!(f, "{}:{}", self.first_column, self.last_column),
        }
    }
}

impl Serialize for CellRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CellRange::parse(&raw).map_err(serde::de::Error::custom)
    }
}
