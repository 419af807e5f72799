use chrono::{NaiveDateTime, Timelike};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

//==============================================================================
// Cell values
//==============================================================================

/// A single scalar cell.
///
/// Blank cells come back from a grid either as `Empty` or as an empty
/// `Text`; both count as blank for row termination and key scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

/// One row of cells, ordered by column.
pub type Row = Vec<CellValue>;

impl CellValue {
    /// True for `Empty` and for the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the text of a `Text` cell. Other variants yield `None`,
    /// so a numeric cell never matches a textual key.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "Empty",
            CellValue::Bool(_) => "Bool",
            CellValue::Number(_) => "Number",
            CellValue::Text(_) => "Text",
            CellValue::DateTime(_) => "DateTime",
        }
    }

    /// Interpret free-form user input (CLI flags, query strings).
    ///
    /// - `""` → `Empty`
    /// - `true` / `false` → `Bool`
    /// - anything `f64` accepts → `Number`
    /// - everything else → `Text`
    pub fn parse_input(input: &str) -> Self {
        if input.is_empty() {
            return CellValue::Empty;
        }
        match input {
            "true" => return CellValue::Bool(true),
            "false" => return CellValue::Bool(false),
            _ => {}
        }
        match input.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(input.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime(dt) => {
                if dt.num_seconds_from_midnight() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

//==============================================================================
// Field mappings
//==============================================================================

/// Field name → value mapping that remembers insertion order.
///
/// Order matters: `create` writes a mapping as a row in insertion order,
/// not aligned to the table's header labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, CellValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping by pairing labels with a row. Extra labels get `Empty`,
    /// extra cells are ignored.
    pub fn from_row<S: AsRef<str>>(labels: &[S], row: &[CellValue]) -> Self {
        labels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                (
                    label.as_ref().to_string(),
                    row.get(idx).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Insert or replace. A replaced field keeps its original position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<CellValue>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Values in insertion order
    pub fn into_row(self) -> Row {
        self.entries.into_iter().map(|(_, value)| value).collect()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (field, value) in iter {
            map.insert(field, value);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut map = FieldMap::new();
                while let Some((field, value)) = access.next_entry::<String, CellValue>()? {
                    map.insert(field, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

//==============================================================================
// Record input
//==============================================================================

/// Input accepted by `create`: either a ready row or a field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValues {
    Ordered(Row),
    Fields(FieldMap),
}

impl RecordValues {
    /// Resolve to the row that will be appended
    pub fn into_row(self) -> Row {
        match self {
            RecordValues::Ordered(row) => row,
            RecordValues::Fields(map) => map.into_row(),
        }
    }
}

impl From<Row> for RecordValues {
    fn from(row: Row) -> Self {
        RecordValues::Ordered(row)
    }
}

impl From<FieldMap> for RecordValues {
    fn from(map: FieldMap) -> Self {
        RecordValues::Fields(map)
    }
}
