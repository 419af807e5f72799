//! Workbook and table catalogue loaded from YAML
//!
//! ```yaml
//! backend: xlsx
//! data_dir: ./data
//! workbook: sales
//! tables:
//!   invoices:
//!     sheet: Invoices
//!     key_column: A
//!     first_column: A
//!     last_column: N
//! ```

use crate::address::{Column, ColumnSpan};
use crate::crud::{MissingFieldPolicy, ReadFallback, RecordSchema, RecordStore};
use crate::error::{CrudError, CrudResult};
use crate::store::{Backend, GridStore, MemoryStore, TableRef, XlsxStore};
use crate::types::{CellValue, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Xlsx,
    Memory,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_column() -> String {
    "A".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub workbook: String,
    /// Reject updates that omit a header field instead of blanking the cell
    #[serde(default)]
    pub strict_updates: bool,
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TableConfig {
    pub sheet: String,
    #[serde(default = "default_column")]
    pub key_column: String,
    #[serde(default = "default_column")]
    pub first_column: String,
    pub last_column: String,
    /// Header labels; read from row 1 when omitted
    #[serde(default)]
    pub headers: Vec<String>,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> CrudResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CrudError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            CrudError::Config(msg) => CrudError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        if config.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_dir = parent.join(&config.data_dir);
            }
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> CrudResult<Self> {
        let config: AppConfig = serde_yaml::from_str(content)
            .map_err(|e| CrudError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CrudResult<()> {
        if self.workbook.trim().is_empty() {
            return Err(CrudError::Config("workbook must not be empty".to_string()));
        }
        for (alias, table) in &self.tables {
            let span = table
                .span()
                .map_err(|e| CrudError::Config(format!("table '{}': {}", alias, e)))?;
            let key = table
                .key()
                .map_err(|e| CrudError::Config(format!("table '{}': {}", alias, e)))?;
            if !table.headers.is_empty() {
                RecordSchema::new(table.headers.clone(), key, span)
                    .map_err(|e| CrudError::Config(format!("table '{}': {}", alias, e)))?;
            }
        }
        Ok(())
    }

    pub fn table(&self, alias: &str) -> CrudResult<&TableConfig> {
        self.tables.get(alias).ok_or_else(|| {
            let known: Vec<&str> = self.tables.keys().map(String::as_str).collect();
            CrudError::invalid(format!(
                "unknown table '{}' (configured: {})",
                alias,
                known.join(", ")
            ))
        })
    }

    pub fn table_ref(&self, alias: &str) -> CrudResult<TableRef> {
        Ok(TableRef::new(&self.workbook, &self.table(alias)?.sheet))
    }

    pub fn missing_field_policy(&self) -> MissingFieldPolicy {
        if self.strict_updates {
            MissingFieldPolicy::Reject
        } else {
            MissingFieldPolicy::Blank
        }
    }

    /// Open the configured backend. The memory backend comes up with every
    /// configured table present and its header row written.
    pub fn open(&self) -> CrudResult<RecordStore<Backend>> {
        let backend = match self.backend {
            BackendKind::Xlsx => Backend::Xlsx(XlsxStore::new(&self.data_dir)),
            BackendKind::Memory => {
                let mut store = MemoryStore::new();
                store.add_workbook(&self.workbook);
                for table in self.tables.values() {
                    store.add_table(&self.workbook, &table.sheet, Vec::new());
                }
                Backend::Memory(store)
            }
        };
        let mut records =
            RecordStore::new(backend).with_missing_fields(self.missing_field_policy());
        if self.backend == BackendKind::Memory {
            self.write_headers(&mut records)?;
        }
        Ok(records)
    }

    /// Create the workbook file (xlsx backend) and write configured header
    /// rows into empty tables. Returns the aliases whose headers were written.
    pub fn provision(&self, records: &mut RecordStore<Backend>) -> CrudResult<Vec<String>> {
        if let Backend::Xlsx(store) = records.store() {
            let sheets: Vec<&str> = self.tables.values().map(|t| t.sheet.as_str()).collect();
            store.create_workbook(&self.workbook, &sheets)?;
        }
        self.write_headers(records)
    }

    fn write_headers<S: GridStore>(&self, records: &mut RecordStore<S>) -> CrudResult<Vec<String>> {
        let mut written = Vec::new();
        for (alias, table) in &self.tables {
            if table.headers.is_empty() {
                continue;
            }
            let table_ref = TableRef::new(&self.workbook, &table.sheet);
            if records.store().extent(&table_ref)?.rows > 0 {
                continue;
            }
            let header: Row = table.headers.iter().map(|h| CellValue::from(h.as_str())).collect();
            records.create(&table_ref, header)?;
            info!(table = %table_ref, "header row written");
            written.push(alias.clone());
        }
        Ok(written)
    }
}

impl TableConfig {
    pub fn span(&self) -> CrudResult<ColumnSpan> {
        ColumnSpan::parse(&self.first_column, &self.last_column)
    }

    pub fn key(&self) -> CrudResult<Column> {
        self.key_column.parse()
    }

    /// Schema with configured headers, or the table's header row when none
    /// are configured.
    pub fn schema<S: GridStore>(
        &self,
        records: &RecordStore<S>,
        table: &TableRef,
    ) -> CrudResult<RecordSchema> {
        let span = self.span()?;
        let headers = if self.headers.is_empty() {
            records.header_labels(table, &span)?
        } else {
            self.headers.clone()
        };
        RecordSchema::new(headers, self.key()?, span)
    }

    /// Header labels for display; empty when they cannot be read
    pub fn display_headers<S: GridStore>(&self, records: &RecordStore<S>, table: &TableRef) -> Vec<String> {
        match self.span() {
            Ok(span) if self.headers.is_empty() => records.header_labels(table, &span).or_empty(),
            Ok(_) => self.headers.clone(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
backend: memory
workbook: sales
tables:
  people:
    sheet: People
    last_column: C
    headers: [ID, FIRST, LAST]
  customers:
    sheet: Customer Info
    key_column: B
    first_column: A
    last_column: B
"#;

    #[test]
    fn test_parse_defaults() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(!config.strict_updates);
        let people = config.table("people").unwrap();
        assert_eq!(people.key_column, "A");
        assert_eq!(people.span().unwrap().to_string(), "A:C");
        assert_eq!(config.table("customers").unwrap().key().unwrap().letters(), "B");
    }

    #[test]
    fn test_unknown_table() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        let err = config.table("orders").unwrap_err();
        assert!(err.to_string().contains("customers, people"));
    }

    #[test]
    fn test_rejects_bad_columns() {
        let yaml = "workbook: w\ntables:\n  t:\n    sheet: T\n    last_column: '1'\n";
        assert!(matches!(AppConfig::parse(yaml), Err(CrudError::Config(_))));
    }

    #[test]
    fn test_rejects_header_width_mismatch() {
        let yaml = "workbook: w\ntables:\n  t:\n    sheet: T\n    last_column: C\n    headers: [ID]\n";
        assert!(matches!(AppConfig::parse(yaml), Err(CrudError::Config(_))));
    }

    #[test]
    fn test_memory_backend_writes_headers() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        let records = config.open().unwrap();
        let table = config.table_ref("people").unwrap();
        let span = config.table("people").unwrap().span().unwrap();
        let rows = records.read_range(&table, true, &span).unwrap();
        assert_eq!(rows, vec![vec![
            CellValue::from("ID"),
            CellValue::from("FIRST"),
            CellValue::from("LAST")
        ]]);
    }

    #[test]
    fn test_strict_updates_policy() {
        let config = AppConfig::parse("workbook: w\nstrict_updates: true\n").unwrap();
        assert_eq!(config.missing_field_policy(), MissingFieldPolicy::Reject);
    }
}
