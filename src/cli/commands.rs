use crate::config::{AppConfig, TableConfig};
use crate::crud::{ReadFallback, RecordSchema, RecordStore};
use crate::error::{CrudError, CrudResult};
use crate::keys::{KeyGenerator, UuidKeys};
use crate::store::{Backend, TableRef};
use crate::types::{CellValue, FieldMap, RecordValues, Row};
use colored::Colorize;
use std::path::Path;

/// Loaded configuration plus the opened store for one table
struct TableContext {
    settings: TableConfig,
    records: RecordStore<Backend>,
    table: TableRef,
}

impl TableContext {
    fn open(config_path: &Path, alias: &str) -> CrudResult<Self> {
        let config = AppConfig::load(config_path)?;
        let settings = config.table(alias)?.clone();
        let table = config.table_ref(alias)?;
        let records = config.open()?;
        Ok(Self {
            settings,
            records,
            table,
        })
    }

    fn table_config(&self) -> &TableConfig {
        &self.settings
    }
}

fn split_assignment(input: &str) -> CrudResult<(&str, &str)> {
    let (field, value) = input.split_once('=').ok_or_else(|| {
        CrudError::invalid(format!("expected FIELD=VALUE, got '{}'", input))
    })?;
    if field.trim().is_empty() {
        return Err(CrudError::invalid(format!("missing field name in '{}'", input)));
    }
    Ok((field.trim(), value))
}

/// Split `FIELD=VALUE` into a field name and a parsed cell value
pub fn parse_assignment(input: &str) -> CrudResult<(String, CellValue)> {
    let (field, value) = split_assignment(input)?;
    Ok((field.to_string(), CellValue::parse_input(value)))
}

/// Keys are opaque text, so `1001` stays "1001" in the key column
fn key_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        CellValue::Empty
    } else {
        CellValue::from(raw)
    }
}

fn assignments(sets: &[String], key_field: Option<&str>) -> CrudResult<FieldMap> {
    let mut map = FieldMap::new();
    for set in sets {
        let (field, raw) = split_assignment(set)?;
        let value = if Some(field) == key_field {
            key_cell(raw)
        } else {
            CellValue::parse_input(raw)
        };
        map.insert(field, value);
    }
    Ok(map)
}

fn positional(values: &[String], key_offset: Option<usize>) -> Row {
    values
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            if Some(idx) == key_offset {
                key_cell(raw)
            } else {
                CellValue::parse_input(raw)
            }
        })
        .collect()
}

fn print_rows(headers: &[String], rows: &[Row], json: bool) -> CrudResult<()> {
    if json {
        let out = serde_json::to_string_pretty(rows)
            .map_err(|e| CrudError::invalid(format!("cannot encode rows: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if !headers.is_empty() {
        println!("   {}", headers.join(" | ").bold().cyan());
    }
    for row in rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("   {}", cells.join(" | "));
    }
    println!("\n   {} row(s)", rows.len().to_string().bold());
    Ok(())
}

/// Execute the init command - create the workbook and header rows
pub fn init(config_path: &Path) -> CrudResult<()> {
    let config = AppConfig::load(config_path)?;
    println!("{}", "📒 Sheet CRUD - Provisioning workbook".bold().green());
    println!("   Workbook: {}", config.workbook.bright_blue().bold());

    let mut records = config.open()?;
    let written = config.provision(&mut records)?;

    for (alias, table) in &config.tables {
        let marker = if written.contains(alias) {
            "headers written".green()
        } else {
            "unchanged".yellow()
        };
        println!("   📊 {} ({}): {}", alias.cyan(), table.sheet, marker);
    }
    Ok(())
}

/// Execute the keygen command
pub fn keygen(count: usize) -> CrudResult<()> {
    for _ in 0..count {
        println!("{}", UuidKeys.generate());
    }
    Ok(())
}

/// Execute the create command
pub fn create(
    config_path: &Path,
    table: &str,
    values: Vec<String>,
    sets: Vec<String>,
    auto_key: bool,
) -> CrudResult<()> {
    let mut ctx = TableContext::open(config_path, table)?;
    // Header labels are only needed to place a generated key
    let schema = ctx.table_config().schema(&ctx.records, &ctx.table);
    let key_offset = ctx.table_config().span()?.offset_of(ctx.table_config().key()?);
    let key_field = schema.as_ref().ok().map(RecordSchema::key_field);

    let record = match (values.is_empty(), sets.is_empty()) {
        (false, true) => RecordValues::Ordered(positional(&values, key_offset.filter(|_| !auto_key))),
        (true, false) => RecordValues::Fields(assignments(&sets, key_field)?),
        (false, false) => {
            return Err(CrudError::invalid(
                "use either positional values or --set, not both",
            ))
        }
        (true, true) if auto_key => RecordValues::Ordered(Vec::new()),
        (true, true) => return Err(CrudError::invalid("nothing to create")),
    };

    let (record, key) = if auto_key {
        let key = ctx.records.generate_key();
        (RecordValues::Ordered(schema?.keyed_row(record, &key)?), Some(key))
    } else {
        (record, None)
    };

    let row = ctx.records.create(&ctx.table, record)?;
    println!(
        "{} row {} of {}",
        "✅ Created".bold().green(),
        row.to_string().bold(),
        ctx.table.table.bright_blue()
    );
    if let Some(key) = key {
        println!("   Key: {}", key.bold());
    }
    Ok(())
}

/// Execute the read command
pub fn read(config_path: &Path, table: &str, include_header: bool, json: bool) -> CrudResult<()> {
    let ctx = TableContext::open(config_path, table)?;
    let span = ctx.table_config().span()?;
    let rows = ctx.records.read_range(&ctx.table, include_header, &span).or_empty();
    let headers = if include_header || json {
        Vec::new()
    } else {
        ctx.table_config().display_headers(&ctx.records, &ctx.table)
    };
    print_rows(&headers, &rows, json)
}

/// Execute the tail command
pub fn tail(config_path: &Path, table: &str, n: &str, json: bool) -> CrudResult<()> {
    let ctx = TableContext::open(config_path, table)?;
    let span = ctx.table_config().span()?;
    // Argument errors are reported; store failures show as no rows
    let rows = match ctx
        .records
        .get_tail_rows(&ctx.table, CellValue::parse_input(n), &span)
    {
        Err(CrudError::InvalidArgument(msg)) => return Err(CrudError::InvalidArgument(msg)),
        other => other.or_empty(),
    };
    let headers = if json {
        Vec::new()
    } else {
        ctx.table_config().display_headers(&ctx.records, &ctx.table)
    };
    print_rows(&headers, &rows, json)
}

/// Execute the get command
pub fn get(config_path: &Path, table: &str, key: &str, json: bool) -> CrudResult<()> {
    let ctx = TableContext::open(config_path, table)?;
    let table_config = ctx.table_config();
    let lookup = ctx
        .records
        .search_by_key(&ctx.table, key, table_config.key()?, &table_config.span()?)
        .or_empty();

    if json {
        let out = serde_json::to_string_pretty(&lookup)
            .map_err(|e| CrudError::invalid(format!("cannot encode record: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    match (&lookup.row_data, &lookup.range) {
        (Some(row), Some(range)) => {
            println!(
                "{} {} at {}",
                "🔍 Found".bold().green(),
                key.bold(),
                range.to_string().cyan()
            );
            let headers = table_config.display_headers(&ctx.records, &ctx.table);
            for (idx, value) in row.iter().enumerate() {
                let label = headers.get(idx).cloned().unwrap_or_else(|| format!("#{}", idx + 1));
                println!("   {:<20} {}", label.bright_blue(), value);
            }
        }
        _ => println!("{} {}", "⚠️  No record with key".yellow(), key.bold()),
    }
    Ok(())
}

/// Execute the exists command
pub fn exists(config_path: &Path, table: &str, key: &str) -> CrudResult<bool> {
    let ctx = TableContext::open(config_path, table)?;
    let found = ctx
        .records
        .is_valid_key(&ctx.table, key, ctx.table_config().key()?)
        .or_empty();
    println!("{}", found);
    Ok(found)
}

/// Execute the update command
pub fn update(config_path: &Path, table: &str, key: &str, sets: Vec<String>) -> CrudResult<()> {
    if sets.is_empty() {
        return Err(CrudError::invalid("nothing to update, pass --set FIELD=VALUE"));
    }
    let mut ctx = TableContext::open(config_path, table)?;
    let schema = ctx.table_config().schema(&ctx.records, &ctx.table)?;
    let changes = assignments(&sets, Some(schema.key_field()))?;

    if !ctx.records.update_by_key(&ctx.table, &schema, key, &changes)? {
        return Err(CrudError::invalid(format!(
            "no record with key '{}' in {}",
            key, ctx.table
        )));
    }
    println!(
        "{} {} ({} field(s))",
        "✅ Updated".bold().green(),
        key.bold(),
        changes.len()
    );
    Ok(())
}

/// Execute the delete command
pub fn delete(config_path: &Path, table: &str, key: &str) -> CrudResult<()> {
    let mut ctx = TableContext::open(config_path, table)?;
    let key_column = ctx.table_config().key()?;
    let deleted = ctx.records.delete_by_key(&ctx.table, key, key_column)?;
    if deleted == 0 {
        println!("{} {}", "⚠️  No record with key".yellow(), key.bold());
    } else {
        println!(
            "{} {} row(s) with key {}",
            "🗑  Deleted".bold().green(),
            deleted,
            key.bold()
        );
    }
    Ok(())
}

/// Execute the search command
pub fn search(
    config_path: &Path,
    table: &str,
    text: &str,
    from_column: usize,
    json: bool,
) -> CrudResult<()> {
    let ctx = TableContext::open(config_path, table)?;
    let span = ctx.table_config().span()?;
    let rows = ctx
        .records
        .find_rows_containing(&ctx.table, &span, text, from_column)
        .or_empty();
    let headers = if json {
        Vec::new()
    } else {
        ctx.table_config().display_headers(&ctx.records, &ctx.table)
    };
    print_rows(&headers, &rows, json)
}
