//! Record layer tests over the in-memory store

use pretty_assertions::assert_eq;
use sheet_crud::keys::SequentialKeys;
use sheet_crud::{
    CellRange, CellValue, ColumnSpan, CrudError, FieldMap, GridStore, MemoryStore,
    MissingFieldPolicy, RecordSchema, RecordStore, RecordValues, Row, TableRef,
};

fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| CellValue::from(*c)).collect()
}

fn people_table(rows: Vec<Row>) -> (RecordStore<MemoryStore>, TableRef) {
    let mut all = vec![row(&["ID", "FIRST", "LAST"])];
    all.extend(rows);
    let store = MemoryStore::new().with_table("crm", "People", all);
    let records = RecordStore::new(store).with_key_generator(SequentialKeys::new("k"));
    (records, TableRef::new("crm", "People"))
}

fn span() -> ColumnSpan {
    ColumnSpan::parse("A", "C").unwrap()
}

fn schema() -> RecordSchema {
    RecordSchema::new(
        vec!["ID".into(), "FIRST".into(), "LAST".into()],
        "A".parse().unwrap(),
        span(),
    )
    .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// CONCRETE SCENARIO
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_people_scenario() {
    let (mut records, table) = people_table(Vec::new());

    records.create(&table, row(&["k1", "John", "Doe"])).unwrap();
    records.create(&table, row(&["k2", "Jane", "Doe"])).unwrap();

    let tail = records.get_tail_rows(&table, 1, &span()).unwrap();
    assert_eq!(tail, vec![row(&["k2", "Jane", "Doe"])]);

    let deleted = records.delete_by_key(&table, "k1", "A".parse().unwrap()).unwrap();
    assert_eq!(deleted, 1);

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k2", "Jane", "Doe"])]);
}

// ═══════════════════════════════════════════════════════════════════════════
// CREATE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_create_round_trip() {
    let (mut records, table) = people_table(Vec::new());
    let record = row(&["k7", "Ada", "Lovelace"]);

    let written = records.create(&table, record.clone()).unwrap();
    assert_eq!(written, 2);

    let lookup = records
        .search_by_key(&table, "k7", "A".parse().unwrap(), &span())
        .unwrap();
    assert_eq!(lookup.row_data, Some(record));
    assert_eq!(lookup.row_index, 2);
    assert_eq!(lookup.range.unwrap().to_string(), "A2:C2");
}

#[test]
fn test_create_from_field_map_keeps_insertion_order() {
    let (mut records, table) = people_table(Vec::new());
    let mut fields = FieldMap::new();
    fields.insert("ID", "k9");
    fields.insert("LAST", "Hopper");
    fields.insert("FIRST", "Grace");

    records.create(&table, RecordValues::Fields(fields)).unwrap();

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k9", "Hopper", "Grace"])]);
}

#[test]
fn test_create_with_generated_key_aligns_to_headers() {
    let (mut records, table) = people_table(Vec::new());
    let mut fields = FieldMap::new();
    fields.insert("LAST", "Hopper");
    fields.insert("FIRST", "Grace");

    let key = records.generate_key();
    let keyed = schema().keyed_row(RecordValues::Fields(fields), &key).unwrap();
    records.create(&table, keyed).unwrap();

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k1", "Grace", "Hopper"])]);
}

#[test]
fn test_create_appends_after_last_occupied_row() {
    let (mut records, table) =
        people_table(vec![row(&["k1", "a", "b"]), row(&["", "", ""]), row(&["k3", "c", "d"])]);
    let written = records.create(&table, row(&["k4", "e", "f"])).unwrap();
    assert_eq!(written, 5);
}

#[test]
fn test_generated_keys_are_distinct() {
    let (records, _) = people_table(Vec::new());
    assert_eq!(records.generate_key(), "k1");
    assert_eq!(records.generate_key(), "k2");

    let uuid_records = RecordStore::new(MemoryStore::new());
    assert_ne!(uuid_records.generate_key(), uuid_records.generate_key());
}

// ═══════════════════════════════════════════════════════════════════════════
// READ
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_read_range_stops_at_first_blank_row() {
    let (records, table) = people_table(vec![
        row(&["k1", "a", "b"]),
        row(&["k2", "c", "d"]),
        row(&["", "", ""]),
        row(&["k3", "e", "f"]),
    ]);

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k1", "a", "b"]), row(&["k2", "c", "d"])]);
}

#[test]
fn test_read_range_with_header() {
    let (records, table) = people_table(vec![row(&["k1", "a", "b"])]);
    let rows = records.read_range(&table, true, &span()).unwrap();
    assert_eq!(rows, vec![row(&["ID", "FIRST", "LAST"]), row(&["k1", "a", "b"])]);
}

#[test]
fn test_read_range_keeps_rows_with_some_blank_cells() {
    let (records, table) = people_table(vec![row(&["k1", "", ""]), row(&["k2", "x", ""])]);
    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_read_range_of_header_only_table_is_empty() {
    let (records, table) = people_table(Vec::new());
    assert!(records.read_range(&table, false, &span()).unwrap().is_empty());
}

#[test]
fn test_read_address_returns_exact_rectangle() {
    let (records, table) = people_table(vec![
        row(&["k1", "a", "b"]),
        row(&["", "", ""]),
        row(&["k3", "e", "f"]),
    ]);

    let range = CellRange::parse("People!B1:C4").unwrap();
    let rows = records.read_address(&table, &range, false).unwrap();
    assert_eq!(
        rows,
        vec![row(&["a", "b"]), row(&["", ""]), row(&["e", "f"])]
    );
}

#[test]
fn test_read_address_rejects_other_sheet() {
    let (records, table) = people_table(Vec::new());
    let range = CellRange::parse("Orders!A1:C2").unwrap();
    assert!(matches!(
        records.read_address(&table, &range, true),
        Err(CrudError::InvalidArgument(_))
    ));
}

#[test]
fn test_missing_table_is_store_failure() {
    let (records, _) = people_table(Vec::new());
    let err = records
        .read_range(&TableRef::new("crm", "Nope"), false, &span())
        .unwrap_err();
    assert!(err.is_store_failure());
}

// ═══════════════════════════════════════════════════════════════════════════
// KEY LOOKUP
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_lookup_miss_is_sentinel() {
    let (records, table) = people_table(vec![row(&["k1", "a", "b"])]);
    let lookup = records
        .search_by_key(&table, "nonexistent", "A".parse().unwrap(), &span())
        .unwrap();
    assert_eq!(lookup.row_data, None);
    assert_eq!(lookup.row_index, -1);
    assert_eq!(lookup.range, None);
    assert!(lookup.handle().is_none());
}

#[test]
fn test_lookup_returns_first_match() {
    let (records, table) =
        people_table(vec![row(&["dup", "first", "x"]), row(&["dup", "second", "y"])]);
    let lookup = records
        .search_by_key(&table, "dup", "A".parse().unwrap(), &span())
        .unwrap();
    assert_eq!(lookup.row_index, 2);
    assert_eq!(lookup.row_data, Some(row(&["dup", "first", "x"])));
}

#[test]
fn test_is_valid_key_is_exact() {
    let (records, table) = people_table(vec![row(&["abc123", "a", "b"])]);
    let key_column = "A".parse().unwrap();
    assert!(records.is_valid_key(&table, "abc123", key_column).unwrap());
    assert!(!records.is_valid_key(&table, "abc", key_column).unwrap());
    assert!(!records.is_valid_key(&table, "ABC123", key_column).unwrap());
}

#[test]
fn test_header_is_not_a_key() {
    let (records, table) = people_table(Vec::new());
    assert!(!records.is_valid_key(&table, "ID", "A".parse().unwrap()).unwrap());
}

#[test]
fn test_lookup_on_non_first_key_column() {
    let store = MemoryStore::new().with_table(
        "erp",
        "Customer Info",
        vec![row(&["NAME", "CUSTOMER KEY"]), row(&["Acme", "c-1"]), row(&["Globex", "c-2"])],
    );
    let records = RecordStore::new(store);
    let table = TableRef::new("erp", "Customer Info");
    let lookup = records
        .search_by_key(&table, "c-2", "B".parse().unwrap(), &ColumnSpan::parse("A", "B").unwrap())
        .unwrap();
    assert_eq!(lookup.row_index, 3);
    assert_eq!(lookup.row_data, Some(row(&["Globex", "c-2"])));
}

// ═══════════════════════════════════════════════════════════════════════════
// TAIL
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_tail_returns_last_rows_in_order() {
    let (records, table) = people_table(vec![
        row(&["k1", "a", "a"]),
        row(&["k2", "b", "b"]),
        row(&["k3", "c", "c"]),
    ]);

    let tail = records.get_tail_rows(&table, 2, &span()).unwrap();
    assert_eq!(tail, vec![row(&["k2", "b", "b"]), row(&["k3", "c", "c"])]);

    let all = records.get_tail_rows(&table, 10, &span()).unwrap();
    assert_eq!(all.len(), 3);

    assert!(records.get_tail_rows(&table, 0, &span()).unwrap().is_empty());
}

#[test]
fn test_tail_accepts_numeric_text() {
    let (records, table) = people_table(vec![row(&["k1", "a", "a"]), row(&["k2", "b", "b"])]);
    let tail = records.get_tail_rows(&table, "1", &span()).unwrap();
    assert_eq!(tail, vec![row(&["k2", "b", "b"])]);
}

#[test]
fn test_tail_rejects_non_integers() {
    let (records, table) = people_table(vec![row(&["k1", "a", "a"])]);
    for bad in [CellValue::from("two"), CellValue::Number(1.5), CellValue::Number(-1.0)] {
        assert!(matches!(
            records.get_tail_rows(&table, bad, &span()),
            Err(CrudError::InvalidArgument(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_update_overwrites_only_target_row() {
    let store = MemoryStore::new().with_table(
        "crm",
        "Pairs",
        vec![row(&["ID", "NAME"]), row(&["a", "1"]), row(&["b", "2"]), row(&["c", "3"])],
    );
    let mut records = RecordStore::new(store);
    let table = TableRef::new("crm", "Pairs");
    let pair = ColumnSpan::parse("A", "B").unwrap();

    let handle = records
        .search_by_key(&table, "b", "A".parse().unwrap(), &pair)
        .unwrap()
        .handle()
        .unwrap();
    let mut values = FieldMap::new();
    values.insert("ID", "x");
    values.insert("NAME", "y");
    records.update(&table, &["ID", "NAME"], &handle, &values).unwrap();

    let rows = records.read_range(&table, true, &pair).unwrap();
    assert_eq!(
        rows,
        vec![row(&["ID", "NAME"]), row(&["a", "1"]), row(&["x", "y"]), row(&["c", "3"])]
    );
}

#[test]
fn test_update_blanks_missing_fields_by_default() {
    let (mut records, table) = people_table(vec![row(&["k1", "John", "Doe"])]);
    let handle = records
        .search_by_key(&table, "k1", "A".parse().unwrap(), &span())
        .unwrap()
        .handle()
        .unwrap();
    let mut values = FieldMap::new();
    values.insert("ID", "k1");
    values.insert("FIRST", "Johnny");
    records
        .update(&table, &["ID", "FIRST", "LAST"], &handle, &values)
        .unwrap();

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(
        rows,
        vec![vec![CellValue::from("k1"), CellValue::from("Johnny"), CellValue::Empty]]
    );
}

#[test]
fn test_update_reject_policy() {
    let (records, table) = people_table(vec![row(&["k1", "John", "Doe"])]);
    let mut records = records.with_missing_fields(MissingFieldPolicy::Reject);
    let handle = records
        .search_by_key(&table, "k1", "A".parse().unwrap(), &span())
        .unwrap()
        .handle()
        .unwrap();
    let mut values = FieldMap::new();
    values.insert("ID", "k1");

    let err = records
        .update(&table, &["ID", "FIRST", "LAST"], &handle, &values)
        .unwrap_err();
    assert!(err.to_string().contains("FIRST, LAST"));

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k1", "John", "Doe"])]);
}

#[test]
fn test_update_with_mismatched_range_is_shape_error() {
    let (mut records, table) = people_table(vec![row(&["k1", "John", "Doe"])]);
    let handle = records
        .handle_for(&table, &CellRange::parse("A2:D2").unwrap())
        .unwrap();
    let err = records
        .update(&table, &["ID", "FIRST", "LAST"], &handle, &FieldMap::new())
        .unwrap_err();
    assert!(matches!(err, CrudError::ShapeMismatch { .. }));
}

#[test]
fn test_update_by_key_merges_changes() {
    let (mut records, table) =
        people_table(vec![row(&["k1", "John", "Doe"]), row(&["k2", "Jane", "Doe"])]);
    let mut changes = FieldMap::new();
    changes.insert("LAST", "Smith");

    assert!(records.update_by_key(&table, &schema(), "k2", &changes).unwrap());
    assert!(!records.update_by_key(&table, &schema(), "k3", &changes).unwrap());

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k1", "John", "Doe"]), row(&["k2", "Jane", "Smith"])]);
}

#[test]
fn test_update_by_key_rejects_unknown_field() {
    let (mut records, table) = people_table(vec![row(&["k1", "John", "Doe"])]);
    let mut changes = FieldMap::new();
    changes.insert("EMAIL", "j@example.com");
    assert!(matches!(
        records.update_by_key(&table, &schema(), "k1", &changes),
        Err(CrudError::InvalidArgument(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// DELETE AND ROW HANDLES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_delete_reindexes_following_rows() {
    let (mut records, table) = people_table(vec![
        row(&["k1", "a", "a"]),
        row(&["k2", "b", "b"]),
        row(&["k3", "c", "c"]),
    ]);

    records.store_mut().delete_row(&table, 2).unwrap();

    let lookup = records
        .search_by_key(&table, "k2", "A".parse().unwrap(), &span())
        .unwrap();
    assert_eq!(lookup.row_index, 2);
    assert_eq!(lookup.range.unwrap().to_string(), "A2:C2");
}

#[test]
fn test_stale_handle_is_rejected() {
    let (mut records, table) = people_table(vec![
        row(&["k1", "a", "a"]),
        row(&["k2", "b", "b"]),
        row(&["k3", "c", "c"]),
    ]);
    let handle = records
        .search_by_key(&table, "k3", "A".parse().unwrap(), &span())
        .unwrap()
        .handle()
        .unwrap();

    records.delete_by_key(&table, "k1", "A".parse().unwrap()).unwrap();

    let values = schema().record(&row(&["k3", "changed", "changed"]));
    let err = records.update(&table, &schema().headers, &handle, &values).unwrap_err();
    assert!(matches!(err, CrudError::StaleRowHandle { .. }));

    // The row the stale handle pointed at now holds nothing; k2 and k3 are intact
    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k2", "b", "b"]), row(&["k3", "c", "c"])]);
}

#[test]
fn test_handles_on_other_tables_stay_valid() {
    let store = MemoryStore::new()
        .with_table("crm", "A", vec![row(&["ID"]), row(&["a1"])])
        .with_table("crm", "B", vec![row(&["ID"]), row(&["b1"]), row(&["b2"])]);
    let mut records = RecordStore::new(store);
    let (a, b) = (TableRef::new("crm", "A"), TableRef::new("crm", "B"));
    let one = ColumnSpan::parse("A", "A").unwrap();

    let handle = records
        .search_by_key(&a, "a1", "A".parse().unwrap(), &one)
        .unwrap()
        .handle()
        .unwrap();
    records.delete_by_key(&b, "b1", "A".parse().unwrap()).unwrap();

    let mut values = FieldMap::new();
    values.insert("ID", "a2");
    records.update(&a, &["ID"], &handle, &values).unwrap();
    assert!(records.is_valid_key(&a, "a2", "A".parse().unwrap()).unwrap());
}

#[test]
fn test_delete_removes_every_match() {
    let (mut records, table) = people_table(vec![
        row(&["dup", "a", "a"]),
        row(&["k2", "b", "b"]),
        row(&["dup", "c", "c"]),
    ]);
    let deleted = records.delete_by_key(&table, "dup", "A".parse().unwrap()).unwrap();
    assert_eq!(deleted, 2);
    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(rows, vec![row(&["k2", "b", "b"])]);
}

#[test]
fn test_delete_reaches_past_blank_rows() {
    let (mut records, table) = people_table(vec![
        row(&["k1", "a", "a"]),
        row(&["", "", ""]),
        row(&["k3", "c", "c"]),
    ]);
    assert_eq!(records.delete_by_key(&table, "k3", "A".parse().unwrap()).unwrap(), 1);
    assert_eq!(records.store().extent(&table).unwrap().rows, 2);
}

#[test]
fn test_delete_never_touches_header() {
    let (mut records, table) = people_table(vec![row(&["k1", "a", "a"])]);
    assert_eq!(records.delete_by_key(&table, "ID", "A".parse().unwrap()).unwrap(), 0);
    assert_eq!(records.header_labels(&table, &span()).unwrap(), vec!["ID", "FIRST", "LAST"]);
}

#[test]
fn test_delete_missing_key_is_noop() {
    let (mut records, table) = people_table(vec![row(&["k1", "a", "a"])]);
    assert_eq!(records.delete_by_key(&table, "zz", "A".parse().unwrap()).unwrap(), 0);
    assert_eq!(records.store().revision(&table).unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH AND BULK REWRITE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_find_rows_containing_ignores_case() {
    let (records, table) = people_table(vec![
        row(&["k1", "Johnny", "Doe"]),
        row(&["k2", "Jane", "Doe"]),
        row(&["k3", "Mary", "Johnson"]),
    ]);

    let rows = records.find_rows_containing(&table, &span(), "JOHN", 1).unwrap();
    assert_eq!(rows, vec![row(&["k1", "Johnny", "Doe"]), row(&["k3", "Mary", "Johnson"])]);

    // Offset past FIRST only searches LAST
    let rows = records.find_rows_containing(&table, &span(), "john", 2).unwrap();
    assert_eq!(rows, vec![row(&["k3", "Mary", "Johnson"])]);

    assert!(records.find_rows_containing(&table, &span(), "", 0).unwrap().is_empty());
}

#[test]
fn test_rewrite_where_resolves_each_key() {
    let (mut records, table) = people_table(vec![
        row(&["k1", "John", "Doe"]),
        row(&["k2", "Jane", "Doe"]),
        row(&["k3", "Mary", "Major"]),
    ]);

    let rewritten = records
        .rewrite_where(
            &table,
            &schema(),
            |record| record.get("LAST") == Some(&CellValue::from("Doe")),
            |record| record.insert("LAST", "Roe"),
        )
        .unwrap();
    assert_eq!(rewritten, 2);

    let rows = records.read_range(&table, false, &span()).unwrap();
    assert_eq!(
        rows,
        vec![
            row(&["k1", "John", "Roe"]),
            row(&["k2", "Jane", "Roe"]),
            row(&["k3", "Mary", "Major"]),
        ]
    );
}
