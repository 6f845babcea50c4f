//! Parsing a real `.xlsx` workbook end to end.
//!
//! `fixtures/people.xlsx` holds one sheet: a `name, age, joined` header, a
//! blank third row, text and numeric cells, and `joined` cells styled with
//! the builtin short-date format.

use chrono::NaiveDate;

use tabletalk_core::Cell;
use tabletalk_table::{parse_table, SourceFormat};

const PEOPLE_XLSX: &[u8] = include_bytes!("fixtures/people.xlsx");

#[test]
fn test_xlsx_detected_by_extension_and_magic() {
    assert_eq!(
        SourceFormat::detect(None, "people.xlsx", PEOPLE_XLSX).unwrap(),
        SourceFormat::Xlsx
    );
    assert_eq!(
        SourceFormat::detect(None, "https://host/download?id=7", PEOPLE_XLSX).unwrap(),
        SourceFormat::Xlsx
    );
}

#[test]
fn test_xlsx_header_and_rows() {
    let format = SourceFormat::detect(None, "people.xlsx", PEOPLE_XLSX).unwrap();
    let table = parse_table(PEOPLE_XLSX, format).unwrap();

    let names: Vec<&str> = table.column_names().collect();
    assert_eq!(names, vec!["name", "age", "joined"]);
    // The blank row between Alice and Bob is skipped.
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 0), Some(&Cell::text("Alice")));
    assert_eq!(table.cell(1, 0), Some(&Cell::text("Bob")));
}

#[test]
fn test_xlsx_numbers_render_like_source() {
    let table = parse_table(PEOPLE_XLSX, SourceFormat::Xlsx).unwrap();

    let age = table.cell(0, 1).unwrap();
    assert_eq!(age, &Cell::Float(30.0));
    assert_eq!(age.canonical_text(), "30");
    assert_eq!(table.cell(1, 1).unwrap().canonical_text(), "41.5");
}

#[test]
fn test_xlsx_date_styled_cells_become_dates() {
    let table = parse_table(PEOPLE_XLSX, SourceFormat::Xlsx).unwrap();

    assert_eq!(
        table.cell(0, 2),
        Some(&Cell::Date(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()))
    );
    assert_eq!(table.cell(1, 2).unwrap().canonical_text(), "2023-03-16");
}
