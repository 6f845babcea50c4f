//! Payload parsing: delimited text through `csv`, workbooks through `calamine`.
//!
//! Both paths produce a header row plus row-major cells, then share the same
//! shaping rules: empty header names become `column_<n>`, fully empty rows
//! are skipped, short rows are padded with nulls and long rows truncated to
//! the header width.

use std::fmt;
use std::io::{Cursor, Read, Seek};

use calamine::{DataType, Ods, Reader, Xls, Xlsx};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use tabletalk_core::{Cell, Table};

use crate::error::LoadError;
use crate::format::SourceFormat;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Lines inspected when sniffing the delimiter.
const DELIMITER_SAMPLE_LINES: usize = 5;

/// Parse a complete payload into a table.
pub fn parse_table(bytes: &[u8], format: SourceFormat) -> Result<Table, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyPayload);
    }

    let (headers, rows) = match format {
        SourceFormat::Delimited => read_delimited(bytes)?,
        SourceFormat::Xlsx => {
            let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(malformed)?;
            read_first_sheet(workbook)?
        }
        SourceFormat::Xls => {
            let workbook: Xls<_> = Xls::new(Cursor::new(bytes)).map_err(malformed)?;
            read_first_sheet(workbook)?
        }
        SourceFormat::Ods => {
            let workbook: Ods<_> = Ods::new(Cursor::new(bytes)).map_err(malformed)?;
            read_first_sheet(workbook)?
        }
    };

    shape_table(headers, rows)
}

fn malformed(err: impl fmt::Display) -> LoadError {
    LoadError::Malformed(err.to_string())
}

// =============================================================================
// Delimited text
// =============================================================================

fn read_delimited(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<Cell>>), LoadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| LoadError::Encoding {
        offset: e.valid_up_to(),
    })?;
    if text.trim().is_empty() {
        return Err(LoadError::EmptyPayload);
    }

    let delimiter = detect_delimiter(text);
    debug!(delimiter = ?(delimiter as char), "Sniffed delimiter");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::Malformed(e.to_string()))?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        if headers.is_none() {
            headers = Some(record.iter().map(header_name).collect());
        } else {
            rows.push(record.iter().map(delimited_cell).collect());
        }
    }

    let headers = headers.ok_or(LoadError::EmptyPayload)?;
    Ok((headers, rows))
}

/// Delimiters in tie-break order.
const DELIMITER_CANDIDATES: [u8; 3] = [b',', b'\t', b';'];

/// Prefer the candidate that occurs the same non-zero number of times on
/// every sampled line, the highest such count winning. Otherwise take the
/// most frequent candidate on the first line. Ties keep the earlier
/// candidate; comma is the default.
fn detect_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(DELIMITER_SAMPLE_LINES)
        .collect();

    let mut consistent: Option<(u8, usize)> = None;
    for delimiter in DELIMITER_CANDIDATES {
        let Some(first) = sample.first().map(|line| count_in(line, delimiter)) else {
            break;
        };
        let steady = first > 0 && sample.iter().all(|line| count_in(line, delimiter) == first);
        if steady && consistent.map_or(true, |(_, best)| first > best) {
            consistent = Some((delimiter, first));
        }
    }
    if let Some((delimiter, _)) = consistent {
        return delimiter;
    }

    let mut best = (b',', 0);
    if let Some(header) = sample.first() {
        for delimiter in DELIMITER_CANDIDATES {
            let count = count_in(header, delimiter);
            if count > best.1 {
                best = (delimiter, count);
            }
        }
    }
    best.0
}

fn count_in(line: &str, delimiter: u8) -> usize {
    line.bytes().filter(|b| *b == delimiter).count()
}

/// Type a delimited cell only when the typed value renders back to exactly
/// the source text, so `007`, `1e3` and `3.50` stay text.
fn delimited_cell(raw: &str) -> Cell {
    let value = normalize_newlines(raw.trim());
    if value.is_empty() {
        return Cell::Null;
    }

    let candidate = if let Ok(n) = value.parse::<i64>() {
        Some(Cell::Integer(n))
    } else if let Ok(f) = value.parse::<f64>() {
        f.is_finite().then_some(Cell::Float(f))
    } else if value == "true" || value == "false" {
        Some(Cell::Bool(value == "true"))
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S") {
        Some(Cell::DateTime(dt))
    } else if let Ok(d) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        Some(Cell::Date(d))
    } else {
        None
    };

    match candidate {
        Some(cell) if cell.canonical_text() == value.as_str() => cell,
        _ => Cell::Text(value),
    }
}

// =============================================================================
// Workbooks
// =============================================================================

fn read_first_sheet<RS, R>(mut workbook: R) -> Result<(Vec<String>, Vec<Vec<Cell>>), LoadError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::EmptyPayload)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| LoadError::Malformed(format!("worksheet '{sheet_name}' is unreadable")))?
        .map_err(malformed)?;
    debug!(sheet = %sheet_name, rows = range.height(), "Reading first worksheet");

    let mut rows_iter = range
        .rows()
        .filter(|row| row.iter().any(|value| !workbook_cell(value).is_null()));

    let headers = rows_iter
        .next()
        .ok_or(LoadError::EmptyPayload)?
        .iter()
        .map(|value| header_name(&workbook_cell(value).canonical_text()))
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();

    Ok((headers, rows))
}

fn workbook_cell(value: &DataType) -> Cell {
    match value {
        DataType::Empty => Cell::Null,
        DataType::Int(n) => Cell::Integer(*n),
        DataType::Float(f) => Cell::Float(*f),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => excel_serial_to_cell(*serial),
        DataType::String(s) => {
            let s = normalize_newlines(s.trim());
            if s.is_empty() {
                Cell::Null
            } else {
                Cell::Text(s)
            }
        }
        other => {
            let s = other.to_string();
            iso_datetime_cell(&s).unwrap_or_else(|| Cell::Text(normalize_newlines(s.trim())))
        }
    }
}

/// Workbook serial dates count days from 1899-12-30; the fraction is the
/// time of day.
fn excel_serial_to_cell(serial: f64) -> Cell {
    if !serial.is_finite() || serial < 0.0 {
        return Cell::Float(serial);
    }
    let days = serial.trunc();
    let mut seconds = ((serial - days) * 86_400.0).round() as u32;
    let mut days = days as u64;
    if seconds >= 86_400 {
        days += 1;
        seconds = 0;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30);
    let Some(date) = epoch.and_then(|e| e.checked_add_days(Days::new(days))) else {
        return Cell::Float(serial);
    };
    if seconds == 0 {
        return Cell::Date(date);
    }
    match NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0) {
        Some(time) => Cell::DateTime(date.and_time(time)),
        None => Cell::Float(serial),
    }
}

fn iso_datetime_cell(s: &str) -> Option<Cell> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Cell::DateTime(dt));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Cell::Date)
}

// =============================================================================
// Shaping
// =============================================================================

fn header_name(raw: &str) -> String {
    normalize_newlines(raw.trim())
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn shape_table(
    mut headers: Vec<String>,
    mut rows: Vec<Vec<Cell>>,
) -> Result<Table, LoadError> {
    if headers.is_empty() || rows.is_empty() {
        return Err(LoadError::EmptyPayload);
    }

    for (i, name) in headers.iter_mut().enumerate() {
        if name.is_empty() {
            *name = format!("column_{}", i + 1);
        }
    }

    let width = headers.len();
    for row in rows.iter_mut() {
        row.resize(width, Cell::Null);
    }
    rows.retain(|row| row.iter().any(|cell| !cell.is_null()));
    if rows.is_empty() {
        return Err(LoadError::EmptyPayload);
    }

    Table::from_rows(headers, rows).map_err(|e| LoadError::Malformed(e.to_string()))
}
