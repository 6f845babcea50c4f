use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Cells
// =============================================================================

/// A single scalar value in a table.
///
/// Spreadsheet cells are heterogeneous. Every variant has exactly one
/// canonical text form (see [`Cell::canonical_text`]) and that form is what
/// row matching and context rendering operate on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// Floats at or above this magnitude are not collapsed to integer text.
const MAX_EXACT_INTEGRAL_FLOAT: f64 = 1e15;

impl Cell {
    /// Build a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Canonical text representation of the cell.
    ///
    /// - text is returned verbatim
    /// - whole finite floats drop the fractional part (`30.0` -> `30`)
    /// - dates render as `YYYY-MM-DD`, date-times as `YYYY-MM-DD HH:MM:SS`
    /// - booleans render as `true` / `false`
    /// - null renders as empty text
    pub fn canonical_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Integer(n) => Cow::Owned(n.to_string()),
            Cell::Float(v) => Cow::Owned(format_float(*v)),
            Cell::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Cell::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
            Cell::DateTime(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::Null => Cow::Borrowed(""),
        }
    }

    /// Returns `true` for [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_text())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGRAL_FLOAT {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}

// =============================================================================
// Table
// =============================================================================

/// Violation of the equal-row-count invariant.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("column '{column}' has {actual} cells, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A named column of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// An immutable, column-oriented dataset.
///
/// All columns have the same number of cells; row `i` is the `i`-th cell of
/// every column. Once built a table is never mutated, so it is shared
/// between sessions as `Arc<Table>` without locking.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table from columns, validating that every column has the
    /// same length.
    pub fn new(columns: Vec<Column>) -> Result<Self, ShapeError> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        for column in &columns {
            if column.cells.len() != row_count {
                return Err(ShapeError::RaggedColumn {
                    column: column.name.clone(),
                    expected: row_count,
                    actual: column.cells.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Build a table from a header row and row-major records.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, ShapeError> {
        let width = headers.len();
        let mut columns: Vec<Vec<Cell>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ShapeError::RaggedRow {
                    row: row_idx,
                    expected: width,
                    actual: row.len(),
                });
            }
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(cell);
            }
        }

        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.columns.get(column).and_then(|c| c.cells.get(row))
    }

    /// A view of row `index`, or `None` if out of range.
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.row_count).then_some(Row { table: self, index })
    }

    /// All rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.row_count).map(move |index| Row { table: self, index })
    }
}

/// A borrowed view of one logical record.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cells in column declaration order.
    pub fn cells(&self) -> impl Iterator<Item = &'a Cell> + 'a {
        let table = self.table;
        let index = self.index;
        table.columns.iter().map(move |c| &c.cells[index])
    }

    pub fn get(&self, column: usize) -> Option<&'a Cell> {
        let table = self.table;
        table.cell(self.index, column)
    }
}

// =============================================================================
// MatchSet
// =============================================================================

/// Row indices selected for one query, in original table order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSet(Vec<usize>);

impl MatchSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Wrap indices produced by an in-order scan.
    pub fn from_indices(indices: Vec<usize>) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    id: Uuid,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::from_rows(
            vec!["name".to_string(), "age".to_string()],
            vec![
                vec![Cell::text("Alice"), Cell::text("30")],
                vec![Cell::text("Bob"), Cell::text("41")],
            ],
        )
        .unwrap()
    }

    // ---- Canonical text ----

    #[test]
    fn test_canonical_text_variants() {
        assert_eq!(Cell::text("Alice").canonical_text(), "Alice");
        assert_eq!(Cell::Integer(-7).canonical_text(), "-7");
        assert_eq!(Cell::Float(30.0).canonical_text(), "30");
        assert_eq!(Cell::Float(2.5).canonical_text(), "2.5");
        assert_eq!(Cell::Bool(true).canonical_text(), "true");
        assert_eq!(Cell::Null.canonical_text(), "");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Cell::Date(date).canonical_text(), "2024-03-09");
        let dt = date.and_hms_opt(14, 5, 0).unwrap();
        assert_eq!(Cell::DateTime(dt).canonical_text(), "2024-03-09 14:05:00");
    }

    #[test]
    fn test_canonical_text_non_finite_floats() {
        assert_eq!(Cell::Float(f64::NAN).canonical_text(), "NaN");
        assert_eq!(Cell::Float(f64::INFINITY).canonical_text(), "inf");
        assert_eq!(Cell::Float(f64::NEG_INFINITY).canonical_text(), "-inf");
    }

    #[test]
    fn test_canonical_text_huge_float_not_collapsed() {
        let text = Cell::Float(1e20).canonical_text().into_owned();
        assert_eq!(text, 1e20f64.to_string());
    }

    #[test]
    fn test_display_matches_canonical_text() {
        assert_eq!(Cell::Float(4.0).to_string(), "4");
        assert_eq!(Cell::Null.to_string(), "");
    }

    #[test]
    fn test_cell_from_conversions() {
        assert_eq!(Cell::from("x"), Cell::Text("x".to_string()));
        assert_eq!(Cell::from(3i64), Cell::Integer(3));
        assert_eq!(Cell::from(1.5f64), Cell::Float(1.5));
        assert_eq!(Cell::from(false), Cell::Bool(false));
        assert!(Cell::Null.is_null());
    }

    // ---- Table shape ----

    #[test]
    fn test_from_rows_builds_columns() {
        let table = people();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(table.cell(1, 0), Some(&Cell::text("Bob")));
        assert_eq!(table.cell(2, 0), None);
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::new("a", vec![Cell::Null, Cell::Null]),
            Column::new("b", vec![Cell::Null]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ShapeError::RaggedColumn {
                column: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let err = Table::from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Cell::Null, Cell::Null], vec![Cell::Null]],
        )
        .unwrap_err();
        assert!(matches!(err, ShapeError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(vec![]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.rows().count(), 0);
    }

    // ---- Rows ----

    #[test]
    fn test_row_view() {
        let table = people();
        let row = table.row(0).unwrap();
        assert_eq!(row.index(), 0);
        let cells: Vec<String> = row.cells().map(|c| c.to_string()).collect();
        assert_eq!(cells, vec!["Alice", "30"]);
        assert!(table.row(2).is_none());
    }

    #[test]
    fn test_rows_iterate_in_order() {
        let table = people();
        let indices: Vec<usize> = table.rows().map(|r| r.index()).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    // ---- MatchSet ----

    #[test]
    fn test_match_set_accessors() {
        let set = MatchSet::from_indices(vec![0, 3, 7]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(3));
        assert!(!set.contains(4));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 3, 7]);
        assert!(MatchSet::empty().is_empty());
    }

    // ---- Conversation turns ----

    #[test]
    fn test_turn_constructors() {
        let user = ConversationTurn::user("hello");
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.content(), "hello");
        let assistant = ConversationTurn::assistant("hi");
        assert_eq!(assistant.role(), Role::Assistant);
        assert_ne!(user.id(), assistant.id());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_turn_json_roundtrip() {
        let turn = ConversationTurn::user("how old is alice?");
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
