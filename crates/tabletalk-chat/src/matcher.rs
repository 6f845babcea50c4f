//! Row matching: case-insensitive substring containment over canonical cell text.

use tabletalk_core::{MatchSet, Row, Table};

/// Selects the rows of a table whose cells contain a query.
///
/// Stateless and deterministic: the result depends only on the table and the
/// query, so one matcher is shared by every session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowMatcher;

impl RowMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Return the indices of every row where some cell's canonical text
    /// contains `query`, ignoring case, in table order.
    ///
    /// An empty or whitespace-only query matches nothing. Any other query is
    /// used verbatim, surrounding whitespace included.
    pub fn find_matches(&self, table: &Table, query: &str) -> MatchSet {
        if query.trim().is_empty() {
            return MatchSet::empty();
        }
        let needle = query.to_lowercase();
        let indices = table
            .rows()
            .filter(|row| row_contains(row, &needle))
            .map(|row| row.index())
            .collect();
        MatchSet::from_indices(indices)
    }
}

/// `needle` must already be lowercased.
fn row_contains(row: &Row<'_>, needle: &str) -> bool {
    row.cells()
        .any(|cell| cell.canonical_text().to_lowercase().contains(needle))
}
