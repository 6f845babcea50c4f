//! Prompt context rendering.
//!
//! Renders matched rows as a header line plus one `" | "`-joined line per
//! row, bounded by a character budget.

use tabletalk_core::{MatchSet, Table};

/// Returned instead of an empty block when nothing matched.
pub const NO_DATA_SENTINEL: &str = "No relevant data found.";

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

const CELL_SEPARATOR: &str = " | ";

// =============================================================================
// ContextFormatter
// =============================================================================

/// Turns a [`MatchSet`] into the data block embedded in the prompt.
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    max_chars: usize,
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_CHARS)
    }
}

impl ContextFormatter {
    /// `max_chars` bounds the whole block, truncation marker included,
    /// counted in Unicode scalar values.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Render the matched rows of `table`.
    ///
    /// Rows keep match order and columns keep declaration order. When the
    /// budget runs out, trailing rows are dropped whole and a marker line
    /// reports how many were omitted. If not even the header and the marker
    /// fit, the block is the marker alone.
    pub fn format(&self, matches: &MatchSet, table: &Table) -> String {
        if matches.is_empty() {
            return NO_DATA_SENTINEL.to_string();
        }

        let total = matches.len();
        let header = table.column_names().collect::<Vec<_>>().join(CELL_SEPARATOR);
        let header_len = header.chars().count();

        // Render rows only while they could still fit; `ends[k]` is the
        // block length with the first `k` rows.
        let mut lines = Vec::new();
        let mut ends = vec![header_len];
        let mut used = header_len;
        for index in matches.iter() {
            let line = render_row(table, index);
            let after = used + 1 + line.chars().count();
            if after > self.max_chars {
                break;
            }
            lines.push(line);
            ends.push(after);
            used = after;
        }

        if lines.len() == total && used <= self.max_chars {
            let mut out = header;
            for line in &lines {
                out.push('\n');
                out.push_str(line);
            }
            return out;
        }

        let fitting = (0..=lines.len()).rev().find_map(|kept| {
            let marker = marker(total - kept);
            (ends[kept] + 1 + marker.chars().count() <= self.max_chars).then_some((kept, marker))
        });

        match fitting {
            Some((kept, marker)) => {
                let mut out = header;
                for line in &lines[..kept] {
                    out.push('\n');
                    out.push_str(line);
                }
                out.push('\n');
                out.push_str(&marker);
                out
            }
            None => marker(total).chars().take(self.max_chars).collect(),
        }
    }
}

fn render_row(table: &Table, index: usize) -> String {
    let cells: Vec<_> = (0..table.column_count())
        .map(|col| {
            table
                .cell(index, col)
                .map(|cell| cell.canonical_text())
                .unwrap_or_default()
        })
        .collect();
    cells.join(CELL_SEPARATOR)
}

fn marker(omitted: usize) -> String {
    format!("[... {} more matching rows omitted]", omitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::RowMatcher;
    use tabletalk_core::Cell;

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

    fn numbered(rows: usize) -> Table {
        Table::from_rows(
            vec!["id".to_string(), "label".to_string()],
            (0..rows)
                .map(|i| vec![Cell::Integer(i as i64), Cell::text(format!("row-{i:04}"))])
                .collect(),
        )
        .unwrap()
    }

    fn all_rows(table: &Table) -> MatchSet {
        MatchSet::from_indices((0..table.row_count()).collect())
    }

    // ---- sentinel ----

    #[test]
    fn test_empty_match_set_returns_sentinel() {
        let out = ContextFormatter::default().format(&MatchSet::empty(), &people());
        assert_eq!(out, NO_DATA_SENTINEL);
        assert_eq!(out, "No relevant data found.");
    }

    // ---- rendering ----

    #[test]
    fn test_scenario_alice() {
        let table = people();
        let matches = RowMatcher::new().find_matches(&table, "alice");
        let out = ContextFormatter::default().format(&matches, &table);
        assert_eq!(out, "name | age\nAlice | 30");
        assert!(out.contains("Alice"));
        assert!(out.contains("30"));
        assert!(!out.contains("Bob"));
    }

    #[test]
    fn test_rows_in_match_order_and_nulls_empty() {
        let table = Table::from_rows(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                vec![Cell::text("x"), Cell::Null, Cell::Float(1.5)],
                vec![Cell::text("y"), Cell::Bool(false), Cell::Integer(2)],
            ],
        )
        .unwrap();
        let out = ContextFormatter::default().format(&all_rows(&table), &table);
        assert_eq!(out, "a | b | c\nx |  | 1.5\ny | false | 2");
    }

    #[test]
    fn test_matched_rows_contain_query() {
        let table = numbered(50);
        for query in ["ROW-001", "7", "row-0049"] {
            let matches = RowMatcher::new().find_matches(&table, query);
            let out = ContextFormatter::new(100_000).format(&matches, &table);
            let lines: Vec<&str> = out.lines().skip(1).collect();
            assert_eq!(lines.len(), matches.len());
            for line in lines {
                assert!(line.to_lowercase().contains(&query.to_lowercase()));
            }
        }
    }

    // ---- truncation ----

    #[test]
    fn test_truncation_drops_trailing_rows_with_marker() {
        let table = numbered(100);
        let formatter = ContextFormatter::new(200);
        let out = formatter.format(&all_rows(&table), &table);

        assert!(out.chars().count() <= 200);
        let last = out.lines().last().unwrap();
        assert!(last.starts_with("[... "));
        assert!(last.ends_with(" more matching rows omitted]"));

        let kept = out.lines().count() - 2;
        assert_eq!(last, format!("[... {} more matching rows omitted]", 100 - kept));
        assert!(out.lines().nth(1).unwrap().starts_with("0 | row-0000"));
        for line in out.lines().skip(1).take(kept) {
            assert!(line.contains(" | row-"));
        }
    }

    #[test]
    fn test_budget_never_exceeded() {
        let table = numbered(300);
        let matches = all_rows(&table);
        for budget in [1, 5, 20, 37, 38, 60, 120, 500, 4000] {
            let out = ContextFormatter::new(budget).format(&matches, &table);
            assert!(
                out.chars().count() <= budget,
                "budget {budget} exceeded: {}",
                out.chars().count()
            );
        }
    }

    #[test]
    fn test_marker_alone_when_header_cannot_fit() {
        let table = numbered(3);
        let marker_len = marker(3).chars().count();
        let out = ContextFormatter::new(marker_len + 2).format(&all_rows(&table), &table);
        assert_eq!(out, "[... 3 more matching rows omitted]");
    }

    #[test]
    fn test_exact_fit_has_no_marker() {
        let table = people();
        let full = "name | age\nAlice | 30\nBob | 41";
        let out = ContextFormatter::new(full.chars().count()).format(&all_rows(&table), &table);
        assert_eq!(out, full);
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        let table = Table::from_rows(
            vec!["w".to_string()],
            vec![vec![Cell::text("éééé")], vec![Cell::text("üüüü")]],
        )
        .unwrap();
        let full = "w\néééé\nüüüü";
        let out = ContextFormatter::new(full.chars().count()).format(&all_rows(&table), &table);
        assert_eq!(out, full);
    }
}
