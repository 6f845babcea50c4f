//! Benchmarks for row matching and context rendering.
//!
//! Uses a 10,000-row table by default. Set `BENCH_FULL_SCALE=1` to run
//! against 100,000 rows:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p tabletalk-chat
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tabletalk_chat::{ContextFormatter, RowMatcher};
use tabletalk_core::{Cell, MatchSet, Table};

const CI_ROW_COUNT: usize = 10_000;
const FULL_SCALE_ROW_COUNT: usize = 100_000;

const CITIES: [&str; 5] = ["Paris", "London", "Berlin", "Madrid", "Lisbon"];

fn row_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_ROW_COUNT
    } else {
        CI_ROW_COUNT
    }
}

/// Employee-style table with mixed text, integer and float cells.
fn build_table(rows: usize) -> Table {
    let headers = ["id", "name", "city", "salary", "notes"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            vec![
                Cell::Integer(i as i64),
                Cell::text(format!("Employee {}", i)),
                Cell::text(CITIES[i % CITIES.len()]),
                Cell::Float(30_000.0 + (i % 97) as f64 * 125.5),
                Cell::text(if i % 50 == 0 {
                    "Reviewed the quarterly budget"
                } else {
                    "No remarks"
                }),
            ]
        })
        .collect();
    Table::from_rows(headers, rows).expect("benchmark table is rectangular")
}

fn bench_find_matches(c: &mut Criterion) {
    let count = row_count();
    let table = build_table(count);
    let matcher = RowMatcher::new();

    let mut group = c.benchmark_group("find_matches");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("selective_{}rows", count), |b| {
        b.iter(|| {
            let matches = matcher.find_matches(&table, black_box("budget"));
            assert!(!matches.is_empty());
            matches
        });
    });

    group.bench_function(format!("broad_{}rows", count), |b| {
        b.iter(|| matcher.find_matches(&table, black_box("paris")));
    });

    group.bench_function(format!("no_match_{}rows", count), |b| {
        b.iter(|| {
            let matches = matcher.find_matches(&table, black_box("zzzz"));
            assert!(matches.is_empty());
            matches
        });
    });

    group.finish();
}

fn bench_format_context(c: &mut Criterion) {
    let count = row_count();
    let table = build_table(count);
    let formatter = ContextFormatter::default();
    let all = MatchSet::from_indices((0..count).collect());

    let mut group = c.benchmark_group("format_context");
    group.sample_size(50);

    group.bench_function(format!("truncated_{}rows", count), |b| {
        b.iter(|| {
            let context = formatter.format(black_box(&all), &table);
            assert!(context.chars().count() <= formatter.max_chars());
            context
        });
    });

    group.finish();
}

criterion_group!(benches, bench_find_matches, bench_format_context);
criterion_main!(benches);
