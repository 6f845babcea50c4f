//! Memoized table loading.
//!
//! One once-cell per source identity. Concurrent first loads of the same
//! source share a single fetch and parse; a failed load leaves the cell
//! empty so the next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use tabletalk_core::Table;

use crate::error::LoadError;
use crate::fetch::{DatasetFetcher, SourceLocator};
use crate::format::SourceFormat;
use crate::parse::parse_table;

type TableCell = Arc<OnceCell<Arc<Table>>>;

/// Process-wide cache of parsed tables keyed by source identity.
#[derive(Default)]
pub struct TableStore {
    cells: Mutex<HashMap<String, TableCell>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_for(&self, source: &str) -> TableCell {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(source.to_string()).or_default())
    }

    /// Return the cached table for `source`, running `init` at most once
    /// across concurrent callers until it succeeds.
    pub async fn get_or_load<F, Fut>(&self, source: &str, init: F) -> Result<Arc<Table>, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table, LoadError>>,
    {
        let cell = self.cell_for(source);
        let table = cell
            .get_or_try_init(move || async move {
                let table = init().await?;
                info!(
                    source = %source,
                    rows = table.row_count(),
                    columns = table.column_count(),
                    "Dataset loaded"
                );
                Ok::<_, LoadError>(Arc::new(table))
            })
            .await?;
        Ok(Arc::clone(table))
    }

    /// Fetch, detect and parse `locator`, memoized by its identity.
    pub async fn load(
        &self,
        locator: &SourceLocator,
        fetcher: &dyn DatasetFetcher,
        format_hint: Option<&str>,
    ) -> Result<Arc<Table>, LoadError> {
        let identity = locator.identity();
        let source = identity.as_str();
        self.get_or_load(source, move || async move {
            let bytes = fetcher.fetch(locator).await?;
            let format = SourceFormat::detect(format_hint, source, &bytes)?;
            debug!(source = %source, format = %format, bytes = bytes.len(), "Parsing dataset");
            tokio::task::spawn_blocking(move || parse_table(&bytes, format))
                .await
                .map_err(|e| LoadError::Malformed(format!("parse task failed: {}", e)))?
        })
        .await
    }

    /// Cached table for `source`, if one has loaded successfully.
    pub fn get(&self, source: &str) -> Option<Arc<Table>> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(source).and_then(|cell| cell.get().cloned())
    }

    /// Drop the cached table so the next load re-fetches and re-parses.
    ///
    /// Tables already handed out stay valid. Returns `true` if an entry existed.
    pub fn invalidate(&self, source: &str) -> bool {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        let removed = cells.remove(source).is_some();
        if removed {
            info!(source = %source, "Dataset cache invalidated");
        }
        removed
    }

    /// Number of sources with a successfully loaded table.
    pub fn loaded_count(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|cell| cell.initialized()).count()
    }
}
