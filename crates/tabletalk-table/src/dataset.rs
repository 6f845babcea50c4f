//! A configured dataset: one locator, one fetcher, one shared store.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use tabletalk_core::config::DatasetConfig;
use tabletalk_core::Table;

use crate::error::LoadError;
use crate::fetch::{DatasetFetcher, SourceFetcher, SourceLocator};
use crate::store::TableStore;

/// Timeout for downloading a remote dataset.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Handle that sessions use to obtain the dataset table.
#[derive(Clone)]
pub struct Dataset {
    locator: SourceLocator,
    format_hint: Option<String>,
    fetcher: Arc<dyn DatasetFetcher>,
    store: Arc<TableStore>,
}

impl Dataset {
    pub fn new(
        locator: SourceLocator,
        fetcher: Arc<dyn DatasetFetcher>,
        store: Arc<TableStore>,
    ) -> Self {
        Self {
            locator,
            format_hint: None,
            fetcher,
            store,
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    /// Build from the `[dataset]` config section with the default fetcher.
    pub fn from_config(config: &DatasetConfig, store: Arc<TableStore>) -> Result<Self, LoadError> {
        if config.source.trim().is_empty() {
            return Err(LoadError::Fetch("no dataset source configured".to_string()));
        }
        let fetcher = SourceFetcher::new(DEFAULT_FETCH_TIMEOUT)?;
        let mut dataset = Self::new(SourceLocator::parse(&config.source), Arc::new(fetcher), store);
        if let Some(hint) = &config.format {
            dataset = dataset.with_format_hint(hint.clone());
        }
        Ok(dataset)
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    pub fn source(&self) -> String {
        self.locator.identity()
    }

    /// Load (or return the memoized) table.
    pub async fn load(&self) -> Result<Arc<Table>, LoadError> {
        let result = self
            .store
            .load(&self.locator, self.fetcher.as_ref(), self.format_hint.as_deref())
            .await;
        if let Err(e) = &result {
            warn!(source = %self.locator, reason = e.reason(), error = %e, "Dataset load failed");
        }
        result
    }

    /// The table if it has already loaded, without triggering a load.
    pub fn cached(&self) -> Option<Arc<Table>> {
        self.store.get(&self.locator.identity())
    }

    /// Discard the memoized table and load again.
    pub async fn reload(&self) -> Result<Arc<Table>, LoadError> {
        self.store.invalidate(&self.locator.identity());
        self.load().await
    }
}
