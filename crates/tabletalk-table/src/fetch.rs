//! Fetching raw dataset payloads.
//!
//! Fetchers only move bytes. Format detection and parsing happen afterwards
//! so every fetcher shares the same parse rules.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::LoadError;

/// Where a dataset lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocator {
    Url(String),
    Path(PathBuf),
}

impl SourceLocator {
    /// Classify a configured source string.
    ///
    /// `http://` and `https://` are URLs, `file://` is stripped to a path,
    /// anything else is a filesystem path as given.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source.starts_with("http://") || source.starts_with("https://") {
            SourceLocator::Url(source.to_string())
        } else if let Some(path) = source.strip_prefix("file://") {
            SourceLocator::Path(PathBuf::from(path))
        } else {
            SourceLocator::Path(PathBuf::from(source))
        }
    }

    /// Memoization key: the URL verbatim or the path as given.
    pub fn identity(&self) -> String {
        match self {
            SourceLocator::Url(url) => url.clone(),
            SourceLocator::Path(path) => path.to_string_lossy().into_owned(),
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

/// Retrieves the raw bytes behind a locator.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, LoadError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// Downloads datasets over HTTP(S).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Fetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DatasetFetcher for HttpFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, LoadError> {
        let SourceLocator::Url(url) = locator else {
            return Err(LoadError::Fetch(format!("not a URL: {}", locator)));
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Fetch(format!("failed to read body: {}", e.without_url())))?;
        tracing::debug!(url = %url, bytes = body.len(), "Dataset downloaded");
        Ok(body.to_vec())
    }
}

// =============================================================================
// Filesystem
// =============================================================================

/// Reads datasets from the local filesystem.
pub struct FileFetcher;

#[async_trait]
impl DatasetFetcher for FileFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, LoadError> {
        let SourceLocator::Path(path) = locator else {
            return Err(LoadError::Fetch(format!("not a file path: {}", locator)));
        };
        tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::Fetch(format!("{}: {}", path.display(), e)))
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Routes URLs to [`HttpFetcher`] and paths to [`FileFetcher`].
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    pub fn new(http_timeout: Duration) -> Result<Self, LoadError> {
        Ok(Self {
            http: HttpFetcher::new(http_timeout)?,
            file: FileFetcher,
        })
    }
}

#[async_trait]
impl DatasetFetcher for SourceFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, LoadError> {
        match locator {
            SourceLocator::Url(_) => self.http.fetch(locator).await,
            SourceLocator::Path(_) => self.file.fetch(locator).await,
        }
    }
}
