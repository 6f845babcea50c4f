//! Error types for dataset loading.

use tabletalk_core::error::TableTalkError;

/// Why a dataset could not be turned into a [`Table`](tabletalk_core::Table).
///
/// Cloneable so a failed load can be stored in every session that observed it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("dataset is empty")]
    EmptyPayload,
    #[error("dataset is malformed: {0}")]
    Malformed(String),
    #[error("dataset is not valid UTF-8 (first invalid byte at offset {offset})")]
    Encoding { offset: usize },
    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to fetch dataset: {0}")]
    Fetch(String),
}

impl LoadError {
    /// Short machine-readable reason, used in logs and API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            LoadError::EmptyPayload => "empty_payload",
            LoadError::Malformed(_) => "malformed",
            LoadError::Encoding { .. } => "encoding",
            LoadError::UnsupportedFormat(_) => "unsupported_format",
            LoadError::Fetch(_) => "fetch",
        }
    }
}

impl From<LoadError> for TableTalkError {
    fn from(err: LoadError) -> Self {
        TableTalkError::Load(err.to_string())
    }
}
