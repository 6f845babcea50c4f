//! Error types for the chat pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use tabletalk_core::error::TableTalkError;
use tabletalk_core::redact_secrets;
use tabletalk_table::LoadError;

// =============================================================================
// ChatError
// =============================================================================

/// Errors returned by session operations.
///
/// Generation failures are not here: they are recorded as an assistant turn
/// and the turn still completes.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("dataset unavailable: {0}")]
    TableUnavailable(LoadError),
    #[error("turn cancelled")]
    Cancelled,
}

impl From<ChatError> for TableTalkError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::TableUnavailable(load) => load.into(),
            other => TableTalkError::Chat(other.to_string()),
        }
    }
}

// =============================================================================
// GenerationError
// =============================================================================

/// Classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    AuthError,
    RateLimited,
    Timeout,
    BackendUnavailable,
    Unknown,
}

impl GenerationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationErrorKind::AuthError => "auth_error",
            GenerationErrorKind::RateLimited => "rate_limited",
            GenerationErrorKind::Timeout => "timeout",
            GenerationErrorKind::BackendUnavailable => "backend_unavailable",
            GenerationErrorKind::Unknown => "unknown",
        }
    }

    /// Transient kinds that a caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationErrorKind::RateLimited | GenerationErrorKind::Timeout
        )
    }

    /// Fixed text shown to the user: the kind plus a remediation hint.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationErrorKind::AuthError => {
                "Sorry, I couldn't get an answer (authentication error). \
                 Check that the language model API key is configured correctly."
            }
            GenerationErrorKind::RateLimited => {
                "Sorry, I couldn't get an answer (rate limited). \
                 The language model service is busy; wait a moment and try again."
            }
            GenerationErrorKind::Timeout => {
                "Sorry, I couldn't get an answer (timeout). \
                 The language model service took too long to respond; please try again."
            }
            GenerationErrorKind::BackendUnavailable => {
                "Sorry, I couldn't get an answer (service unavailable). \
                 The language model service can't be reached right now; try again later."
            }
            GenerationErrorKind::Unknown => {
                "Sorry, I couldn't get an answer (unexpected error). Please try again."
            }
        }
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed generation: its kind plus a redacted detail for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct GenerationError {
    kind: GenerationErrorKind,
    detail: String,
}

impl GenerationError {
    /// Build an error, scrubbing credential-like text out of `detail`.
    pub fn new(kind: GenerationErrorKind, detail: impl AsRef<str>) -> Self {
        Self {
            kind,
            detail: redact_secrets(detail.as_ref(), None),
        }
    }

    /// Like [`GenerationError::new`] but also removes a known secret.
    pub fn redacted(kind: GenerationErrorKind, detail: impl AsRef<str>, secret: Option<&str>) -> Self {
        Self {
            kind,
            detail: redact_secrets(detail.as_ref(), secret),
        }
    }

    pub fn kind(&self) -> GenerationErrorKind {
        self.kind
    }

    /// Diagnostic detail. Safe to log, not meant for users.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<GenerationError> for TableTalkError {
    fn from(err: GenerationError) -> Self {
        TableTalkError::Generation(err.to_string())
    }
}
