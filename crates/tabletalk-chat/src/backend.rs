//! Text-generation backend interface.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationErrorKind;

/// One completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// Text returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
}

/// Backend-specific failure, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {message}")]
    Transport {
        message: String,
        timeout: bool,
        connect: bool,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Map onto the generation error taxonomy.
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            BackendError::Status { status, .. } => match *status {
                401 | 403 => GenerationErrorKind::AuthError,
                429 => GenerationErrorKind::RateLimited,
                408 | 504 => GenerationErrorKind::Timeout,
                500..=599 => GenerationErrorKind::BackendUnavailable,
                _ => GenerationErrorKind::Unknown,
            },
            BackendError::Transport { timeout: true, .. } => GenerationErrorKind::Timeout,
            BackendError::Transport { connect: true, .. } => {
                GenerationErrorKind::BackendUnavailable
            }
            BackendError::Transport { .. } | BackendError::InvalidResponse(_) => {
                GenerationErrorKind::Unknown
            }
        }
    }
}

/// Service that turns a prompt into text.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the call.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError>;
}

// ---------------------------------------------------------------------------
// MockBackend - scripted replies for tests and offline runs
// ---------------------------------------------------------------------------

/// Scripted response of a [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(BackendError),
    /// Never completes.
    Hang,
}

/// Requests a [`MockBackend`] keeps; older ones are dropped first.
pub const MOCK_RECORDED_REQUESTS: usize = 64;

/// Backend that plays back queued replies and records recent requests.
///
/// When the queue is empty it answers with a fixed text mentioning how many
/// prompt lines it received.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<VecDeque<CompletionRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let backend = Self::new();
        backend.lock_replies().extend(replies);
        backend
    }

    /// Wait this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.lock_replies().push_back(MockReply::Text(text.into()));
    }

    pub fn push_error(&self, error: BackendError) {
        self.lock_replies().push_back(MockReply::Error(error));
    }

    pub fn push_status(&self, status: u16) {
        self.push_error(BackendError::Status {
            status,
            message: format!("mock status {}", status),
        });
    }

    /// The most recent requests, oldest first, at most
    /// [`MOCK_RECORDED_REQUESTS`] of them.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Every call ever made, including those no longer recorded.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<MockReply>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TextBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            if requests.len() == MOCK_RECORDED_REQUESTS {
                requests.pop_front();
            }
            requests.push_back(request.clone());
        }
        let reply = self.lock_replies().pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Some(MockReply::Text(text)) => Ok(Completion { text }),
            Some(MockReply::Error(error)) => Err(error),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(Completion {
                text: format!(
                    "Mock answer based on {} prompt lines.",
                    request.prompt.lines().count()
                ),
            }),
        }
    }
}
