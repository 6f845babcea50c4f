//! Answer generation: prompt composition plus one bounded backend call.
//!
//! The generator never retries. Retry belongs to the session loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use tabletalk_core::config::BackendConfig;

use crate::backend::{CompletionRequest, TextBackend};
use crate::error::{GenerationError, GenerationErrorKind};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 150;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Build the prompt sent to the backend.
pub fn compose_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about a spreadsheet.\n\
         User asked: {query}\n\
         Spreadsheet data:\n\
         {context}\n\
         Generate a response for the user using only the data above."
    )
}

/// Sends composed prompts to a [`TextBackend`] and classifies failures.
pub struct AnswerGenerator {
    backend: Arc<dyn TextBackend>,
    max_output_tokens: u32,
    timeout: Duration,
    secret: Option<String>,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            backend,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            secret: None,
        }
    }

    /// Take output length, timeout and credential (for redaction only) from config.
    pub fn from_config(backend: Arc<dyn TextBackend>, config: &BackendConfig) -> Self {
        let generator = Self::new(backend)
            .with_max_output_tokens(config.max_output_tokens)
            .with_timeout(config.timeout());
        if config.has_api_key() {
            generator.redacting(config.api_key.clone())
        } else {
            generator
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scrub `secret` from every error detail this generator produces.
    pub fn redacting(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Generate an answer to `query` from the rendered `context`.
    pub async fn generate(&self, query: &str, context: &str) -> Result<String, GenerationError> {
        let request = CompletionRequest {
            prompt: compose_prompt(query, context),
            max_tokens: self.max_output_tokens,
        };
        debug!(
            backend = self.backend.name(),
            prompt_chars = request.prompt.chars().count(),
            max_tokens = request.max_tokens,
            "Calling text backend"
        );

        let outcome = tokio::time::timeout(self.timeout, self.backend.complete(&request)).await;
        let completion = match outcome {
            Err(_) => {
                return Err(self.error(
                    GenerationErrorKind::Timeout,
                    format!("no response within {} ms", self.timeout.as_millis()),
                ))
            }
            Ok(Err(e)) => return Err(self.error(e.kind(), e.to_string())),
            Ok(Ok(completion)) => completion,
        };

        let text = completion.text.trim();
        if text.is_empty() {
            return Err(self.error(GenerationErrorKind::Unknown, "backend returned an empty completion"));
        }
        Ok(text.to_string())
    }

    fn error(&self, kind: GenerationErrorKind, detail: impl AsRef<str>) -> GenerationError {
        GenerationError::redacted(kind, detail, self.secret.as_deref())
    }
}
