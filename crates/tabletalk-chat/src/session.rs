//! The per-session turn loop.
//!
//! Each turn walks `Idle -> Matching -> Formatting -> Generating -> Idle`.
//! A generation failure passes through `Error`, is recorded as an assistant
//! turn with a user-safe message, and the session returns to `Idle`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabletalk_core::config::TableTalkConfig;
use tabletalk_core::{ConversationTurn, Table};
use tabletalk_table::LoadError;

use crate::backend::TextBackend;
use crate::context::ContextFormatter;
use crate::error::{ChatError, GenerationError, GenerationErrorKind};
use crate::generator::AnswerGenerator;
use crate::log::ConversationLog;
use crate::matcher::RowMatcher;
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_QUERY_CHARS: usize = 2000;

// =============================================================================
// SessionState
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Matching,
    Formatting,
    Generating,
    Error,
}

// =============================================================================
// TurnPipeline
// =============================================================================

/// Stateless collaborators shared by every session.
pub struct TurnPipeline {
    matcher: RowMatcher,
    formatter: ContextFormatter,
    generator: AnswerGenerator,
    retry: RetryPolicy,
    max_query_chars: usize,
}

impl TurnPipeline {
    pub fn new(generator: AnswerGenerator) -> Self {
        Self {
            matcher: RowMatcher::new(),
            formatter: ContextFormatter::default(),
            generator,
            retry: RetryPolicy::default(),
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
        }
    }

    pub fn from_config(backend: Arc<dyn TextBackend>, config: &TableTalkConfig) -> Self {
        Self::new(AnswerGenerator::from_config(backend, &config.backend))
            .with_formatter(ContextFormatter::new(config.context.max_chars))
            .with_retry(RetryPolicy::from_config(&config.backend))
            .with_max_query_chars(config.session.max_query_chars)
    }

    pub fn with_formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }

    pub fn matcher(&self) -> &RowMatcher {
        &self.matcher
    }

    pub fn formatter(&self) -> &ContextFormatter {
        &self.formatter
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn max_query_chars(&self) -> usize {
        self.max_query_chars
    }

    fn validate(&self, query: &str) -> Result<(), ChatError> {
        if query.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if query.chars().count() > self.max_query_chars {
            return Err(ChatError::MessageTooLong(self.max_query_chars));
        }
        Ok(())
    }

    async fn generate_with_retry(
        &self,
        session_id: Uuid,
        query: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let mut attempts = 1;
        loop {
            match self.generator.generate(query, context).await {
                Ok(answer) => return Ok(answer),
                Err(err) if self.retry.should_retry(attempts, err.kind()) => {
                    let delay = self.retry.delay_for(attempts);
                    warn!(
                        session_id = %session_id,
                        attempt = attempts,
                        kind = %err.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// =============================================================================
// ChatSession
// =============================================================================

/// Result of one completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub match_count: usize,
    pub user_turn: ConversationTurn,
    pub assistant_turn: ConversationTurn,
    /// Set when the assistant turn is an error message.
    pub error: Option<GenerationErrorKind>,
}

/// One conversation over one dataset.
///
/// `submit_query` takes `&mut self`, so turns within a session are strictly
/// sequential. Many sessions may share the same `Arc<Table>`.
pub struct ChatSession {
    id: Uuid,
    table: Result<Arc<Table>, LoadError>,
    log: ConversationLog,
    state: SessionState,
    pipeline: Arc<TurnPipeline>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
}

impl ChatSession {
    /// `table` is the outcome of loading the dataset; a session over a
    /// failed load rejects every query.
    pub fn new(table: Result<Arc<Table>, LoadError>, pipeline: Arc<TurnPipeline>) -> Self {
        Self {
            id: Uuid::new_v4(),
            table,
            log: ConversationLog::new(),
            state: SessionState::Idle,
            pipeline,
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn table(&self) -> Result<&Arc<Table>, &LoadError> {
        self.table.as_ref()
    }

    /// Token that aborts an in-flight turn when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start a new conversation on the same dataset.
    pub fn reset(&mut self) {
        self.log = ConversationLog::new();
        self.state = SessionState::Idle;
        info!(session_id = %self.id, "Conversation reset");
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }

    /// Run one turn for `query`.
    ///
    /// Rejected queries and sessions without a table return an error and
    /// leave the log untouched. A failed generation is not an error here:
    /// it becomes the assistant turn and is reported in
    /// [`TurnOutcome::error`].
    pub async fn submit_query(&mut self, query: &str) -> Result<TurnOutcome, ChatError> {
        self.pipeline.validate(query)?;
        let table = match &self.table {
            Ok(table) => Arc::clone(table),
            Err(e) => return Err(ChatError::TableUnavailable(e.clone())),
        };
        if self.cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        if self.state != SessionState::Idle {
            debug!(session_id = %self.id, state = ?self.state, "Previous turn was abandoned");
            self.state = SessionState::Idle;
        }

        let user_turn = ConversationTurn::user(query);
        self.log.append(user_turn.clone());

        self.transition(SessionState::Matching);
        let matches = self.pipeline.matcher.find_matches(&table, query);
        debug!(session_id = %self.id, matches = matches.len(), "Rows matched");

        self.transition(SessionState::Formatting);
        let context = self.pipeline.formatter.format(&matches, &table);

        self.transition(SessionState::Generating);
        let cancel = self.cancel.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = pipeline.generate_with_retry(self.id, query, &context) => Some(result),
        };

        let (assistant_turn, error) = match generated {
            None => {
                info!(session_id = %self.id, "Turn cancelled during generation");
                self.transition(SessionState::Idle);
                return Err(ChatError::Cancelled);
            }
            Some(Ok(answer)) => (ConversationTurn::assistant(answer), None),
            Some(Err(err)) => {
                self.transition(SessionState::Error);
                warn!(
                    session_id = %self.id,
                    kind = %err.kind(),
                    detail = %err.detail(),
                    "Generation failed"
                );
                (ConversationTurn::assistant(err.user_message()), Some(err.kind()))
            }
        };

        self.log.append(assistant_turn.clone());
        self.transition(SessionState::Idle);
        info!(
            session_id = %self.id,
            matches = matches.len(),
            failed = error.is_some(),
            "Turn completed"
        );

        Ok(TurnOutcome {
            match_count: matches.len(),
            user_turn,
            assistant_turn,
            error,
        })
    }
}
