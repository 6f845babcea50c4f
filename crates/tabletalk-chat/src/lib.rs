//! Conversational layer for TableTalk.
//!
//! Matches user queries against the loaded table, renders the matching rows
//! into a bounded context, asks a text backend for an answer and records both
//! sides of the exchange in a per-session conversation log.

pub mod backend;
pub mod context;
pub mod error;
pub mod generator;
pub mod log;
pub mod matcher;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod session;

pub use backend::{BackendError, Completion, CompletionRequest, MockBackend, MockReply, TextBackend};
pub use context::{ContextFormatter, NO_DATA_SENTINEL};
pub use error::{ChatError, GenerationError, GenerationErrorKind};
pub use generator::{compose_prompt, AnswerGenerator};
pub use log::ConversationLog;
pub use matcher::RowMatcher;
pub use openai::OpenAiBackend;
pub use registry::{SessionRegistry, SessionSummary};
pub use retry::RetryPolicy;
pub use session::{ChatSession, SessionState, TurnOutcome, TurnPipeline};
