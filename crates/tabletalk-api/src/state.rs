//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use tabletalk_chat::SessionRegistry;
use tabletalk_core::config::TableTalkConfig;

use crate::auth::generate_token;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TableTalkConfig>,
    /// All chat sessions over the configured dataset.
    pub registry: Arc<SessionRegistry>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    pub start_time: Instant,
}

impl AppState {
    /// Create state with a freshly generated API token.
    pub fn new(config: TableTalkConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            api_token: generate_token(),
            start_time: Instant::now(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = token.into();
        self
    }
}
