//! TableTalk HTTP API - axum server exposing dataset info and chat sessions.
//!
//! Every route except `/health` requires a bearer token and is rate limited.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
