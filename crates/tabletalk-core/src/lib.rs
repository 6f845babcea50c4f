pub mod config;
pub mod error;
pub mod redact;
pub mod types;

pub use config::TableTalkConfig;
pub use error::{Result, TableTalkError};
pub use redact::redact_secrets;
pub use types::*;
