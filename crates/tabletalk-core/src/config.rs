use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TableTalkError};

/// Top-level configuration for TableTalk.
///
/// Loaded from `~/.tabletalk/config.toml` by default. Each section corresponds
/// to one collaborator of the search-and-answer pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableTalkConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl TableTalkConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TableTalkConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration if the file exists. `Ok(None)` means there is no
    /// file; an unreadable or unparsable one is an error.
    ///
    /// Nothing is logged, so this is safe to call before a subscriber is
    /// installed.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&content)?))
    }

    /// Save the current configuration to a TOML file.
    ///
    /// The backend credential is never written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.backend.max_output_tokens == 0 {
            return Err(TableTalkError::Config(
                "backend.max_output_tokens must be greater than zero".to_string(),
            ));
        }
        if self.backend.timeout_ms == 0 {
            return Err(TableTalkError::Config(
                "backend.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.context.max_chars == 0 {
            return Err(TableTalkError::Config(
                "context.max_chars must be greater than zero".to_string(),
            ));
        }
        if self.session.max_query_chars == 0 {
            return Err(TableTalkError::Config(
                "session.max_query_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP API port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Where the dataset comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// URL or filesystem path of the spreadsheet.
    pub source: String,
    /// Optional format hint: "csv", "tsv", "xlsx", "xls", "ods".
    pub format: Option<String>,
}

/// Text-generation backend settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API credential. Never serialized, never logged.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Upper bound on generated tokens per answer.
    pub max_output_tokens: u32,
    /// Per-attempt timeout for the backend call, in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt for rate-limited or timed-out calls.
    pub max_retries: u32,
    /// First backoff delay, doubled on every further retry.
    pub retry_base_delay_ms: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 150,
            timeout_ms: 30_000,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

/// Prompt context rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Character budget for the rendered row block.
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_chars: 4000 }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes before a session may be pruned.
    pub timeout_minutes: u32,
    /// Longest accepted query, in characters.
    pub max_query_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            max_query_chars: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TableTalkConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 3040);
        assert!(config.dataset.source.is_empty());
        assert_eq!(config.backend.max_output_tokens, 150);
        assert_eq!(config.backend.timeout_ms, 30_000);
        assert_eq!(config.backend.max_retries, 2);
        assert_eq!(config.context.max_chars, 4000);
        assert_eq!(config.session.max_query_chars, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
port = 8080

[dataset]
source = "https://example.com/data.xlsx"
format = "xlsx"

[backend]
api_key = "sk-test-1234567890"
model = "gpt-4o"
max_output_tokens = 300
timeout_ms = 5000
max_retries = 1

[context]
max_chars = 1200
"#;
        let file = create_temp_config(content);
        let config = TableTalkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.dataset.source, "https://example.com/data.xlsx");
        assert_eq!(config.dataset.format.as_deref(), Some("xlsx"));
        assert_eq!(config.backend.api_key, "sk-test-1234567890");
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.backend.max_output_tokens, 300);
        assert_eq!(config.backend.timeout(), Duration::from_millis(5000));
        assert_eq!(config.backend.max_retries, 1);
        assert_eq!(config.context.max_chars, 1200);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = TableTalkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.backend.base_url, "https://api.openai.com/v1");
        assert_eq!(config.session.timeout_minutes, 30);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nlog_level = ");
        let err = TableTalkConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, TableTalkError::Config(_)));
    }

    #[test]
    fn test_load_if_present_missing_file() {
        let found = TableTalkConfig::load_if_present(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_load_if_present_reads_file() {
        let file = create_temp_config("[general]\nport = 4100\n");
        let config = TableTalkConfig::load_if_present(file.path()).unwrap().unwrap();
        assert_eq!(config.general.port, 4100);
    }

    #[test]
    fn test_load_if_present_broken_file_is_error() {
        let file = create_temp_config("[general\nport = ");
        let err = TableTalkConfig::load_if_present(file.path()).unwrap_err();
        assert!(matches!(err, TableTalkError::Config(_)));
    }

    #[test]
    fn test_save_never_writes_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = TableTalkConfig::default();
        config.backend.api_key = "sk-secret-value-abcdef".to_string();
        config.dataset.source = "data.csv".to_string();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret-value-abcdef"));
        assert!(!written.contains("api_key"));

        let reloaded = TableTalkConfig::load(&path).unwrap();
        assert_eq!(reloaded.dataset.source, "data.csv");
        assert!(reloaded.backend.api_key.is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = TableTalkConfig::default();
        config.backend.api_key = "sk-super-secret-key".to_string();
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("sk-super-secret-key"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn test_has_api_key() {
        let mut backend = BackendConfig::default();
        assert!(!backend.has_api_key());
        backend.api_key = "   ".to_string();
        assert!(!backend.has_api_key());
        backend.api_key = "sk-abc".to_string();
        assert!(backend.has_api_key());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = TableTalkConfig::default();
        config.backend.max_output_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = TableTalkConfig::default();
        config.backend.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TableTalkConfig::default();
        config.context.max_chars = 0;
        assert!(config.validate().is_err());

        let mut config = TableTalkConfig::default();
        config.session.max_query_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_base_delay_duration() {
        let backend = BackendConfig::default();
        assert_eq!(backend.retry_base_delay(), Duration::from_millis(500));
    }
}
