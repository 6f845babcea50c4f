//! CLI argument definitions for the TableTalk binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use tabletalk_core::config::TableTalkConfig;
use tabletalk_core::error::TableTalkError;

/// TableTalk - ask questions about a spreadsheet in plain language.
#[derive(Parser, Debug)]
#[command(name = "tabletalk", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Dataset to load: an http(s) URL or a local path.
    #[arg(short = 'd', long = "dataset", global = true)]
    pub dataset: Option<String>,

    /// Dataset format when it cannot be inferred (csv, tsv, xlsx, xls, ods).
    #[arg(long = "format", global = true)]
    pub format: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Model name sent to the backend.
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Answer with the built-in mock backend instead of calling the API.
    #[arg(long = "offline", global = true)]
    pub offline: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Chat about the dataset in the terminal (default).
    Chat,
    /// Run the HTTP API.
    Serve,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TABLETALK_CONFIG env var > ~/.tabletalk/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(&env_var)
    }

    fn resolve_config_path_with(&self, env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env("TABLETALK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Layer flags and environment variables over a loaded config.
    pub fn apply(&self, config: &mut TableTalkConfig) {
        self.apply_with(config, &env_var);
    }

    fn apply_with(&self, config: &mut TableTalkConfig, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(port) = self.port {
            config.general.port = port;
        } else if let Some(port) = env("TABLETALK_PORT").and_then(|v| v.parse::<u16>().ok()) {
            config.general.port = port;
        }

        if let Some(ref source) = self.dataset {
            config.dataset.source = source.clone();
        } else if let Some(source) = env("TABLETALK_DATASET") {
            config.dataset.source = source;
        }
        if let Some(ref format) = self.format {
            config.dataset.format = Some(format.clone());
        }

        // The credential comes only from the environment or the file.
        if let Some(key) = env("TABLETALK_API_KEY").or_else(|| env("OPENAI_API_KEY")) {
            config.backend.api_key = key;
        }

        if let Some(ref model) = self.model {
            config.backend.model = model.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Read the config file before any subscriber exists.
///
/// A missing file gives defaults. A broken one also gives defaults, and its
/// error is handed back for the caller to log once tracing is installed.
pub fn load_config(path: &Path) -> (TableTalkConfig, Option<TableTalkError>) {
    match TableTalkConfig::load_if_present(path) {
        Ok(found) => (found.unwrap_or_default(), None),
        Err(e) => (TableTalkConfig::default(), Some(e)),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `~/.tabletalk`, or the working directory when no home is set.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tabletalk");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tabletalk");
    }
    PathBuf::from(".tabletalk")
}

fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}
