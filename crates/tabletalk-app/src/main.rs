//! TableTalk binary - composition root.
//!
//! 1. Resolve configuration (flags > env > TOML file > defaults)
//! 2. Build the dataset handle, text backend and turn pipeline
//! 3. Run the terminal chat or the HTTP API

mod chat;
mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use tabletalk_api::auth::load_or_generate_token;
use tabletalk_api::AppState;
use tabletalk_chat::{MockBackend, OpenAiBackend, SessionRegistry, TextBackend, TurnPipeline};
use tabletalk_core::config::TableTalkConfig;
use tabletalk_core::redact_secrets;
use tabletalk_table::{Dataset, TableStore};

use crate::cli::{CliArgs, Command};

/// How often idle sessions are swept while serving.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing(config: &TableTalkConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.general.log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the conversation; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_backend(args: &CliArgs, config: &TableTalkConfig) -> Arc<dyn TextBackend> {
    if args.offline {
        tracing::info!("Offline mode: answers come from the mock backend");
        return Arc::new(MockBackend::new());
    }
    if !config.backend.has_api_key() {
        tracing::warn!(
            "No API key configured (set TABLETALK_API_KEY or OPENAI_API_KEY); answers will report an authentication error"
        );
    }
    let backend = OpenAiBackend::from_config(&config.backend);
    tracing::info!(model = backend.model(), "Text backend ready");
    Arc::new(backend)
}

async fn serve(config: TableTalkConfig, registry: Arc<SessionRegistry>) -> Result<(), Box<dyn std::error::Error>> {
    let token_path = cli::data_dir().join("api_token");
    let token = load_or_generate_token(&token_path);

    let pruner = Arc::clone(&registry);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            pruner.prune_expired();
        }
    });

    let state = AppState::new(config, registry).with_token(token);
    tabletalk_api::start_server(state).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let (mut config, load_error) = cli::load_config(&config_path);
    args.apply(&mut config);
    init_tracing(&config);
    if let Some(e) = load_error {
        tracing::warn!(
            config = %config_path.display(),
            error = %redact_secrets(&e.to_string(), None),
            "Failed to load config; using defaults"
        );
    }
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "Starting TableTalk"
    );

    let store = Arc::new(TableStore::new());
    let dataset = Dataset::from_config(&config.dataset, store)?;
    tracing::info!(source = %dataset.locator(), "Dataset configured");

    let backend = build_backend(&args, &config);
    let pipeline = Arc::new(TurnPipeline::from_config(backend, &config));
    let idle_timeout = Duration::from_secs(u64::from(config.session.timeout_minutes) * 60);
    let registry = Arc::new(SessionRegistry::new(dataset, pipeline).with_idle_timeout(idle_timeout));

    match args.command() {
        Command::Serve => serve(config, registry).await,
        Command::Chat => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            tokio::select! {
                result = chat::run_repl(&registry, stdin, tokio::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
            Ok(())
        }
    }
}
