use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rc_archive::FsArchive;
use rc_coordinator::{OperationsService, RunCoordinator};
use rc_planning::ToolRegistry;
use rc_tracking::{IncidentLog, RateLimitTracker};
use rc_types::model::ConversationPolicy;
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use rc_server::api;
use rc_server::cli::{Cli, Command, ConfigCommand};
use rc_server::config::{Config, RuntimeMode};
use rc_server::kv::InMemoryConversationKv;
use rc_server::provider::{HttpProviderClient, StubProviderClient};
use rc_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = Config::load(&cli.config)?;
            run_server(config).await
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = Config::load(&cli.config)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rc_server=debug")))
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("rc-server starting");

    let tools = Arc::new(ToolRegistry::new());
    let rate_limits = Arc::new(RateLimitTracker::new());
    let incidents_path = config.archive.dir.join("incidents.json");
    std::fs::create_dir_all(&config.archive.dir).with_context(|| format!("creating {:?}", config.archive.dir))?;
    let incidents = Arc::new(IncidentLog::open(incidents_path)?);

    let archive_capabilities = Arc::new(FsArchive::new(config.archive.dir.clone())).capabilities();

    let provider: Arc<dyn rc_types::provider::ProviderClient> = match config.runtime.mode {
        RuntimeMode::Stub => Arc::new(StubProviderClient),
        RuntimeMode::Http => {
            let base_url = config
                .runtime
                .provider_base_url
                .clone()
                .context("runtime.provider_base_url is required when runtime.mode = \"http\"")?;
            let api_key = std::env::var(&config.runtime.provider_api_key_env).ok();
            Arc::new(HttpProviderClient::new(base_url, api_key)?)
        }
    };

    let default_policy = ConversationPolicy {
        strategy: config.runtime.default_policy,
        ttl_seconds: None,
    };
    let kv: Arc<dyn rc_types::kv::ConversationKv> = Arc::new(InMemoryConversationKv::default());
    let coordinator = Arc::new(
        RunCoordinator::new(
            archive_capabilities,
            provider,
            Some(kv),
            rate_limits,
            incidents,
            tools,
            config.runtime.context_window_tokens,
        )
        .with_default_policy(default_policy),
    );
    let ops = Arc::new(OperationsService::new(coordinator.clone()).with_cost_per_1k_tokens(config.runtime.cost_per_1k_tokens));

    let admin_token_hash = std::env::var("RESPONSES_ADMIN_TOKEN")
        .ok()
        .map(|token| Sha256::digest(token.as_bytes()).to_vec());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        coordinator,
        ops,
        admin_token_hash,
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "rc-server listening");
    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
