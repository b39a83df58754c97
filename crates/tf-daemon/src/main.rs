// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tf_daemon::{build_app, AppState};
use tf_enforcer::Enforcer;
use tf_orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorSettings};
use tf_provider::{
    InMemoryHealthManager, InMemoryImageRegistry, InMemoryLogManager, InMemoryObservabilityManager,
    InMemoryTaskManager, InMemoryWebSocketManager,
};
use tf_repo::{
    ImageRepo, InMemoryConnectionRepo, InMemoryExecutionRepo, InMemoryImageRepo, InMemorySecretsRepo,
    InMemoryTokenRepo, InMemoryUserRepo,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tf-daemon", version, about = "Taskforge orchestrator daemon")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Path to a `taskforge.toml` configuration file. Falls back to
    /// built-in defaults (plus `TF_*` environment overrides) if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("tf=debug,tower_http=debug")
    } else {
        EnvFilter::new("tf=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = tf_config::load_config(args.config.as_deref())
        .context("loading orchestrator configuration")?;
    let settings = OrchestratorSettings {
        claim_window: chrono::Duration::minutes(config.claim_url_expiration_minutes),
        default_execution_list_limit: config.default_execution_list_limit,
        secret_token_byte_size: config.secret_token_byte_size,
    };

    let orchestrator = Arc::new(build_orchestrator(&config, settings).await?);

    let state = Arc::new(AppState { orchestrator });
    let app = build_app(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "tf-daemon listening");

    axum::serve(listener, app).await.context("serve")
}

/// Wire the default in-memory reference collaborators for the demo
/// topology. A production deployment constructs the same
/// [`OrchestratorDeps`] record against real adapters instead.
async fn build_orchestrator(
    config: &tf_config::OrchestratorConfig,
    settings: OrchestratorSettings,
) -> Result<Orchestrator> {
    let user_repo = Arc::new(InMemoryUserRepo::new());
    let execution_repo = Arc::new(InMemoryExecutionRepo::new());
    let secrets_repo = Arc::new(InMemorySecretsRepo::new());
    let image_repo = Arc::new(InMemoryImageRepo::new());
    let connection_repo = Arc::new(InMemoryConnectionRepo::new());
    let token_repo = Arc::new(InMemoryTokenRepo::new());

    let task_manager = Arc::new(InMemoryTaskManager::new());
    let image_registry = Arc::new(InMemoryImageRegistry::new());
    let log_manager = Arc::new(InMemoryLogManager::new());
    let observability = Arc::new(InMemoryObservabilityManager::new());
    let websocket_manager = Arc::new(InMemoryWebSocketManager::new(
        token_repo.clone(),
        connection_repo.clone(),
        "wss://executions.local",
        config.websocket_token_ttl,
        config.secret_token_byte_size,
    ));
    let health_manager = Arc::new(InMemoryHealthManager::new());

    let enforcer = Arc::new(Enforcer::new());
    enforcer
        .hydrate(
            user_repo.clone(),
            execution_repo.clone(),
            secrets_repo.clone(),
            Some(image_repo.clone() as Arc<dyn ImageRepo>),
        )
        .await
        .context("hydrating authorization enforcer")?;

    Ok(Orchestrator::new(
        OrchestratorDeps {
            enforcer,
            user_repo,
            execution_repo,
            secrets_repo,
            image_repo,
            connection_repo,
            token_repo,
            task_manager,
            image_registry,
            log_manager,
            observability,
            websocket_manager,
            health_manager,
        },
        settings,
    ))
}
