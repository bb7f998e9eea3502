mod answers;
mod browser;
mod config;
mod db;
mod errors;
mod form;
mod llm_client;
mod models;
mod oracle;
mod routes;
mod run;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::answers::{AnswerStore, PgAnswerStore};
use crate::browser::chrome::{ChromeLauncher, ChromeSettings};
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::oracle::{CachedOracle, LlmOracle};
use crate::routes::build_router;
use crate::run::{ApplicationRunner, RunSettings};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting autofill v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and the answer store
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;
    let answers: Arc<dyn AnswerStore> = Arc::new(PgAnswerStore::new(db));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let applicant_context = config.load_applicant_context()?;
    if applicant_context.is_none() {
        warn!("No applicant context configured; answers will not be grounded");
    }
    let oracle = CachedOracle::new(Arc::clone(&answers), LlmOracle::new(llm, applicant_context));

    let settings = RunSettings::from_config(&config);
    info!(
        "Run defaults: profile {:?}, evidence in {}, {} navigation attempt(s)",
        config.form_profile,
        settings.evidence_dir.display(),
        settings.retries
    );
    let runner = Arc::new(ApplicationRunner::new(Arc::new(oracle), settings));

    let launcher = Arc::new(ChromeLauncher::new(ChromeSettings {
        headless: config.browser_headless,
        executable_path: config.chrome_path.clone(),
        window_size: config.window_size,
    }));

    let shutdown = CancellationToken::new();

    // Build app state
    let state = AppState {
        answers,
        runner,
        launcher,
        shutdown: shutdown.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C and cancels in-flight runs so they close their browsers.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {e}");
        return std::future::pending().await;
    }
    info!("Shutting down, cancelling in-flight runs");
    shutdown.cancel();
}
