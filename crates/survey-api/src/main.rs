//! Survey Platform API server

use std::sync::Arc;

use anyhow::Context;
use survey_api::auth::LogOtpSender;
use survey_api::config::ServerConfig;
use survey_api::{bootstrap_admins, build_router, spawn_job_worker, AppState};
use survey_core::InMemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load();
    let store = Arc::new(InMemoryStore::new());
    bootstrap_admins(&store, &config.bootstrap_admins)?;

    let (state, jobs) = AppState::build(&config, store, Arc::new(LogOtpSender));
    let worker = spawn_job_worker(state.surveys.clone(), jobs);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("Survey API listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    worker.abort();
    Ok(())
}
