mod app;
mod build_log;
mod compile_job;
mod config;
mod convert_job;
mod error;
mod resources;
mod response;
mod routes_compile;
mod routes_convert;
mod routes_health;
mod state;
mod toolchain;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::ServiceConfig;
use crate::state::AppState;
use crate::toolchain::{check_environment, ProcessRunner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = ServiceConfig::from_env()?;
    check_environment(&cfg.tools);

    let state = Arc::new(AppState::new(&cfg, Arc::new(ProcessRunner)));
    let app = app::build_router(state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("bundler listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
