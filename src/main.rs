//! UniDream catalog service: binary entrypoint.
//! Loads config, starts the background collection fetch and serves the JSON
//! API plus `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unidream_catalog::{
    api::{self, AppState},
    config::CatalogConfig,
    metrics::Metrics,
    session::SessionStore,
    HttpPageSource, PageSource,
};

/// `CATALOG_LOG` wins over `RUST_LOG`; both take EnvFilter syntax.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CATALOG_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("unidream_catalog=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = CatalogConfig::load_default()?;
    let metrics = Metrics::install()?;
    let session = SessionStore::open(&cfg.session_path)?;
    let source: Arc<dyn PageSource> = Arc::new(HttpPageSource::new(cfg.api_url.clone()));

    info!(
        api = %cfg.api_url,
        page_size = cfg.page_size,
        synthetic_scores = cfg.synthesize_scores,
        "catalog config loaded"
    );

    let bind = cfg.bind.clone();
    let state = AppState::new(cfg, source, session);
    api::spawn_load(&state);

    let app = api::router(state.clone()).merge(metrics.router());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(addr = %bind, "serving catalog api");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    state.careers.unmount();
    state.universities.unmount();
    Ok(())
}
