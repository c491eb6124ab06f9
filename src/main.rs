//! Deal Completeness Service: binary entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.
//!
//! See `README.md` for quickstart.

use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deal_completeness::api::{self, AppState};
use deal_completeness::DEFAULT_LOG_FILTER;
use deal_completeness::engine::{
    corpus_path_from_env, start_hot_reload_thread, CompletenessEngine, EngineHandle,
};

/// Compact tracing logs. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // The runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables CORPUS_CONFIG_PATH / CORPUS_HOT_RELOAD / DEBUG_ROUTES from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    // --- Load corpus (fatal on error) ---
    let engine = CompletenessEngine::from_toml()?;
    info!(
        target: "corpus",
        version = %engine.corpus().version,
        buckets = engine.corpus().buckets.len(),
        "completeness engine ready"
    );
    let handle = EngineHandle::new(engine);

    // If hot reload is enabled, spawn background watcher
    start_hot_reload_thread(handle.clone(), corpus_path_from_env());

    let router = api::router(AppState { engine: handle });

    Ok(router.into())
}
