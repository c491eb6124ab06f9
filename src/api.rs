use shuttle_axum::axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::classify::ScoreResult;
use crate::corpus::CorpusSummary;
use crate::engine::EngineHandle;
use crate::metrics::{debug_routes_enabled, Metrics};

// Shared app state used by Axum.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
}

/// Build the service router. `/metrics` is mounted only when DEBUG_ROUTES=1.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/score", post(score))
        .route("/score/batch", post(score_batch))
        .route("/corpus", get(corpus))
        .with_state(state);

    if debug_routes_enabled() {
        match Metrics::init() {
            Ok(m) => {
                info!(target: "api", "debug routes enabled: /metrics");
                app = app.merge(m.router());
            }
            Err(e) => warn!(target: "api", error = %e, "metrics recorder unavailable"),
        }
    }

    app.layer(CorsLayer::very_permissive())
}

#[derive(serde::Deserialize)]
struct ScoreReq {
    text: String,
}

#[derive(serde::Deserialize)]
struct BatchItem {
    id: String,
    text: String,
}

#[derive(serde::Serialize)]
struct BatchOut {
    id: String,
    result: ScoreResult,
}

async fn score(State(state): State<AppState>, Json(body): Json<ScoreReq>) -> Json<ScoreResult> {
    Json(state.engine.score(&body.text))
}

async fn score_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<BatchItem>>,
) -> Json<Vec<BatchOut>> {
    let texts: Vec<&str> = items.iter().map(|it| it.text.as_str()).collect();
    let results = state.engine.score_batch(&texts);
    let out = items
        .into_iter()
        .zip(results)
        .map(|(it, result)| BatchOut { id: it.id, result })
        .collect();
    Json(out)
}

async fn corpus(State(state): State<AppState>) -> Json<CorpusSummary> {
    Json(state.engine.corpus_summary())
}
