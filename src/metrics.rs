use std::time::Duration;

use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::classify::ScoreResult;

pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the scoring series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| -> anyhow::Result<PrometheusHandle> {
            // Use default buckets to avoid API differences across crate versions.
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe_scoring_metrics();
            Ok(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// `/metrics` is only mounted when DEBUG_ROUTES=1.
pub fn debug_routes_enabled() -> bool {
    std::env::var(ENV_DEBUG_ROUTES).ok().as_deref() == Some("1")
}

fn describe_scoring_metrics() {
    describe_counter!(
        "completeness_documents_scored_total",
        "Documents scored, by classification."
    );
    describe_counter!(
        "completeness_hard_fail_total",
        "Triggered hard-fail rules, by rule."
    );
    describe_counter!(
        "completeness_teaser_flag_total",
        "Documents flagged as teaser/LOI/term sheet."
    );
    describe_histogram!("completeness_score_ms", "Scoring time per document in milliseconds.");
}

/// Record one scored document. No-op until a recorder is installed.
pub fn record_scored(result: &ScoreResult, elapsed: Duration) {
    counter!(
        "completeness_documents_scored_total",
        "classification" => result.classification.as_str()
    )
    .increment(1);
    for o in &result.hard_fail_triggers {
        counter!("completeness_hard_fail_total", "rule" => o.rule_id.as_str()).increment(1);
    }
    if result.teaser_flag {
        counter!("completeness_teaser_flag_total").increment(1);
    }
    histogram!("completeness_score_ms").record(elapsed.as_secs_f64() * 1000.0);
}
