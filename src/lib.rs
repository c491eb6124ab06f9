// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod classify;
pub mod corpus;
pub mod engine;
pub mod matcher;
pub mod metrics;
pub mod rules;
pub mod scoring;
pub mod teaser;

/// Default `EnvFilter` directives when `RUST_LOG` is unset: the crate plus the
/// `corpus`, `scoring` and `api` event targets at info, everything else at warn.
pub const DEFAULT_LOG_FILTER: &str =
    "deal_completeness=info,corpus=info,scoring=info,api=info,warn";

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::classify::{score_document, Classification, ScoreResult};
pub use crate::corpus::PatternCorpus;
pub use crate::engine::{CompletenessEngine, EngineHandle};
pub use crate::rules::{HardFailOutcome, HardFailRule};
