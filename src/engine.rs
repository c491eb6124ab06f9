// src/engine.rs
//! Scoring engine over a compiled corpus, a shared handle for the service, and the
//! dev-only corpus hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{info, warn};

use crate::classify::{score_document, ScoreResult};
use crate::corpus::{CorpusSummary, PatternCorpus, DEFAULT_CORPUS_PATH, ENV_CORPUS_PATH};
use crate::metrics::record_scored;

pub const ENV_HOT_RELOAD: &str = "CORPUS_HOT_RELOAD";
pub const ENV_DEV_LOG: &str = "COMPLETENESS_DEV_LOG";

// Dev environment: debug build OR SHUTTLE_ENV in {local, development, dev}
pub(crate) fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().as_deref() == Some("1")
}

pub(crate) fn dev_logging_enabled() -> bool {
    env_flag(ENV_DEV_LOG) && is_dev_env()
}

/// Short anonymous id for a document: first 6 bytes of its SHA-256, hex.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// Never log raw text. Only hashed id, scores and rule ids.
fn dev_log_score(text: &str, r: &ScoreResult) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    let rules: Vec<&str> = r.hard_fail_triggers.iter().map(|o| o.rule_id.as_str()).collect();
    let missing: Vec<char> = r.missing_core_buckets.iter().map(|b| b.letter()).collect();
    info!(
        target: "scoring",
        %id,
        bucket = r.bucket_score,
        evidence = r.evidence_score,
        overall = r.overall_score,
        classification = r.classification.as_str(),
        teaser = r.teaser_flag,
        hard_fails = ?rules,
        missing = ?missing,
        "document scored"
    );
}

/* ----------------------------
Engine
---------------------------- */

/// Immutable after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompletenessEngine {
    corpus: PatternCorpus,
}

impl CompletenessEngine {
    pub fn new(corpus: PatternCorpus) -> Self {
        Self { corpus }
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Ok(Self::new(PatternCorpus::builtin()?))
    }

    /// $CORPUS_CONFIG_PATH, then config/corpus.toml, then the builtin corpus.
    pub fn from_toml() -> anyhow::Result<Self> {
        Ok(Self::new(PatternCorpus::from_toml()?))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(PatternCorpus::from_path(path)?))
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        Ok(Self::new(PatternCorpus::from_toml_str(toml_str)?))
    }

    pub fn corpus(&self) -> &PatternCorpus {
        &self.corpus
    }

    pub fn score(&self, text: &str) -> ScoreResult {
        let t0 = Instant::now();
        let result = score_document(text, &self.corpus);
        record_scored(&result, t0.elapsed());
        dev_log_score(text, &result);
        result
    }

    /// Score many documents on scoped worker threads. Output order matches input order.
    pub fn score_batch<S>(&self, texts: &[S]) -> Vec<ScoreResult>
    where
        S: AsRef<str> + Sync,
    {
        if texts.len() <= 1 {
            return texts.iter().map(|t| self.score(t.as_ref())).collect();
        }
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(texts.len());
        let chunk = texts.len().div_ceil(workers);

        thread::scope(|s| {
            let parts: Vec<_> = texts
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move || {
                        part.iter()
                            .map(|t| self.score(t.as_ref()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            parts
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared engine handle for the HTTP service. Readers never block each other;
/// a reload swaps the whole engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<RwLock<CompletenessEngine>>,
}

impl EngineHandle {
    pub fn new(engine: CompletenessEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn score(&self, text: &str) -> ScoreResult {
        let eng = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        eng.score(text)
    }

    pub fn score_batch<S>(&self, texts: &[S]) -> Vec<ScoreResult>
    where
        S: AsRef<str> + Sync,
    {
        let eng = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        eng.score_batch(texts)
    }

    pub fn corpus_summary(&self) -> CorpusSummary {
        let eng = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        eng.corpus().summary()
    }

    /// Swap in a new engine.
    pub fn replace(&self, engine: CompletenessEngine) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = engine;
    }

    /// Reload from `path`; on error the current engine stays in place.
    pub fn reload_from(&self, path: &Path) -> anyhow::Result<()> {
        let content = fs::read_to_string(path)?;
        let engine = CompletenessEngine::from_toml_str(&content)?;
        let version = engine.corpus().version.clone();
        self.replace(engine);
        info!(target: "corpus", path = %path.display(), %version, "corpus reloaded");
        Ok(())
    }
}

/// Corpus path the service watches: $CORPUS_CONFIG_PATH or config/corpus.toml.
pub fn corpus_path_from_env() -> PathBuf {
    std::env::var(ENV_CORPUS_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CORPUS_PATH))
}

/// Returns true if we should enable hot reload (dev/local only).
pub fn hot_reload_enabled() -> bool {
    env_flag(ENV_HOT_RELOAD) && is_dev_env()
}

/// Start a polling watcher on `path` that hot-reloads into `handle`.
/// Polls mtime every 2s.
pub fn start_hot_reload_thread(handle: EngineHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }
    info!(target: "corpus", path = %path.display(), "corpus hot reload enabled");

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    if let Err(e) = handle.reload_from(&path) {
                        warn!(
                            target: "corpus",
                            error = %format!("{e:#}"),
                            "corpus reload failed, keeping previous corpus"
                        );
                    }
                    last_mtime = Some(mtime);
                }
            }
            // missing or unreadable file: keep polling
            thread::sleep(poll);
        }
    });
}
