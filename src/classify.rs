// src/classify.rs
//! Final aggregation: scores, hard fails and the teaser cap combined into one `ScoreResult`.

use serde::Serialize;

use crate::corpus::{BandsCfg, BucketId, DealStructure, PatternCorpus, SignalId};
use crate::matcher::{match_document, BucketResult, EvidenceResult, MatchSummary};
use crate::rules::{evaluate_hard_fails, triggered, HardFailOutcome};
use crate::scoring::{bucket_score, evidence_score, missing_core_buckets, overall_score};
use crate::teaser::detect_teaser;

/// Closed set of outcomes, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    RejectIncomplete,
    AcceptWithWarnings,
    AcceptOk,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::RejectIncomplete => "reject_incomplete",
            Classification::AcceptWithWarnings => "accept_with_warnings",
            Classification::AcceptOk => "accept_ok",
        }
    }

    /// Band lookup for a score, ignoring hard fails and the teaser cap.
    pub fn from_score(score: u32, bands: &BandsCfg) -> Self {
        if score >= bands.ok_min {
            Classification::AcceptOk
        } else if score >= bands.warn_min {
            Classification::AcceptWithWarnings
        } else {
            Classification::RejectIncomplete
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub bucket_score: u32,
    pub evidence_score: u32,
    pub overall_score: u32,
    pub classification: Classification,
    pub teaser_flag: bool,
    /// Triggered rules only, in rule order.
    pub hard_fail_triggers: Vec<HardFailOutcome>,
    /// Core buckets (A, B, C, E, G, H, K).
    pub bucket_breakdown: Vec<BucketResult>,
    pub evidence_breakdown: Vec<EvidenceResult>,
    /// Reserved buckets (D, F, I, J, L); reported, never scored.
    pub reserved_breakdown: Vec<BucketResult>,
    pub missing_core_buckets: Vec<BucketId>,
    pub generic_language_without_details: bool,
    pub deal_structure: DealStructure,
    pub word_count: usize,
    pub teaser_keywords: Vec<String>,
    pub corpus_version: String,
}

impl ScoreResult {
    pub fn is_hard_fail(&self) -> bool {
        !self.hard_fail_triggers.is_empty()
    }
}

/// Score one document. Never fails; empty or garbage input is simply incomplete.
pub fn score_document(text: &str, corpus: &PatternCorpus) -> ScoreResult {
    let summary = match_document(text, corpus);
    aggregate(summary, corpus)
}

/// Combine a `MatchSummary` into the final result.
pub fn aggregate(summary: MatchSummary, corpus: &PatternCorpus) -> ScoreResult {
    let bucket = bucket_score(&summary);
    let evidence = evidence_score(&summary);
    let overall = overall_score(bucket, evidence);

    let hard_fail_triggers = triggered(&evaluate_hard_fails(&summary, corpus));
    let teaser = detect_teaser(&summary);

    let classification = if !hard_fail_triggers.is_empty() {
        Classification::RejectIncomplete
    } else {
        let banded = Classification::from_score(overall, &corpus.bands);
        if teaser.flagged {
            banded.min(Classification::AcceptWithWarnings)
        } else {
            banded
        }
    };

    let generic_language_without_details = !summary.numbers_present
        && !summary.signal_present(SignalId::Dates)
        && !summary.signal_present(SignalId::ScheduleRefs)
        && !summary.signal_present(SignalId::DefinedTerms)
        && bucket > 0;

    let missing = missing_core_buckets(&summary);
    let MatchSummary {
        buckets,
        signals,
        word_count,
        deal_structure,
        ..
    } = summary;
    let (bucket_breakdown, reserved_breakdown): (Vec<_>, Vec<_>) =
        buckets.into_iter().partition(|b| b.bucket.is_core());

    ScoreResult {
        bucket_score: bucket,
        evidence_score: evidence,
        overall_score: overall,
        classification,
        teaser_flag: teaser.flagged,
        hard_fail_triggers,
        bucket_breakdown,
        evidence_breakdown: signals,
        reserved_breakdown,
        missing_core_buckets: missing,
        generic_language_without_details,
        deal_structure,
        word_count,
        teaser_keywords: teaser.keywords,
        corpus_version: corpus.version.clone(),
    }
}
