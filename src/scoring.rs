// src/scoring.rs
//! Bucket coverage (0..=70) and evidence strength (0..=30).

use crate::corpus::{
    BucketId, BUCKET_POINTS, MAX_BUCKET_SCORE, MAX_EVIDENCE_SCORE, MAX_OVERALL_SCORE,
};
use crate::matcher::MatchSummary;

/// 10 points per present core bucket. Reserved buckets never contribute.
pub fn bucket_score(summary: &MatchSummary) -> u32 {
    let present = BucketId::CORE
        .iter()
        .filter(|&&id| summary.bucket_present(id))
        .count() as u32;
    (present * BUCKET_POINTS).min(MAX_BUCKET_SCORE)
}

pub fn evidence_score(summary: &MatchSummary) -> u32 {
    summary
        .signals
        .iter()
        .filter(|s| s.present)
        .map(|s| s.points_awarded)
        .sum::<u32>()
        .min(MAX_EVIDENCE_SCORE)
}

pub fn overall_score(bucket: u32, evidence: u32) -> u32 {
    (bucket + evidence).min(MAX_OVERALL_SCORE)
}

/// Core buckets below threshold, in bucket order.
pub fn missing_core_buckets(summary: &MatchSummary) -> Vec<BucketId> {
    BucketId::CORE
        .iter()
        .copied()
        .filter(|&id| !summary.bucket_present(id))
        .collect()
}
