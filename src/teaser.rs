// src/teaser.rs
//! Teaser / LOI / term-sheet detection. A flagged document can never be `accept_ok`.

use serde::Serialize;

use crate::corpus::BucketId;
use crate::matcher::MatchSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeaserAssessment {
    pub flagged: bool,
    /// Summary-document keywords found in the text.
    pub keywords: Vec<String>,
    /// Which of C, E, G were absent.
    pub missing_buckets: Vec<BucketId>,
}

/// Keywords AND no indemnities (G) AND (no closing conditions (E) OR no reps (C)).
pub fn detect_teaser(summary: &MatchSummary) -> TeaserAssessment {
    let missing_buckets: Vec<BucketId> = [
        BucketId::RepsAndWarranties,
        BucketId::ClosingConditions,
        BucketId::IndemnitiesAndLimits,
    ]
    .into_iter()
    .filter(|&id| !summary.bucket_present(id))
    .collect();

    let absent = |id| missing_buckets.contains(&id);
    let flagged = !summary.teaser_keywords.is_empty()
        && absent(BucketId::IndemnitiesAndLimits)
        && (absent(BucketId::ClosingConditions) || absent(BucketId::RepsAndWarranties));

    TeaserAssessment {
        flagged,
        keywords: summary.teaser_keywords.clone(),
        missing_buckets,
    }
}
