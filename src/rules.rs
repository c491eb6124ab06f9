// src/rules.rs
//! Hard-fail rules. Every rule is evaluated, in a fixed order, over one `MatchSummary`.
//! Any triggered rule forces `reject_incomplete` regardless of score.

use serde::Serialize;

use crate::corpus::{DealStructure, PartyRole, PatternCorpus, SignalId};
use crate::matcher::MatchSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardFailRule {
    NoParties,
    NoTransactionStructure,
    GenericOnly,
    UnsupportedNoLitigation,
}

impl HardFailRule {
    pub const ORDERED: [HardFailRule; 4] = [
        HardFailRule::NoParties,
        HardFailRule::NoTransactionStructure,
        HardFailRule::GenericOnly,
        HardFailRule::UnsupportedNoLitigation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HardFailRule::NoParties => "no_parties",
            HardFailRule::NoTransactionStructure => "no_transaction_structure",
            HardFailRule::GenericOnly => "generic_only",
            HardFailRule::UnsupportedNoLitigation => "unsupported_no_litigation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardFailOutcome {
    pub rule_id: HardFailRule,
    pub triggered: bool,
    pub reason: String,
}

/// Evaluate all rules in order. Non-triggered outcomes are kept (with an empty reason)
/// so callers can audit the full cascade.
pub fn evaluate_hard_fails(
    summary: &MatchSummary,
    corpus: &PatternCorpus,
) -> Vec<HardFailOutcome> {
    HardFailRule::ORDERED
        .iter()
        .map(|&rule| {
            let reason = match rule {
                HardFailRule::NoParties => no_parties(summary),
                HardFailRule::NoTransactionStructure => no_transaction_structure(summary),
                HardFailRule::GenericOnly => generic_only(summary, corpus),
                HardFailRule::UnsupportedNoLitigation => unsupported_no_litigation(summary),
            };
            HardFailOutcome {
                rule_id: rule,
                triggered: reason.is_some(),
                reason: reason.unwrap_or_default(),
            }
        })
        .collect()
}

/// Triggered rules only, in rule order.
pub fn triggered(outcomes: &[HardFailOutcome]) -> Vec<HardFailOutcome> {
    outcomes.iter().filter(|o| o.triggered).cloned().collect()
}

fn no_parties(s: &MatchSummary) -> Option<String> {
    let missing: Vec<&str> = PartyRole::ALL
        .iter()
        .filter(|&&r| !s.parties_found.contains(&r))
        .map(|r| r.as_str())
        .collect();
    (missing.len() >= 2).then(|| format!("party roles not identified: {}", missing.join(", ")))
}

fn no_transaction_structure(s: &MatchSummary) -> Option<String> {
    (s.deal_structure == DealStructure::Unknown).then(|| {
        "no transaction structure (asset purchase, share purchase, merger, acquisition) stated"
            .to_string()
    })
}

fn generic_only(s: &MatchSummary, corpus: &PatternCorpus) -> Option<String> {
    let no_details = !s.numbers_present
        && !s.signal_present(SignalId::Dates)
        && !s.signal_present(SignalId::ScheduleRefs)
        && !s.signal_present(SignalId::DefinedTerms);
    let min_words = corpus.rules.narrative_min_words;
    (no_details && s.word_count >= min_words).then(|| {
        format!(
            "{} words of narrative without numbers, dates, schedule references or defined terms",
            s.word_count
        )
    })
}

/// Support inputs are matched with the assertion text blanked out.
fn unsupported_no_litigation(s: &MatchSummary) -> Option<String> {
    let supported =
        s.disclosure_refs_present || s.litigation_section_present || s.case_refs_present;
    (s.no_litigation_claim && !supported).then(|| {
        "no-litigation assertion without disclosure schedule, litigation section or case references"
            .to_string()
    })
}
