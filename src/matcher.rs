// src/matcher.rs
//! Keyword/pattern matcher: one pass of the compiled corpus over a document.
//!
//! Produces a `MatchSummary` holding everything the scorers and rules need, so
//! downstream stages never touch the raw text again.

use std::borrow::Cow;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::corpus::{
    Bucket, BucketId, DealStructure, HitPolicy, MatchingCfg, PartyRole, PatternCorpus, SignalId,
};

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex"));

/// One counted occurrence of a bucket term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordHit {
    pub bucket: BucketId,
    pub term: String,
    /// Byte span in the input text.
    pub start: usize,
    pub end: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketResult {
    #[serde(rename = "bucket_id")]
    pub bucket: BucketId,
    pub letter: char,
    pub label: String,
    pub hit_count: usize,
    pub min_hits: usize,
    pub present: bool,
    pub matched_terms: Vec<String>,
    pub snippets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvidenceResult {
    #[serde(rename = "signal_id")]
    pub signal: SignalId,
    pub present: bool,
    #[serde(rename = "points")]
    pub points_awarded: u32,
}

/// Everything observed in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// All buckets in `BucketId` order, core and reserved.
    pub buckets: Vec<BucketResult>,
    pub hits: Vec<KeywordHit>,
    /// All signals in `SignalId` order.
    pub signals: Vec<EvidenceResult>,
    pub word_count: usize,
    pub parties_found: Vec<PartyRole>,
    pub deal_structure: DealStructure,
    pub numbers_present: bool,
    pub no_litigation_claim: bool,
    /// The four support inputs below are matched outside the no-litigation assertions.
    /// Disclosure refs include the schedule-refs signal.
    pub disclosure_refs_present: bool,
    pub litigation_section_present: bool,
    pub case_refs_present: bool,
    pub teaser_keywords: Vec<String>,
}

impl MatchSummary {
    pub fn bucket(&self, id: BucketId) -> Option<&BucketResult> {
        self.buckets.iter().find(|b| b.bucket == id)
    }

    pub fn bucket_present(&self, id: BucketId) -> bool {
        self.bucket(id).is_some_and(|b| b.present)
    }

    pub fn signal_present(&self, id: SignalId) -> bool {
        self.signals.iter().any(|s| s.signal == id && s.present)
    }
}

/// Match `text` against every part of the corpus.
pub fn match_document(text: &str, corpus: &PatternCorpus) -> MatchSummary {
    let mut buckets = Vec::with_capacity(corpus.buckets.len());
    let mut hits = Vec::new();
    for bucket in &corpus.buckets {
        let (result, bucket_hits) = match_bucket(text, bucket, &corpus.matching);
        buckets.push(result);
        hits.extend(bucket_hits);
    }

    let signals = corpus
        .signals
        .iter()
        .map(|s| {
            let present = s.is_present(text);
            EvidenceResult {
                signal: s.id,
                present,
                points_awarded: if present { s.points } else { 0 },
            }
        })
        .collect();

    let rules = &corpus.rules;
    let parties_found = rules
        .parties
        .iter()
        .filter(|(_, lex)| lex.any_match(text))
        .map(|(role, _)| *role)
        .collect();
    // first configured deal type wins
    let deal_structure = rules
        .structures
        .iter()
        .find(|(_, lex)| lex.any_match(text))
        .map(|(kind, _)| *kind)
        .unwrap_or(DealStructure::Unknown);

    let claims: Vec<Range<usize>> = rules
        .no_litigation_assertions
        .terms()
        .iter()
        .flat_map(|t| t.find_iter(text).map(|m| m.range()))
        .collect();
    let no_litigation_claim = !claims.is_empty();
    let unclaimed = blank_spans(text, claims);
    let schedule_refs = corpus
        .signal(SignalId::ScheduleRefs)
        .is_some_and(|s| s.is_present(&unclaimed));

    MatchSummary {
        buckets,
        hits,
        signals,
        word_count: word_count(text),
        parties_found,
        deal_structure,
        numbers_present: rules.numbers.any_match(text),
        no_litigation_claim,
        disclosure_refs_present: schedule_refs || rules.disclosure_refs.any_match(&unclaimed),
        litigation_section_present: rules.litigation_section.any_match(&unclaimed),
        case_refs_present: rules.case_refs.any_match(&unclaimed),
        teaser_keywords: corpus.teaser.matched_terms(text),
    }
}

pub fn word_count(text: &str) -> usize {
    RE_WORD.find_iter(text).count()
}

/// `text` with each span replaced by a single space.
fn blank_spans(text: &str, mut spans: Vec<Range<usize>>) -> Cow<'_, str> {
    if spans.is_empty() {
        return Cow::Borrowed(text);
    }
    spans.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for r in spans {
        if r.end <= pos {
            continue;
        }
        if r.start > pos {
            out.push_str(&text[pos..r.start]);
        }
        out.push(' ');
        pos = r.end;
    }
    out.push_str(&text[pos..]);
    Cow::Owned(out)
}

struct Occurrence {
    start: usize,
    end: usize,
    term: usize,
}

fn match_bucket(
    text: &str,
    bucket: &Bucket,
    cfg: &MatchingCfg,
) -> (BucketResult, Vec<KeywordHit>) {
    let terms = bucket.lexicon.terms();
    let mut occ: Vec<Occurrence> = terms
        .iter()
        .enumerate()
        .flat_map(|(i, t)| {
            t.find_iter(text).map(move |m| Occurrence {
                start: m.start(),
                end: m.end(),
                term: i,
            })
        })
        .collect();

    // Enclosing occurrences sort first; equal spans credit the earlier term.
    // Only `occurrences` drops enclosed hits; `distinct_terms` credits every matching term.
    let shadow = cfg.hit_policy == HitPolicy::Occurrences;
    occ.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.term.cmp(&b.term))
    });

    let mut cover_end = 0usize;
    let mut seen_any = false;
    let mut per_term = vec![0usize; terms.len()];
    let mut hits = Vec::new();
    for o in &occ {
        if shadow && seen_any && cover_end >= o.end {
            continue;
        }
        seen_any = true;
        cover_end = cover_end.max(o.end);
        per_term[o.term] += 1;
        hits.push(KeywordHit {
            bucket: bucket.id,
            term: terms[o.term].text.clone(),
            start: o.start,
            end: o.end,
            snippet: snippet(text, o.start, o.end, cfg.snippet_window),
        });
    }

    let hit_count = match cfg.hit_policy {
        HitPolicy::DistinctTerms => per_term.iter().filter(|&&n| n > 0).count(),
        HitPolicy::Occurrences => per_term.iter().sum(),
    };
    let matched_terms = terms
        .iter()
        .zip(&per_term)
        .filter(|&(_, &n)| n > 0)
        .map(|(t, _)| t.text.clone())
        .collect();

    let mut snippets: Vec<String> = Vec::new();
    for h in &hits {
        if snippets.len() >= cfg.max_snippets {
            break;
        }
        if !h.snippet.is_empty() && !snippets.contains(&h.snippet) {
            snippets.push(h.snippet.clone());
        }
    }

    let result = BucketResult {
        bucket: bucket.id,
        letter: bucket.id.letter(),
        label: bucket.label.clone(),
        hit_count,
        min_hits: bucket.min_hits,
        present: hit_count >= bucket.min_hits,
        matched_terms,
        snippets,
    };
    (result, hits)
}

/// `window` chars of context on each side of `start..end`, whitespace collapsed.
fn snippet(text: &str, start: usize, end: usize, window: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML: &str = r#"
version = "test"

[matching]
hit_policy = "distinct_terms"
snippet_window = 10
max_snippets = 2

[[buckets]]
id = "deal_identity"
label = "Deal Identity"
keywords = ["governing law", "signing date", "closing date"]

[[buckets]]
id = "price_and_payment"
label = "Price / Payment"
keywords = ["purchase price", "escrow", "earn-out"]

[[buckets]]
id = "reps_and_warranties"
label = "Reps & Warranties"
keywords = ["disclosure schedule", "disclosure schedules", "MAE", "materiality"]

[[buckets]]
id = "closing_conditions"
label = "Closing Conditions"
keywords = ["conditions to closing", "regulatory approval"]

[[buckets]]
id = "indemnities_and_limits"
label = "Indemnities & Limits"
keywords = ["basket", "tipping basket", "indemnification"]

[[buckets]]
id = "financials"
label = "Financials"
keywords = ["balance sheet", "EBITDA"]

[[buckets]]
id = "litigation_and_claims"
label = "Litigation / Claims"
keywords = ["lawsuit", "arbitration"]

[[signals]]
id = "currency"
points = 6
patterns = ['\bUSD\b']

[[signals]]
id = "dates"
points = 6
patterns = ['\b\d{4}-\d{2}-\d{2}\b']

[[signals]]
id = "percentages"
points = 4
patterns = ['\d+(?:\.\d+)?\s?%']

[[signals]]
id = "defined_terms"
points = 7
patterns = ['"[A-Z][A-Za-z ]{1,40}"\s+means']

[[signals]]
id = "schedule_refs"
points = 7
patterns = ['\bSchedule\s+\d+\b']

[rules.parties]
buyer = ["buyer"]
seller = ["seller"]
target = ["target"]

[[rules.structure]]
kind = "share_purchase"
phrases = ["share purchase"]

[[rules.structure]]
kind = "acquisition"
phrases = ["acquisition"]

[rules.generic_only]
narrative_min_words = 40
numbers = ['re:\d']

[rules.no_litigation]
assertions = ["no litigation"]
disclosure_refs = ["disclosure schedule"]
section_language = ["legal proceedings"]
case_refs = ['re:\bcase\s+no\.\s*\d+']

[teaser]
keywords = ["term sheet", "teaser"]
"#;

    fn corpus() -> PatternCorpus {
        PatternCorpus::from_toml_str(TEST_TOML).expect("test corpus")
    }

    #[test]
    fn distinct_terms_count_each_term_once() {
        let c = corpus();
        let s = match_document("Escrow here, escrow there, and the purchase price.", &c);
        let b = s.bucket(BucketId::PriceAndPayment).unwrap();
        assert_eq!(b.hit_count, 2);
        assert!(b.present);
        assert_eq!(b.matched_terms, vec!["purchase price", "escrow"]);
    }

    #[test]
    fn occurrences_policy_counts_repeats() {
        let c = occurrences_corpus();
        let s = match_document("escrow, escrow, escrow", &c);
        let b = s.bucket(BucketId::PriceAndPayment).unwrap();
        assert_eq!(b.hit_count, 3);
        assert!(b.present);
    }

    fn occurrences_corpus() -> PatternCorpus {
        let toml =
            TEST_TOML.replace("hit_policy = \"distinct_terms\"", "hit_policy = \"occurrences\"");
        PatternCorpus::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn distinct_terms_credit_enclosed_matches() {
        let c = corpus();
        let s = match_document("Losses are subject to a tipping basket.", &c);
        let g = s.bucket(BucketId::IndemnitiesAndLimits).unwrap();
        assert_eq!(g.hit_count, 2);
        assert_eq!(g.matched_terms, vec!["basket", "tipping basket"]);
    }

    #[test]
    fn enclosed_occurrence_is_not_counted_under_occurrences() {
        let c = occurrences_corpus();
        let s = match_document("Losses are subject to a tipping basket.", &c);
        let g = s.bucket(BucketId::IndemnitiesAndLimits).unwrap();
        assert_eq!(g.hit_count, 1);
        assert_eq!(g.matched_terms, vec!["tipping basket"]);
        assert!(!g.present);
    }

    #[test]
    fn same_span_credits_first_term_under_occurrences() {
        let c = occurrences_corpus();
        let s = match_document("See the Disclosure Schedules.", &c);
        let r = s.bucket(BucketId::RepsAndWarranties).unwrap();
        assert_eq!(r.hit_count, 1);
        assert_eq!(r.matched_terms, vec!["disclosure schedule"]);
    }

    #[test]
    fn support_inputs_ignore_the_claim_text() {
        let c = corpus();
        let text = "There is no litigation and legal proceedings are described below.";
        let s = match_document(text, &c);
        assert!(s.no_litigation_claim);
        assert!(s.litigation_section_present);

        let s = match_document("There is no litigation.", &c);
        assert!(s.no_litigation_claim);
        assert!(!s.litigation_section_present);
        assert!(!s.case_refs_present);
    }

    #[test]
    fn blanking_handles_overlapping_and_multibyte_spans() {
        let text = "é no litigation ü";
        let a = text.find("no").unwrap();
        let b = text.find(" ü").unwrap();
        assert_eq!(blank_spans(text, vec![a..b, a + 3..b]), "é   ü");
        assert_eq!(blank_spans(text, vec![]), text);
    }

    #[test]
    fn acronyms_do_not_match_lowercase_words() {
        let c = corpus();
        let s = match_document("mae and materiality", &c);
        assert_eq!(s.bucket(BucketId::RepsAndWarranties).unwrap().hit_count, 1);
        let s = match_document("no MAE; materiality scrape applies", &c);
        assert_eq!(s.bucket(BucketId::RepsAndWarranties).unwrap().hit_count, 2);
    }

    #[test]
    fn snippets_are_capped_and_collapsed() {
        let c = corpus();
        let text = "the\n\nescrow  amount and purchase price and earn-out terms";
        let s = match_document(text, &c);
        let b = s.bucket(BucketId::PriceAndPayment).unwrap();
        assert_eq!(b.snippets.len(), 2);
        assert!(b.snippets[0].starts_with("the escrow amount"));
        assert!(b.snippets.iter().all(|sn| !sn.contains('\n')));
    }

    #[test]
    fn snippet_respects_multibyte_boundaries() {
        let text = "ééééééééééééé escrow ààààààààààààà";
        let start = text.find("escrow").unwrap();
        let sn = snippet(text, start, start + 6, 4);
        assert_eq!(sn, "ééé escrow ààà");
    }

    #[test]
    fn signals_report_points_when_present() {
        let c = corpus();
        let s = match_document("USD 10 on 2024-01-15 at 5%", &c);
        let present: Vec<SignalId> = s
            .signals
            .iter()
            .filter(|e| e.present)
            .map(|e| e.signal)
            .collect();
        assert_eq!(present, vec![SignalId::Currency, SignalId::Dates, SignalId::Percentages]);
        assert!(s.signals.iter().all(|e| e.present == (e.points_awarded > 0)));
    }

    #[test]
    fn rule_inputs_are_collected() {
        let c = corpus();
        let s = match_document(
            "The Buyer completes the acquisition of the Target. \
             There is no litigation. Term sheet only.",
            &c,
        );
        assert_eq!(s.parties_found, vec![PartyRole::Buyer, PartyRole::Target]);
        assert_eq!(s.deal_structure, DealStructure::Acquisition);
        assert!(s.no_litigation_claim);
        assert!(!s.disclosure_refs_present);
        assert!(!s.numbers_present);
        assert_eq!(s.teaser_keywords, vec!["term sheet"]);
        assert_eq!(s.word_count, 15);
    }

    #[test]
    fn empty_text_matches_nothing() {
        let c = corpus();
        let s = match_document("", &c);
        assert!(s.hits.is_empty());
        assert!(s.buckets.iter().all(|b| b.hit_count == 0 && !b.present));
        assert_eq!(s.word_count, 0);
        assert_eq!(s.deal_structure, DealStructure::Unknown);
    }
}
