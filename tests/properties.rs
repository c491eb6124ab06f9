// tests/properties.rs
//
// Score invariants over deterministic synthetic documents.
// Fixed-seed LCG, no external randomness.

use deal_completeness::classify::Classification;
use deal_completeness::{CompletenessEngine, ScoreResult};

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_usize(&mut self, n: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % n
    }
}

// Whole sentences so that appending never merges with the previous fragment.
const FRAGMENTS: &[&str] = &[
    "The Buyer shall purchase the shares of the Target from the Seller.",
    "This is a share purchase agreement.",
    "The merger becomes effective on the closing date.",
    "The governing law is the law of England.",
    "The purchase price is USD 12,000,000 subject to a working capital adjustment.",
    "An escrow holdback secures the earn-out.",
    "The Seller gives representations and warranties qualified by materiality.",
    "No material adverse effect has occurred.",
    "Conditions precedent include regulatory approval and board approval.",
    "The bring-down of warranties is a closing deliverable.",
    "Indemnification is subject to a basket and a cap.",
    "The survival period is 18 months.",
    "The audited balance sheet shows EBITDA of $3,000,000.",
    "Revenue recognition follows IFRS.",
    "There is no litigation.",
    "There are no pending claims except as set out in the Disclosure Schedule.",
    "A lawsuit and an arbitration are pending under Case No. 4471.",
    "Signing took place on 12 March 2024.",
    "Interest accrues at 4.5% per annum.",
    "\"Material Contracts\" means the contracts listed in Schedule 3.2.",
    "This term sheet is non-binding.",
    "This letter of intent is for discussion only.",
    "We are excited about the strong growth and the talented team.",
    "The business enjoys a loyal customer base and great momentum.",
    "Our vision is to become the leading platform in the region.",
    "Tax returns have been filed and VAT is paid.",
    "The Seller accepts a non-compete and a non-solicit.",
];

fn doc(rng: &mut Lcg, len: usize) -> Vec<&'static str> {
    (0..len).map(|_| FRAGMENTS[rng.next_usize(FRAGMENTS.len())]).collect()
}

fn engine() -> CompletenessEngine {
    CompletenessEngine::builtin().expect("builtin corpus")
}

fn check_invariants(r: &ScoreResult) {
    assert!(r.bucket_score <= 70);
    assert_eq!(r.bucket_score % 10, 0);
    assert!(r.evidence_score <= 30);
    assert_eq!(r.overall_score, (r.bucket_score + r.evidence_score).min(100));
    if !r.hard_fail_triggers.is_empty() {
        assert_eq!(r.classification, Classification::RejectIncomplete);
    }
    if r.teaser_flag {
        assert_ne!(r.classification, Classification::AcceptOk);
    }
    assert!(r.hard_fail_triggers.iter().all(|o| o.triggered));
    assert_eq!(r.bucket_breakdown.len(), 7);
    assert!(r.bucket_breakdown.iter().all(|b| b.bucket.is_core()));
    assert!(r.reserved_breakdown.iter().all(|b| !b.bucket.is_core()));
    assert!(r
        .bucket_breakdown
        .iter()
        .all(|b| b.present == (b.hit_count >= b.min_hits)));
}

#[test]
fn invariants_hold_on_synthetic_documents() {
    let eng = engine();
    let mut rng = Lcg::new(0xDEA1);
    for _ in 0..300 {
        let len = 1 + rng.next_usize(14);
        let text = doc(&mut rng, len).join(" ");
        check_invariants(&eng.score(&text));
    }
}

#[test]
fn appending_text_never_lowers_component_scores() {
    let eng = engine();
    let mut rng = Lcg::new(42);
    for _ in 0..150 {
        let base_len = 1 + rng.next_usize(8);
        let base = doc(&mut rng, base_len).join(" ");
        let extra_len = 1 + rng.next_usize(6);
        let extended = format!("{base} {}", doc(&mut rng, extra_len).join(" "));

        let a = eng.score(&base);
        let b = eng.score(&extended);
        assert!(
            b.bucket_score >= a.bucket_score,
            "bucket score dropped {} -> {} for {extended:?}",
            a.bucket_score,
            b.bucket_score
        );
        assert!(b.evidence_score >= a.evidence_score);
        for (x, y) in a.bucket_breakdown.iter().zip(&b.bucket_breakdown) {
            assert_eq!(x.bucket, y.bucket);
            assert!(y.hit_count >= x.hit_count);
        }
    }
}

#[test]
fn completing_a_longer_term_never_drops_the_shorter_hit() {
    let eng = engine();
    let base = "The merger agreement is signed. Venue noted. The merger";
    let a = eng.score(base);
    let b = eng.score(&format!("{base} agreement."));

    let identity = |r: &ScoreResult| {
        r.bucket_breakdown
            .iter()
            .find(|x| x.bucket.as_str() == "deal_identity")
            .map(|x| (x.hit_count, x.present))
            .expect("deal identity reported")
    };
    assert_eq!(identity(&a), (3, true));
    assert_eq!(identity(&b), (3, true));
    assert!(b.bucket_score >= a.bucket_score);
}

#[test]
fn scoring_is_deterministic() {
    let eng = engine();
    let mut rng = Lcg::new(7);
    for _ in 0..50 {
        let len = 1 + rng.next_usize(12);
        let text = doc(&mut rng, len).join(" ");
        let first = serde_json::to_string(&eng.score(&text)).unwrap();
        let second = serde_json::to_string(&eng.score(&text)).unwrap();
        assert_eq!(first, second);

        let fresh = serde_json::to_string(&engine().score(&text)).unwrap();
        assert_eq!(first, fresh);
    }
}

#[test]
fn arbitrary_input_never_panics() {
    let eng = engine();
    let long = "buyer ".repeat(5000);
    for text in [
        "",
        " ",
        "\u{0}\u{1}\u{2}",
        "€€€€ £ $ % \" \" ()",
        "ééééé purchase price ààààà escrow",
        "SCHEDULE SCHEDULE schedule 1.1.1.1.1",
        long.as_str(),
    ] {
        check_invariants(&eng.score(text));
    }
}

#[test]
fn batch_matches_single_scoring() {
    let eng = engine();
    let mut rng = Lcg::new(99);
    let docs: Vec<String> = (0..40)
        .map(|_| {
            let len = 1 + rng.next_usize(10);
            doc(&mut rng, len).join(" ")
        })
        .collect();
    let batch = eng.score_batch(&docs);
    assert_eq!(batch.len(), docs.len());
    for (d, r) in docs.iter().zip(&batch) {
        assert_eq!(r, &eng.score(d));
    }
}
