// src/corpus.rs
//! Pattern corpus: config types (from TOML), term compilation and load-time validation.
//!
//! The corpus is the only configuration the scorer needs. It is compiled once
//! (every keyword and pattern becomes a `Regex`) and is immutable afterwards, so a
//! single instance can be shared by any number of scoring threads.
//!
//! Loading is the one place where things are allowed to fail: a bad regex or a
//! malformed weight table is rejected here with an error naming the offending item,
//! before any document is scored.

use anyhow::{anyhow, bail, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// --- env defaults & names ---
pub const DEFAULT_CORPUS_PATH: &str = "config/corpus.toml";
pub const ENV_CORPUS_PATH: &str = "CORPUS_CONFIG_PATH";

/// The corpus shipped with the crate. `PatternCorpus::builtin()` compiles this.
pub const BUILTIN_CORPUS: &str = include_str!("../config/corpus.toml");

/// Points awarded per present core bucket.
pub const BUCKET_POINTS: u32 = 10;
pub const MAX_BUCKET_SCORE: u32 = 70;
pub const MAX_EVIDENCE_SCORE: u32 = 30;
pub const MAX_OVERALL_SCORE: u32 = 100;

/* ----------------------------
Identifiers
---------------------------- */

/// Topical buckets. Seven are core (scored); the rest are reserved and only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketId {
    DealIdentity,
    PriceAndPayment,
    RepsAndWarranties,
    Covenants,
    ClosingConditions,
    TerminationAndRemedies,
    IndemnitiesAndLimits,
    Financials,
    CapitalAndDebt,
    Tax,
    LitigationAndClaims,
    Compliance,
}

impl BucketId {
    pub const ALL: [BucketId; 12] = [
        BucketId::DealIdentity,
        BucketId::PriceAndPayment,
        BucketId::RepsAndWarranties,
        BucketId::Covenants,
        BucketId::ClosingConditions,
        BucketId::TerminationAndRemedies,
        BucketId::IndemnitiesAndLimits,
        BucketId::Financials,
        BucketId::CapitalAndDebt,
        BucketId::Tax,
        BucketId::LitigationAndClaims,
        BucketId::Compliance,
    ];

    pub const CORE: [BucketId; 7] = [
        BucketId::DealIdentity,
        BucketId::PriceAndPayment,
        BucketId::RepsAndWarranties,
        BucketId::ClosingConditions,
        BucketId::IndemnitiesAndLimits,
        BucketId::Financials,
        BucketId::LitigationAndClaims,
    ];

    /// Letter used in deal-review checklists (A..L). Core buckets are A, B, C, E, G, H, K.
    pub fn letter(self) -> char {
        match self {
            BucketId::DealIdentity => 'A',
            BucketId::PriceAndPayment => 'B',
            BucketId::RepsAndWarranties => 'C',
            BucketId::Covenants => 'D',
            BucketId::ClosingConditions => 'E',
            BucketId::TerminationAndRemedies => 'F',
            BucketId::IndemnitiesAndLimits => 'G',
            BucketId::Financials => 'H',
            BucketId::CapitalAndDebt => 'I',
            BucketId::Tax => 'J',
            BucketId::LitigationAndClaims => 'K',
            BucketId::Compliance => 'L',
        }
    }

    pub fn is_core(self) -> bool {
        Self::CORE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BucketId::DealIdentity => "deal_identity",
            BucketId::PriceAndPayment => "price_and_payment",
            BucketId::RepsAndWarranties => "reps_and_warranties",
            BucketId::Covenants => "covenants",
            BucketId::ClosingConditions => "closing_conditions",
            BucketId::TerminationAndRemedies => "termination_and_remedies",
            BucketId::IndemnitiesAndLimits => "indemnities_and_limits",
            BucketId::Financials => "financials",
            BucketId::CapitalAndDebt => "capital_and_debt",
            BucketId::Tax => "tax",
            BucketId::LitigationAndClaims => "litigation_and_claims",
            BucketId::Compliance => "compliance",
        }
    }
}

/// Hard-to-fake lexical evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    Currency,
    Dates,
    Percentages,
    DefinedTerms,
    ScheduleRefs,
}

impl SignalId {
    pub const ALL: [SignalId; 5] = [
        SignalId::Currency,
        SignalId::Dates,
        SignalId::Percentages,
        SignalId::DefinedTerms,
        SignalId::ScheduleRefs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalId::Currency => "currency",
            SignalId::Dates => "dates",
            SignalId::Percentages => "percentages",
            SignalId::DefinedTerms => "defined_terms",
            SignalId::ScheduleRefs => "schedule_refs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Buyer,
    Seller,
    Target,
}

impl PartyRole {
    pub const ALL: [PartyRole; 3] = [PartyRole::Buyer, PartyRole::Seller, PartyRole::Target];

    pub fn as_str(self) -> &'static str {
        match self {
            PartyRole::Buyer => "buyer",
            PartyRole::Seller => "seller",
            PartyRole::Target => "target",
        }
    }
}

/// Transaction type detected from canonical deal-type phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStructure {
    AssetPurchase,
    SharePurchase,
    Merger,
    Acquisition,
    Unknown,
}

impl DealStructure {
    pub fn as_str(self) -> &'static str {
        match self {
            DealStructure::AssetPurchase => "asset_purchase",
            DealStructure::SharePurchase => "share_purchase",
            DealStructure::Merger => "merger",
            DealStructure::Acquisition => "acquisition",
            DealStructure::Unknown => "unknown",
        }
    }
}

/// How keyword matches turn into a bucket's hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPolicy {
    /// Each term counts once if it matches anywhere.
    #[default]
    DistinctTerms,
    /// Every occurrence counts, except one lying inside a longer occurrence of
    /// another term from the same bucket.
    Occurrences,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusFile {
    pub version: String,
    #[serde(default)]
    pub matching: MatchingCfg,
    #[serde(default)]
    pub classification: BandsCfg,
    pub buckets: Vec<BucketCfg>,
    pub signals: Vec<SignalCfg>,
    pub rules: RulesCfg,
    pub teaser: TeaserCfg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingCfg {
    pub hit_policy: HitPolicy,
    /// Context chars kept on each side of a hit.
    pub snippet_window: usize,
    /// Snippets kept per bucket for the audit breakdown.
    pub max_snippets: usize,
}

impl Default for MatchingCfg {
    fn default() -> Self {
        Self {
            hit_policy: HitPolicy::DistinctTerms,
            snippet_window: 50,
            max_snippets: 3,
        }
    }
}

/// Score bands: `[0, warn_min)` reject, `[warn_min, ok_min)` warn, `[ok_min, 100]` ok.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsCfg {
    pub warn_min: u32,
    pub ok_min: u32,
}

impl Default for BandsCfg {
    fn default() -> Self {
        Self {
            warn_min: 50,
            ok_min: 70,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketCfg {
    pub id: BucketId,
    pub label: String,
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,
    pub keywords: Vec<String>,
}

fn default_min_hits() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalCfg {
    pub id: SignalId,
    pub points: u32,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesCfg {
    pub parties: PartiesCfg,
    pub structure: Vec<StructureCfg>,
    pub generic_only: GenericOnlyCfg,
    pub no_litigation: NoLitigationCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartiesCfg {
    pub buyer: Vec<String>,
    pub seller: Vec<String>,
    pub target: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructureCfg {
    pub kind: DealStructure,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenericOnlyCfg {
    /// Documents with at least this many words count as long narrative.
    pub narrative_min_words: usize,
    pub numbers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoLitigationCfg {
    pub assertions: Vec<String>,
    pub disclosure_refs: Vec<String>,
    pub section_language: Vec<String>,
    pub case_refs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeaserCfg {
    pub keywords: Vec<String>,
}

/* ----------------------------
Compiled corpus
---------------------------- */

/// One keyword or pattern, compiled.
#[derive(Debug, Clone)]
pub struct Term {
    pub text: String,
    re: Regex,
}

impl Term {
    pub fn compile(spec: &str) -> anyhow::Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec == "re:" {
            bail!("empty term");
        }
        let re = Regex::new(&term_pattern(spec))
            .map_err(|e| anyhow!("term `{}` regex error: {}", spec, e))?;
        Ok(Self {
            text: spec.to_string(),
            re,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    pub fn find_iter<'t>(&self, text: &'t str) -> regex::Matches<'_, 't> {
        self.re.find_iter(text)
    }
}

/// Translate the term syntax into a regex pattern.
fn term_pattern(spec: &str) -> String {
    if let Some(raw) = spec.strip_prefix("re:") {
        return raw.to_string();
    }
    let body = spec
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");

    let has_letters = spec.chars().any(char::is_alphabetic);
    let all_caps = has_letters && !spec.chars().any(char::is_lowercase);
    let flags = if all_caps { "" } else { "(?i)" };

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let first = spec.chars().next().is_some_and(is_word);
    let last = spec.chars().last();
    let plural = if last.is_some_and(char::is_alphabetic) {
        "(?:s|es)?"
    } else {
        ""
    };
    let open = if first { r"\b" } else { "" };
    let close = if last.is_some_and(is_word) { r"\b" } else { "" };

    format!("{flags}{open}{body}{plural}{close}")
}

/// An ordered, de-duplicated list of terms.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    terms: Vec<Term>,
}

impl Lexicon {
    /// Compile `specs`; `owner` names the config location for error messages.
    pub fn compile(owner: &str, specs: &[String]) -> anyhow::Result<Self> {
        let mut seen = BTreeSet::new();
        let mut terms = Vec::with_capacity(specs.len());
        for spec in specs {
            // Identical terms (ignoring case and spacing) must not double count.
            let key = spec.split_whitespace().collect::<Vec<_>>().join(" ");
            let key = if key.starts_with("re:") {
                key
            } else {
                key.to_lowercase()
            };
            if !seen.insert(key) {
                continue;
            }
            let term = Term::compile(spec).with_context(|| owner.to_string())?;
            terms.push(term);
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn any_match(&self, text: &str) -> bool {
        self.terms.iter().any(|t| t.is_match(text))
    }

    /// Terms that match somewhere in `text`, in lexicon order.
    pub fn matched_terms(&self, text: &str) -> Vec<String> {
        self.terms
            .iter()
            .filter(|t| t.is_match(text))
            .map(|t| t.text.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: BucketId,
    pub label: String,
    pub min_hits: usize,
    pub lexicon: Lexicon,
}

#[derive(Debug, Clone)]
pub struct EvidenceSignal {
    pub id: SignalId,
    pub points: u32,
    patterns: Vec<Regex>,
}

impl EvidenceSignal {
    pub fn is_present(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

#[derive(Debug, Clone)]
pub struct RuleLexicons {
    pub parties: Vec<(PartyRole, Lexicon)>,
    pub structures: Vec<(DealStructure, Lexicon)>,
    pub narrative_min_words: usize,
    pub numbers: Lexicon,
    pub no_litigation_assertions: Lexicon,
    pub disclosure_refs: Lexicon,
    pub litigation_section: Lexicon,
    pub case_refs: Lexicon,
}

/// The compiled, validated corpus.
#[derive(Debug, Clone)]
pub struct PatternCorpus {
    pub version: String,
    pub matching: MatchingCfg,
    pub bands: BandsCfg,
    /// Ordered by `BucketId`.
    pub buckets: Vec<Bucket>,
    /// Ordered by `SignalId`.
    pub signals: Vec<EvidenceSignal>,
    pub rules: RuleLexicons,
    pub teaser: Lexicon,
}

impl PatternCorpus {
    /// Compile the corpus embedded in the crate.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml_str(BUILTIN_CORPUS).context("builtin corpus")
    }

    /// Resolve the corpus location:
    /// 1) $CORPUS_CONFIG_PATH (must exist)
    /// 2) config/corpus.toml
    /// 3) builtin corpus
    pub fn from_toml() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_CORPUS_PATH) {
            return Self::from_path(&PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CORPUS_PATH);
        if default.exists() {
            return Self::from_path(&default);
        }
        info!(target: "corpus", "no corpus file found, using builtin corpus");
        Self::builtin()
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus at {}", path.display()))?;
        let corpus = Self::from_toml_str(&content)
            .with_context(|| format!("invalid corpus at {}", path.display()))?;
        info!(
            target: "corpus",
            path = %path.display(),
            version = %corpus.version,
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Parse, compile and validate a corpus from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: CorpusFile = toml::from_str(toml_str)?;
        Self::compile(cfg)
    }

    pub fn compile(cfg: CorpusFile) -> anyhow::Result<Self> {
        validate_bands(&cfg.classification)?;

        // Buckets
        let mut buckets = Vec::with_capacity(cfg.buckets.len());
        for b in &cfg.buckets {
            if buckets.iter().any(|x: &Bucket| x.id == b.id) {
                bail!("bucket `{}` defined more than once", b.id.as_str());
            }
            if b.min_hits == 0 {
                bail!("bucket `{}` min_hits must be at least 1", b.id.as_str());
            }
            let owner = format!("bucket `{}`", b.id.as_str());
            let lexicon = Lexicon::compile(&owner, &b.keywords)?;
            if lexicon.is_empty() {
                bail!("{owner} has no keywords");
            }
            buckets.push(Bucket {
                id: b.id,
                label: b.label.clone(),
                min_hits: b.min_hits,
                lexicon,
            });
        }
        for id in BucketId::CORE {
            if !buckets.iter().any(|b| b.id == id) {
                bail!("core bucket `{}` is missing", id.as_str());
            }
        }
        buckets.sort_by_key(|b| b.id);

        // Evidence signals
        let mut signals = Vec::with_capacity(cfg.signals.len());
        for s in &cfg.signals {
            if signals.iter().any(|x: &EvidenceSignal| x.id == s.id) {
                bail!("signal `{}` defined more than once", s.id.as_str());
            }
            if s.patterns.is_empty() {
                bail!("signal `{}` has no patterns", s.id.as_str());
            }
            let patterns = s
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        anyhow!("signal `{}` pattern `{}` regex error: {}", s.id.as_str(), p, e)
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            signals.push(EvidenceSignal {
                id: s.id,
                points: s.points,
                patterns,
            });
        }
        for id in SignalId::ALL {
            if !signals.iter().any(|s| s.id == id) {
                bail!("signal `{}` is missing", id.as_str());
            }
        }
        let total: u32 = signals.iter().map(|s| s.points).sum();
        if total != MAX_EVIDENCE_SCORE {
            bail!(
                "signal points must sum to {}, got {}",
                MAX_EVIDENCE_SCORE,
                total
            );
        }
        signals.sort_by_key(|s| s.id);

        let rules = compile_rules(&cfg.rules)?;
        let teaser = required("teaser keywords", &cfg.teaser.keywords)?;

        Ok(Self {
            version: cfg.version,
            matching: cfg.matching,
            bands: cfg.classification,
            buckets,
            signals,
            rules,
            teaser,
        })
    }

    pub fn bucket(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.id == id)
    }

    pub fn signal(&self, id: SignalId) -> Option<&EvidenceSignal> {
        self.signals.iter().find(|s| s.id == id)
    }

    /// Serializable overview for diagnostics.
    pub fn summary(&self) -> CorpusSummary {
        CorpusSummary {
            version: self.version.clone(),
            hit_policy: self.matching.hit_policy,
            bands: self.bands,
            narrative_min_words: self.rules.narrative_min_words,
            buckets: self
                .buckets
                .iter()
                .map(|b| BucketSummary {
                    id: b.id,
                    letter: b.id.letter(),
                    label: b.label.clone(),
                    core: b.id.is_core(),
                    min_hits: b.min_hits,
                    terms: b.lexicon.len(),
                })
                .collect(),
            signals: self
                .signals
                .iter()
                .map(|s| SignalSummary {
                    id: s.id,
                    points: s.points,
                })
                .collect(),
        }
    }
}

fn validate_bands(bands: &BandsCfg) -> anyhow::Result<()> {
    if bands.warn_min == 0 || bands.warn_min > bands.ok_min || bands.ok_min > MAX_OVERALL_SCORE {
        bail!(
            "classification bands must satisfy 0 < warn_min <= ok_min <= {} \
             (got warn_min={}, ok_min={})",
            MAX_OVERALL_SCORE,
            bands.warn_min,
            bands.ok_min
        );
    }
    Ok(())
}

/// Compile a lexicon that must keep at least one term.
fn required(owner: &str, specs: &[String]) -> anyhow::Result<Lexicon> {
    let lexicon = Lexicon::compile(owner, specs)?;
    if lexicon.is_empty() {
        bail!("{owner} must not be empty");
    }
    Ok(lexicon)
}

fn compile_rules(cfg: &RulesCfg) -> anyhow::Result<RuleLexicons> {
    let parties = vec![
        (PartyRole::Buyer, required("rules.parties.buyer", &cfg.parties.buyer)?),
        (PartyRole::Seller, required("rules.parties.seller", &cfg.parties.seller)?),
        (PartyRole::Target, required("rules.parties.target", &cfg.parties.target)?),
    ];

    if cfg.structure.is_empty() {
        bail!("rules.structure must list at least one deal type");
    }
    let structures = cfg
        .structure
        .iter()
        .map(|s| {
            if s.kind == DealStructure::Unknown {
                bail!("rules.structure cannot define phrases for `unknown`");
            }
            let owner = format!("rules.structure `{}`", s.kind.as_str());
            let lex = required(&owner, &s.phrases)?;
            Ok((s.kind, lex))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let nl = &cfg.no_litigation;
    Ok(RuleLexicons {
        parties,
        structures,
        narrative_min_words: cfg.generic_only.narrative_min_words,
        numbers: required("rules.generic_only.numbers", &cfg.generic_only.numbers)?,
        no_litigation_assertions: required("rules.no_litigation.assertions", &nl.assertions)?,
        disclosure_refs: Lexicon::compile(
            "rules.no_litigation.disclosure_refs",
            &nl.disclosure_refs,
        )?,
        litigation_section: Lexicon::compile(
            "rules.no_litigation.section_language",
            &nl.section_language,
        )?,
        case_refs: Lexicon::compile("rules.no_litigation.case_refs", &nl.case_refs)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusSummary {
    pub version: String,
    pub hit_policy: HitPolicy,
    pub bands: BandsCfg,
    pub narrative_min_words: usize,
    pub buckets: Vec<BucketSummary>,
    pub signals: Vec<SignalSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub id: BucketId,
    pub letter: char,
    pub label: String,
    pub core: bool,
    pub min_hits: usize,
    pub terms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub id: SignalId,
    pub points: u32,
}

/* ----------------------------
Tests
---------------------------- */
