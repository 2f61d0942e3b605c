use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Verdict bands, ordered by escalating concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Moderate,
    Peak,
}

/// One matched taxonomy category: how confident the match is and which
/// input tokens produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryMatch {
    pub confidence: f64,
    pub matching_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub toxic_score: f64,
    pub negative_score: f64,
    pub severity: Severity,
    pub is_microaggression: bool,
    pub reason: String,
    pub categories: BTreeMap<String, CategoryMatch>,
    pub token_weights: BTreeMap<String, f64>,
}

/// Raw output of a model scorer, before normalization. `toxic` is optional:
/// a classifier that returns per-label scores may not emit a toxicity label
/// at all, and that is not a failure.
#[derive(Debug, Clone, Copy)]
pub struct RawScores {
    pub toxic: Option<f64>,
    pub negative: f64,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("scorer failure: {0}")]
    Scorer(String),
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

struct Thresholds {
    binary_toxic: f64,
    binary_negative: f64,
    graded_low_toxic: f64,
    graded_low_negative: f64,
    graded_mid_toxic: f64,
    graded_mid_negative: f64,
    category_min_confidence: f64,
    lexicon_hit_scale: f64,
}

static HP: Thresholds = Thresholds {
    binary_toxic: 0.5,
    binary_negative: 0.7,
    graded_low_toxic: 0.3,
    graded_low_negative: 0.4,
    graded_mid_toxic: 0.6,
    graded_mid_negative: 0.7,
    category_min_confidence: 0.1,
    lexicon_hit_scale: 12.0,
};

// ---------------------------------------------------------------------------
// Severity policies
// ---------------------------------------------------------------------------

const REASON_TOXICITY: &str = "Microaggression detected due to toxicity!";
const REASON_NEGATIVE: &str = "Microaggression detected due to strong negative semantics!";
const REASON_NONE: &str = "No microaggression detected.";
const REASON_MODERATE: &str = "Moderate microaggression severity.";
const REASON_PEAK: &str = "Peak toxicity severity.";

/// How `(toxic_score, negative_score)` maps to a verdict band.
///
/// `Binary` is the either/or policy: one threshold per score, either one
/// trips the verdict, and toxicity is checked first so it wins the reason
/// string when both trip. `Graded` walks conjunctive bands: a band applies
/// only when *both* scores sit under its ceilings, so a text with very high
/// toxicity but mild negative sentiment escalates to `Peak` by failing the
/// middle band's toxicity ceiling, while high negative sentiment alone can
/// hold a text at `Moderate`. The conjunctive logic is deliberate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityPolicy {
    Binary,
    Graded,
}

impl SeverityPolicy {
    /// Pure function of two clamped scores.
    pub fn classify(&self, toxic: f64, negative: f64) -> (Severity, &'static str) {
        match self {
            SeverityPolicy::Binary => {
                if toxic > HP.binary_toxic {
                    (Severity::Peak, REASON_TOXICITY)
                } else if negative > HP.binary_negative {
                    (Severity::Peak, REASON_NEGATIVE)
                } else {
                    (Severity::None, REASON_NONE)
                }
            }
            SeverityPolicy::Graded => {
                if toxic <= HP.graded_low_toxic && negative <= HP.graded_low_negative {
                    (Severity::None, REASON_NONE)
                } else if toxic <= HP.graded_mid_toxic && negative <= HP.graded_mid_negative {
                    (Severity::Moderate, REASON_MODERATE)
                } else {
                    (Severity::Peak, REASON_PEAK)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Category name -> keyword set. Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl Taxonomy {
    /// Build a taxonomy from (category, keywords) pairs. Keywords are
    /// lowercased; categories with an empty keyword set are dropped, so
    /// every retained category has at least one keyword.
    pub fn from_pairs<I, S, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, K)>,
        S: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        let categories: BTreeMap<String, BTreeSet<String>> = pairs
            .into_iter()
            .map(|(name, keywords)| {
                let set: BTreeSet<String> = keywords
                    .into_iter()
                    .map(|k| k.into().to_lowercase())
                    .collect();
                (name.into(), set)
            })
            .filter(|(_, set)| !set.is_empty())
            .collect();
        Self { categories }
    }

    /// The built-in microaggression taxonomy.
    pub fn default_set() -> &'static Taxonomy {
        &DEFAULT_TAXONOMY
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

static DEFAULT_TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| {
    Taxonomy::from_pairs([
        (
            "racism",
            vec![
                "ethnic",
                "racial",
                "culture",
                "minority",
                "foreign",
                "immigrant",
                "accent",
                "asian",
                "black",
                "white",
                "latino",
                "hispanic",
                "indian",
                "native",
                "exotic",
                "ghetto",
                "thug",
                "articulate",
                "civilized",
            ],
        ),
        (
            "sexism",
            vec![
                "woman",
                "girl",
                "female",
                "lady",
                "mother",
                "emotional",
                "hormonal",
                "hysteric",
                "masculine",
                "feminine",
                "gender",
                "secretary",
                "nurse",
                "bossy",
                "aggressive",
            ],
        ),
        (
            "ageism",
            vec![
                "old",
                "young",
                "boomer",
                "millennial",
                "elderly",
                "senior",
                "outdated",
                "retire",
                "ancient",
                "junior",
                "grandpa",
                "grandma",
                "spry",
                "energetic",
            ],
        ),
        (
            "ableism",
            vec![
                "disabled",
                "handicapped",
                "crazy",
                "insane",
                "lame",
                "crippled",
                "blind",
                "deaf",
                "psycho",
                "invalid",
                "wheelchair",
                "slow",
            ],
        ),
        (
            "religion",
            vec![
                "muslim",
                "christian",
                "jewish",
                "hindu",
                "atheist",
                "radical",
                "cult",
                "devout",
                "heathen",
                "fanatic",
                "infidel",
            ],
        ),
        (
            "classism",
            vec![
                "poor",
                "rich",
                "welfare",
                "ghetto",
                "homeless",
                "privileged",
                "classy",
                "trashy",
                "uneducated",
                "elite",
                "peasant",
            ],
        ),
    ])
});

// ---------------------------------------------------------------------------
// Category matching
// ---------------------------------------------------------------------------

/// Intersect the (deduplicated) token set with each category's keywords.
///
/// Confidence is `|matches| / |distinct tokens|`: repeated mentions of one
/// keyword collapse, and longer, more varied inputs dilute confidence. A
/// category is emitted only when the intersection is non-empty and its
/// confidence clears the floor. An empty token set emits nothing.
pub fn match_categories(tokens: &[String], taxonomy: &Taxonomy) -> BTreeMap<String, CategoryMatch> {
    let token_set: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
    if token_set.is_empty() {
        return BTreeMap::new();
    }

    let mut categories = BTreeMap::new();
    for (name, keywords) in &taxonomy.categories {
        let matching: Vec<String> = token_set
            .iter()
            .filter(|t| keywords.contains(**t))
            .map(|t| t.to_string())
            .collect();
        if matching.is_empty() {
            continue;
        }
        let confidence = matching.len() as f64 / token_set.len() as f64;
        if confidence > HP.category_min_confidence {
            categories.insert(
                name.clone(),
                CategoryMatch {
                    confidence,
                    matching_terms: matching,
                },
            );
        }
    }
    categories
}

// ---------------------------------------------------------------------------
// Contribution weighting
// ---------------------------------------------------------------------------

/// Frequency histogram over the token sequence, every count scaled by
/// `(toxic + negative) / 2`. Runs at every severity band, unlike category
/// matching. An empty sequence yields an empty map ("no significant words
/// detected" downstream, not an error).
pub fn weigh_contributions(tokens: &[String], toxic: f64, negative: f64) -> BTreeMap<String, f64> {
    let factor = (toxic + negative) / 2.0;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(token, count)| (token.to_string(), count as f64 * factor))
        .collect()
}

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Turns raw text into an ordered sequence of normalized content tokens.
pub trait TokenExtractor {
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Produces the two model probabilities for a text. This is the expected
/// expensive call; errors here propagate to the caller unmodified.
pub trait ModelScorer {
    fn score(&self, text: &str) -> Result<RawScores, AnalyzeError>;
}

// ---------------------------------------------------------------------------
// Built-in lexicon collaborators
// ---------------------------------------------------------------------------

static PUNCT_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\w]+|[^\w]+$").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "is", "it",
        "that", "this", "with", "as", "by", "from", "was", "were", "are", "be", "been", "has",
        "have", "had", "not", "no", "do", "does", "did", "will", "would", "could", "should",
        "can", "may", "might", "if", "then", "than", "so", "up", "out", "about", "into", "over",
        "after", "before", "between", "through", "just", "also", "very", "more", "most", "some",
        "any", "each", "every", "all", "both", "few", "other", "such", "only", "own", "same",
        "too", "how", "what", "which", "who", "when", "where", "why", "you", "your", "they",
        "them", "their", "she", "her", "he", "him", "his", "we", "our", "i", "me", "my",
    ]
    .into_iter()
    .collect()
});

static TOXIC_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    let words = [
        "stupid",
        "idiot",
        "idiotic",
        "dumb",
        "moron",
        "hate",
        "hateful",
        "ugly",
        "trash",
        "garbage",
        "loser",
        "pathetic",
        "worthless",
        "useless",
        "disgusting",
        "freak",
        "creep",
        "creepy",
        "scum",
        "vile",
    ];
    let alt = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)\\b({alt})\\b")).unwrap()
});

static NEGATIVE_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    let words = [
        "bad",
        "terrible",
        "awful",
        "horrible",
        "worst",
        "sad",
        "angry",
        "annoying",
        "disappointing",
        "disappointed",
        "poor",
        "rude",
        "nasty",
        "mean",
        "unfair",
        "offensive",
        "hostile",
        "miserable",
        "dreadful",
        "unpleasant",
    ];
    let alt = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)\\b({alt})\\b")).unwrap()
});

/// Fallback token extractor: whitespace split, edge punctuation stripped,
/// lowercased, stopwords and non-alphabetic tokens dropped. A stand-in for
/// a POS-filtering pipeline when no external extractor is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconExtractor;

impl TokenExtractor for LexiconExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter_map(|raw| {
                let stripped = PUNCT_STRIP_RE.replace_all(raw, "").to_lowercase();
                if stripped.is_empty()
                    || !stripped.chars().any(|c| c.is_alphabetic())
                    || STOPWORDS.contains(stripped.as_str())
                {
                    None
                } else {
                    Some(stripped)
                }
            })
            .collect()
    }
}

/// Fallback scorer: hit density of two fixed lexicons, squashed into a
/// probability with `1 - exp(-scale * hits / words)`. Deterministic and
/// infallible; real deployments substitute a model-backed `ModelScorer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl LexiconScorer {
    fn squash(hits: usize, words: usize) -> f64 {
        if hits == 0 || words == 0 {
            return 0.0;
        }
        let density = hits as f64 / words as f64;
        1.0 - (-HP.lexicon_hit_scale * density).exp()
    }

    fn score_lexicons(&self, text: &str) -> RawScores {
        let words = text.split_whitespace().count();
        let toxic_hits = TOXIC_WORD_RE.find_iter(text).count();
        let negative_hits = NEGATIVE_WORD_RE.find_iter(text).count();
        // No toxic hits mirrors a classifier that emits no toxicity label.
        let toxic = if toxic_hits > 0 {
            Some(Self::squash(toxic_hits, words))
        } else {
            None
        };
        RawScores {
            toxic,
            negative: Self::squash(negative_hits, words),
        }
    }
}

impl ModelScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<RawScores, AnalyzeError> {
        Ok(self.score_lexicons(text))
    }
}

// ---------------------------------------------------------------------------
// Score normalization
// ---------------------------------------------------------------------------

// Missing toxic label means 0.0, never a failure. Out-of-range or NaN
// values from a misbehaving scorer are clamped, not reported.
fn normalize_scores(raw: RawScores) -> (f64, f64) {
    (clamp_unit(raw.toxic.unwrap_or(0.0)), clamp_unit(raw.negative))
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Result assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub policy: SeverityPolicy,
    pub taxonomy: Taxonomy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            policy: SeverityPolicy::Binary,
            taxonomy: Taxonomy::default_set().clone(),
        }
    }
}

fn assemble(tokens: &[String], raw: RawScores, config: &AnalyzerConfig) -> AnalysisResult {
    let (toxic, negative) = normalize_scores(raw);
    let (severity, reason) = config.policy.classify(toxic, negative);

    // Categories only above the lowest band; weights unconditionally.
    let categories = if severity > Severity::None {
        match_categories(tokens, &config.taxonomy)
    } else {
        BTreeMap::new()
    };
    let token_weights = weigh_contributions(tokens, toxic, negative);

    AnalysisResult {
        toxic_score: toxic,
        negative_score: negative,
        severity,
        is_microaggression: severity > Severity::None,
        reason: reason.to_string(),
        categories,
        token_weights,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the full pipeline with caller-supplied collaborators. A scorer
/// failure propagates unmodified; nothing past the collaborators can fail.
pub fn analyze_with(
    text: &str,
    extractor: &dyn TokenExtractor,
    scorer: &dyn ModelScorer,
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, AnalyzeError> {
    let tokens = extractor.extract(text);
    let raw = scorer.score(text)?;
    Ok(assemble(&tokens, raw, config))
}

/// Convenience entry: built-in lexicon collaborators, default taxonomy,
/// binary policy. Infallible.
pub fn analyze(text: &str) -> AnalysisResult {
    let config = AnalyzerConfig::default();
    let tokens = LexiconExtractor.extract(text);
    let raw = LexiconScorer.score_lexicons(text);
    assemble(&tokens, raw, &config)
}
