//! Query intent resolution.
//!
//! Turns free-form question text into a [`QueryIntent`]: which known graph
//! entities the question mentions, what kind of question it is, and which
//! domain area it leans toward. Matching is purely lexical against the
//! store's node labels and their alias variants, which keeps resolution
//! cheap and deterministic; [`ResolveIntent`] is the seam where a smarter
//! classifier could be swapped in without touching callers.
//!
//! The resolver never fails. An empty or unintelligible query resolves to a
//! low-confidence general intent with no entities, and vector search can
//! still answer it downstream.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{alias_variants, normalize_label};
use crate::graph::index::GraphStore;

// ---------------------------------------------------------------------------
// Intent data model
// ---------------------------------------------------------------------------

/// What kind of question the query asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Relationship,
    Definition,
    Comparison,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relationship => "relationship",
            Self::Definition => "definition",
            Self::Comparison => "comparison",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved reading of one query. Derived per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub raw_query: String,
    /// Normalized node labels the query mentions, at most [`MAX_ENTITIES`].
    pub entities: BTreeSet<String>,
    pub query_type: QueryType,
    /// Strongest domain keyword hit, if any.
    pub focus_area: Option<String>,
    /// Mean of the cue and entity evidence scores, in [0, 1].
    pub confidence: f32,
}

/// Narrow seam for query classification.
pub trait ResolveIntent: Send + Sync {
    /// Classify `query`. Must not fail: unusable input yields a
    /// low-confidence general intent instead of an error.
    fn resolve(&self, query: &str) -> QueryIntent;
}

// ---------------------------------------------------------------------------
// Lexical resolver
// ---------------------------------------------------------------------------

/// Upper bound on entities carried by one intent. Graph lookups fan out per
/// entity, so an unbounded mention list would let a keyword-stuffed query
/// dominate retrieval.
pub const MAX_ENTITIES: usize = 5;

/// Words a label may not be recognized by on their own.
const MIN_KEYWORD_LEN: usize = 5;

const FUNCTION_WORDS: &[&str] = &[
    "about", "above", "after", "among", "because", "before", "between", "could",
    "during", "their", "there", "these", "those", "through", "under", "where",
    "which", "while", "would", "within", "without",
];

const COMPARISON_CUES: &[&str] = &[
    "compare", "compared", "comparison", "versus", "vs", "difference",
    "differences", "differ", "differs",
];

const DEFINITION_PHRASES: &[&str] = &["what is", "what are", "tell me about", "definition of"];

const DEFINITION_WORDS: &[&str] = &["define", "describe", "explain"];

/// Domain areas with weighted marker keywords. Environmental stressors carry
/// the top weight: in a query like "how does radiation affect plant growth"
/// the stressor is the focus, not the organism.
const FOCUS_AREAS: &[(&str, &[(&str, f32)])] = &[
    ("microgravity", &[
        ("microgravity", 1.0),
        ("weightlessness", 0.9),
        ("spaceflight", 0.7),
    ]),
    ("radiation", &[
        ("radiation", 1.0),
        ("irradiation", 0.9),
        ("cosmic", 0.8),
    ]),
    ("bone", &[
        ("bone", 0.9),
        ("bones", 0.9),
        ("skeletal", 0.85),
        ("skeleton", 0.85),
        ("osteoporosis", 0.85),
    ]),
    ("muscle", &[
        ("muscle", 0.9),
        ("muscles", 0.9),
        ("muscular", 0.85),
        ("atrophy", 0.7),
    ]),
    ("immune", &[
        ("immune", 0.9),
        ("immunity", 0.9),
        ("immunological", 0.85),
        ("lymphocyte", 0.8),
        ("cytokine", 0.8),
    ]),
    ("plants", &[
        ("plant", 0.9),
        ("plants", 0.9),
        ("arabidopsis", 0.9),
        ("seedling", 0.85),
        ("seedlings", 0.85),
    ]),
    ("bacteria", &[
        ("bacteria", 0.9),
        ("bacterial", 0.9),
        ("microbial", 0.85),
        ("microbe", 0.85),
        ("biofilm", 0.8),
    ]),
    ("gene expression", &[
        ("gene", 0.8),
        ("genes", 0.8),
        ("genomic", 0.8),
        ("transcriptome", 0.85),
    ]),
];

/// Resolves intents by scanning the graph's node labels against the query.
pub struct LexicalResolver {
    store: Arc<GraphStore>,
}

impl LexicalResolver {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ResolveIntent for LexicalResolver {
    fn resolve(&self, query: &str) -> QueryIntent {
        let normalized = normalize_label(query);
        if normalized.is_empty() {
            return QueryIntent {
                raw_query: query.to_string(),
                entities: BTreeSet::new(),
                query_type: QueryType::General,
                focus_area: None,
                confidence: 0.2,
            };
        }
        let words: Vec<&str> = normalized.split_whitespace().collect();

        let mut mentions = Vec::new();
        for label in self.store.entity_labels() {
            if let Some(mention) = label_mention(&label, &words) {
                mentions.push(mention);
            }
        }
        let kept = keep_longest(mentions);

        let (query_type, cue_confidence) = classify_query(&normalized, &words, kept.len());
        let entity_confidence = entity_confidence(&kept);
        let confidence = ((cue_confidence + entity_confidence) / 2.0).clamp(0.0, 1.0);
        let focus_area = focus_area(&words);
        let entities: BTreeSet<String> = kept.into_iter().map(|m| m.label).collect();

        debug!(
            query_type = %query_type,
            entities = entities.len(),
            focus = focus_area.as_deref().unwrap_or("none"),
            "resolved query intent"
        );

        QueryIntent {
            raw_query: query.to_string(),
            entities,
            query_type,
            focus_area,
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Mention matching
// ---------------------------------------------------------------------------

/// Evidence tier behind a mention. A full label (or alias) appearing in the
/// query outranks a single distinctive word from the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Word,
    Label,
}

#[derive(Debug)]
struct Mention {
    /// Graph node label this mention resolves to.
    label: String,
    /// Query words the match claims, used for overlap suppression.
    matched: Vec<String>,
    tier: MatchTier,
}

/// Contiguous word-bounded containment, so "iss" never matches inside
/// "tissue" and "bone density" requires both words adjacent.
fn contains_word_seq(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

/// How `label` shows up in the query, if it does. Tries every alias variant
/// of the whole label first, then falls back to the label's longest
/// distinctive word (>= [`MIN_KEYWORD_LEN`], not a function word) so a query
/// saying just "atrophy" still reaches the "muscle atrophy" node.
fn label_mention(label: &str, query_words: &[&str]) -> Option<Mention> {
    let mut best: Option<Mention> = None;
    for variant in alias_variants(label) {
        let variant_words: Vec<&str> = variant.split_whitespace().collect();
        if !contains_word_seq(query_words, &variant_words) {
            continue;
        }
        let longer = best
            .as_ref()
            .is_none_or(|b| variant_words.len() > b.matched.len());
        if longer {
            best = Some(Mention {
                label: label.to_string(),
                matched: variant_words.iter().map(|w| w.to_string()).collect(),
                tier: MatchTier::Label,
            });
        }
    }
    if best.is_some() {
        return best;
    }

    let mut keyword: Option<&str> = None;
    for word in label.split_whitespace() {
        if word.len() >= MIN_KEYWORD_LEN
            && !FUNCTION_WORDS.contains(&word)
            && query_words.contains(&word)
        {
            let longer = keyword.is_none_or(|k| word.len() > k.len());
            if longer {
                keyword = Some(word);
            }
        }
    }
    keyword.map(|word| Mention {
        label: label.to_string(),
        matched: vec![word.to_string()],
        tier: MatchTier::Word,
    })
}

/// Longest-match-wins selection. Mentions whose claimed words sit inside an
/// already kept mention's claim are dropped, so matching both "bone" and
/// "bone density" keeps only the longer label. Capped at [`MAX_ENTITIES`].
fn keep_longest(mut mentions: Vec<Mention>) -> Vec<Mention> {
    mentions.sort_by(|a, b| {
        b.tier
            .cmp(&a.tier)
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
            .then_with(|| a.label.cmp(&b.label))
    });
    let mut kept: Vec<Mention> = Vec::new();
    for mention in mentions {
        if kept.len() == MAX_ENTITIES {
            break;
        }
        let needle: Vec<&str> = mention.matched.iter().map(String::as_str).collect();
        let claimed = kept.iter().any(|k| {
            let hay: Vec<&str> = k.matched.iter().map(String::as_str).collect();
            contains_word_seq(&hay, &needle)
        });
        if !claimed {
            kept.push(mention);
        }
    }
    kept
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Query type plus the cue evidence score. Precedence: comparison cues beat
/// definition cues ("what is the difference between ..." is a comparison),
/// and two or more mentioned entities read as a relationship question.
fn classify_query(normalized: &str, words: &[&str], entity_count: usize) -> (QueryType, f32) {
    if words.iter().any(|w| COMPARISON_CUES.contains(w)) {
        return (QueryType::Comparison, 0.9);
    }
    let padded = format!(" {normalized} ");
    let definitional = DEFINITION_PHRASES
        .iter()
        .any(|p| padded.contains(format!(" {p} ").as_str()))
        || words.iter().any(|w| DEFINITION_WORDS.contains(w));
    if definitional {
        return (QueryType::Definition, 0.85);
    }
    if entity_count >= 2 {
        return (QueryType::Relationship, 0.8);
    }
    (QueryType::General, 0.5)
}

fn entity_confidence(kept: &[Mention]) -> f32 {
    let full_labels = kept.iter().filter(|m| m.tier == MatchTier::Label).count();
    match (kept.len(), full_labels) {
        (0, _) => 0.3,
        (_, 0) => 0.6,
        (1, _) => 0.75,
        _ => 0.9,
    }
}

/// Strongest marker hit wins; ties go to the earlier table entry.
fn focus_area(words: &[&str]) -> Option<String> {
    let mut best: Option<(&str, f32)> = None;
    for (area, markers) in FOCUS_AREAS {
        for (marker, weight) in *markers {
            if !words.contains(marker) {
                continue;
            }
            let better = best.is_none_or(|(_, w)| *weight > w);
            if better {
                best = Some((area, *weight));
            }
        }
    }
    best.map(|(area, _)| area.to_string())
}
