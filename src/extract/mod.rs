//! Triple extraction from document text.
//!
//! Two extractors implement [`Extract`]:
//! - [`rules::RuleExtractor`]: deterministic pattern matching over relation
//!   cues, with hedging adverbs modulating confidence.
//! - [`assisted::AssistedExtractor`]: prompts a generation collaborator for
//!   JSON triples and falls back to the rule extractor when the reply is
//!   unusable.
//!
//! Raw candidates from either source pass through [`refine_triples`], which
//! applies the confidence floor and collapses duplicate statements.

pub mod assisted;
pub mod rules;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::graph::Triple;
use crate::text::TextChunk;

/// Knobs shared by both extractors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Candidates below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Per-chunk cap; lowest-confidence candidates are dropped first.
    #[serde(default = "default_max_per_chunk")]
    pub max_per_chunk: usize,
    /// Sentences shorter than this many words are not worth scanning.
    #[serde(default = "default_min_sentence_words")]
    pub min_sentence_words: usize,
}

fn default_min_confidence() -> f32 {
    0.6
}

fn default_max_per_chunk() -> usize {
    8
}

fn default_min_sentence_words() -> usize {
    5
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_per_chunk: default_max_per_chunk(),
            min_sentence_words: default_min_sentence_words(),
        }
    }
}

/// A triple extractor over chunked document text.
pub trait Extract: Send + Sync {
    /// Extract candidate triples from one chunk of a document.
    fn extract_chunk(&self, document_id: &str, chunk: &TextChunk)
    -> Result<Vec<Triple>, ExtractError>;

    /// Extract from every chunk of a document, then apply the confidence
    /// floor and duplicate collapse in one pass.
    fn extract_document(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
        min_confidence: f32,
    ) -> Result<Vec<Triple>, ExtractError> {
        let mut raw = Vec::new();
        for chunk in chunks {
            raw.extend(self.extract_chunk(document_id, chunk)?);
        }
        Ok(refine_triples(raw, min_confidence))
    }
}

/// Keep at most `max` candidates, dropping the weakest first.
pub(crate) fn cap_chunk(mut triples: Vec<Triple>, max: usize) -> Vec<Triple> {
    if triples.len() > max {
        triples.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        triples.truncate(max);
    }
    triples
}

/// Drop candidates below the confidence floor and collapse duplicate
/// (subject, predicate, object) statements, keeping the strongest evidence.
/// First-seen order is preserved.
pub fn refine_triples(triples: Vec<Triple>, min_confidence: f32) -> Vec<Triple> {
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut kept: Vec<Triple> = Vec::new();

    for t in triples {
        if t.confidence() < min_confidence {
            continue;
        }
        let (s, p, o) = t.spo();
        let key = (s.to_string(), p.to_string(), o.to_string());
        match index.get(&key) {
            Some(&at) => {
                if t.confidence() > kept[at].confidence() {
                    kept[at] = t;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(t);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{triple, triple_from};

    #[test]
    fn refine_drops_low_confidence() {
        let triples = vec![
            triple("microgravity", "reduces", "bone density", 0.9),
            triple("microgravity", "affects", "muscle mass", 0.4),
        ];
        let kept = refine_triples(triples, 0.6);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].predicate(), "reduces");
    }

    #[test]
    fn refine_keeps_strongest_duplicate() {
        let triples = vec![
            triple("microgravity", "reduces", "bone density", 0.7),
            triple("radiation", "damages", "dna", 0.8),
            triple("microgravity", "reduces", "bone density", 0.95),
        ];
        let kept = refine_triples(triples, 0.6);
        assert_eq!(kept.len(), 2);
        // first-seen position, strongest confidence
        assert_eq!(kept[0].subject(), "microgravity");
        assert!((kept[0].confidence() - 0.95).abs() < f32::EPSILON);
        assert_eq!(kept[1].subject(), "radiation");
    }

    #[test]
    fn refine_treats_sources_as_one_statement() {
        let triples = vec![
            triple_from("microgravity", "reduces", "bone density", 0.7, "doc-1"),
            triple_from("microgravity", "reduces", "bone density", 0.9, "doc-2"),
        ];
        let kept = refine_triples(triples, 0.6);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source().document_id, "doc-2");
    }
}
