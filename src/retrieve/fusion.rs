//! Evidence fusion.
//!
//! Merges graph triples and vector passages into one ranked list under a
//! single normalized score: `alpha * confidence + (1 - alpha) * similarity`.
//! A triple carries no similarity and a passage no confidence, so the missing
//! component contributes zero. The sort is stable and ties keep discovery
//! order, graph matches ahead of vector matches. Duplicate relationships
//! (same subject, predicate, object) and duplicate passage texts collapse to
//! their best-scoring instance.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::collab::PassageMatch;
use crate::graph::Triple;

/// Weight of graph confidence against vector similarity. Tunable through
/// the retriever config; both evidence kinds count equally by default.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// One fused item: a graph relationship or a retrieved passage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Evidence {
    Triple(Triple),
    Passage(PassageMatch),
}

impl Evidence {
    pub fn as_triple(&self) -> Option<&Triple> {
        match self {
            Self::Triple(t) => Some(t),
            Self::Passage(_) => None,
        }
    }

    pub fn as_passage(&self) -> Option<&PassageMatch> {
        match self {
            Self::Triple(_) => None,
            Self::Passage(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEvidence {
    pub evidence: Evidence,
    pub combined_score: f32,
}

/// Rank graph and vector evidence together.
///
/// Similarity arrives from an external service and is clamped to [0, 1]
/// before weighting so one out-of-scale score cannot swamp the ranking.
/// Raising either input score never lowers that item's position.
pub fn fuse_evidence(
    graph_matches: &[Triple],
    vector_matches: &[PassageMatch],
    alpha: f32,
) -> Vec<RankedEvidence> {
    let mut ranked = Vec::with_capacity(graph_matches.len() + vector_matches.len());
    for triple in graph_matches {
        ranked.push(RankedEvidence {
            combined_score: alpha * triple.confidence(),
            evidence: Evidence::Triple(triple.clone()),
        });
    }
    for passage in vector_matches {
        ranked.push(RankedEvidence {
            combined_score: (1.0 - alpha) * passage.similarity.clamp(0.0, 1.0),
            evidence: Evidence::Passage(passage.clone()),
        });
    }

    // Stable: equal scores keep discovery order.
    ranked.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut seen_spo: HashSet<(String, String, String)> = HashSet::new();
    let mut seen_text: HashSet<String> = HashSet::new();
    ranked.retain(|item| match &item.evidence {
        Evidence::Triple(t) => {
            let (s, p, o) = t.spo();
            seen_spo.insert((s.to_string(), p.to_string(), o.to_string()))
        }
        Evidence::Passage(p) => seen_text.insert(p.passage_text.clone()),
    });
    ranked
}
