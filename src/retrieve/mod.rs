//! Hybrid retrieval.
//!
//! Answers a resolved query from two sources at once. The vector-search
//! collaborator sees the raw query text while the graph store is probed per
//! mentioned entity; the two lookups are independent, so they run
//! concurrently on scoped threads and the external call never holds a graph
//! lock. A failed or timed-out vector call degrades to empty matches rather
//! than failing the request, leaving graph evidence to carry the answer.

pub mod fusion;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collab::{PassageMatch, VectorSearch};
use crate::graph::index::GraphStore;
use crate::graph::{Triple, TripleKey};
use crate::intent::QueryIntent;

use self::fusion::{DEFAULT_ALPHA, RankedEvidence, fuse_evidence};

/// Retrieval knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Passages requested from the vector collaborator.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Graph neighborhood radius per mentioned entity.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// Fusion weight of graph confidence against vector similarity.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Bound on the vector-search call.
    #[serde(default = "default_vector_timeout_ms")]
    pub vector_timeout_ms: u64,
}

fn default_top_k() -> usize {
    3
}

fn default_max_hops() -> usize {
    2
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

fn default_vector_timeout_ms() -> u64 {
    10_000
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_hops: default_max_hops(),
            alpha: default_alpha(),
            vector_timeout_ms: default_vector_timeout_ms(),
        }
    }
}

/// Everything retrieval produced for one query. Created per call, discarded
/// once the answer is generated.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceBundle {
    pub vector_matches: Vec<PassageMatch>,
    pub graph_matches: Vec<Triple>,
    pub combined_rank: Vec<RankedEvidence>,
}

impl EvidenceBundle {
    pub fn is_empty(&self) -> bool {
        self.combined_rank.is_empty()
    }
}

/// Joins graph lookups and vector search into one evidence bundle.
pub struct HybridRetriever {
    store: Arc<GraphStore>,
    vector: Option<Box<dyn VectorSearch>>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<GraphStore>,
        vector: Option<Box<dyn VectorSearch>>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            vector,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Whether a vector-search collaborator is wired in.
    pub fn has_vector(&self) -> bool {
        self.vector.is_some()
    }

    /// Retrieve evidence for one query. Never fails: collaborator trouble
    /// shrinks the bundle instead of surfacing an error.
    pub fn retrieve(&self, query: &str, intent: &QueryIntent) -> EvidenceBundle {
        let timeout = Duration::from_millis(self.config.vector_timeout_ms);
        let top_k = self.config.top_k;

        let (graph_matches, vector_matches) = thread::scope(|scope| {
            let vector_handle = self
                .vector
                .as_deref()
                .map(|v| scope.spawn(move || v.search(query, top_k, timeout)));

            let graph = self.graph_matches(intent);

            let vector = match vector_handle {
                None => Vec::new(),
                Some(handle) => match handle.join() {
                    Ok(Ok(matches)) => matches,
                    Ok(Err(e)) => {
                        warn!(%e, "vector search degraded, continuing with graph evidence only");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("vector search thread panicked, continuing with graph evidence only");
                        Vec::new()
                    }
                },
            };
            (graph, vector)
        });

        let combined_rank = fuse_evidence(&graph_matches, &vector_matches, self.config.alpha);
        debug!(
            graph = graph_matches.len(),
            vector = vector_matches.len(),
            ranked = combined_rank.len(),
            "retrieved evidence"
        );

        EvidenceBundle {
            vector_matches,
            graph_matches,
            combined_rank,
        }
    }

    /// Per-entity neighborhood lookups in entity order, exact duplicate edges
    /// removed. Zero entities short-circuits to an empty list; the vector
    /// side alone can still answer.
    pub fn graph_matches(&self, intent: &QueryIntent) -> Vec<Triple> {
        if intent.entities.is_empty() {
            return Vec::new();
        }
        let mut seen: HashSet<TripleKey> = HashSet::new();
        let mut matches = Vec::new();
        for entity in &intent.entities {
            for triple in self.store.query_by_entity(entity, self.config.max_hops) {
                if seen.insert(triple.key()) {
                    matches.push(triple);
                }
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CollabError;
    use crate::graph::test_support::triple;
    use crate::intent::QueryType;
    use std::collections::BTreeSet;

    struct StubVector(Vec<PassageMatch>);

    impl VectorSearch for StubVector {
        fn search(
            &self,
            _query: &str,
            top_k: usize,
            _timeout: Duration,
        ) -> Result<Vec<PassageMatch>, CollabError> {
            let mut matches = self.0.clone();
            matches.truncate(top_k);
            Ok(matches)
        }
    }

    struct TimingOutVector;

    impl VectorSearch for TimingOutVector {
        fn search(
            &self,
            _query: &str,
            _top_k: usize,
            timeout: Duration,
        ) -> Result<Vec<PassageMatch>, CollabError> {
            Err(CollabError::Timeout {
                service: "vector-search",
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    fn passage(text: &str, similarity: f32) -> PassageMatch {
        PassageMatch {
            passage_text: text.to_string(),
            similarity,
            document_id: Some("doc-1".to_string()),
            title: Some("Bone loss study".to_string()),
        }
    }

    fn seeded_store() -> Arc<GraphStore> {
        let store = GraphStore::new();
        store.add_triples(&[
            triple("microgravity", "reduces", "bone density", 0.9),
            triple("microgravity", "increases", "calcium loss", 0.8),
            triple("radiation", "damages", "dna", 0.7),
        ]);
        Arc::new(store)
    }

    fn intent_with(entities: &[&str]) -> QueryIntent {
        QueryIntent {
            raw_query: "test query".to_string(),
            entities: entities.iter().map(|e| e.to_string()).collect::<BTreeSet<_>>(),
            query_type: QueryType::General,
            focus_area: None,
            confidence: 0.8,
        }
    }

    #[test]
    fn fuses_graph_and_vector_evidence() {
        let retriever = HybridRetriever::new(
            seeded_store(),
            Some(Box::new(StubVector(vec![passage("bone loss excerpt", 0.95)]))),
            RetrieverConfig::default(),
        );

        let bundle = retriever.retrieve("bone density", &intent_with(&["microgravity"]));

        assert_eq!(bundle.vector_matches.len(), 1);
        assert!(!bundle.graph_matches.is_empty());
        assert_eq!(
            bundle.combined_rank.len(),
            bundle.graph_matches.len() + bundle.vector_matches.len()
        );
    }

    #[test]
    fn vector_timeout_degrades_to_graph_only() {
        let retriever = HybridRetriever::new(
            seeded_store(),
            Some(Box::new(TimingOutVector)),
            RetrieverConfig::default(),
        );

        let bundle = retriever.retrieve("bone density", &intent_with(&["microgravity"]));

        assert!(bundle.vector_matches.is_empty());
        assert!(!bundle.graph_matches.is_empty());
        assert!(bundle.combined_rank.iter().all(|r| r.evidence.as_triple().is_some()));
    }

    #[test]
    fn no_entities_short_circuits_graph_lookup() {
        let retriever = HybridRetriever::new(
            seeded_store(),
            Some(Box::new(StubVector(vec![passage("vector only", 0.9)]))),
            RetrieverConfig::default(),
        );

        let bundle = retriever.retrieve("something unrelated", &intent_with(&[]));

        assert!(bundle.graph_matches.is_empty());
        assert_eq!(bundle.vector_matches.len(), 1);
        assert_eq!(bundle.combined_rank.len(), 1);
    }

    #[test]
    fn no_collaborator_still_answers_from_graph() {
        let retriever =
            HybridRetriever::new(seeded_store(), None, RetrieverConfig::default());

        let bundle = retriever.retrieve("bone density", &intent_with(&["microgravity"]));

        assert!(bundle.vector_matches.is_empty());
        assert!(!bundle.graph_matches.is_empty());
    }

    #[test]
    fn overlapping_entity_neighborhoods_are_deduplicated() {
        let retriever =
            HybridRetriever::new(seeded_store(), None, RetrieverConfig::default());

        let bundle = retriever.retrieve(
            "bone density",
            &intent_with(&["microgravity", "bone density"]),
        );

        let reducing: Vec<_> = bundle
            .graph_matches
            .iter()
            .filter(|t| t.spo() == ("microgravity", "reduces", "bone density"))
            .collect();
        assert_eq!(reducing.len(), 1);
    }

    #[test]
    fn top_k_bounds_vector_requests() {
        let matches = vec![
            passage("first", 0.9),
            passage("second", 0.8),
            passage("third", 0.7),
            passage("fourth", 0.6),
        ];
        let retriever = HybridRetriever::new(
            seeded_store(),
            Some(Box::new(StubVector(matches))),
            RetrieverConfig::default(),
        );

        let bundle = retriever.retrieve("anything", &intent_with(&[]));

        assert_eq!(bundle.vector_matches.len(), 3);
    }

    #[test]
    fn absent_entity_contributes_nothing() {
        let retriever =
            HybridRetriever::new(seeded_store(), None, RetrieverConfig::default());

        let bundle = retriever.retrieve("unknown", &intent_with(&["phantom entity"]));

        assert!(bundle.graph_matches.is_empty());
        assert!(bundle.combined_rank.is_empty());
    }
}
