//! In-memory knowledge graph store.
//!
//! Uses `petgraph` for the multigraph structure and `DashMap` for label
//! lookups. Single-writer/multiple-reader: batch commits take the write lock
//! once for the whole batch; queries share the read lock. Lock order is
//! always graph lock before label index.

use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::entity::normalize_label;

use super::{Triple, TripleKey, traverse};

/// In-memory directed multigraph of [`Triple`]s keyed by normalized labels.
///
/// Inserts are idempotent per (subject, predicate, object, source document):
/// the same fact re-ingested from the same document is one edge, while the
/// same fact from a second document adds a second edge, preserving
/// provenance diversity. Parallel edges with different predicates are kept.
pub struct GraphStore {
    /// Nodes are normalized entity labels; edges carry the full triple.
    graph: RwLock<DiGraph<String, Triple>>,
    /// label → NodeIndex for O(1) lookups.
    node_index: DashMap<String, NodeIndex>,
    /// Idempotency keys of every committed edge.
    seen: DashSet<TripleKey>,
    /// Edge count, kept in step with `seen`.
    edge_count: AtomicUsize,
}

impl GraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            seen: DashSet::new(),
            edge_count: AtomicUsize::new(0),
        }
    }

    fn ensure_node(
        graph: &mut DiGraph<String, Triple>,
        node_index: &DashMap<String, NodeIndex>,
        label: &str,
    ) -> NodeIndex {
        if let Some(idx) = node_index.get(label) {
            return *idx.value();
        }
        let idx = graph.add_node(label.to_string());
        node_index.insert(label.to_string(), idx);
        idx
    }

    /// Commit a batch of triples under one write lock.
    ///
    /// Returns the number of edges actually added; triples whose idempotency
    /// key is already present are skipped silently.
    pub fn add_triples(&self, triples: &[Triple]) -> usize {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut added = 0usize;
        for triple in triples {
            let key = triple.key();
            if self.seen.contains(&key) {
                continue;
            }
            let subj = Self::ensure_node(&mut graph, &self.node_index, triple.subject());
            let obj = Self::ensure_node(&mut graph, &self.node_index, triple.object());
            graph.add_edge(subj, obj, triple.clone());
            self.seen.insert(key);
            added += 1;
        }
        if added > 0 {
            self.edge_count.fetch_add(added, Ordering::Relaxed);
        }
        added
    }

    /// Commit a single triple. Returns false if it was already present.
    pub fn add_triple(&self, triple: &Triple) -> bool {
        self.add_triples(std::slice::from_ref(triple)) == 1
    }

    /// Triples within `max_hops` edges of the entity (either direction),
    /// ordered by confidence descending, then hop distance ascending.
    /// An entity absent from the graph yields an empty result.
    pub fn query_by_entity(&self, entity: &str, max_hops: usize) -> Vec<Triple> {
        traverse::neighborhood(self, entity, max_hops)
            .into_iter()
            .map(|h| h.triple)
            .collect()
    }

    /// All triples where the entity is the subject.
    pub fn triples_from(&self, label: &str) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let idx = match self.node_index.get(&normalize_label(label)) {
            Some(idx) => *idx.value(),
            None => return vec![],
        };
        graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.weight().clone())
            .collect()
    }

    /// All triples where the entity is the object.
    pub fn triples_to(&self, label: &str) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let idx = match self.node_index.get(&normalize_label(label)) {
            Some(idx) => *idx.value(),
            None => return vec![],
        };
        graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.weight().clone())
            .collect()
    }

    /// Whether a label (after normalization) is a node.
    pub fn contains_entity(&self, label: &str) -> bool {
        self.node_index.contains_key(&normalize_label(label))
    }

    /// Every node label, in no particular order.
    pub fn entity_labels(&self) -> Vec<String> {
        self.node_index.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of entity nodes.
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of edges (committed triples).
    pub fn edge_count(&self) -> usize {
        self.edge_count.load(Ordering::Relaxed)
    }

    /// Every triple in the graph, in insertion order.
    pub fn all_triples(&self) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_indices()
            .filter_map(|ei| graph.edge_weight(ei).cloned())
            .collect()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{triple, triple_from};

    #[test]
    fn insert_and_query() {
        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "affects", "bone density", 0.92));
        store.add_triple(&triple("microgravity", "affects", "muscle mass", 0.81));

        assert!(store.contains_entity("microgravity"));
        assert!(store.contains_entity("Bone Density"));
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.edge_count(), 2);

        let from = store.triples_from("microgravity");
        assert_eq!(from.len(), 2);

        let to = store.triples_to("bone density");
        assert_eq!(to.len(), 1);
        assert_eq!(to[0].subject(), "microgravity");
    }

    #[test]
    fn reinsert_from_same_source_is_idempotent() {
        let store = GraphStore::new();
        let t = triple_from("microgravity", "affects", "bone density", 0.92, "doc-1");
        assert!(store.add_triple(&t));
        assert!(!store.add_triple(&t));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn reinsert_from_other_source_adds_edge() {
        let store = GraphStore::new();
        let a = triple_from("microgravity", "affects", "bone density", 0.92, "doc-1");
        let b = triple_from("microgravity", "affects", "bone density", 0.88, "doc-2");
        assert_eq!(store.add_triples(&[a, b]), 2);
        assert_eq!(store.edge_count(), 2);
        // Still two nodes: parallel edges, not duplicated endpoints.
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn parallel_predicates_are_preserved() {
        let store = GraphStore::new();
        store.add_triple(&triple("radiation", "damages", "dna", 0.9));
        store.add_triple(&triple("radiation", "alters", "dna", 0.7));

        let from = store.triples_from("radiation");
        assert_eq!(from.len(), 2);
        let predicates: Vec<&str> = from.iter().map(|t| t.predicate()).collect();
        assert!(predicates.contains(&"damages"));
        assert!(predicates.contains(&"alters"));
    }

    #[test]
    fn queries_on_absent_entities_are_empty() {
        let store = GraphStore::new();
        assert!(store.triples_from("nothing").is_empty());
        assert!(store.triples_to("nothing").is_empty());
        assert!(store.query_by_entity("nothing", 2).is_empty());
        assert!(!store.contains_entity("nothing"));
    }

    #[test]
    fn query_normalizes_the_label() {
        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "affects", "bone density", 0.9));
        assert_eq!(store.triples_from("  MICROGRAVITY ").len(), 1);
    }

    #[test]
    fn all_triples_returns_every_edge() {
        let store = GraphStore::new();
        store.add_triple(&triple("a1", "affects", "b1", 0.9));
        store.add_triple(&triple("b1", "affects", "c1", 0.8));
        assert_eq!(store.all_triples().len(), 2);
    }
}
