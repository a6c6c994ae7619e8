//! Graph statistics: size, degree ranking, class histogram, density.
//!
//! All figures are derived from the store on demand; nothing here is cached,
//! so a stats call always reflects the current graph.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::classify;

use super::index::GraphStore;

/// Default number of entries in the most-connected ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// An entity and its total degree (in + out).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDegree {
    pub label: String,
    pub degree: usize,
}

/// Snapshot of graph-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Node count per [`crate::entity::NodeClass`] name.
    pub node_classes: BTreeMap<String, usize>,
    /// Top-N entities by total degree, ties broken alphabetically.
    pub most_connected: Vec<NodeDegree>,
    /// Mean total degree, 2E/N for a directed graph.
    pub average_degree: f64,
    /// E / (N x (N-1)); defined as 0 for graphs with fewer than two nodes.
    pub density: f64,
}

/// Compute [`GraphStats`] with a ranking of the `top_n` most connected nodes.
pub fn graph_stats(store: &GraphStore, top_n: usize) -> GraphStats {
    let total_nodes = store.node_count();
    let total_edges = store.edge_count();

    let mut node_classes: BTreeMap<String, usize> = BTreeMap::new();
    let mut degrees: Vec<NodeDegree> = Vec::with_capacity(total_nodes);
    for label in store.entity_labels() {
        *node_classes
            .entry(classify(&label).as_str().to_string())
            .or_insert(0) += 1;
        let degree = store.triples_from(&label).len() + store.triples_to(&label).len();
        degrees.push(NodeDegree { label, degree });
    }
    degrees.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.label.cmp(&b.label)));
    degrees.truncate(top_n);

    let average_degree = if total_nodes == 0 {
        0.0
    } else {
        (2 * total_edges) as f64 / total_nodes as f64
    };
    let density = if total_nodes < 2 {
        0.0
    } else {
        total_edges as f64 / (total_nodes as f64 * (total_nodes as f64 - 1.0))
    };

    GraphStats {
        total_nodes,
        total_edges,
        node_classes,
        most_connected: degrees,
        average_degree,
        density,
    }
}

impl GraphStore {
    /// Current statistics with the default most-connected ranking size.
    pub fn stats(&self) -> GraphStats {
        graph_stats(self, DEFAULT_TOP_N)
    }
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "nodes:          {}", self.total_nodes)?;
        writeln!(f, "edges:          {}", self.total_edges)?;
        writeln!(f, "average degree: {:.2}", self.average_degree)?;
        writeln!(f, "density:        {:.4}", self.density)?;
        if !self.node_classes.is_empty() {
            writeln!(f, "classes:")?;
            for (class, count) in &self.node_classes {
                writeln!(f, "  {class}: {count}")?;
            }
        }
        if !self.most_connected.is_empty() {
            writeln!(f, "most connected:")?;
            for nd in &self.most_connected {
                writeln!(f, "  {} ({})", nd.label, nd.degree)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::triple;

    #[test]
    fn empty_graph_has_zero_stats() {
        let store = GraphStore::new();
        let stats = store.stats();
        assert_eq!(stats.total_nodes, 0);
        assert_eq!(stats.total_edges, 0);
        assert_eq!(stats.average_degree, 0.0);
        assert_eq!(stats.density, 0.0);
        assert!(stats.node_classes.is_empty());
        assert!(stats.most_connected.is_empty());
    }

    #[test]
    fn two_node_graph_density() {
        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "reduces", "bone density", 0.9));
        let stats = store.stats();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_edges, 1);
        // 1 / (2 x 1)
        assert!((stats.density - 0.5).abs() < f64::EPSILON);
        assert!((stats.average_degree - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_counts_node_classes() {
        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "reduces", "bone density", 0.9));
        store.add_triple(&triple("microgravity", "affects", "mice", 0.8));
        let stats = store.stats();
        assert_eq!(stats.node_classes.get("condition"), Some(&1));
        assert_eq!(stats.node_classes.get("measurement"), Some(&1));
        assert_eq!(stats.node_classes.get("species"), Some(&1));
    }

    #[test]
    fn most_connected_ranks_by_degree() {
        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "reduces", "bone density", 0.9));
        store.add_triple(&triple("microgravity", "reduces", "muscle mass", 0.9));
        store.add_triple(&triple("microgravity", "alters", "gene expression", 0.8));

        let stats = graph_stats(&store, 2);
        assert_eq!(stats.most_connected.len(), 2);
        assert_eq!(stats.most_connected[0].label, "microgravity");
        assert_eq!(stats.most_connected[0].degree, 3);
        // Remaining nodes all have degree 1; alphabetical tie-break.
        assert_eq!(stats.most_connected[1].label, "bone density");
    }
}
