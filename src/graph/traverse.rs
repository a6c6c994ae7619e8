//! Hop-bounded neighborhood queries and path finding.
//!
//! BFS from a seed entity following edges in both directions: a relationship
//! is relevant to the entity whichever way the edge points. Hop distance is
//! the BFS depth at which an edge is first discovered.

use std::collections::{HashSet, VecDeque};

use crate::entity::normalize_label;

use super::index::GraphStore;
use super::{Triple, TripleKey};

/// A triple tagged with its discovery distance from the queried entity.
#[derive(Debug, Clone)]
pub struct HopTriple {
    pub triple: Triple,
    /// 1 for edges touching the seed, 2 for the next ring, and so on.
    pub hops: usize,
}

/// Collect every triple within `max_hops` of `entity`, ordered by confidence
/// descending, then hop distance ascending; ties keep discovery order.
///
/// An absent entity or `max_hops == 0` yields an empty result.
pub fn neighborhood(store: &GraphStore, entity: &str, max_hops: usize) -> Vec<HopTriple> {
    let seed = normalize_label(entity);
    if max_hops == 0 || !store.contains_entity(&seed) {
        return Vec::new();
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_edges: HashSet<TripleKey> = HashSet::new();
    let mut collected: Vec<HopTriple> = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    visited.insert(seed.clone());
    queue.push_back((seed, 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        let mut edges = store.triples_from(&node);
        edges.extend(store.triples_to(&node));

        for triple in edges {
            let other = if triple.subject() == node {
                triple.object().to_string()
            } else {
                triple.subject().to_string()
            };
            if seen_edges.insert(triple.key()) {
                collected.push(HopTriple {
                    triple,
                    hops: depth + 1,
                });
            }
            if visited.insert(other.clone()) {
                queue.push_back((other, depth + 1));
            }
        }
    }

    collected.sort_by(|a, b| {
        b.triple
            .confidence()
            .partial_cmp(&a.triple.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.hops.cmp(&b.hops))
    });
    collected
}

/// Simple paths between two entities, ignoring edge direction, each at most
/// `max_len` edges long. Collection stops after `limit` paths.
pub fn paths_between(
    store: &GraphStore,
    from: &str,
    to: &str,
    max_len: usize,
    limit: usize,
) -> Vec<Vec<String>> {
    let start = normalize_label(from);
    let goal = normalize_label(to);
    if max_len == 0
        || limit == 0
        || start == goal
        || !store.contains_entity(&start)
        || !store.contains_entity(&goal)
    {
        return Vec::new();
    }

    let mut paths: Vec<Vec<String>> = Vec::new();
    let mut path = vec![start.clone()];
    let mut on_path: HashSet<String> = HashSet::new();
    on_path.insert(start.clone());
    walk(store, &start, &goal, max_len, limit, &mut path, &mut on_path, &mut paths);
    paths
}

#[allow(clippy::too_many_arguments)]
fn walk(
    store: &GraphStore,
    node: &str,
    goal: &str,
    remaining: usize,
    limit: usize,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    paths: &mut Vec<Vec<String>>,
) {
    if paths.len() >= limit || remaining == 0 {
        return;
    }
    for next in undirected_neighbors(store, node) {
        if paths.len() >= limit {
            return;
        }
        if next == goal {
            let mut found = path.clone();
            found.push(next.clone());
            paths.push(found);
            continue;
        }
        if on_path.contains(&next) {
            continue;
        }
        path.push(next.clone());
        on_path.insert(next.clone());
        walk(store, &next, goal, remaining - 1, limit, path, on_path, paths);
        on_path.remove(&next);
        path.pop();
    }
}

/// Neighbor labels in edge-insertion order, deduplicated.
fn undirected_neighbors(store: &GraphStore, node: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for t in store.triples_from(node) {
        if seen.insert(t.object().to_string()) {
            out.push(t.object().to_string());
        }
    }
    for t in store.triples_to(node) {
        if seen.insert(t.subject().to_string()) {
            out.push(t.subject().to_string());
        }
    }
    out
}
