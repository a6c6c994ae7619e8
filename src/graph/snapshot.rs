//! JSON snapshot persistence for the graph store.
//!
//! A snapshot is a flat list of triple records with full provenance. Loading
//! runs every record back through validated construction, so a snapshot from
//! an older or hand-edited file can never smuggle an invalid triple into the
//! store; offending records are skipped with a warning.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GraphError;

use super::index::GraphStore;
use super::{SourceSpan, Triple};

/// Wire form of one triple in a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleRecord {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    pub document_id: String,
    pub chunk_index: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    pub extracted_at: u64,
}

impl From<&Triple> for TripleRecord {
    fn from(t: &Triple) -> Self {
        let src = t.source();
        Self {
            subject: t.subject().to_string(),
            predicate: t.predicate().to_string(),
            object: t.object().to_string(),
            confidence: t.confidence(),
            document_id: src.document_id.clone(),
            chunk_index: src.chunk_index,
            byte_start: src.byte_start,
            byte_end: src.byte_end,
            extracted_at: t.extracted_at(),
        }
    }
}

impl TripleRecord {
    fn into_triple(self) -> Result<Triple, crate::error::TripleError> {
        let span = SourceSpan::new(
            self.document_id,
            self.chunk_index,
            self.byte_start,
            self.byte_end,
        );
        Triple::new(
            &self.subject,
            &self.predicate,
            &self.object,
            self.confidence,
            span,
        )
        .map(|t| t.with_extracted_at(self.extracted_at))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    triples: Vec<TripleRecord>,
}

/// Write every triple in the store to `path` as pretty-printed JSON.
pub fn save_snapshot(store: &GraphStore, path: &Path) -> Result<(), GraphError> {
    let snapshot = Snapshot {
        triples: store.all_triples().iter().map(TripleRecord::from).collect(),
    };
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| GraphError::SnapshotParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| GraphError::SnapshotWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    std::fs::write(path, json).map_err(|e| GraphError::SnapshotWrite {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load a snapshot into the store. Returns the number of triples committed;
/// records failing validation are skipped, and records already present
/// (same idempotency key) are not duplicated.
pub fn load_snapshot(store: &GraphStore, path: &Path) -> Result<usize, GraphError> {
    let data = std::fs::read_to_string(path).map_err(|e| GraphError::SnapshotRead {
        path: path.display().to_string(),
        source: e,
    })?;
    let snapshot: Snapshot =
        serde_json::from_str(&data).map_err(|e| GraphError::SnapshotParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let mut triples = Vec::with_capacity(snapshot.triples.len());
    for record in snapshot.triples {
        match record.into_triple() {
            Ok(t) => triples.push(t),
            Err(e) => warn!(%e, "skipping invalid snapshot record"),
        }
    }
    Ok(store.add_triples(&triples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{triple, triple_from};

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kg.json");

        let store = GraphStore::new();
        store.add_triple(&triple_from("microgravity", "reduces", "bone density", 0.92, "doc-1"));
        store.add_triple(&triple_from("microgravity", "reduces", "bone density", 0.88, "doc-2"));
        store.add_triple(&triple_from("radiation", "damages", "dna", 0.9, "doc-3"));
        save_snapshot(&store, &path).unwrap();

        let restored = GraphStore::new();
        let loaded = load_snapshot(&restored, &path).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(restored.node_count(), store.node_count());
        assert_eq!(restored.edge_count(), store.edge_count());

        let hits = restored.query_by_entity("microgravity", 1);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].confidence() - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn load_into_populated_store_stays_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kg.json");

        let store = GraphStore::new();
        store.add_triple(&triple("microgravity", "reduces", "bone density", 0.9));
        save_snapshot(&store, &path).unwrap();

        // Loading the snapshot back into the same store adds nothing.
        assert_eq!(load_snapshot(&store, &path).unwrap(), 0);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn invalid_records_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kg.json");
        let json = r#"{
            "triples": [
                {"subject": "microgravity", "predicate": "reduces", "object": "bone density",
                 "confidence": 0.9, "document_id": "d", "chunk_index": 0,
                 "byte_start": 0, "byte_end": 10, "extracted_at": 0},
                {"subject": "", "predicate": "reduces", "object": "bone density",
                 "confidence": 0.9, "document_id": "d", "chunk_index": 0,
                 "byte_start": 0, "byte_end": 10, "extracted_at": 0},
                {"subject": "x", "predicate": "affects", "object": "y",
                 "confidence": 7.0, "document_id": "d", "chunk_index": 0,
                 "byte_start": 0, "byte_end": 10, "extracted_at": 0}
            ]
        }"#;
        std::fs::write(&path, json).unwrap();

        let store = GraphStore::new();
        assert_eq!(load_snapshot(&store, &path).unwrap(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let store = GraphStore::new();
        let err = load_snapshot(&store, Path::new("/nonexistent/kg.json")).unwrap_err();
        assert!(matches!(err, GraphError::SnapshotRead { .. }));
    }

    #[test]
    fn extraction_timestamps_survive_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kg.json");

        let store = GraphStore::new();
        let t = triple("microgravity", "reduces", "bone density", 0.9).with_extracted_at(1_700_000_000);
        store.add_triple(&t);
        save_snapshot(&store, &path).unwrap();

        let restored = GraphStore::new();
        load_snapshot(&restored, &path).unwrap();
        assert_eq!(restored.all_triples()[0].extracted_at(), 1_700_000_000);
    }
}
