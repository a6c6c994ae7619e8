//! Knowledge graph of extracted relationships.
//!
//! The graph stores [`Triple`]s — (subject, predicate, object) relationships
//! with confidence and provenance — as edges of a directed multigraph keyed by
//! normalized entity labels.
//!
//! - [`index::GraphStore`]: petgraph-backed store with idempotent inserts
//! - [`traverse`]: hop-bounded neighborhood queries and path finding
//! - [`analytics`]: node/edge statistics
//! - [`snapshot`]: JSON persistence

pub mod analytics;
pub mod index;
pub mod snapshot;
pub mod traverse;

use serde::Serialize;

use crate::entity::{normalize_label, normalize_predicate};
use crate::error::TripleError;

/// Where a triple came from: document, chunk, and byte range of the
/// supporting sentence within that chunk's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    pub document_id: String,
    pub chunk_index: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

impl SourceSpan {
    pub fn new(
        document_id: impl Into<String>,
        chunk_index: usize,
        byte_start: usize,
        byte_end: usize,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_index,
            byte_start,
            byte_end,
        }
    }
}

/// A (subject, predicate, object) relationship with confidence and provenance.
///
/// Immutable once constructed; [`Triple::new`] normalizes the three labels and
/// rejects anything violating the data-model invariants, so a `Triple` in hand
/// is always valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triple {
    subject: String,
    predicate: String,
    object: String,
    confidence: f32,
    source: SourceSpan,
    extracted_at: u64,
}

/// Idempotency key for graph inserts: exact (subject, predicate, object,
/// source document). The same fact re-extracted from the same document is one
/// edge; the same fact from a second document is a second edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub document_id: String,
}

impl Triple {
    /// Construct a validated triple. Labels are normalized here; empty or
    /// self-referential endpoints and out-of-range confidence are rejected.
    pub fn new(
        subject: &str,
        predicate: &str,
        object: &str,
        confidence: f32,
        source: SourceSpan,
    ) -> Result<Self, TripleError> {
        let subject = normalize_label(subject);
        let predicate = normalize_predicate(predicate);
        let object = normalize_label(object);

        if subject.is_empty() {
            return Err(TripleError::EmptyField { field: "subject" });
        }
        if predicate.is_empty() {
            return Err(TripleError::EmptyField { field: "predicate" });
        }
        if object.is_empty() {
            return Err(TripleError::EmptyField { field: "object" });
        }
        if subject == object {
            return Err(TripleError::SelfReferential { label: subject });
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TripleError::ConfidenceOutOfRange { value: confidence });
        }

        Ok(Self {
            subject,
            predicate,
            object,
            confidence,
            source,
            extracted_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
    }

    /// Override the extraction timestamp (snapshot reload keeps the original).
    pub fn with_extracted_at(mut self, extracted_at: u64) -> Self {
        self.extracted_at = extracted_at;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn source(&self) -> &SourceSpan {
        &self.source
    }

    pub fn extracted_at(&self) -> u64 {
        self.extracted_at
    }

    /// Idempotency key for graph inserts.
    pub fn key(&self) -> TripleKey {
        TripleKey {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
            document_id: self.source.document_id.clone(),
        }
    }

    /// Relationship identity without provenance, for cross-source dedup.
    pub fn spo(&self) -> (&str, &str, &str) {
        (&self.subject, &self.predicate, &self.object)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} --{}--> {} ({:.2})",
            self.subject, self.predicate, self.object, self.confidence
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::triple;
    use super::*;

    #[test]
    fn construction_normalizes_labels() {
        let t = triple("  Microgravity ", "Affects", "Bone   Density.", 0.92);
        assert_eq!(t.subject(), "microgravity");
        assert_eq!(t.predicate(), "affects");
        assert_eq!(t.object(), "bone density");
    }

    #[test]
    fn construction_rejects_empty_fields() {
        let src = SourceSpan::new("d", 0, 0, 0);
        assert!(matches!(
            Triple::new("", "affects", "bone density", 0.9, src.clone()),
            Err(TripleError::EmptyField { field: "subject" })
        ));
        assert!(matches!(
            Triple::new("microgravity", "  ", "bone density", 0.9, src.clone()),
            Err(TripleError::EmptyField { field: "predicate" })
        ));
        assert!(matches!(
            Triple::new("microgravity", "affects", "...", 0.9, src),
            Err(TripleError::EmptyField { field: "object" })
        ));
    }

    #[test]
    fn construction_rejects_self_reference() {
        let src = SourceSpan::new("d", 0, 0, 0);
        // Different surface forms, same normalized label.
        let err = Triple::new("Bone Density", "affects", "bone  density", 0.9, src);
        assert!(matches!(err, Err(TripleError::SelfReferential { .. })));
    }

    #[test]
    fn construction_rejects_out_of_range_confidence() {
        let src = SourceSpan::new("d", 0, 0, 0);
        for bad in [-0.1, 1.1, f32::NAN] {
            assert!(matches!(
                Triple::new("a", "affects", "b", bad, src.clone()),
                Err(TripleError::ConfidenceOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn key_distinguishes_sources_not_spans() {
        let a = Triple::new(
            "microgravity",
            "affects",
            "bone density",
            0.9,
            SourceSpan::new("doc-1", 0, 10, 50),
        )
        .unwrap();
        let b = Triple::new(
            "microgravity",
            "affects",
            "bone density",
            0.7,
            SourceSpan::new("doc-1", 3, 200, 260),
        )
        .unwrap();
        let c = Triple::new(
            "microgravity",
            "affects",
            "bone density",
            0.9,
            SourceSpan::new("doc-2", 0, 10, 50),
        )
        .unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn display_is_readable() {
        let t = triple("microgravity", "reduces", "bone density", 0.92);
        assert_eq!(format!("{t}"), "microgravity --reduces--> bone density (0.92)");
    }
}
