//! Document ingestion.
//!
//! The offline half of the engine: clean raw publication text, chunk it,
//! run extraction, and commit the surviving triples to the graph store.
//! Extraction never mutates the store itself; the commit happens here, after
//! refinement, so a failed document leaves no partial edges behind.
//!
//! Batches run document-parallel under rayon. A malformed document is
//! skipped and reported in the batch outcome, never fatal to its batch.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::extract::Extract;
use crate::graph::index::GraphStore;
use crate::text::{ChunkConfig, chunk_text, clean_text};

/// One raw document handed to ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub document_id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
        }
    }
}

/// What ingesting one document produced.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub chunks: usize,
    pub triples_extracted: usize,
    pub triples_added: usize,
}

/// A document the batch skipped, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub document_id: String,
    pub reason: String,
}

/// Batch outcome: per-document results plus the skip list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub skipped: Vec<SkippedDocument>,
}

impl IngestReport {
    pub fn documents_ingested(&self) -> usize {
        self.outcomes.len()
    }

    pub fn triples_added(&self) -> usize {
        self.outcomes.iter().map(|o| o.triples_added).sum()
    }

    pub fn triples_extracted(&self) -> usize {
        self.outcomes.iter().map(|o| o.triples_extracted).sum()
    }
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} documents ingested, {} triples added ({} extracted), {} skipped",
            self.documents_ingested(),
            self.triples_added(),
            self.triples_extracted(),
            self.skipped.len()
        )
    }
}

/// Ingest one document end to end.
///
/// An empty (post-cleaning) document is an error so batches can report it;
/// a merely short document yields zero triples without complaint.
pub fn ingest_document<E: Extract + ?Sized>(
    store: &GraphStore,
    extractor: &E,
    chunking: &ChunkConfig,
    min_confidence: f32,
    document_id: &str,
    raw_text: &str,
) -> Result<DocumentOutcome, ExtractError> {
    let cleaned = clean_text(raw_text);
    if cleaned.is_empty() {
        return Err(ExtractError::EmptyDocument {
            document_id: document_id.to_string(),
        });
    }

    let chunks = chunk_text(&cleaned, chunking);
    let triples = extractor.extract_document(document_id, &chunks, min_confidence)?;
    let triples_added = store.add_triples(&triples);

    info!(
        document_id,
        chunks = chunks.len(),
        extracted = triples.len(),
        added = triples_added,
        "ingested document"
    );

    Ok(DocumentOutcome {
        document_id: document_id.to_string(),
        chunks: chunks.len(),
        triples_extracted: triples.len(),
        triples_added,
    })
}

/// Ingest a batch of documents, document-parallel. Failures are collected,
/// not propagated.
pub fn ingest_batch<E: Extract + ?Sized>(
    store: &GraphStore,
    extractor: &E,
    chunking: &ChunkConfig,
    min_confidence: f32,
    documents: &[SourceDocument],
) -> IngestReport {
    let results: Vec<(&str, Result<DocumentOutcome, ExtractError>)> = documents
        .par_iter()
        .map(|doc| {
            (
                doc.document_id.as_str(),
                ingest_document(
                    store,
                    extractor,
                    chunking,
                    min_confidence,
                    &doc.document_id,
                    &doc.text,
                ),
            )
        })
        .collect();

    let mut report = IngestReport::default();
    for (document_id, result) in results {
        match result {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(e) => {
                warn!(%e, document_id, "skipping document");
                report.skipped.push(SkippedDocument {
                    document_id: document_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorConfig;
    use crate::extract::rules::RuleExtractor;

    const ABSTRACT: &str = "Microgravity exposure reduces bone density in flight mice. \
        Prolonged spaceflight also increases calcium loss. \
        Radiation damages cellular dna strands during deep space missions.";

    fn extractor() -> RuleExtractor {
        RuleExtractor::new(ExtractorConfig::default())
    }

    #[test]
    fn document_flows_into_the_store() {
        let store = GraphStore::new();

        let outcome = ingest_document(
            &store,
            &extractor(),
            &ChunkConfig::default(),
            0.6,
            "OSD-1",
            ABSTRACT,
        )
        .unwrap();

        assert!(outcome.chunks >= 1);
        assert!(outcome.triples_extracted > 0);
        assert_eq!(outcome.triples_added, outcome.triples_extracted);
        assert!(store.contains_entity("bone density"));
    }

    #[test]
    fn reingesting_the_same_document_adds_nothing() {
        let store = GraphStore::new();
        let chunking = ChunkConfig::default();

        let first =
            ingest_document(&store, &extractor(), &chunking, 0.6, "OSD-1", ABSTRACT).unwrap();
        let second =
            ingest_document(&store, &extractor(), &chunking, 0.6, "OSD-1", ABSTRACT).unwrap();

        assert!(first.triples_added > 0);
        assert_eq!(second.triples_added, 0);
        assert_eq!(store.edge_count(), first.triples_added);
    }

    #[test]
    fn empty_document_is_an_error() {
        let store = GraphStore::new();

        let err = ingest_document(
            &store,
            &extractor(),
            &ChunkConfig::default(),
            0.6,
            "OSD-2",
            "  \n\t ",
        )
        .unwrap_err();

        assert!(matches!(err, ExtractError::EmptyDocument { .. }));
    }

    #[test]
    fn short_document_yields_zero_triples_not_an_error() {
        let store = GraphStore::new();

        let outcome = ingest_document(
            &store,
            &extractor(),
            &ChunkConfig::default(),
            0.6,
            "OSD-3",
            "Too short.",
        )
        .unwrap();

        assert_eq!(outcome.triples_extracted, 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn batch_skips_bad_documents_and_keeps_going() {
        let store = GraphStore::new();
        let documents = vec![
            SourceDocument::new("OSD-1", ABSTRACT),
            SourceDocument::new("OSD-broken", "   "),
            SourceDocument::new(
                "OSD-2",
                "Spaceflight conditions alter gene expression in arabidopsis seedlings grown aboard the station.",
            ),
        ];

        let report = ingest_batch(
            &store,
            &extractor(),
            &ChunkConfig::default(),
            0.6,
            &documents,
        );

        assert_eq!(report.documents_ingested(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].document_id, "OSD-broken");
        assert!(report.triples_added() > 0);
        assert!(report.skipped[0].reason.contains("OSD-broken"));
    }

    #[test]
    fn report_display_summarizes_counts() {
        let report = IngestReport {
            outcomes: vec![DocumentOutcome {
                document_id: "OSD-1".to_string(),
                chunks: 2,
                triples_extracted: 5,
                triples_added: 4,
            }],
            skipped: vec![SkippedDocument {
                document_id: "OSD-9".to_string(),
                reason: "empty".to_string(),
            }],
        };

        assert_eq!(
            report.to_string(),
            "1 documents ingested, 4 triples added (5 extracted), 1 skipped"
        );
    }
}
