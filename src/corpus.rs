//! Bundled sample corpus.
//!
//! A TOML-defined bundle of space-biology abstracts compiled into the
//! binary. It backs the `demo` command and smoke tests: enough material to
//! populate a meaningful graph without fetching anything.

use serde::Deserialize;
use tracing::warn;

use crate::ingest::SourceDocument;

/// One bundled publication abstract.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
    pub document_id: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct CorpusToml {
    documents: Vec<CorpusDocument>,
}

const CORPUS_TOML: &str = include_str!("../data/corpus.toml");

/// Parse the bundled corpus. A malformed bundle is a packaging bug: it is
/// reported and treated as empty rather than taking the binary down.
pub fn bundled_corpus() -> Vec<CorpusDocument> {
    match toml::from_str::<CorpusToml>(CORPUS_TOML) {
        Ok(parsed) => parsed.documents,
        Err(e) => {
            warn!("failed to parse bundled corpus: {e}");
            Vec::new()
        }
    }
}

/// The bundled corpus as ingestable documents.
pub fn bundled_documents() -> Vec<SourceDocument> {
    bundled_corpus()
        .into_iter()
        .map(|d| SourceDocument::new(d.document_id, d.text))
        .collect()
}
