//! Rich diagnostic error types for the waterbear engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::collab::CollabError;

/// Top-level error type for the waterbear engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum WbError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Triple(#[from] TripleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Collab(#[from] CollabError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Triple errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TripleError {
    #[error("empty {field} after normalization")]
    #[diagnostic(
        code(wb::triple::empty_field),
        help(
            "Subject, predicate, and object must all be non-empty once \
             whitespace is collapsed. The offending text was probably \
             punctuation or whitespace only."
        )
    )]
    EmptyField { field: &'static str },

    #[error("self-referential triple: subject and object both normalize to \"{label}\"")]
    #[diagnostic(
        code(wb::triple::self_referential),
        help(
            "A relationship needs two distinct entities. Check the extraction \
             pattern that produced identical endpoints."
        )
    )]
    SelfReferential { label: String },

    #[error("confidence {value} outside [0, 1]")]
    #[diagnostic(
        code(wb::triple::confidence_range),
        help("Confidence scores are probabilities. Clamp or rescale before constructing the triple.")
    )]
    ConfidenceOutOfRange { value: f32 },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read snapshot: {path}")]
    #[diagnostic(
        code(wb::graph::snapshot_read),
        help("Ensure the snapshot file exists and is readable.")
    )]
    SnapshotRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot: {path}: {message}")]
    #[diagnostic(
        code(wb::graph::snapshot_parse),
        help(
            "The snapshot is not valid JSON for this version of the store. \
             Re-export it from the engine that produced it, or re-ingest \
             the source documents."
        )
    )]
    SnapshotParse { path: String, message: String },

    #[error("failed to write snapshot: {path}")]
    #[diagnostic(
        code(wb::graph::snapshot_write),
        help("Check write permissions and free disk space for the target directory.")
    )]
    SnapshotWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("document {document_id} is empty after cleaning")]
    #[diagnostic(
        code(wb::extract::empty_document),
        help(
            "The document contained no extractable text. Binary or \
             markup-only files should be filtered out before ingestion."
        )
    )]
    EmptyDocument { document_id: String },

    #[error("failed to read document {document_id}: {source}")]
    #[diagnostic(
        code(wb::extract::unreadable),
        help("Ensure the file exists, is readable, and is valid UTF-8 text.")
    )]
    Unreadable {
        document_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("assisted extraction returned malformed triples for {document_id}: {message}")]
    #[diagnostic(
        code(wb::extract::malformed_reply),
        help(
            "The generation collaborator did not return a parseable JSON \
             triple array. The rule extractor is used as fallback, so this \
             is informational unless it recurs constantly."
        )
    )]
    MalformedReply { document_id: String, message: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(wb::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(wb::engine::config_read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {path}: {message}")]
    #[diagnostic(
        code(wb::engine::config_parse),
        help("Check the TOML syntax in the config file.")
    )]
    ConfigParse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(wb::engine::config_write),
        help("Ensure you have write permissions to the config directory.")
    )]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning waterbear results.
pub type WbResult<T> = std::result::Result<T, WbError>;
