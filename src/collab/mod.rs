//! External collaborators: vector passage search and answer generation.
//!
//! The engine core never talks HTTP directly. It goes through the
//! [`VectorSearch`] and [`GenerateAnswer`] traits so retrieval and tests can
//! swap in stubs, and so every external call carries an explicit timeout.
//! Both collaborators are optional: a failed or absent collaborator degrades
//! the answer, it never fails the query.

pub mod http;

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A scored passage from the vector collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageMatch {
    pub passage_text: String,
    /// Cosine similarity in [0, 1] as reported by the vector index.
    pub similarity: f32,
    pub document_id: Option<String>,
    pub title: Option<String>,
}

/// Semantic passage search over the document corpus.
pub trait VectorSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Vec<PassageMatch>, CollabError>;
}

/// Free-text generation for assisted extraction and answer synthesis.
pub trait GenerateAnswer: Send + Sync {
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, CollabError>;
}

/// One generation client can be shared between the chat path and the
/// assisted extractor.
impl<G: GenerateAnswer + ?Sized> GenerateAnswer for std::sync::Arc<G> {
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, CollabError> {
        (**self).generate(prompt, timeout)
    }
}

/// Errors from collaborator calls.
#[derive(Debug, Error, Diagnostic)]
pub enum CollabError {
    #[error("{service} collaborator is unreachable: {message}")]
    #[diagnostic(
        code(wb::collab::unavailable),
        help("Check the collaborator URL in the engine config and that the service is running.")
    )]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} collaborator request failed: {message}")]
    #[diagnostic(
        code(wb::collab::request_failed),
        help("The service is up but rejected the request. Check its logs and the configured model or index.")
    )]
    RequestFailed {
        service: &'static str,
        message: String,
    },

    #[error("failed to parse {service} collaborator reply: {message}")]
    #[diagnostic(
        code(wb::collab::parse_error),
        help("The service returned an unexpected response format.")
    )]
    ParseError {
        service: &'static str,
        message: String,
    },

    #[error("{service} collaborator timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(wb::collab::timeout),
        help("Increase the timeout in the engine config or check the service load.")
    )]
    Timeout {
        service: &'static str,
        timeout_ms: u64,
    },
}
