//! Generation-assisted triple extraction.
//!
//! Prompts the generation collaborator for structured JSON triples over a
//! chunk. Any failure, from an unreachable service to an unparseable reply,
//! falls back to the rule extractor so ingestion always makes progress.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::collab::GenerateAnswer;
use crate::error::ExtractError;
use crate::graph::{SourceSpan, Triple};
use crate::text::TextChunk;

use super::rules::RuleExtractor;
use super::{Extract, ExtractorConfig, cap_chunk};

const EXTRACTION_INSTRUCTIONS: &str = "\
You are an expert in space biology and knowledge extraction. Extract factual \
(subject, predicate, object) triples from the text below.

Rules:
1. Extract only relationships explicitly stated in the text.
2. Use informative predicates such as \"affects\", \"causes\", \"reduces\", \"increases\".
3. Focus on organisms, biological processes, environmental conditions, and molecules.
4. Extract 3-8 triples.
5. Return ONLY a JSON object shaped like:
{\"triples\": [{\"subject\": \"Microgravity\", \"predicate\": \"reduces\", \"object\": \"Bone Density\", \"confidence\": 0.9}]}";

fn extraction_prompt(text: &str) -> String {
    format!("{EXTRACTION_INSTRUCTIONS}\n\nTEXT:\n{text}\n\nReturn only the JSON object.")
}

#[derive(Debug, Deserialize)]
struct ReplyTriples {
    triples: Vec<ReplyTriple>,
}

#[derive(Debug, Deserialize)]
struct ReplyTriple {
    subject: String,
    predicate: String,
    object: String,
    #[serde(default = "default_reply_confidence")]
    confidence: f32,
}

fn default_reply_confidence() -> f32 {
    0.7
}

/// Pull the JSON object out of a reply that may be wrapped in prose or
/// markdown code fences.
fn parse_reply(document_id: &str, reply: &str) -> Result<ReplyTriples, ExtractError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if e > s => &reply[s..=e],
        _ => {
            return Err(ExtractError::MalformedReply {
                document_id: document_id.to_string(),
                message: "no JSON object found in reply".into(),
            });
        }
    };
    serde_json::from_str(body).map_err(|e| ExtractError::MalformedReply {
        document_id: document_id.to_string(),
        message: e.to_string(),
    })
}

/// Extractor that asks the generation collaborator first and falls back to
/// rules when the reply is missing or malformed.
pub struct AssistedExtractor<G> {
    generator: G,
    fallback: RuleExtractor,
    config: ExtractorConfig,
    timeout: Duration,
}

impl<G: GenerateAnswer> AssistedExtractor<G> {
    pub fn new(generator: G, config: ExtractorConfig, timeout: Duration) -> Self {
        Self {
            generator,
            fallback: RuleExtractor::new(config.clone()),
            config,
            timeout,
        }
    }
}

impl<G: GenerateAnswer> Extract for AssistedExtractor<G> {
    fn extract_chunk(
        &self,
        document_id: &str,
        chunk: &TextChunk,
    ) -> Result<Vec<Triple>, ExtractError> {
        let prompt = extraction_prompt(&chunk.text);
        let reply = match self.generator.generate(&prompt, self.timeout) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%e, document_id, "generation failed, extracting with rules");
                return self.fallback.extract_chunk(document_id, chunk);
            }
        };

        let parsed = match parse_reply(document_id, &reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%e, "unusable extraction reply, extracting with rules");
                return self.fallback.extract_chunk(document_id, chunk);
            }
        };

        // Assisted replies cover the whole chunk; the span is chunk-wide.
        let span = SourceSpan::new(document_id, chunk.index, 0, chunk.text.len());
        let mut out = Vec::new();
        for rt in parsed.triples {
            let confidence = rt.confidence.clamp(0.0, 1.0);
            match Triple::new(&rt.subject, &rt.predicate, &rt.object, confidence, span.clone()) {
                Ok(t) => out.push(t),
                Err(e) => debug!(%e, document_id, "dropping invalid assisted triple"),
            }
        }
        Ok(cap_chunk(out, self.config.max_per_chunk))
    }
}

impl<G> std::fmt::Debug for AssistedExtractor<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistedExtractor")
            .field("timeout", &self.timeout)
            .field("max_per_chunk", &self.config.max_per_chunk)
            .finish()
    }
}
