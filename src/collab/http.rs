//! HTTP implementations of the collaborator traits.
//!
//! [`HttpVectorSearch`] talks to a passage-search service exposing
//! `POST /search`; [`HttpGenerate`] talks to an OpenAI-compatible
//! `POST /v1/chat/completions` endpoint. Both are built per-call with the
//! caller's timeout so a slow collaborator can never wedge a query.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CollabError, GenerateAnswer, PassageMatch, VectorSearch};

/// Sampling temperature for generation; low for consistent synthesis.
const GEN_TEMPERATURE: f64 = 0.1;
const GEN_MAX_TOKENS: u32 = 1000;

/// Configuration for the vector search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorServiceConfig {
    /// Base URL of the passage-search service.
    #[serde(default = "default_vector_url")]
    pub base_url: String,
}

fn default_vector_url() -> String {
    "http://localhost:8600".into()
}

impl Default for VectorServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_vector_url(),
        }
    }
}

/// Configuration for the generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_generation_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Bearer token, if the service requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_generation_url() -> String {
    "http://localhost:8601".into()
}

fn default_generation_model() -> String {
    "llama-3.3-70b-versatile".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            model: default_generation_model(),
            api_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Vector search client
// ---------------------------------------------------------------------------

/// Passage-search client over a JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpVectorSearch {
    config: VectorServiceConfig,
}

impl HttpVectorSearch {
    pub fn new(config: VectorServiceConfig) -> Self {
        Self { config }
    }

    /// Lightweight availability check against the health endpoint.
    pub fn probe(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200)
    }
}

impl VectorSearch for HttpVectorSearch {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Vec<PassageMatch>, CollabError> {
        let url = format!("{}/search", self.config.base_url);
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        let body = serde_json::json!({
            "query": query,
            "top_k": top_k,
            "include_metadata": true,
        });

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| map_call_error("vector", e, timeout))?;

        let text = resp.into_string().map_err(|e| CollabError::ParseError {
            service: "vector",
            message: e.to_string(),
        })?;

        parse_matches(&text)
    }
}

/// Parse a `{"matches": [{"score": .., "metadata": {..}}]}` reply.
fn parse_matches(body: &str) -> Result<Vec<PassageMatch>, CollabError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| CollabError::ParseError {
            service: "vector",
            message: e.to_string(),
        })?;

    let matches = json["matches"]
        .as_array()
        .ok_or_else(|| CollabError::ParseError {
            service: "vector",
            message: "missing 'matches' array".into(),
        })?;

    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        let metadata = &m["metadata"];
        let Some(text) = metadata["text"].as_str() else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        out.push(PassageMatch {
            passage_text: text.to_string(),
            similarity: m["score"].as_f64().unwrap_or(0.0) as f32,
            document_id: metadata["paper_id"].as_str().map(str::to_string),
            title: metadata["title"].as_str().map(str::to_string),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Generation client
// ---------------------------------------------------------------------------

/// Chat-completions client for answer synthesis and assisted extraction.
#[derive(Debug, Clone)]
pub struct HttpGenerate {
    config: GenerationConfig,
}

impl HttpGenerate {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// Lightweight availability check against the models endpoint.
    pub fn probe(&self) -> bool {
        let url = format!("{}/v1/models", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        let mut req = agent.get(&url);
        if let Some(key) = &self.config.api_key {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }
        matches!(req.call(), Ok(resp) if resp.status() == 200)
    }
}

impl GenerateAnswer for HttpGenerate {
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, CollabError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": GEN_TEMPERATURE,
            "max_tokens": GEN_MAX_TOKENS,
        });

        let mut req = agent.post(&url).set("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }

        let resp = req
            .send_string(&body.to_string())
            .map_err(|e| map_call_error("generation", e, timeout))?;

        let text = resp.into_string().map_err(|e| CollabError::ParseError {
            service: "generation",
            message: e.to_string(),
        })?;

        parse_completion(&text)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn parse_completion(body: &str) -> Result<String, CollabError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| CollabError::ParseError {
            service: "generation",
            message: e.to_string(),
        })?;

    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CollabError::ParseError {
            service: "generation",
            message: "missing 'choices[0].message.content'".into(),
        })
}

fn map_call_error(service: &'static str, err: ureq::Error, timeout: Duration) -> CollabError {
    match err {
        ureq::Error::Status(status, _) => CollabError::RequestFailed {
            service,
            message: format!("status {status}"),
        },
        ureq::Error::Transport(t) => {
            let message = t.to_string();
            if message.contains("timed out") || message.contains("timeout") {
                CollabError::Timeout {
                    service,
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                CollabError::Unavailable { service, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_unreachable_returns_false() {
        let client = HttpVectorSearch::new(VectorServiceConfig {
            base_url: "http://127.0.0.1:1".into(), // unreachable port
        });
        assert!(!client.probe());
    }

    #[test]
    fn search_unreachable_returns_error() {
        let client = HttpVectorSearch::new(VectorServiceConfig {
            base_url: "http://127.0.0.1:1".into(),
        });
        let result = client.search("microgravity", 3, Duration::from_millis(200));
        assert!(result.is_err());
    }

    #[test]
    fn generate_unreachable_returns_error() {
        let client = HttpGenerate::new(GenerationConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });
        let result = client.generate("hello", Duration::from_millis(200));
        assert!(result.is_err());
    }

    #[test]
    fn parse_matches_reads_score_and_metadata() {
        let body = r#"{
            "matches": [
                {"score": 0.87, "metadata": {"text": "Microgravity reduces bone density.",
                 "title": "Bone loss in orbit", "paper_id": "PMC-1"}},
                {"score": 0.42, "metadata": {"text": "  "}},
                {"score": 0.39, "metadata": {"title": "no text field"}}
            ]
        }"#;
        let matches = parse_matches(body).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].title.as_deref(), Some("Bone loss in orbit"));
        assert_eq!(matches[0].document_id.as_deref(), Some("PMC-1"));
        assert!((matches[0].similarity - 0.87).abs() < 1e-6);
    }

    #[test]
    fn parse_matches_without_array_is_an_error() {
        let err = parse_matches(r#"{"error": "bad index"}"#).unwrap_err();
        assert!(matches!(err, CollabError::ParseError { .. }));
    }

    #[test]
    fn parse_completion_reads_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "Bone density drops."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Bone density drops.");
    }

    #[test]
    fn parse_completion_without_choices_is_an_error() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, CollabError::ParseError { .. }));
    }

    #[test]
    fn default_config_values() {
        let config = GenerationConfig::default();
        assert_eq!(config.base_url, "http://localhost:8601");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert!(config.api_key.is_none());
    }
}
