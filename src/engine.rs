//! Engine facade: top-level API for the waterbear system.
//!
//! One owned instance wires the whole pipeline together:
//!
//! - ingestion runs documents through the extractor into the graph store
//! - queries flow through intent resolution and hybrid retrieval
//! - answers come from the generation collaborator when one is reachable,
//!   from deterministic summaries when not
//! - per-session conversation memory is committed only after an answer exists
//!
//! Collaborators are probed once at construction. Services are either up for
//! the process lifetime or absent, and an absent collaborator degrades the
//! engine rather than failing it.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answer::{
    fallback_answer, findings_summary, graph_prompt, source_lines, synthesis_prompt,
};
use crate::collab::http::{GenerationConfig, HttpGenerate, HttpVectorSearch, VectorServiceConfig};
use crate::collab::{GenerateAnswer, VectorSearch};
use crate::error::{EngineError, WbError, WbResult};
use crate::extract::assisted::AssistedExtractor;
use crate::extract::rules::RuleExtractor;
use crate::extract::{Extract, ExtractorConfig};
use crate::graph::Triple;
use crate::graph::analytics::GraphStats;
use crate::graph::index::GraphStore;
use crate::graph::snapshot;
use crate::ingest::{self, DocumentOutcome, IngestReport, SourceDocument};
use crate::intent::{LexicalResolver, QueryIntent, ResolveIntent};
use crate::memory::{CONTEXT_TURNS, DEFAULT_MAX_TURNS, MemoryStatus, SessionRegistry};
use crate::retrieve::{HybridRetriever, RetrieverConfig};
use crate::text::ChunkConfig;

/// Triples echoed back in a [`KgQueryResponse`].
const TOP_TRIPLES: usize = 5;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine-wide configuration.
///
/// Serializes to and from TOML. Every field has a default, so an empty file
/// yields a working engine pointed at localhost collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub chunking: ChunkConfig,
    #[serde(default)]
    pub extraction: ExtractorConfig,
    #[serde(default)]
    pub retrieval: RetrieverConfig,
    #[serde(default)]
    pub vector_service: VectorServiceConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Ask the generation collaborator for triples during ingestion, with
    /// the rule extractor as fallback. Off by default: rules are
    /// deterministic and need no network.
    #[serde(default)]
    pub assisted_extraction: bool,
    #[serde(default = "default_memory_enabled")]
    pub memory_enabled: bool,
    /// Turns kept per session before the oldest are evicted.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
}

fn default_memory_enabled() -> bool {
    true
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            extraction: ExtractorConfig::default(),
            retrieval: RetrieverConfig::default(),
            vector_service: VectorServiceConfig::default(),
            generation: GenerationConfig::default(),
            assisted_extraction: false,
            memory_enabled: default_memory_enabled(),
            max_turns: default_max_turns(),
            generation_timeout_ms: default_generation_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Check cross-field consistency before the engine is built.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "retrieval.alpha must be in [0, 1], got {}",
                    self.retrieval.alpha
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.extraction.min_confidence) {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "extraction.min_confidence must be in [0, 1], got {}",
                    self.extraction.min_confidence
                ),
            });
        }
        if self.extraction.max_per_chunk == 0 {
            return Err(EngineError::InvalidConfig {
                message: "extraction.max_per_chunk must be at least 1".to_string(),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(EngineError::InvalidConfig {
                message: "retrieval.top_k must be at least 1".to_string(),
            });
        }
        if self.retrieval.max_hops == 0 {
            return Err(EngineError::InvalidConfig {
                message: "retrieval.max_hops must be at least 1".to_string(),
            });
        }
        if self.retrieval.vector_timeout_ms == 0 || self.generation_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig {
                message: "collaborator timeouts must be nonzero".to_string(),
            });
        }
        if self.chunking.min_words > self.chunking.target_words
            || self.chunking.target_words > self.chunking.max_words
        {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "chunking word bounds must satisfy min <= target <= max, got {} <= {} <= {}",
                    self.chunking.min_words, self.chunking.target_words, self.chunking.max_words
                ),
            });
        }
        if self.chunking.overlap_words >= self.chunking.target_words {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "chunking.overlap_words must be below target_words, got {} >= {}",
                    self.chunking.overlap_words, self.chunking.target_words
                ),
            });
        }
        if self.memory_enabled && self.max_turns == 0 {
            return Err(EngineError::InvalidConfig {
                message: "max_turns must be at least 1 when memory is enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let rendered = toml::to_string_pretty(self).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| EngineError::ConfigWrite {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        fs::write(path, rendered).map_err(|source| EngineError::ConfigWrite {
            path: path.display().to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of the graph-focused query surface.
#[derive(Debug, Clone, Serialize)]
pub struct KgQueryResponse {
    pub query: String,
    pub answer: String,
    pub intent: QueryIntent,
    /// Total graph matches before the echo cap.
    pub relevant_triples_count: usize,
    pub top_triples: Vec<Triple>,
}

/// Result of one conversational exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub query: String,
    pub answer: String,
    pub intent: QueryIntent,
    pub graph_evidence: usize,
    pub vector_evidence: usize,
}

/// Summary information about the engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub triples: usize,
    pub entities: usize,
    pub active_sessions: usize,
    pub vector_search_available: bool,
    pub generation_available: bool,
    pub assisted_extraction: bool,
    pub memory_enabled: bool,
    pub generation_model: String,
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let avail = |on: bool| if on { "available" } else { "unavailable" };
        let toggled = |on: bool| if on { "on" } else { "off" };
        writeln!(f, "waterbear engine info")?;
        writeln!(f, "  triples:      {}", self.triples)?;
        writeln!(f, "  entities:     {}", self.entities)?;
        writeln!(f, "  sessions:     {}", self.active_sessions)?;
        writeln!(f, "  vector:       {}", avail(self.vector_search_available))?;
        writeln!(
            f,
            "  generation:   {} ({})",
            avail(self.generation_available),
            self.generation_model
        )?;
        writeln!(f, "  assisted:     {}", toggled(self.assisted_extraction))?;
        writeln!(f, "  memory:       {}", toggled(self.memory_enabled))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The assembled retrieval engine.
///
/// All methods take `&self`; mutable state lives in the concurrent graph
/// store and the session registry.
pub struct Engine {
    config: EngineConfig,
    store: Arc<GraphStore>,
    extractor: Box<dyn Extract>,
    resolver: LexicalResolver,
    retriever: HybridRetriever,
    generator: Option<Arc<dyn GenerateAnswer>>,
    sessions: SessionRegistry,
}

impl Engine {
    /// Build an engine from config, probing the HTTP collaborators once.
    /// An unreachable collaborator is dropped with a warning and the engine
    /// runs graph-only with deterministic answers.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let vector_client = HttpVectorSearch::new(config.vector_service.clone());
        let vector: Option<Box<dyn VectorSearch>> = if vector_client.probe() {
            info!(url = %config.vector_service.base_url, "vector search service reachable");
            Some(Box::new(vector_client))
        } else {
            warn!(
                url = %config.vector_service.base_url,
                "vector search service unreachable, retrieval will be graph-only"
            );
            None
        };

        let generation_client = HttpGenerate::new(config.generation.clone());
        let generator: Option<Arc<dyn GenerateAnswer>> = if generation_client.probe() {
            info!(
                url = %config.generation.base_url,
                model = %config.generation.model,
                "generation service reachable"
            );
            Some(Arc::new(generation_client))
        } else {
            warn!(
                url = %config.generation.base_url,
                "generation service unreachable, answers will be deterministic summaries"
            );
            None
        };

        Ok(Self::assemble(config, vector, generator))
    }

    /// Build an engine with caller-supplied collaborators and no probing.
    /// This is how tests and embedding applications wire in stubs.
    pub fn with_collaborators(
        config: EngineConfig,
        vector: Option<Box<dyn VectorSearch>>,
        generator: Option<Arc<dyn GenerateAnswer>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::assemble(config, vector, generator))
    }

    fn assemble(
        config: EngineConfig,
        vector: Option<Box<dyn VectorSearch>>,
        generator: Option<Arc<dyn GenerateAnswer>>,
    ) -> Self {
        let store = Arc::new(GraphStore::new());

        let extractor: Box<dyn Extract> = match (&generator, config.assisted_extraction) {
            (Some(g), true) => Box::new(AssistedExtractor::new(
                Arc::clone(g),
                config.extraction.clone(),
                Duration::from_millis(config.generation_timeout_ms),
            )),
            _ => Box::new(RuleExtractor::new(config.extraction.clone())),
        };

        let resolver = LexicalResolver::new(Arc::clone(&store));
        let retriever = HybridRetriever::new(Arc::clone(&store), vector, config.retrieval.clone());
        let sessions = SessionRegistry::new(config.max_turns);

        Self {
            config,
            store,
            extractor,
            resolver,
            retriever,
            generator,
            sessions,
        }
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Extract triples from one document and add them to the graph.
    pub fn ingest_text(&self, document_id: &str, text: &str) -> WbResult<DocumentOutcome> {
        ingest::ingest_document(
            &self.store,
            self.extractor.as_ref(),
            &self.config.chunking,
            self.config.extraction.min_confidence,
            document_id,
            text,
        )
        .map_err(WbError::from)
    }

    /// Ingest a batch of documents in parallel. Failures are reported per
    /// document, never aborting the batch.
    pub fn ingest_batch(&self, documents: &[SourceDocument]) -> IngestReport {
        ingest::ingest_batch(
            &self.store,
            self.extractor.as_ref(),
            &self.config.chunking,
            self.config.extraction.min_confidence,
            documents,
        )
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Graph-focused query: resolve intent, gather the entity neighborhoods,
    /// and answer from graph evidence alone.
    pub fn kg_query(&self, query: &str) -> KgQueryResponse {
        let intent = self.resolver.resolve(query);
        let matches = self.retriever.graph_matches(&intent);

        let answer = match &self.generator {
            Some(generator) if !matches.is_empty() => {
                let prompt = graph_prompt(query, &intent, &matches);
                match generator.generate(&prompt, self.generation_timeout()) {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        warn!(%e, "generation failed, answering with the findings summary");
                        findings_summary(&matches)
                    }
                }
            }
            _ => findings_summary(&matches),
        };

        let top_triples: Vec<Triple> = matches.iter().take(TOP_TRIPLES).cloned().collect();
        KgQueryResponse {
            query: query.to_string(),
            answer,
            intent,
            relevant_triples_count: matches.len(),
            top_triples,
        }
    }

    /// Conversational query over both evidence channels.
    ///
    /// Retrieval and generation run outside any session lock; the exchange
    /// is committed to memory only once the answer exists, so an interrupted
    /// call leaves no partial turn behind.
    pub fn ask(&self, session_id: &str, query: &str) -> ChatResponse {
        let intent = self.resolver.resolve(query);
        let bundle = self.retriever.retrieve(query, &intent);

        let graph_answer = if bundle.graph_matches.is_empty() {
            String::new()
        } else {
            findings_summary(&bundle.graph_matches)
        };

        let conversation_context = if self.config.memory_enabled {
            self.sessions
                .session(session_id)
                .lock()
                .expect("session memory lock poisoned")
                .render_context(CONTEXT_TURNS)
        } else {
            None
        };

        let prompt = synthesis_prompt(
            query,
            &graph_answer,
            &bundle,
            conversation_context.as_deref(),
        );
        let mut answer = match &self.generator {
            Some(generator) => match generator.generate(&prompt, self.generation_timeout()) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(%e, "generation failed, composing a deterministic answer");
                    fallback_answer(&graph_answer, &bundle)
                }
            },
            None => fallback_answer(&graph_answer, &bundle),
        };

        let sources = source_lines(&bundle);
        if !sources.is_empty() {
            answer.push_str("\n\nResearch Sources:\n");
            answer.push_str(&sources.join("\n"));
        }

        if self.config.memory_enabled {
            let summary = format!(
                "{} relationships, {} excerpts",
                bundle.graph_matches.len(),
                bundle.vector_matches.len()
            );
            self.sessions
                .session(session_id)
                .lock()
                .expect("session memory lock poisoned")
                .commit_exchange(query, &answer, Some(summary));
        }

        ChatResponse {
            query: query.to_string(),
            answer,
            intent,
            graph_evidence: bundle.graph_matches.len(),
            vector_evidence: bundle.vector_matches.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection and persistence
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> GraphStats {
        self.store.stats()
    }

    pub fn memory_status(&self, session_id: &str) -> MemoryStatus {
        let conversation_length = if self.config.memory_enabled {
            self.sessions
                .session(session_id)
                .lock()
                .expect("session memory lock poisoned")
                .len()
        } else {
            0
        };
        MemoryStatus {
            conversation_length,
            memory_enabled: self.config.memory_enabled,
        }
    }

    /// Drop a session's conversation history. Returns false for an unknown
    /// session.
    pub fn clear_memory(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }

    pub fn save_snapshot(&self, path: &Path) -> WbResult<()> {
        snapshot::save_snapshot(&self.store, path).map_err(WbError::from)
    }

    /// Merge a snapshot into the store. Returns the number of triples added.
    pub fn load_snapshot(&self, path: &Path) -> WbResult<usize> {
        let loaded = snapshot::load_snapshot(&self.store, path).map_err(WbError::from)?;
        info!(loaded, "merged snapshot into graph store");
        Ok(loaded)
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            triples: self.store.edge_count(),
            entities: self.store.node_count(),
            active_sessions: self.sessions.session_count(),
            vector_search_available: self.retriever.has_vector(),
            generation_available: self.generator.is_some(),
            assisted_extraction: self.config.assisted_extraction && self.generator.is_some(),
            memory_enabled: self.config.memory_enabled,
            generation_model: self.config.generation.model.clone(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.config.generation_timeout_ms)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("triples", &self.store.edge_count())
            .field("vector_search", &self.retriever.has_vector())
            .field("generation", &self.generator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CollabError;
    use tempfile::TempDir;

    const ABSTRACT: &str = "Microgravity exposure reduces bone density in flight mice. \
                            Prolonged spaceflight also increases calcium loss. \
                            Radiation damages cellular dna strands during deep space missions.";

    struct StubGenerator(&'static str);

    impl GenerateAnswer for StubGenerator {
        fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, CollabError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    impl GenerateAnswer for FailingGenerator {
        fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, CollabError> {
            Err(CollabError::Timeout {
                service: "generation",
                timeout_ms: 1,
            })
        }
    }

    fn offline_engine() -> Engine {
        Engine::with_collaborators(EngineConfig::default(), None, None)
            .expect("default config is valid")
    }

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        let mut config = EngineConfig::default();
        config.retrieval.alpha = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut config = EngineConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn chunk_bound_ordering_is_enforced() {
        let mut config = EngineConfig::default();
        config.chunking.min_words = 300;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunking"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("waterbear.toml");

        let mut config = EngineConfig::default();
        config.retrieval.alpha = 0.7;
        config.generation.model = "test-model".to_string();
        config.save(&path).expect("save config");

        let loaded = EngineConfig::load(&path).expect("load config");
        assert!((loaded.retrieval.alpha - 0.7).abs() < 1e-6);
        assert_eq!(loaded.generation.model, "test-model");
        assert!(loaded.memory_enabled);
    }

    #[test]
    fn loading_missing_config_is_a_read_error() {
        let dir = TempDir::new().expect("create temp dir");
        let err = EngineConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigRead { .. }));
    }

    #[test]
    fn loading_bad_toml_is_a_parse_error() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "retrieval = [broken").expect("write file");
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse { .. }));
    }

    #[test]
    fn offline_engine_answers_from_the_graph() {
        let engine = offline_engine();
        let outcome = engine.ingest_text("OSD-101", ABSTRACT).expect("ingest");
        assert!(outcome.triples_added > 0);

        let response = engine.kg_query("How does microgravity affect bone density?");
        assert!(response.relevant_triples_count > 0);
        assert!(response.answer.starts_with("Based on the research data"));
        assert!(response.answer.contains("bone density"));
        assert!(response.top_triples.len() <= 5);
    }

    #[test]
    fn kg_query_on_empty_graph_reports_no_information() {
        let engine = offline_engine();
        let response = engine.kg_query("What is microgravity?");
        assert_eq!(response.relevant_triples_count, 0);
        assert!(
            response
                .answer
                .contains("couldn't find specific information")
        );
    }

    #[test]
    fn ask_commits_one_exchange_per_question() {
        let config = EngineConfig::default();
        let engine =
            Engine::with_collaborators(config, None, Some(Arc::new(StubGenerator("An answer."))))
                .expect("valid config");
        engine.ingest_text("OSD-101", ABSTRACT).expect("ingest");

        let response = engine.ask("session-a", "How does microgravity affect bone density?");
        assert_eq!(response.answer, "An answer.");
        assert!(response.graph_evidence > 0);

        let status = engine.memory_status("session-a");
        assert!(status.memory_enabled);
        assert_eq!(status.conversation_length, 2);

        assert!(engine.clear_memory("session-a"));
        assert_eq!(engine.memory_status("session-a").conversation_length, 0);
    }

    #[test]
    fn disabled_memory_never_records_turns() {
        let mut config = EngineConfig::default();
        config.memory_enabled = false;
        let engine = Engine::with_collaborators(config, None, None).expect("valid config");
        engine.ingest_text("OSD-101", ABSTRACT).expect("ingest");

        engine.ask("session-a", "What does radiation damage?");
        let status = engine.memory_status("session-a");
        assert!(!status.memory_enabled);
        assert_eq!(status.conversation_length, 0);
    }

    #[test]
    fn failed_generation_falls_back_to_research_summary() {
        let engine = Engine::with_collaborators(
            EngineConfig::default(),
            None,
            Some(Arc::new(FailingGenerator)),
        )
        .expect("valid config");
        engine.ingest_text("OSD-101", ABSTRACT).expect("ingest");

        let response = engine.ask("session-a", "How does microgravity affect bone density?");
        assert!(response.answer.starts_with("**Research Summary:**"));
        assert!(response.answer.contains("Based on the research data"));
    }

    #[test]
    fn snapshot_round_trips_through_the_engine() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("graph.json");

        let engine = offline_engine();
        engine.ingest_text("OSD-101", ABSTRACT).expect("ingest");
        let triples = engine.store().edge_count();
        engine.save_snapshot(&path).expect("save snapshot");

        let fresh = offline_engine();
        let loaded = fresh.load_snapshot(&path).expect("load snapshot");
        assert_eq!(loaded, triples);
        assert_eq!(fresh.store().edge_count(), triples);
    }

    #[test]
    fn info_reflects_wiring() {
        let engine = offline_engine();
        let info = engine.info();
        assert!(!info.vector_search_available);
        assert!(!info.generation_available);
        assert!(info.memory_enabled);
        let rendered = info.to_string();
        assert!(rendered.contains("vector:       unavailable"));
        assert!(rendered.contains("memory:       on"));
    }
}
