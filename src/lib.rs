// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # waterbear
//!
//! A hybrid knowledge-retrieval engine for space-biology literature. Documents
//! are mined into (subject, predicate, object) triples with confidence scores,
//! the triples are indexed into a directed multigraph, and free-text questions
//! are answered by fusing graph traversal with external vector-similarity
//! search.
//!
//! ## Architecture
//!
//! - **Extraction** (`extract`): rule-based (optionally LLM-assisted) triple
//!   mining with a documented confidence model
//! - **Knowledge graph** (`graph`): petgraph-backed directed multigraph with
//!   provenance-keyed idempotent inserts and hop-bounded queries
//! - **Intent resolution** (`intent`): lexical entity/query-type classification
//!   behind a swappable trait
//! - **Hybrid retrieval** (`retrieve`): confidence/similarity score fusion of
//!   graph and vector evidence
//! - **Conversation memory** (`memory`): bounded per-session turn history
//!
//! ## Library usage
//!
//! ```no_run
//! use waterbear::engine::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.ingest_text("doc-1", "Microgravity reduces bone density in mice.").unwrap();
//! let insight = engine.kg_query("What does microgravity affect?");
//! println!("{}", insight.answer);
//! ```

pub mod answer;
pub mod collab;
pub mod corpus;
pub mod engine;
pub mod entity;
pub mod error;
pub mod extract;
pub mod graph;
pub mod ingest;
pub mod intent;
pub mod memory;
pub mod retrieve;
pub mod text;
