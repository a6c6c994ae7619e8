//! Answer assembly.
//!
//! Builds the prompts handed to the generation collaborator and the
//! deterministic texts used when no collaborator is reachable. Prompt
//! context is assembled from labelled sections so the model can tell graph
//! evidence, retrieved excerpts, and prior conversation apart; every section
//! is length-capped so one verbose source cannot crowd out the rest.
//!
//! Nothing here calls out; callers pass evidence in and send prompts
//! themselves, which keeps this module trivially testable.

use crate::graph::Triple;
use crate::intent::QueryIntent;
use crate::retrieve::EvidenceBundle;
use crate::text::clip_chars;

/// Longest knowledge-graph answer quoted into a synthesis prompt.
const KG_ANSWER_CLIP: usize = 3000;
/// Relationship lines quoted into a synthesis prompt.
const RELATIONSHIP_CAP: usize = 8;
/// Excerpts quoted into a synthesis prompt, and their per-excerpt length.
const EXCERPT_CAP: usize = 5;
const EXCERPT_CLIP: usize = 300;
/// Relationship lines quoted into a graph-only prompt.
const PROMPT_RELATIONSHIP_CAP: usize = 10;
/// Findings listed by the deterministic summary.
const FINDINGS_CAP: usize = 5;
/// Excerpts and their length in the deterministic fallback answer.
const FALLBACK_EXCERPT_CAP: usize = 2;
const FALLBACK_EXCERPT_CLIP: usize = 150;

const SYNTHESIS_INSTRUCTIONS: &str = "You are a space biology research assistant. \
Answer the current question from the context below. Ground every claim in the \
supplied relationships and excerpts, cite specific findings where they exist, \
and say plainly when the evidence is thin or indirect.";

const GRAPH_INSTRUCTIONS: &str = "You are a space biology research expert. Based on \
the knowledge relationships below, extracted from research publications, provide a \
clear and natural answer. Use the relationships as evidence and acknowledge when \
they only partially address the question.";

// ---------------------------------------------------------------------------
// Deterministic answers
// ---------------------------------------------------------------------------

/// Plain-text summary of graph findings, used when no generation collaborator
/// is available and as the graph section of richer prompts.
pub fn findings_summary(matches: &[Triple]) -> String {
    if matches.is_empty() {
        return "I couldn't find specific information to answer your question in the \
                current knowledge base."
            .to_string();
    }

    let mut out = String::from("Based on the research data, here are the relevant findings:\n\n");
    for (i, t) in matches.iter().take(FINDINGS_CAP).enumerate() {
        out.push_str(&format!(
            "{}. {} {} {}\n   (Confidence: {:.2}, Source: {})\n\n",
            i + 1,
            t.subject(),
            t.predicate(),
            t.object(),
            t.confidence(),
            t.source().document_id,
        ));
    }
    if matches.len() > FINDINGS_CAP {
        out.push_str(&format!(
            "... and {} more related findings.",
            matches.len() - FINDINGS_CAP
        ));
    }
    out.trim_end().to_string()
}

/// Deterministic whole-answer fallback for when generation fails mid-chat:
/// the graph summary plus a couple of retrieved excerpts and their sources.
pub fn fallback_answer(graph_answer: &str, bundle: &EvidenceBundle) -> String {
    if graph_answer.is_empty() && bundle.vector_matches.is_empty() {
        return "Insufficient evidence was retrieved to answer this question. Try \
                rephrasing, or ingest more publications first."
            .to_string();
    }

    let mut out = String::from("**Research Summary:**\n\n");
    if graph_answer.is_empty() {
        out.push_str("No direct relationships found in the knowledge graph.");
    } else {
        out.push_str(graph_answer);
    }

    if !bundle.vector_matches.is_empty() {
        out.push_str("\n\n**Additional Research Context:**\n");
        for m in bundle.vector_matches.iter().take(FALLBACK_EXCERPT_CAP) {
            out.push_str(&format!(
                "- {}...\n",
                clip_chars(&m.passage_text, FALLBACK_EXCERPT_CLIP)
            ));
        }
        let sources = source_lines(bundle);
        if !sources.is_empty() {
            out.push_str("\nSources:\n");
            for line in sources {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }
    out.trim_end().to_string()
}

/// Numbered source attributions from passage metadata, deduplicated.
pub fn source_lines(bundle: &EvidenceBundle) -> Vec<String> {
    let mut seen = Vec::new();
    let mut lines = Vec::new();
    for m in &bundle.vector_matches {
        let title = m
            .title
            .as_deref()
            .or(m.document_id.as_deref())
            .unwrap_or("Unknown source");
        if seen.contains(&title) {
            continue;
        }
        seen.push(title);
        let line = match (&m.title, &m.document_id) {
            (Some(title), Some(id)) => format!("{}. {} ({})", lines.len() + 1, title, id),
            _ => format!("{}. {}", lines.len() + 1, title),
        };
        lines.push(line);
    }
    lines
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Relationship lines for prompt context: `- s --p--> o (92%)`.
fn relationship_lines(matches: &[Triple], cap: usize) -> String {
    matches
        .iter()
        .take(cap)
        .map(|t| {
            format!(
                "- {} --{}--> {} ({:.0}%)",
                t.subject(),
                t.predicate(),
                t.object(),
                t.confidence() * 100.0
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for a graph-only query: the question, the resolved intent, and the
/// strongest relationships as evidence.
pub fn graph_prompt(query: &str, intent: &QueryIntent, matches: &[Triple]) -> String {
    let mut lines = String::new();
    for t in matches.iter().take(PROMPT_RELATIONSHIP_CAP) {
        lines.push_str(&format!(
            "- {} {} {} (confidence {:.2}, source {})\n",
            t.subject(),
            t.predicate(),
            t.object(),
            t.confidence(),
            t.source().document_id,
        ));
    }

    format!(
        "{GRAPH_INSTRUCTIONS}\n\nA user asked: \"{query}\"\n\n\
         Knowledge Relationships:\n{lines}\n\
         Query Type: {}\nFocus Area: {}\n",
        intent.query_type,
        intent.focus_area.as_deref().unwrap_or("general"),
    )
}

/// Full chat synthesis prompt: prior conversation, the graph answer, the
/// strongest relationships, the retrieved excerpts, then the question.
pub fn synthesis_prompt(
    query: &str,
    graph_answer: &str,
    bundle: &EvidenceBundle,
    conversation_context: Option<&str>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(context) = conversation_context {
        sections.push(context.trim_end().to_string());
    }
    if !graph_answer.is_empty() {
        sections.push(format!(
            "[Knowledge Graph Answer]\n{}",
            clip_chars(graph_answer, KG_ANSWER_CLIP)
        ));
    }
    if !bundle.graph_matches.is_empty() {
        sections.push(format!(
            "[Representative Relationships]\n{}",
            relationship_lines(&bundle.graph_matches, RELATIONSHIP_CAP)
        ));
    }
    if !bundle.vector_matches.is_empty() {
        let mut excerpts = String::from("[Vector Retrieved Excerpts]\n");
        for (i, m) in bundle.vector_matches.iter().take(EXCERPT_CAP).enumerate() {
            let title = m
                .title
                .as_deref()
                .or(m.document_id.as_deref())
                .unwrap_or("Unknown source");
            excerpts.push_str(&format!(
                "{}. {} - {}...\n",
                i + 1,
                title,
                clip_chars(&m.passage_text, EXCERPT_CLIP)
            ));
        }
        sections.push(excerpts.trim_end().to_string());
    }

    let context = if sections.is_empty() {
        "No additional context retrieved.".to_string()
    } else {
        sections.join("\n\n")
    };

    format!("{SYNTHESIS_INSTRUCTIONS}\n\nContext:\n{context}\n\nCurrent Question: {query}")
}
