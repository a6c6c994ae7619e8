//! Deterministic pattern-based triple extraction.
//!
//! Scans each sentence for relation cues (single verbs like "reduces",
//! phrases like "exposed to"), segments coordinated and independent clauses,
//! and trims the surrounding word spans down to entity phrases. Frequency
//! adverbs ("often", "rarely") and hedging modals ("may", "suggests")
//! modulate confidence; assertive markers ("demonstrated", "significantly")
//! raise it.

use tracing::debug;

use crate::error::ExtractError;
use crate::graph::{SourceSpan, Triple};
use crate::text::{TextChunk, sentences};

use super::{Extract, ExtractorConfig, cap_chunk};

// ---------------------------------------------------------------------------
// Cue tables
// ---------------------------------------------------------------------------

/// Single-verb cues: base form, canonical predicate, base confidence.
/// Surface forms in "-s", "-es", "-d", "-ed" match the base.
const VERB_CUES: &[(&str, &str, f32)] = &[
    ("cause", "causes", 0.85),
    ("reduce", "reduces", 0.85),
    ("decrease", "decreases", 0.85),
    ("increase", "increases", 0.85),
    ("prevent", "prevents", 0.85),
    ("damage", "damages", 0.85),
    ("inhibit", "inhibits", 0.85),
    ("affect", "affects", 0.8),
    ("elevate", "elevates", 0.8),
    ("suppress", "suppresses", 0.8),
    ("promote", "promotes", 0.8),
    ("induce", "induces", 0.8),
    ("trigger", "triggers", 0.8),
    ("disrupt", "disrupts", 0.8),
    ("impair", "impairs", 0.8),
    ("regulate", "regulates", 0.8),
    ("accelerate", "accelerates", 0.8),
    ("mitigate", "mitigates", 0.8),
    ("counteract", "counteracts", 0.8),
    ("alter", "alters", 0.75),
    ("modulate", "modulates", 0.75),
    ("attenuate", "attenuates", 0.75),
    ("require", "requires", 0.75),
    ("produce", "produces", 0.75),
    ("influence", "influences", 0.7),
    ("enable", "enables", 0.7),
    ("experience", "experiences", 0.7),
    ("exhibit", "exhibits", 0.7),
    ("undergo", "undergoes", 0.7),
    ("contain", "contains", 0.7),
    ("has", "has", 0.65),
    ("have", "has", 0.65),
];

/// Multi-word cues, matched before single verbs at the same position.
const PHRASE_CUES: &[(&[&str], &str, f32)] = &[
    (&["is", "a"], "is_a", 0.9),
    (&["is", "an"], "is_a", 0.9),
    (&["are", "a"], "is_a", 0.9),
    (&["is", "part", "of"], "part_of", 0.85),
    (&["are", "part", "of"], "part_of", 0.85),
    (&["leads", "to"], "leads_to", 0.8),
    (&["lead", "to"], "leads_to", 0.8),
    (&["led", "to"], "leads_to", 0.8),
    (&["results", "in"], "results_in", 0.8),
    (&["result", "in"], "results_in", 0.8),
    (&["resulted", "in"], "results_in", 0.8),
    (&["exposed", "to"], "exposed_to", 0.8),
    (&["protects", "against"], "protects_against", 0.8),
    (&["protect", "against"], "protects_against", 0.8),
    (&["grown", "in"], "grown_in", 0.75),
    (&["grown", "under"], "grown_in", 0.75),
    (&["cultured", "in"], "grown_in", 0.7),
    (&["depends", "on"], "depends_on", 0.75),
    (&["depend", "on"], "depends_on", 0.75),
    (&["adapts", "to"], "adapts_to", 0.75),
    (&["adapt", "to"], "adapts_to", 0.75),
    (&["contributes", "to"], "contributes_to", 0.75),
    (&["contribute", "to"], "contributes_to", 0.75),
    (&["associated", "with"], "associated_with", 0.7),
    (&["correlates", "with"], "associated_with", 0.7),
    (&["correlated", "with"], "associated_with", 0.7),
];

/// Tokens that join clauses; used to split independent statements.
const COORDINATORS: &[&str] = &["and", "or", "but", "while", "whereas"];

/// Tokens that open a subordinate clause; spans are cut before them.
const CLAUSE_BREAKS: &[&str] = &[
    "that", "which", "who", "whom", "where", "when", "while", "because",
    "although", "since", "if", "unless",
];

/// Prepositions that start a modifier rather than part of the entity.
/// "of" is deliberately absent: "loss of bone density" is one phrase.
const PHRASE_TAILS: &[&str] = &[
    "in", "on", "at", "by", "under", "during", "within", "across", "aboard",
    "via", "per", "from", "into", "onto", "between", "among", "with",
    "without", "after", "before", "than", "versus", "vs", "compared",
    "despite", "throughout", "toward", "towards",
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "some", "any", "both",
    "several", "many", "most", "all", "each",
];

const PRONOUNS: &[&str] = &[
    "it", "he", "she", "they", "we", "one", "you", "its", "his", "her", "their",
];

const TRAILING_AUX: &[&str] = &[
    "is", "are", "was", "were", "has", "have", "had", "been", "being", "does",
    "do", "did", "may", "might", "could", "can", "would", "should", "will",
    "must",
];

const TRAILING_PARTICIPLES: &[&str] = &[
    "shown", "said", "called", "known", "considered", "given", "observed",
    "reported", "found", "demonstrated", "seen", "noted",
];

const TRAILING_ADVERBS: &[&str] = &[
    "significantly", "markedly", "substantially", "dramatically", "notably",
    "strongly", "severely", "rapidly", "consistently", "typically",
    "generally", "commonly", "also", "further", "thereby",
];

/// Words that never carry entity content on their own.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of",
    "with", "by", "from", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could",
    "should", "may", "might", "shall", "can", "this", "that", "these",
    "those", "it", "its", "they", "we", "not", "no", "so", "as", "such",
    "shown", "seen", "observed", "reported", "found",
];

/// Markers that hedge the whole sentence.
const HEDGING_MARKERS: &[&str] = &[
    "may", "might", "could", "suggest", "suggests", "suggesting", "possibly",
    "potentially", "appears", "appear", "likely", "hypothesized",
];

/// Markers of experimentally established findings.
const ASSERTIVE_MARKERS: &[&str] = &[
    "demonstrated", "demonstrates", "confirmed", "confirms", "significantly",
    "markedly", "substantially",
];

/// Frequency adverb directly beside a cue: confidence weight.
fn adverb_weight(adverb: &str) -> Option<f32> {
    match adverb {
        "always" | "invariably" => Some(1.0),
        "often" | "frequently" | "usually" => Some(0.75),
        "sometimes" | "occasionally" => Some(0.45),
        "seldom" | "rarely" => Some(0.2),
        "never" => Some(0.05),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Cue scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct CueHit {
    position: usize,
    len: usize,
    predicate: &'static str,
    confidence: f32,
}

fn verb_matches(word: &str, base: &str) -> bool {
    word == base
        || word.strip_suffix('s') == Some(base)
        || word.strip_suffix('d') == Some(base)
        || word.strip_suffix("es") == Some(base)
        || word.strip_suffix("ed") == Some(base)
}

fn match_cue_at(lower: &[String], i: usize) -> Option<CueHit> {
    for (cue, predicate, confidence) in PHRASE_CUES {
        if i + cue.len() <= lower.len()
            && cue.iter().zip(&lower[i..]).all(|(c, w)| w == c)
        {
            return Some(CueHit {
                position: i,
                len: cue.len(),
                predicate,
                confidence: *confidence,
            });
        }
    }
    for (base, predicate, confidence) in VERB_CUES {
        if verb_matches(&lower[i], base) {
            return Some(CueHit {
                position: i,
                len: 1,
                predicate,
                confidence: *confidence,
            });
        }
    }
    None
}

fn find_cues(lower: &[String]) -> Vec<CueHit> {
    let mut hits = Vec::new();
    let mut i = 0;
    while i < lower.len() {
        match match_cue_at(lower, i) {
            Some(hit) => {
                i += hit.len;
                hits.push(hit);
            }
            None => i += 1,
        }
    }

    // A past-form verb directly after another cue is a participial modifier
    // ("exhibited reduced bone density"), not a second relation.
    let mut k = 1;
    while k < hits.len() {
        let prev = hits[k - 1];
        let cur = hits[k];
        if cur.len == 1
            && prev.position + prev.len == cur.position
            && lower[cur.position].ends_with('d')
        {
            hits.remove(k);
        } else {
            k += 1;
        }
    }
    hits
}

// ---------------------------------------------------------------------------
// Span trimming
// ---------------------------------------------------------------------------

/// Lowercased token with edge punctuation removed.
fn norm(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

fn leading_skip(words: &[&str]) -> usize {
    words
        .iter()
        .take_while(|w| {
            let low = norm(w);
            DETERMINERS.contains(&low.as_str()) || PRONOUNS.contains(&low.as_str())
        })
        .count()
}

fn strip_trailing<'a, 'b>(words: &'a [&'b str], set: &[&str]) -> &'a [&'b str] {
    let mut end = words.len();
    while end > 0 && set.contains(&norm(words[end - 1]).as_str()) {
        end -= 1;
    }
    &words[..end]
}

/// Rightmost run of content words, capped at five, for overlong spans.
fn rightmost_cluster<'a>(words: &[&'a str]) -> Vec<&'a str> {
    let mut cluster: Vec<&'a str> = Vec::new();
    for &w in words.iter().rev() {
        let low = norm(w);
        if TRAILING_AUX.contains(&low.as_str())
            || TRAILING_PARTICIPLES.contains(&low.as_str())
            || adverb_weight(&low).is_some()
        {
            break;
        }
        cluster.push(w);
        if cluster.len() >= 5 {
            break;
        }
    }
    cluster.reverse();
    cluster
}

/// Trim a word span down to its core entity phrase.
///
/// Cuts at subordinate clauses and modifier prepositions, strips leading
/// determiners and trailing auxiliaries/participles/adverbs, and requires at
/// least one content word to survive.
fn head_noun_phrase(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        return None;
    }

    let cut = words
        .iter()
        .position(|w| CLAUSE_BREAKS.contains(&norm(w).as_str()));
    let words = match cut {
        Some(0) => return None,
        Some(pos) => &words[..pos],
        None => words,
    };

    let cut = words
        .iter()
        .position(|w| PHRASE_TAILS.contains(&norm(w).as_str()));
    let words = match cut {
        Some(0) => return None,
        Some(pos) => &words[..pos],
        None => words,
    };

    let start = leading_skip(words);
    if start >= words.len() {
        return None;
    }
    let mut words = &words[start..];

    loop {
        let before = words.len();
        words = strip_trailing(words, TRAILING_AUX);
        words = strip_trailing(words, TRAILING_PARTICIPLES);
        words = strip_trailing(words, TRAILING_ADVERBS);
        if words.is_empty() || words.len() == before {
            break;
        }
    }
    if words.is_empty() {
        return None;
    }

    let content = words
        .iter()
        .filter(|w| !STOPWORDS.contains(&norm(w).as_str()))
        .count();
    if content == 0 {
        return None;
    }

    let picked: Vec<&str> = if content > 5 {
        rightmost_cluster(words)
    } else {
        words.to_vec()
    };
    if picked.is_empty() {
        return None;
    }
    Some(picked.join(" "))
}

/// Split a word span at "and"/"or" into coordinated sub-spans.
fn split_conjunction<'a>(words: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut groups: Vec<Vec<&'a str>> = Vec::new();
    let mut current: Vec<&'a str> = Vec::new();

    for &w in words {
        let low = norm(w);
        if low == "and" || low == "or" {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(w);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

// ---------------------------------------------------------------------------
// Clause segmentation
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Candidate {
    subject: String,
    predicate: &'static str,
    object: String,
    confidence: f32,
}

/// Extract relation candidates from one sentence.
///
/// Clause handling:
/// - "X reduces A and increases B" shares the subject across both cues.
/// - "X reduces A while Y damages B" splits into independent clauses.
/// - "A is reduced by X" inverts into (X, reduces, A).
/// - "shown to reduce" continues the current subject over the infinitive.
fn sentence_candidates(sentence: &str) -> Vec<Candidate> {
    let trimmed = sentence
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '!' || c == '?');
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < 3 {
        return Vec::new();
    }
    let lower: Vec<String> = words.iter().map(|w| norm(w)).collect();

    let hits = find_cues(&lower);
    if hits.is_empty() {
        return Vec::new();
    }

    let hedged = lower.iter().any(|w| HEDGING_MARKERS.contains(&w.as_str()));
    let assertive = lower
        .iter()
        .any(|w| ASSERTIVE_MARKERS.contains(&w.as_str()));

    let mut out = Vec::new();
    let mut subject_spans: Vec<Vec<&str>> = Vec::new();
    let mut clause_start = 0usize;
    // Pre-verb weight carried into a coordinated cue ("and often increases").
    let mut carry: Option<f32> = None;

    for (k, hit) in hits.iter().enumerate() {
        let pre_weight = match carry.take() {
            Some(w) => w,
            None => {
                let mut subj_hi = hit.position;
                let mut w = 1.0;
                if subj_hi > clause_start {
                    if let Some(aw) = adverb_weight(&lower[subj_hi - 1]) {
                        w = aw;
                        subj_hi -= 1;
                    }
                }
                subject_spans = if subj_hi > clause_start {
                    split_conjunction(&words[clause_start..subj_hi])
                } else {
                    Vec::new()
                };
                w
            }
        };

        let mut obj_lo = hit.position + hit.len;
        let mut post_weight = 1.0;
        if obj_lo < lower.len() {
            if let Some(aw) = adverb_weight(&lower[obj_lo]) {
                post_weight = aw;
                obj_lo += 1;
            }
        }

        let mut obj_hi = words.len();
        if let Some(next) = hits.get(k + 1) {
            let mut probe = next.position;
            let mut next_weight = 1.0;
            if probe > obj_lo {
                if let Some(aw) = adverb_weight(&lower[probe - 1]) {
                    next_weight = aw;
                    probe -= 1;
                }
            }
            let link = if probe > obj_lo {
                Some(lower[probe - 1].as_str())
            } else {
                None
            };
            match link {
                None => {
                    // auxiliary chain runs straight into the next cue
                    carry = Some(next_weight);
                    obj_hi = obj_lo;
                }
                Some("to") => {
                    carry = Some(next_weight);
                    obj_hi = probe - 1;
                }
                Some(w) if COORDINATORS.contains(&w) => {
                    carry = Some(next_weight);
                    obj_hi = probe - 1;
                }
                Some(_) => {
                    let gap = &lower[obj_lo..probe];
                    match gap.iter().rposition(|g| {
                        COORDINATORS.contains(&g.as_str())
                            || CLAUSE_BREAKS.contains(&g.as_str())
                    }) {
                        Some(rel) => {
                            obj_hi = obj_lo + rel;
                            clause_start = obj_lo + rel + 1;
                        }
                        None => {
                            obj_hi = probe;
                            clause_start = probe;
                        }
                    }
                }
            }
        }

        if obj_hi <= obj_lo {
            continue;
        }

        let mut conf = hit.confidence * pre_weight * post_weight;
        if hedged {
            conf *= 0.8;
        }
        if assertive {
            conf = (conf + 0.05).min(0.98);
        }

        if lower[obj_lo] == "by" {
            // passive voice: the agent after "by" is the real subject
            let agent_spans = split_conjunction(&words[obj_lo + 1..obj_hi]);
            for a_span in &agent_spans {
                let Some(agent) = head_noun_phrase(a_span) else {
                    continue;
                };
                for s_span in &subject_spans {
                    let Some(patient) = head_noun_phrase(s_span) else {
                        continue;
                    };
                    out.push(Candidate {
                        subject: agent.clone(),
                        predicate: hit.predicate,
                        object: patient,
                        confidence: conf,
                    });
                }
            }
        } else {
            let object_spans = split_conjunction(&words[obj_lo..obj_hi]);
            for o_span in &object_spans {
                let Some(object) = head_noun_phrase(o_span) else {
                    continue;
                };
                for s_span in &subject_spans {
                    let Some(subject) = head_noun_phrase(s_span) else {
                        continue;
                    };
                    out.push(Candidate {
                        subject,
                        predicate: hit.predicate,
                        object: object.clone(),
                        confidence: conf,
                    });
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Deterministic extractor with no external dependencies.
#[derive(Debug, Clone, Default)]
pub struct RuleExtractor {
    config: ExtractorConfig,
}

impl RuleExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }
}

impl Extract for RuleExtractor {
    fn extract_chunk(
        &self,
        document_id: &str,
        chunk: &TextChunk,
    ) -> Result<Vec<Triple>, ExtractError> {
        let mut out = Vec::new();
        for sent in sentences(&chunk.text) {
            if sent.text.split_whitespace().count() < self.config.min_sentence_words {
                continue;
            }
            for cand in sentence_candidates(sent.text) {
                let span = SourceSpan::new(document_id, chunk.index, sent.start, sent.end);
                match Triple::new(
                    &cand.subject,
                    cand.predicate,
                    &cand.object,
                    cand.confidence,
                    span,
                ) {
                    Ok(t) => out.push(t),
                    Err(e) => debug!(%e, document_id, "dropping malformed candidate"),
                }
            }
        }
        Ok(cap_chunk(out, self.config.max_per_chunk))
    }
}
