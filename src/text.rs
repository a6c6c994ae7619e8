//! Text preparation: cleaning and sentence-aware chunking.
//!
//! Publication text arrives with PDF-join artifacts (glued sentences, control
//! characters, ragged whitespace). Cleaning normalizes it once; chunking then
//! produces word-bounded, sentence-aligned windows with a small overlap so
//! relations straddling a boundary stay extractable. All byte offsets handed
//! to extraction refer to the cleaned text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_GLUED_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])([A-Z])").unwrap());

/// Configuration for sentence-aligned chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Minimum words per chunk (a shorter trailing chunk merges backwards).
    pub min_words: usize,
    /// Target words per chunk; the buffer flushes once it reaches this.
    pub target_words: usize,
    /// Hard ceiling; a single over-long sentence still emits as one chunk.
    pub max_words: usize,
    /// Words of trailing context repeated at the start of the next chunk.
    pub overlap_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_words: 20,
            target_words: 120,
            max_words: 200,
            overlap_words: 20,
        }
    }
}

/// One cleaned, sentence-aligned window of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk within its document, 0-based.
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    /// Byte offset of the first non-overlap sentence in the cleaned document.
    pub offset: usize,
}

/// A sentence slice with its byte range in the parent text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Normalize raw document text.
///
/// - Control characters become spaces (newlines included; chunking re-derives
///   structure from sentence boundaries, not line breaks).
/// - Sentences glued together by PDF extraction (`...mass.Bone...`) are split
///   apart.
/// - Whitespace runs collapse to single spaces.
pub fn clean_text(raw: &str) -> String {
    let no_controls: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let unglued = RE_GLUED_SENTENCE.replace_all(&no_controls, "$1 $2");
    RE_WHITESPACE.replace_all(&unglued, " ").trim().to_string()
}

/// First `max_chars` characters of `text`, on a character boundary. Used
/// wherever prompt sections quote user or document text with a length cap.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split text at sentence boundaries (`.`, `!`, `?` followed by whitespace),
/// keeping byte ranges so extraction can attach provenance spans.
pub fn sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut prev_terminal = false;

    for (i, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            push_sentence(text, start, i, &mut out);
            start = i + ch.len_utf8();
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }
    push_sentence(text, start, text.len(), &mut out);
    out
}

fn push_sentence<'a>(text: &'a str, start: usize, end: usize, out: &mut Vec<Sentence<'a>>) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    let s = start + lead;
    out.push(Sentence {
        text: trimmed,
        start: s,
        end: s + trimmed.len(),
    });
}

/// Chunk cleaned text into sentence-aligned windows per `config`.
///
/// Greedy accumulation: sentences append to a buffer, flushing at
/// `target_words` (or just before `max_words` would be exceeded); each flush
/// reseeds the next buffer with up to `overlap_words` of trailing sentences.
/// A trailing buffer of fresh material below `min_words` merges into the
/// previous chunk instead of emitting its own. A single sentence longer than
/// `max_words` still emits as one chunk.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    let sents = sentences(text);
    if sents.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut buffer: Vec<(Sentence<'_>, usize)> = Vec::new();
    let mut buffer_words = 0usize;
    // Offset of the first non-overlap sentence; None while the buffer holds
    // only carried-over material.
    let mut fresh_start: Option<usize> = None;

    for sent in sents {
        let words = sent.text.split_whitespace().count();

        if let Some(offset) = fresh_start {
            if buffer_words + words > config.max_words {
                flush(&mut chunks, &buffer, offset);
                (buffer, buffer_words) = reseed(&buffer, config.overlap_words);
                fresh_start = None;
            }
        }

        if fresh_start.is_none() {
            fresh_start = Some(sent.start);
        }
        buffer.push((sent, words));
        buffer_words += words;

        if buffer_words >= config.target_words {
            if let Some(offset) = fresh_start {
                flush(&mut chunks, &buffer, offset);
            }
            (buffer, buffer_words) = reseed(&buffer, config.overlap_words);
            fresh_start = None;
        }
    }

    if let Some(offset) = fresh_start {
        let fresh_words: usize = buffer
            .iter()
            .filter(|(s, _)| s.start >= offset)
            .map(|(_, w)| w)
            .sum();
        if fresh_words < config.min_words && !chunks.is_empty() {
            merge_tail(&mut chunks, &buffer, offset);
        } else {
            flush(&mut chunks, &buffer, offset);
        }
    }

    chunks
}

fn flush(chunks: &mut Vec<TextChunk>, buffer: &[(Sentence<'_>, usize)], fresh_offset: usize) {
    let text = buffer
        .iter()
        .map(|(s, _)| s.text)
        .collect::<Vec<_>>()
        .join(" ");
    let word_count = buffer.iter().map(|(_, w)| w).sum();
    chunks.push(TextChunk {
        index: chunks.len(),
        text,
        word_count,
        offset: fresh_offset,
    });
}

/// Append the fresh sentences of a short trailing buffer to the last chunk.
fn merge_tail(chunks: &mut Vec<TextChunk>, buffer: &[(Sentence<'_>, usize)], fresh: usize) {
    let Some(last) = chunks.last_mut() else {
        return;
    };
    for (sent, words) in buffer.iter().filter(|(s, _)| s.start >= fresh) {
        last.text.push(' ');
        last.text.push_str(sent.text);
        last.word_count += words;
    }
}

fn reseed<'a>(
    buffer: &[(Sentence<'a>, usize)],
    overlap_words: usize,
) -> (Vec<(Sentence<'a>, usize)>, usize) {
    let carried = overlap_tail(buffer, overlap_words);
    let words = carried.iter().map(|(_, w)| w).sum();
    (carried, words)
}

/// Trailing sentences of the buffer totalling at most `overlap_words`.
fn overlap_tail<'a>(
    buffer: &[(Sentence<'a>, usize)],
    overlap_words: usize,
) -> Vec<(Sentence<'a>, usize)> {
    if overlap_words == 0 {
        return Vec::new();
    }
    let mut tail = Vec::new();
    let mut words = 0usize;
    for &(sent, w) in buffer.iter().rev() {
        if words + w > overlap_words {
            break;
        }
        words += w;
        tail.push((sent, w));
    }
    tail.reverse();
    tail
}
