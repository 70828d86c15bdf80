//! Sentence-aware text chunking.
//!
//! Documents are split into sentence-like units first, then sentences are
//! greedily packed into segments bounded by a character budget. Closing a
//! segment seeds the next one with the trailing characters of the previous
//! segment so context survives the boundary. The same input and parameters
//! always produce the same segmentation.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Tokens that end with terminal punctuation but do not end a sentence.
const ABBREVIATIONS: &[&str] = &["M.", "Mme.", "Dr.", "Pr.", "etc.", "p.", "n°"];

static WHITESPACE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\s+").expect("static whitespace pattern"));

/// Chunking parameters, loaded from configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Maximum characters per segment.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Characters of the previous segment carried into the next one.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chars() -> usize {
    1200
}

fn default_overlap_chars() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Splits text into sentence-like units.
///
/// A sentence ends at a whitespace token whose last character is `.`, `!`,
/// or `?`, unless the token is a known abbreviation. Whatever trails the
/// last terminal token becomes a final unit of its own.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let collapsed = normalize_whitespace(text);
    if collapsed.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for token in collapsed.split(' ') {
        current.push(token);
        let terminal = token.ends_with(['.', '!', '?']);
        if terminal && !ABBREVIATIONS.contains(&token) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }
    sentences
}

/// Splits `text` into segments of at most `max_chars` characters.
///
/// Sentences are packed greedily. When a segment closes, the next segment
/// is seeded with the last `min(overlap_chars, len)` characters of it; the
/// seed is skipped when attaching it would push the incoming sentence past
/// the budget. A single sentence longer than `max_chars` is hard-split on
/// whole-character boundaries. Empty or whitespace-only input produces no
/// segments. Lengths are Unicode scalar counts, not bytes.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;
    // True once the buffer holds at least one whole sentence, as opposed to
    // only an overlap seed.
    let mut buf_has_sentence = false;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();
        let joined = if buf.is_empty() {
            sentence_chars
        } else {
            buf_chars + 1 + sentence_chars
        };

        if joined <= max_chars {
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(&sentence);
            buf_chars = joined;
            buf_has_sentence = true;
            continue;
        }

        let mut seed = String::new();
        if buf_has_sentence {
            seed = tail_chars(&buf, overlap_chars);
            chunks.push(std::mem::take(&mut buf));
        }
        buf.clear();
        buf_chars = 0;
        buf_has_sentence = false;

        if sentence_chars > max_chars {
            for piece in hard_split(&sentence, max_chars) {
                chunks.push(piece);
            }
            continue;
        }

        let seed_chars = seed.chars().count();
        if !seed.is_empty() && seed_chars + 1 + sentence_chars <= max_chars {
            buf = seed;
            buf.push(' ');
            buf.push_str(&sentence);
            buf_chars = seed_chars + 1 + sentence_chars;
        } else {
            buf = sentence;
            buf_chars = sentence_chars;
        }
        buf_has_sentence = true;
    }

    if buf_has_sentence {
        chunks.push(buf);
    }
    chunks
}

/// Last `count` characters of `text` (the whole text when shorter).
fn tail_chars(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let total = text.chars().count();
    if total <= count {
        return text.to_string();
    }
    text.chars().skip(total - count).collect()
}

/// Splits an oversized sentence into pieces of at most `max_chars` chars.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}
