//! Sentence-boundary chunking under the speech API's input limit
//!
//! Lengths are counted in characters, not bytes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default chunk length, below the speech API's 4096-character ceiling
pub const DEFAULT_CHUNK_LIMIT: usize = 3800;

/// A sentence plus its run of terminal punctuation
static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+").expect("valid sentence regex"));

/// What to do with a single sentence longer than the limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizedSentence {
    /// Emit it as one oversized chunk
    Keep,
    /// Cut it at word boundaries (or mid-word as a last resort)
    #[default]
    HardSplit,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    oversized: OversizedSentence,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LIMIT)
    }
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            oversized: OversizedSentence::default(),
        }
    }

    pub fn with_oversized(mut self, policy: OversizedSentence) -> Self {
        self.oversized = policy;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split text into chunks of at most `max_chars` characters
    ///
    /// Text within the limit comes back unchanged as a single chunk.
    /// Otherwise sentences are packed greedily; each chunk is trimmed.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.chars().count() <= self.max_chars {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in self.sentences(text) {
            let sentence_len = sentence.chars().count();

            if current_len + sentence_len > self.max_chars && current_len > 0 {
                push_trimmed(&mut chunks, &current);
                current.clear();
                current_len = 0;
            }

            current.push_str(sentence);
            current_len += sentence_len;
        }

        push_trimmed(&mut chunks, &current);
        chunks
    }

    /// Sentences in order, covering the whole input
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut last_end = 0;

        for m in SENTENCE.find_iter(text) {
            sentences.push(m.as_str());
            last_end = m.end();
        }

        // Trailing text without terminal punctuation
        if last_end < text.len() {
            sentences.push(&text[last_end..]);
        }

        match self.oversized {
            OversizedSentence::Keep => sentences,
            OversizedSentence::HardSplit => sentences
                .into_iter()
                .flat_map(|s| hard_split(s, self.max_chars))
                .collect(),
        }
    }
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Cut `s` into pieces of at most `max_chars` characters, preferring to end
/// each piece right after whitespace
fn hard_split(s: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = s;

    while rest.chars().count() > max_chars {
        // Byte offset just past the max_chars-th character
        let limit_byte = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let cut = rest[..limit_byte]
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .filter(|&i| i > 0 && rest[..i].trim().chars().count() > 0)
            .unwrap_or(limit_byte);

        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}
