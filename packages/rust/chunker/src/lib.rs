//! Word-boundary chunking for long prompt content.
//!
//! Content is split on whitespace and greedily packed into chunks of at most
//! `max_size` characters, joined by single spaces. A word is never broken:
//! a word longer than the budget becomes a chunk of its own.

use promptsieve_shared::{PromptSieveError, Result};

/// Chunk-size budget used by the built-in agents.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// ChunkSize
// ---------------------------------------------------------------------------

/// A validated, strictly positive chunk budget in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Validate a raw budget from configuration or CLI input.
    pub fn new(raw: i64) -> Result<Self> {
        usize::try_from(raw)
            .ok()
            .filter(|&n| n > 0)
            .map(Self)
            .ok_or_else(invalid_size)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE)
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn invalid_size() -> PromptSieveError {
    PromptSieveError::validation("chunk_size", "Chunk size must be a positive integer.")
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split `text` into word-aligned chunks of at most `max_size` characters.
///
/// Empty or all-whitespace input yields no chunks. Fails only when
/// `max_size` is zero.
pub fn chunk_text(text: &str, max_size: usize) -> Result<Vec<String>> {
    if max_size == 0 {
        return Err(invalid_size());
    }
    Ok(pack_words(text, ChunkSize(max_size)))
}

/// Chunk with an already-validated budget.
pub fn chunk_with(text: &str, size: ChunkSize) -> Vec<String> {
    pack_words(text, size)
}

fn pack_words(text: &str, size: ChunkSize) -> Vec<String> {
    let max_size = size.get();
    let mut words = text.split_whitespace();
    let mut chunks = Vec::new();

    let Some(first) = words.next() else {
        return chunks;
    };

    let mut current = first.to_string();
    let mut current_len = first.chars().count();

    for word in words {
        let word_len = word.chars().count();
        if current_len + 1 + word_len > max_size {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        } else {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        }
    }

    chunks.push(current);
    chunks
}

/// Chunk untyped input, rejecting anything that is not a JSON string.
pub fn chunk_value(value: &serde_json::Value, max_size: i64) -> Result<Vec<String>> {
    let text = value.as_str().ok_or_else(|| {
        PromptSieveError::validation("text", "Input text must be a string.")
    })?;
    let size = ChunkSize::new(max_size)?;
    Ok(chunk_with(text, size))
}
