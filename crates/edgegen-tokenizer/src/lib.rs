//! # edgegen-tokenizer
//!
//! Deterministic tokenization for edgegen.
//!
//! This crate provides:
//! - A `Tokenizer` trait for pluggable tokenization backends
//! - A fixed [`Vocabulary`]: four reserved tokens followed by one entry per
//!   supported literal character
//! - [`CharTokenizer`], the character-level scheme the session uses
//! - Streaming decoding for emitting text one token at a time

mod char_level;
mod vocab;

pub use char_level::CharTokenizer;
pub use vocab::{
    is_reserved, Vocabulary, BOS_TOKEN, DEFAULT_CHARSET, EOS_TOKEN, PAD_TOKEN, UNK_TOKEN,
};

/// Error type for tokenization operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizerError {
    #[error("vocabulary needs {required} entries but vocab_size is {configured}")]
    VocabularyTooSmall { required: usize, configured: usize },
    #[error("duplicate vocabulary entry: {0:?}")]
    DuplicateToken(String),
}

pub type TokenizerResult<T> = std::result::Result<T, TokenizerError>;

/// Core tokenizer trait. Implementations can be swapped without changing app code.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs.
    fn encode(&self, text: &str) -> TokenizerResult<Vec<i32>>;

    /// Decode a complete sequence of tokens into text.
    fn decode(&self, tokens: &[i32]) -> TokenizerResult<String>;

    /// Decode a single token and append it to the streaming state.
    /// Returns the text this token contributed (possibly empty).
    fn decode_token(&self, token: i32, state: &mut DecodingState) -> TokenizerResult<String>;

    /// Get vocabulary size.
    fn vocab_size(&self) -> usize;
}

/// Streaming decoding state.
#[derive(Debug, Clone, Default)]
pub struct DecodingState {
    buffer: String,
    tokens_seen: usize,
}

impl DecodingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text emitted so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Number of tokens fed through this state, including elided ones.
    pub fn tokens_seen(&self) -> usize {
        self.tokens_seen
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.tokens_seen = 0;
    }
}
