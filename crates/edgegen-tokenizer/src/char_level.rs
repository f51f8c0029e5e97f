//! Character-level tokenizer over a fixed [`Vocabulary`].

use crate::vocab::{is_reserved, Vocabulary};
use crate::{DecodingState, Tokenizer, TokenizerResult};

/// One token per character.
///
/// - `encode` prepends `<bos>` and maps unsupported characters to `<unk>`
/// - `decode` skips unknown ids and elides reserved tokens
/// - Deterministic; the vocabulary never grows
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    vocab: Vocabulary,
}

impl CharTokenizer {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    /// Default vocabulary sized for `vocab_size` logits.
    pub fn with_vocab_size(vocab_size: usize) -> TokenizerResult<Self> {
        Ok(Self::new(Vocabulary::new(vocab_size)?))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn bos_id(&self) -> i32 {
        self.vocab.bos_id()
    }

    pub fn eos_id(&self) -> i32 {
        self.vocab.eos_id()
    }

    /// Literal text for a token, or `None` for unmapped and reserved ids.
    fn literal(&self, id: i32) -> Option<&str> {
        self.vocab.token(id).filter(|t| !is_reserved(t))
    }
}

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> TokenizerResult<Vec<i32>> {
        let unk = self.vocab.unk_id();
        let mut ids = Vec::with_capacity(text.len() + 1);
        ids.push(self.vocab.bos_id());
        ids.extend(text.chars().map(|c| self.vocab.char_id(c).unwrap_or(unk)));
        Ok(ids)
    }

    fn decode(&self, tokens: &[i32]) -> TokenizerResult<String> {
        Ok(tokens.iter().filter_map(|&id| self.literal(id)).collect())
    }

    fn decode_token(&self, token: i32, state: &mut DecodingState) -> TokenizerResult<String> {
        state.tokens_seen += 1;
        let emitted = self.literal(token).unwrap_or_default().to_string();
        state.buffer.push_str(&emitted);
        Ok(emitted)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}
