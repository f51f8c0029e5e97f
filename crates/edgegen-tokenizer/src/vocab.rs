//! Bidirectional token/id table.

use std::collections::HashMap;

use crate::{TokenizerError, TokenizerResult};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const BOS_TOKEN: &str = "<bos>";
pub const EOS_TOKEN: &str = "<eos>";

/// Reserved tokens in id order: pad=0, unk=1, bos=2, eos=3.
const RESERVED: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, BOS_TOKEN, EOS_TOKEN];

/// Literal characters in id order, starting right after the reserved tokens.
pub const DEFAULT_CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .!?,:;-()[]{}\"'";

/// Whether a token is delimiter markup rather than literal text.
pub fn is_reserved(token: &str) -> bool {
    token.len() > 2 && token.starts_with('<') && token.ends_with('>')
}

/// Token string ⇄ id mapping. Ids are assigned once at construction and
/// never change afterwards.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, i32>,
    id_to_token: HashMap<i32, String>,
    pad_id: i32,
    unk_id: i32,
    bos_id: i32,
    eos_id: i32,
}

impl Vocabulary {
    /// Build the default vocabulary, checking it fits in `vocab_size` ids.
    pub fn new(vocab_size: usize) -> TokenizerResult<Self> {
        Self::from_charset(DEFAULT_CHARSET, vocab_size)
    }

    /// Build from an explicit character set. Characters are numbered in
    /// iteration order after the four reserved tokens.
    pub fn from_charset(charset: &str, vocab_size: usize) -> TokenizerResult<Self> {
        let required = RESERVED.len() + charset.chars().count();
        if required > vocab_size {
            return Err(TokenizerError::VocabularyTooSmall {
                required,
                configured: vocab_size,
            });
        }

        let mut token_to_id = HashMap::with_capacity(required);
        let mut id_to_token = HashMap::with_capacity(required);

        let reserved = RESERVED.iter().map(|s| s.to_string());
        let literals = charset.chars().map(|c| c.to_string());
        for (id, token) in reserved.chain(literals).enumerate() {
            let id = id as i32;
            if token_to_id.insert(token.clone(), id).is_some() {
                return Err(TokenizerError::DuplicateToken(token));
            }
            id_to_token.insert(id, token);
        }

        tracing::debug!(entries = token_to_id.len(), vocab_size, "vocabulary built");

        Ok(Self {
            token_to_id,
            id_to_token,
            pad_id: 0,
            unk_id: 1,
            bos_id: 2,
            eos_id: 3,
        })
    }

    pub fn id(&self, token: &str) -> Option<i32> {
        self.token_to_id.get(token).copied()
    }

    pub fn token(&self, id: i32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    /// Id for a single literal character, if supported.
    pub fn char_id(&self, ch: char) -> Option<i32> {
        let mut buf = [0u8; 4];
        self.id(ch.encode_utf8(&mut buf))
    }

    pub fn pad_id(&self) -> i32 {
        self.pad_id
    }

    pub fn unk_id(&self) -> i32 {
        self.unk_id
    }

    pub fn bos_id(&self) -> i32 {
        self.bos_id
    }

    pub fn eos_id(&self) -> i32 {
        self.eos_id
    }

    /// Number of entries (reserved + literal).
    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_fixed() {
        let vocab = Vocabulary::new(128).unwrap();
        assert_eq!(vocab.id(PAD_TOKEN), Some(0));
        assert_eq!(vocab.id(UNK_TOKEN), Some(1));
        assert_eq!(vocab.id(BOS_TOKEN), Some(2));
        assert_eq!(vocab.id(EOS_TOKEN), Some(3));
    }

    #[test]
    fn literals_start_after_reserved() {
        let vocab = Vocabulary::new(128).unwrap();
        assert_eq!(vocab.char_id('a'), Some(4));
        assert_eq!(vocab.char_id('z'), Some(29));
        assert_eq!(vocab.char_id('A'), Some(30));
        assert_eq!(vocab.char_id('0'), Some(56));
        assert_eq!(vocab.char_id(' '), Some(66));
        assert_eq!(vocab.char_id('\''), Some(81));
        assert_eq!(vocab.len(), 82);
    }

    #[test]
    fn every_id_maps_back() {
        let vocab = Vocabulary::new(82).unwrap();
        for id in 0..vocab.len() as i32 {
            let token = vocab.token(id).expect("id without inverse entry");
            assert_eq!(vocab.id(token), Some(id));
        }
    }

    #[test]
    fn vocab_size_bounds_the_table() {
        let err = Vocabulary::new(81).unwrap_err();
        assert_eq!(
            err,
            TokenizerError::VocabularyTooSmall {
                required: 82,
                configured: 81
            }
        );
    }

    #[test]
    fn duplicate_characters_rejected() {
        let err = Vocabulary::from_charset("abca", 100).unwrap_err();
        assert_eq!(err, TokenizerError::DuplicateToken("a".into()));
    }

    #[test]
    fn reserved_markup_detection() {
        assert!(is_reserved("<eos>"));
        assert!(is_reserved(PAD_TOKEN));
        assert!(!is_reserved("<"));
        assert!(!is_reserved("a"));
        assert!(!is_reserved("<>"));
    }
}
