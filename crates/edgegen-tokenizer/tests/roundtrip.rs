//! Integration tests for edgegen-tokenizer.
//!
//! Validates:
//! - Roundtrip: decode(encode(x)) == x for text in the supported character set
//! - encode always starts with the begin-of-sequence id
//! - Lossy substitution for unsupported characters
//! - Trait object usage (dyn Tokenizer)

use edgegen_tokenizer::*;

fn tokenizer() -> CharTokenizer {
    CharTokenizer::with_vocab_size(32000).unwrap()
}

#[test]
fn roundtrip_supported_text() {
    let tok = tokenizer();
    let inputs = [
        "Hi",
        "hello world",
        "The quick brown fox jumps over the lazy dog.",
        "Take 2 pills (morning & night)?",
        "Dose: 10-20mg; [max] {once}!",
        "\"quoted\" and 'single'",
        "",
    ];
    for input in inputs {
        let supported: String = input
            .chars()
            .filter(|c| DEFAULT_CHARSET.contains(*c))
            .collect();
        let encoded = tok.encode(&supported).unwrap();
        let decoded = tok.decode(&encoded).unwrap();
        assert_eq!(decoded, supported, "roundtrip failed for: {supported:?}");
    }
}

#[test]
fn roundtrip_every_supported_character() {
    let tok = tokenizer();
    let encoded = tok.encode(DEFAULT_CHARSET).unwrap();
    assert_eq!(encoded.len(), DEFAULT_CHARSET.chars().count() + 1);
    assert_eq!(tok.decode(&encoded).unwrap(), DEFAULT_CHARSET);
}

#[test]
fn encode_starts_with_bos() {
    let tok = tokenizer();
    for input in ["", "a", "ümlaut", "line\nbreak", "12345"] {
        let ids = tok.encode(input).unwrap();
        assert_eq!(ids[0], tok.bos_id(), "missing bos for {input:?}");
    }
}

#[test]
fn scenario_hi() {
    let tok = tokenizer();
    let vocab = tok.vocabulary();
    let h = vocab.char_id('H').unwrap();
    let i = vocab.char_id('i').unwrap();

    assert_eq!(tok.encode("Hi").unwrap(), vec![2, h, i]);
    assert_eq!(tok.decode(&[h, i]).unwrap(), "Hi");
}

#[test]
fn unsupported_characters_are_lossy_not_errors() {
    let tok = tokenizer();
    let ids = tok.encode("café\t").unwrap();
    let unk = tok.vocabulary().unk_id();
    assert_eq!(&ids[4..], &[unk, unk]);
    assert_eq!(tok.decode(&ids).unwrap(), "caf");
}

#[test]
fn eos_is_never_emitted_as_text() {
    let tok = tokenizer();
    let mut ids = tok.encode("done").unwrap();
    ids.push(tok.eos_id());
    assert_eq!(tok.decode(&ids).unwrap(), "done");
}

#[test]
fn ids_are_stable_across_instances() {
    let a = tokenizer();
    let b = tokenizer();
    assert_eq!(
        a.encode("Stable ids 42").unwrap(),
        b.encode("Stable ids 42").unwrap()
    );
}

#[test]
fn works_as_trait_object() {
    let tok: Box<dyn Tokenizer> = Box::new(tokenizer());
    let ids = tok.encode("abc").unwrap();
    let mut state = DecodingState::new();
    let streamed: String = ids
        .iter()
        .map(|&id| tok.decode_token(id, &mut state).unwrap())
        .collect();
    assert_eq!(streamed, "abc");
    assert_eq!(state.buffer(), tok.decode(&ids).unwrap());
}

#[test]
fn too_small_vocab_size_is_rejected() {
    let err = CharTokenizer::with_vocab_size(10).unwrap_err();
    assert!(matches!(err, TokenizerError::VocabularyTooSmall { .. }));
}
