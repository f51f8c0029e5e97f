//! # edgegen-engine
//!
//! The "narrow waist" of the edgegen stack. Defines the error taxonomy, the
//! session configuration, and the forward-pass port that every other crate
//! depends on. Numeric runtimes plug in behind [`ModelRuntime`] without the
//! session or decode loop changing.
//!
//! ## Design Notes
//!
//! ### Exclusive Ownership
//! [`ForwardPass::forward`] takes `&mut self`. A port belongs to exactly one
//! session and is never invoked concurrently; callers that need to share a
//! session serialize access above this crate.
//!
//! ### Token Type
//! `TokenId` is aliased as `i32` to match the tokenizer crate, though token IDs
//! are logically non-negative.

pub mod config;
pub mod port;

pub use config::{
    InferenceSettings, ModelConfig, Precision, SessionConfig, DEFAULT_MAX_SEQUENCE_LENGTH,
    DEFAULT_MEMORY_LIMIT_MB, DEFAULT_THREAD_COUNT, DEFAULT_VOCAB_SIZE, MAX_VOCAB_SIZE,
};
pub use port::{ForwardPass, Logits, ModelRuntime};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Token ID type (i32 for tokenizer compat; logically non-negative).
pub type TokenId = i32;

/// Top-level error type for all engine operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("configuration load failed: {0}")]
    ConfigLoad(String),
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("model not initialized")]
    NotInitialized,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("tokenization failed: {0}")]
    Tokenization(String),
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl EngineError {
    /// Whether this error came out of `initialize` and forced a rollback.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, EngineError::ConfigLoad(_) | EngineError::ModelLoad(_))
    }
}
