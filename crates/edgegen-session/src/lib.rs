//! # edgegen-session
//!
//! Owns a model session from load to teardown and runs the autoregressive
//! generation loop against it.
//!
//! ```text
//! Uninitialized ──initialize──▶ Loading ──ok──▶ Ready ──destroy──▶ Destroyed
//!       ▲                          │
//!       └─────────── error ────────┘
//! ```

pub mod generate;
pub mod manager;
pub mod state;

pub use generate::{decode, DecodeOutcome, DecodeParams};
pub use manager::{
    GenerationOutput, GenerationRequest, ModelInfo, SessionManager, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
pub use state::SessionState;
