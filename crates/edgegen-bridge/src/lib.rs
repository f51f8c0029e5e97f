//! # edgegen-bridge
//!
//! The request/response surface callers use to drive a session: initialize,
//! generate, chat, model info, performance metrics, reconfigure and destroy,
//! plus hardware, model-file and system inspection.
//!
//! All session work is serialized through one worker thread (see
//! [`worker`]), so at most one generation is ever in flight.

pub mod chat;
pub mod error;
pub mod models;
pub mod system;
pub mod worker;

pub use chat::{estimate_token_count, format_chat_prompt};
pub use error::{BridgeError, Rejection, Result};
pub use models::*;
pub use worker::{Bridge, Pending, DEFAULT_QUEUE_CAPACITY};
