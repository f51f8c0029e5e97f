//! Bridge error handling and rejection mapping.

use edgegen_engine::EngineError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("a request is already queued, try again later")]
    Busy,

    #[error("session worker is not running")]
    WorkerUnavailable,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Serializable rejection handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub message: String,
    pub code: &'static str,
}

impl BridgeError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Engine(EngineError::ConfigLoad(_)) => "CONFIG_LOAD_ERROR",
            BridgeError::Engine(EngineError::ModelLoad(_)) => "MODEL_LOAD_ERROR",
            BridgeError::Engine(EngineError::NotInitialized) => "NOT_INITIALIZED",
            BridgeError::Engine(EngineError::InvalidRequest(_))
            | BridgeError::InvalidRequest(_) => "INVALID_REQUEST",
            BridgeError::Engine(EngineError::Inference(_)) => "INFERENCE_ERROR",
            BridgeError::Engine(EngineError::Tokenization(_)) => "TOKENIZATION_ERROR",
            BridgeError::Engine(EngineError::InvalidState { .. }) => "INVALID_STATE",
            BridgeError::Busy => "BUSY",
            BridgeError::WorkerUnavailable => "WORKER_UNAVAILABLE",
        }
    }

    pub fn to_rejection(&self) -> Rejection {
        let message = match self {
            BridgeError::Engine(EngineError::NotInitialized) => {
                "Model not initialized. Call initialize() first.".to_string()
            }
            other => other.to_string(),
        };
        Rejection {
            message,
            code: self.code(),
        }
    }
}

impl From<BridgeError> for Rejection {
    fn from(err: BridgeError) -> Self {
        err.to_rejection()
    }
}
