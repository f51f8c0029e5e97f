//! Session and model configuration.
//!
//! [`ModelConfig`] is read from the JSON config file that ships next to the
//! model. [`InferenceSettings`] is the part a caller may change at any time.
//! [`SessionConfig`] combines both and is what the forward pass sees.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Context window used when the config file does not name one.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 2048;
/// Vocabulary size used when the config file does not name one.
pub const DEFAULT_VOCAB_SIZE: usize = 32000;
/// Largest vocabulary a config file may declare.
pub const MAX_VOCAB_SIZE: usize = 1 << 20;
pub const DEFAULT_THREAD_COUNT: usize = 4;
/// Memory budget for the numeric runtime, in megabytes.
pub const DEFAULT_MEMORY_LIMIT_MB: usize = 1024;

/// Numeric precision requested from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp32,
    #[default]
    Fp16,
    Int8,
}

impl Precision {
    /// Bytes used to store one weight at this precision.
    pub fn bytes_per_weight(self) -> usize {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 => 2,
            Precision::Int8 => 1,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fp32 => write!(f, "fp32"),
            Precision::Fp16 => write!(f, "fp16"),
            Precision::Int8 => write!(f, "int8"),
        }
    }
}

impl FromStr for Precision {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fp32" => Ok(Precision::Fp32),
            "fp16" => Ok(Precision::Fp16),
            "int8" => Ok(Precision::Int8),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown precision mode '{other}' (expected fp32, fp16 or int8)"
            ))),
        }
    }
}

/// Model metadata loaded from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Maximum sequence length (context window).
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Width of every logit vector the model produces.
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,

    /// Display name reported by model info.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable parameter count (e.g. "2B").
    #[serde(default = "default_parameters_count")]
    pub parameters_count: String,
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}
fn default_vocab_size() -> usize {
    DEFAULT_VOCAB_SIZE
}
fn default_model_name() -> String {
    "Gemma 2B Instruct".to_string()
}
fn default_version() -> String {
    "1.0.0".to_string()
}
fn default_parameters_count() -> String {
    "2B".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: default_max_sequence_length(),
            vocab_size: default_vocab_size(),
            model_name: default_model_name(),
            version: default_version(),
            parameters_count: default_parameters_count(),
        }
    }
}

impl ModelConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&raw)
            .map_err(|e| EngineError::ConfigLoad(format!("{}: {e}", path.display())))?;
        tracing::debug!(
            path = %path.display(),
            max_sequence_length = config.max_sequence_length,
            vocab_size = config.vocab_size,
            "model configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate config JSON. Absent fields fall back to defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ModelConfig = serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigLoad(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sequence_length == 0 {
            return Err(EngineError::ConfigLoad(
                "max_sequence_length must be > 0".into(),
            ));
        }
        if self.vocab_size == 0 {
            return Err(EngineError::ConfigLoad("vocab_size must be > 0".into()));
        }
        if self.vocab_size > MAX_VOCAB_SIZE {
            return Err(EngineError::ConfigLoad(format!(
                "vocab_size {} exceeds the maximum of {MAX_VOCAB_SIZE}",
                self.vocab_size
            )));
        }
        Ok(())
    }
}

/// Runtime settings a caller may change at any point in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSettings {
    /// Request the accelerated execution backend.
    #[serde(rename = "useGPU", default)]
    pub use_acceleration: bool,

    #[serde(rename = "threadsCount", default = "default_thread_count")]
    pub thread_count: usize,

    /// Memory budget for the runtime, in megabytes.
    #[serde(rename = "memoryLimit", default = "default_memory_limit_mb")]
    pub memory_limit_mb: usize,

    #[serde(rename = "precisionMode", default)]
    pub precision: Precision,
}

fn default_thread_count() -> usize {
    DEFAULT_THREAD_COUNT
}
fn default_memory_limit_mb() -> usize {
    DEFAULT_MEMORY_LIMIT_MB
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            use_acceleration: false,
            thread_count: DEFAULT_THREAD_COUNT,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            precision: Precision::default(),
        }
    }
}

impl InferenceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acceleration(mut self, enabled: bool) -> Self {
        self.use_acceleration = enabled;
        self
    }

    pub fn with_thread_count(mut self, n: usize) -> Self {
        self.thread_count = n;
        self
    }

    pub fn with_memory_limit_mb(mut self, mb: usize) -> Self {
        self.memory_limit_mb = mb;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Memory budget in bytes.
    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_count == 0 {
            return Err(EngineError::InvalidRequest(
                "thread count must be at least 1".into(),
            ));
        }
        if self.memory_limit_mb == 0 {
            return Err(EngineError::InvalidRequest(
                "memory limit must be at least 1 MB".into(),
            ));
        }
        Ok(())
    }
}

/// Everything the decode loop and the forward pass read on each call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub settings: InferenceSettings,

    /// Maximum sequence length (context window).
    pub max_sequence_length: usize,

    pub vocab_size: usize,

    /// Sampler seed. `None` seeds from the clock at initialize time.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settings: InferenceSettings::default(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            vocab_size: DEFAULT_VOCAB_SIZE,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: InferenceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Copy the model-derived fields out of a loaded config file.
    pub fn apply_model_config(&mut self, model: &ModelConfig) {
        self.max_sequence_length = model.max_sequence_length;
        self.vocab_size = model.vocab_size;
    }
}
