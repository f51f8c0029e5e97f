//! Request/response records exchanged with callers.
//!
//! Field names are camelCase on the wire. Optional request fields fall back
//! to the documented defaults.

use chrono::{DateTime, Utc};
use edgegen_engine::InferenceSettings;
use edgegen_runtime::{HardwareInfo, PerformanceMetrics};
use edgegen_session::{ModelInfo, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_PATH: &str = "models/gemma-2b-it-q4.onnx";
pub const DEFAULT_CONFIG_PATH: &str = "models/gemma-config.json";

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}
fn default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Model and config references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFiles {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_config_path")]
    pub config_path: String,
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            config_path: default_config_path(),
        }
    }
}

impl ModelFiles {
    pub fn new(model_path: impl Into<String>, config_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            config_path: config_path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub text: String,
    /// Milliseconds.
    pub execution_time: u64,
    pub tokens_generated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Trimmed assistant reply.
    pub response: String,
    /// Milliseconds.
    pub execution_time: u64,
    pub tokens_generated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfoResponse {
    pub model_name: String,
    pub version: String,
    pub is_ready: bool,
    /// Bytes.
    pub memory_usage: u64,
    pub parameters_count: String,
}

impl From<ModelInfo> for ModelInfoResponse {
    fn from(info: ModelInfo) -> Self {
        Self {
            model_name: info.name,
            version: info.version,
            is_ready: info.ready,
            memory_usage: info.memory_usage_bytes,
            parameters_count: info.parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    /// Milliseconds.
    pub average_inference_time: f64,
    pub total_inferences: u64,
    /// Bytes.
    pub memory_peak: u64,
    pub battery_impact: String,
}

impl From<PerformanceMetrics> for MetricsResponse {
    fn from(metrics: PerformanceMetrics) -> Self {
        Self {
            battery_impact: metrics.battery_impact().to_string(),
            average_inference_time: metrics.average_latency_ms,
            total_inferences: metrics.total_inferences,
            memory_peak: metrics.peak_memory_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureResponse {
    pub success: bool,
    pub applied_settings: InferenceSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareResponse {
    pub available: bool,
    #[serde(rename = "type")]
    pub backend: String,
    pub device_info: String,
}

impl From<HardwareInfo> for HardwareResponse {
    fn from(info: HardwareInfo) -> Self {
        Self {
            available: info.available,
            backend: info.backend.to_string(),
            device_info: info.device,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFilesResponse {
    pub model_exists: bool,
    pub config_exists: bool,
    /// Bytes, 0 when the model is missing.
    pub model_size: u64,
    /// Model file modification time, when the platform reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoResponse {
    pub os: String,
    pub arch: String,
    pub cpu_cores: usize,
    /// Bytes, 0 when unknown.
    pub available_memory: u64,
    pub has_acceleration: bool,
    pub supported_features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_defaults() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": "Hi"}"#).unwrap();
        assert_eq!(req.max_tokens, 2048);
        assert_eq!(req.temperature, 0.7);
    }

    #[test]
    fn model_files_defaults() {
        let files: ModelFiles = serde_json::from_str("{}").unwrap();
        assert_eq!(files.model_path, "models/gemma-2b-it-q4.onnx");
        assert_eq!(files.config_path, "models/gemma-config.json");
    }

    #[test]
    fn chat_request_parses_roles() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"messages": [{"role": "system", "content": "Be brief"}, {"role": "user", "content": "Hi"}], "maxTokens": 16}"#,
        )
        .unwrap();
        assert_eq!(req.messages[0], ChatMessage::system("Be brief"));
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.max_tokens, 16);
    }

    #[test]
    fn unknown_role_rejected() {
        let parsed = serde_json::from_str::<ChatMessage>(r#"{"role": "tool", "content": "x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn responses_use_camel_case() {
        let json = serde_json::to_value(GenerateResponse {
            text: "ok".into(),
            execution_time: 12,
            tokens_generated: 0,
        })
        .unwrap();
        assert_eq!(json["executionTime"], 12);
        assert_eq!(json["tokensGenerated"], 0);

        let json = serde_json::to_value(ModelInfoResponse::from(ModelInfo::default())).unwrap();
        assert_eq!(json["modelName"], "Not Initialized");
        assert_eq!(json["isReady"], false);
        assert_eq!(json["parametersCount"], "0");
    }

    #[test]
    fn configure_echo_uses_caller_keys() {
        let json = serde_json::to_value(ConfigureResponse {
            success: true,
            applied_settings: InferenceSettings::default(),
        })
        .unwrap();
        let applied = &json["appliedSettings"];
        assert_eq!(applied["useGPU"], false);
        assert_eq!(applied["threadsCount"], 4);
        assert_eq!(applied["memoryLimit"], 1024);
        assert_eq!(applied["precisionMode"], "fp16");
    }

    #[test]
    fn metrics_include_battery_impact() {
        let response = MetricsResponse::from(PerformanceMetrics {
            average_latency_ms: 750.0,
            total_inferences: 2,
            peak_memory_bytes: 10,
        });
        assert_eq!(response.battery_impact, "Medium");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["averageInferenceTime"], 750.0);
        assert_eq!(json["memoryPeak"], 10);
    }

    #[test]
    fn hardware_backend_serialized_as_type() {
        let json = serde_json::to_value(HardwareResponse {
            available: false,
            backend: "cpu".into(),
            device_info: "x86_64 (linux)".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "cpu");
        assert_eq!(json["deviceInfo"], "x86_64 (linux)");
    }
}
