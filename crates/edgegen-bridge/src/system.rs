//! Host and model-file inspection. None of this touches the session.

use std::path::Path;

use chrono::{DateTime, Utc};
use edgegen_runtime::memory::system_available_bytes;
use edgegen_runtime::HardwareInfo;

use crate::models::{ModelFilesResponse, SystemInfoResponse};

/// Report whether the model and config references exist, with the model's
/// size and modification time.
pub fn check_model_files(model_path: &Path, config_path: &Path) -> ModelFilesResponse {
    let model = std::fs::metadata(model_path).ok().filter(|m| m.is_file());
    let config_exists = std::fs::metadata(config_path)
        .map(|m| m.is_file())
        .unwrap_or(false);

    let last_modified = model
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);

    tracing::debug!(
        model = %model_path.display(),
        model_exists = model.is_some(),
        config_exists,
        "checked model files"
    );

    ModelFilesResponse {
        model_exists: model.is_some(),
        config_exists,
        model_size: model.map_or(0, |m| m.len()),
        last_modified,
    }
}

/// Describe the host.
pub fn system_info(hardware: &HardwareInfo) -> SystemInfoResponse {
    let mut supported_features: Vec<String> =
        ["cpu_inference", "quantized_models", "memory_mapped_models"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    if hardware.available {
        supported_features.push("accelerated_inference".to_string());
    }

    SystemInfoResponse {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
        available_memory: system_available_bytes().unwrap_or(0),
        has_acceleration: hardware.available,
        supported_features,
    }
}
