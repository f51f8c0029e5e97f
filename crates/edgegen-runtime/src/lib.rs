//! # edgegen-runtime
//!
//! Runtime side of the forward-pass port: backend selection, a reference CPU
//! forward pass over a memory-mapped model file, a scripted runtime for tests,
//! and the telemetry hooks (latency, tokens/sec, peak memory) that wrap each
//! generation.

pub mod backend;
pub mod cpu;
pub mod mapped;
pub mod memory;
pub mod metrics;
pub mod mock;
pub mod telemetry;

pub use backend::{Backend, BackendSelector, HardwareInfo};
pub use cpu::CpuRuntime;
pub use memory::{FixedMemory, MemoryProbe, ProcessMemory};
pub use metrics::{MetricsRecorder, PerformanceMetrics, PerformanceSample};
pub use mock::ScriptedRuntime;
pub use telemetry::{GenerationStats, GenerationTimer, LogTelemetry, NoopTelemetry, TelemetryHook};
