//! Telemetry hooks for generation performance measurement.
//!
//! Provides:
//! - [`GenerationStats`]: per-call summary (latency, tokens/sec)
//! - [`TelemetryHook`] trait: callback interface for real-time reporting
//! - [`GenerationTimer`]: records timestamps and computes the summary
//! - [`NoopTelemetry`] / [`LogTelemetry`]: built-in hook implementations

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::Backend;

/// Summary of one generation call.
#[derive(Debug, Clone)]
pub struct GenerationStats {
    /// Backend the forward passes ran on.
    pub backend: Backend,
    /// Tokens in the encoded prompt (including the begin marker).
    pub prompt_tokens: usize,
    /// Tokens appended by the decode loop.
    pub generated_tokens: usize,
    /// Forward passes issued, including one that sampled end-of-sequence.
    pub forward_passes: usize,
    /// Total wall-clock time in milliseconds.
    pub elapsed_ms: f64,
    /// Generated tokens per second of wall-clock time.
    pub tokens_per_sec: f64,
}

/// Callback trait for real-time generation telemetry.
///
/// All methods have default no-op implementations so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    /// Called after each forward pass completes.
    fn on_forward_pass(&self, _step: usize, _elapsed_ms: f64) {}

    /// Called when a generation finishes successfully.
    fn on_generation_complete(&self, _stats: &GenerationStats) {}
}

/// No-op telemetry hook.
#[derive(Debug, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Keeps the last completed generation's stats for later retrieval and
/// emits a debug event for each.
#[derive(Debug, Clone, Default)]
pub struct LogTelemetry {
    last_report: Arc<Mutex<Option<GenerationStats>>>,
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the last completed generation's stats.
    pub fn last_stats(&self) -> Option<GenerationStats> {
        self.last_report.lock().ok().and_then(|s| s.clone())
    }
}

impl TelemetryHook for LogTelemetry {
    fn on_generation_complete(&self, stats: &GenerationStats) {
        tracing::debug!(
            backend = %stats.backend,
            generated = stats.generated_tokens,
            elapsed_ms = stats.elapsed_ms,
            tokens_per_sec = stats.tokens_per_sec,
            "generation complete"
        );
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(stats.clone());
        }
    }
}

/// Records timestamps during a generation to compute [`GenerationStats`].
///
/// Usage:
/// 1. Call [`GenerationTimer::start`] before encoding the prompt
/// 2. Call [`GenerationTimer::mark_forward_pass`] after each forward pass
/// 3. Call [`GenerationTimer::finish`] once the output is decoded
pub struct GenerationTimer {
    backend: Backend,
    prompt_tokens: usize,
    start: Instant,
    forward_passes: usize,
    hook: Arc<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn start(backend: Backend, hook: Arc<dyn TelemetryHook>) -> Self {
        Self {
            backend,
            prompt_tokens: 0,
            start: Instant::now(),
            forward_passes: 0,
            hook,
        }
    }

    pub fn set_prompt_tokens(&mut self, n: usize) {
        self.prompt_tokens = n;
    }

    /// Fires `on_forward_pass`.
    pub fn mark_forward_pass(&mut self) {
        self.forward_passes += 1;
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.hook.on_forward_pass(self.forward_passes, elapsed_ms);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finalize and return stats. Fires `on_generation_complete`.
    pub fn finish(self, generated_tokens: usize) -> (Duration, GenerationStats) {
        let elapsed = self.start.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let tokens_per_sec = if elapsed_ms > 0.0 && generated_tokens > 0 {
            generated_tokens as f64 / (elapsed_ms / 1000.0)
        } else {
            0.0
        };

        let stats = GenerationStats {
            backend: self.backend,
            prompt_tokens: self.prompt_tokens,
            generated_tokens,
            forward_passes: self.forward_passes,
            elapsed_ms,
            tokens_per_sec,
        };

        self.hook.on_generation_complete(&stats);
        (elapsed, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        passes: AtomicUsize,
        completions: AtomicUsize,
    }

    impl TelemetryHook for CountingHook {
        fn on_forward_pass(&self, _step: usize, _elapsed_ms: f64) {
            self.passes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_generation_complete(&self, _stats: &GenerationStats) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn timer_counts_passes_and_fires_hooks() {
        let hook = Arc::new(CountingHook::default());
        let mut timer = GenerationTimer::start(Backend::Cpu, hook.clone());
        timer.set_prompt_tokens(4);
        timer.mark_forward_pass();
        timer.mark_forward_pass();
        timer.mark_forward_pass();

        let (elapsed, stats) = timer.finish(2);
        assert_eq!(stats.prompt_tokens, 4);
        assert_eq!(stats.generated_tokens, 2);
        assert_eq!(stats.forward_passes, 3);
        assert!(stats.elapsed_ms >= 0.0);
        assert!((stats.elapsed_ms - elapsed.as_secs_f64() * 1000.0).abs() < 1e-9);
        assert_eq!(hook.passes.load(Ordering::SeqCst), 3);
        assert_eq!(hook.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_tokens_zero_throughput() {
        let timer = GenerationTimer::start(Backend::Cpu, Arc::new(NoopTelemetry));
        let (_, stats) = timer.finish(0);
        assert_eq!(stats.tokens_per_sec, 0.0);
        assert_eq!(stats.forward_passes, 0);
    }

    #[test]
    fn log_telemetry_captures_stats() {
        let log = LogTelemetry::new();
        assert!(log.last_stats().is_none());

        let timer = GenerationTimer::start(Backend::Cpu, Arc::new(log.clone()));
        timer.finish(5);

        let captured = log.last_stats().unwrap();
        assert_eq!(captured.generated_tokens, 5);
        assert_eq!(captured.backend, Backend::Cpu);
    }
}
