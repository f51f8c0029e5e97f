//! Per-session performance accounting.
//!
//! One [`PerformanceSample`] is recorded for every successful generation.
//! Samples accumulate for the life of the session and are cleared only when
//! the session is destroyed.

use std::time::Duration;

/// One latency measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    pub latency_ms: f64,
}

/// Aggregate view over all recorded samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMetrics {
    /// Arithmetic mean of every recorded latency (0 when none).
    pub average_latency_ms: f64,
    pub total_inferences: u64,
    /// Highest memory-in-use observation, 0 when the platform cannot report.
    pub peak_memory_bytes: u64,
}

impl PerformanceMetrics {
    /// Coarse battery-impact classification from the average latency.
    pub fn battery_impact(&self) -> &'static str {
        match self.average_latency_ms {
            ms if ms < 500.0 => "Low",
            ms if ms < 2000.0 => "Medium",
            _ => "High",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    samples: Vec<PerformanceSample>,
    peak_memory_bytes: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed generation.
    pub fn record(&mut self, elapsed: Duration, memory_in_use: Option<u64>) {
        self.samples.push(PerformanceSample {
            latency_ms: elapsed.as_secs_f64() * 1000.0,
        });
        if let Some(bytes) = memory_in_use {
            self.peak_memory_bytes = self.peak_memory_bytes.max(bytes);
        }
    }

    pub fn samples(&self) -> &[PerformanceSample] {
        &self.samples
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        let total = self.samples.len();
        let average_latency_ms = if total == 0 {
            0.0
        } else {
            self.samples.iter().map(|s| s.latency_ms).sum::<f64>() / total as f64
        };
        PerformanceMetrics {
            average_latency_ms,
            total_inferences: total as u64,
            peak_memory_bytes: self.peak_memory_bytes,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.peak_memory_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recorder_reports_zeroes() {
        let metrics = MetricsRecorder::new().snapshot();
        assert_eq!(metrics, PerformanceMetrics::default());
    }

    #[test]
    fn average_is_mean_of_all_samples() {
        let mut recorder = MetricsRecorder::new();
        recorder.record(Duration::from_millis(10), None);
        recorder.record(Duration::from_millis(20), None);
        recorder.record(Duration::from_millis(60), None);

        let metrics = recorder.snapshot();
        assert_eq!(metrics.total_inferences, 3);
        assert!((metrics.average_latency_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn peak_memory_keeps_maximum() {
        let mut recorder = MetricsRecorder::new();
        recorder.record(Duration::ZERO, Some(300));
        recorder.record(Duration::ZERO, Some(900));
        recorder.record(Duration::ZERO, Some(500));
        recorder.record(Duration::ZERO, None);
        assert_eq!(recorder.snapshot().peak_memory_bytes, 900);
    }

    #[test]
    fn unreported_memory_stays_zero() {
        let mut recorder = MetricsRecorder::new();
        recorder.record(Duration::from_millis(1), None);
        assert_eq!(recorder.snapshot().peak_memory_bytes, 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut recorder = MetricsRecorder::new();
        recorder.record(Duration::from_millis(5), Some(64));
        recorder.reset();
        assert!(recorder.samples().is_empty());
        assert_eq!(recorder.snapshot(), PerformanceMetrics::default());
    }

    #[test]
    fn battery_impact_buckets() {
        let mut m = PerformanceMetrics::default();
        assert_eq!(m.battery_impact(), "Low");
        m.average_latency_ms = 1500.0;
        assert_eq!(m.battery_impact(), "Medium");
        m.average_latency_ms = 2000.0;
        assert_eq!(m.battery_impact(), "High");
    }
}
