//! Reference CPU forward pass.
//!
//! A tiny deterministic model used when no external numeric runtime is wired
//! in. The model file is memory-mapped and its contents seed the weights, so
//! the same file always produces the same logits.
//!
//! Per position: causal mean of token embeddings → RMS norm → projection to
//! vocabulary logits. Rows are computed on up to `thread_count` threads.

use std::path::Path;

use edgegen_engine::{
    EngineError, ForwardPass, Logits, ModelRuntime, Precision, Result, SessionConfig, TokenId,
};

use crate::backend::{Backend, BackendSelector};
use crate::mapped::MappedFile;

/// Width of the hidden state.
const HIDDEN_DIM: usize = 16;
const NORM_EPS: f32 = 1e-5;

/// Estimated weight memory for a model of this vocabulary at this precision,
/// or `None` when it does not fit in `usize`.
pub fn estimated_weight_bytes(vocab_size: usize, precision: Precision) -> Option<usize> {
    // Embedding table + output projection.
    vocab_size
        .checked_mul(2 * HIDDEN_DIM)?
        .checked_mul(precision.bytes_per_weight())
}

/// Runtime that opens [`CpuForwardPass`] ports.
#[derive(Debug, Clone, Default)]
pub struct CpuRuntime;

impl CpuRuntime {
    pub fn new() -> Self {
        Self
    }

    pub fn backends() -> &'static [Backend] {
        &[Backend::Cpu]
    }

    pub fn selector() -> BackendSelector {
        BackendSelector::new(Self::backends())
    }
}

impl ModelRuntime for CpuRuntime {
    fn open(&self, model_path: &Path, config: &SessionConfig) -> Result<Box<dyn ForwardPass>> {
        config
            .settings
            .validate()
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;
        let backend = Self::selector().select(config.settings.use_acceleration);
        if config.settings.use_acceleration && backend == Backend::Cpu {
            tracing::warn!("accelerated execution requested but unavailable, using cpu");
        }

        let mapped = MappedFile::open(model_path)?;

        let budget = config.settings.memory_limit_bytes();
        match estimated_weight_bytes(config.vocab_size, config.settings.precision) {
            Some(required) if required <= budget => {}
            Some(required) => {
                return Err(EngineError::ModelLoad(format!(
                    "model needs ~{required} bytes at {}, over the {} MB budget",
                    config.settings.precision, config.settings.memory_limit_mb
                )));
            }
            None => {
                return Err(EngineError::ModelLoad(format!(
                    "vocab_size {} is too large to allocate",
                    config.vocab_size
                )));
            }
        }

        let seed = fnv1a(mapped.as_bytes());
        tracing::debug!(
            path = %model_path.display(),
            bytes = mapped.size(),
            %backend,
            threads = config.settings.thread_count,
            precision = %config.settings.precision,
            "reference model opened"
        );

        Ok(Box::new(CpuForwardPass::new(
            mapped,
            seed,
            config.vocab_size,
            backend,
        )))
    }

    fn name(&self) -> &str {
        "cpu-reference"
    }
}

/// Deterministic weight generator (xorshift64).
struct WeightRng {
    state: u64,
}

impl WeightRng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_f32(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        // Small magnitude weights for stability
        ((self.state >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.2
    }

    fn fill(&mut self, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.next_f32()).collect()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn rms_norm(x: &[f32], eps: f32) -> Vec<f32> {
    let mean_sq = x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32;
    let inv = 1.0 / (mean_sq + eps).sqrt();
    x.iter().map(|v| v * inv).collect()
}

/// `row = ctx @ W` where W is `[HIDDEN_DIM, vocab]` row-major.
fn project(ctx: &[f32], w: &[f32], row: &mut [f32]) {
    let vocab = row.len();
    for (i, &c) in ctx.iter().enumerate() {
        let weights = &w[i * vocab..(i + 1) * vocab];
        for (out, &wv) in row.iter_mut().zip(weights) {
            *out += c * wv;
        }
    }
}

/// Port over one opened reference model.
pub struct CpuForwardPass {
    /// Keeps the model file mapped for the lifetime of the port.
    _model: MappedFile,
    backend: Backend,
    vocab_size: usize,
    /// `[vocab, HIDDEN_DIM]`
    embeddings: Vec<f32>,
    /// `[HIDDEN_DIM, vocab]`
    lm_head: Vec<f32>,
}

impl CpuForwardPass {
    fn new(model: MappedFile, seed: u64, vocab_size: usize, backend: Backend) -> Self {
        let mut rng = WeightRng::new(seed);
        Self {
            embeddings: rng.fill(vocab_size * HIDDEN_DIM),
            lm_head: rng.fill(HIDDEN_DIM * vocab_size),
            _model: model,
            backend,
            vocab_size,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    fn embed(&self, id: usize) -> &[f32] {
        &self.embeddings[id * HIDDEN_DIM..(id + 1) * HIDDEN_DIM]
    }

    /// Normalized causal-mean context for every position, flattened.
    fn contexts(&self, tokens: &[TokenId]) -> Result<Vec<f32>> {
        let mut contexts = Vec::with_capacity(tokens.len() * HIDDEN_DIM);
        let mut running = [0.0f32; HIDDEN_DIM];

        for (pos, &token) in tokens.iter().enumerate() {
            let id = usize::try_from(token)
                .ok()
                .filter(|&id| id < self.vocab_size)
                .ok_or_else(|| {
                    EngineError::Inference(format!(
                        "token id {token} at position {pos} outside vocabulary of {}",
                        self.vocab_size
                    ))
                })?;

            for (acc, &e) in running.iter_mut().zip(self.embed(id)) {
                *acc += e;
            }
            let scale = 1.0 / (pos + 1) as f32;
            let mean: Vec<f32> = running.iter().map(|v| v * scale).collect();
            contexts.extend(rms_norm(&mean, NORM_EPS));
        }

        Ok(contexts)
    }
}

impl ForwardPass for CpuForwardPass {
    fn forward(&mut self, tokens: &[TokenId], config: &SessionConfig) -> Result<Logits> {
        let positions = tokens.len();
        if positions == 0 {
            return Err(EngineError::Inference("empty input sequence".into()));
        }
        if positions > config.max_sequence_length {
            return Err(EngineError::Inference(format!(
                "sequence length {positions} exceeds context window {}",
                config.max_sequence_length
            )));
        }
        if config.vocab_size != self.vocab_size {
            return Err(EngineError::Inference(format!(
                "model opened with vocab_size {}, session now reports {}",
                self.vocab_size, config.vocab_size
            )));
        }

        let contexts = self.contexts(tokens)?;
        let vocab = self.vocab_size;
        let mut out = vec![0.0f32; positions * vocab];

        let threads = config.settings.thread_count.clamp(1, positions);
        let rows_per_thread = positions.div_ceil(threads);
        let lm_head = &self.lm_head;

        std::thread::scope(|s| {
            let ctx_chunks = contexts.chunks(rows_per_thread * HIDDEN_DIM);
            let out_chunks = out.chunks_mut(rows_per_thread * vocab);
            for (ctx_chunk, out_chunk) in ctx_chunks.zip(out_chunks) {
                s.spawn(move || {
                    for (ctx, row) in ctx_chunk
                        .chunks(HIDDEN_DIM)
                        .zip(out_chunk.chunks_mut(vocab))
                    {
                        project(ctx, lm_head, row);
                    }
                });
            }
        });

        Logits::new(out, positions, vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegen_engine::InferenceSettings;
    use std::io::Write;

    fn model_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    fn config(vocab_size: usize) -> SessionConfig {
        SessionConfig {
            vocab_size,
            max_sequence_length: 32,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn forward_returns_one_row_per_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"tiny model");
        let cfg = config(100);
        let mut port = CpuRuntime::new().open(&path, &cfg).unwrap();

        let logits = port.forward(&[2, 10, 11, 12], &cfg).unwrap();
        assert_eq!(logits.positions(), 4);
        assert_eq!(logits.vocab_size(), 100);
        assert!(logits.last().unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn same_file_same_logits() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"deterministic");
        let cfg = config(90);

        let mut a = CpuRuntime::new().open(&path, &cfg).unwrap();
        let mut b = CpuRuntime::new().open(&path, &cfg).unwrap();
        assert_eq!(
            a.forward(&[2, 5, 6], &cfg).unwrap(),
            b.forward(&[2, 5, 6], &cfg).unwrap()
        );
    }

    #[test]
    fn different_files_different_logits() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(90);
        let mut a = CpuRuntime::new()
            .open(&model_file(&dir, "a.bin", b"model a"), &cfg)
            .unwrap();
        let mut b = CpuRuntime::new()
            .open(&model_file(&dir, "b.bin", b"model b"), &cfg)
            .unwrap();
        assert_ne!(
            a.forward(&[2, 5], &cfg).unwrap(),
            b.forward(&[2, 5], &cfg).unwrap()
        );
    }

    #[test]
    fn earlier_rows_are_causal() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"causal");
        let cfg = config(90);
        let mut port = CpuRuntime::new().open(&path, &cfg).unwrap();

        let short = port.forward(&[2, 7], &cfg).unwrap();
        let long = port.forward(&[2, 7, 8, 9], &cfg).unwrap();
        assert_eq!(short.row(1), long.row(1));
    }

    #[test]
    fn thread_count_does_not_change_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"threads");
        let single = config(90);
        let mut multi = config(90);
        multi.settings = InferenceSettings::new().with_thread_count(3);

        let mut port = CpuRuntime::new().open(&path, &single).unwrap();
        let tokens = [2, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(
            port.forward(&tokens, &single).unwrap(),
            port.forward(&tokens, &multi).unwrap()
        );
    }

    #[test]
    fn context_window_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"ctx");
        let mut cfg = config(90);
        cfg.max_sequence_length = 3;
        let mut port = CpuRuntime::new().open(&path, &cfg).unwrap();

        assert!(port.forward(&[2, 4, 5], &cfg).is_ok());
        let err = port.forward(&[2, 4, 5, 6], &cfg).unwrap_err();
        assert!(matches!(err, EngineError::Inference(_)));
    }

    #[test]
    fn out_of_vocabulary_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"oov");
        let cfg = config(90);
        let mut port = CpuRuntime::new().open(&path, &cfg).unwrap();

        assert!(port.forward(&[2, 90], &cfg).is_err());
        assert!(port.forward(&[-1], &cfg).is_err());
        assert!(port.forward(&[], &cfg).is_err());
    }

    #[test]
    fn memory_budget_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"big");
        let mut cfg = config(32000);
        cfg.settings = InferenceSettings::new()
            .with_memory_limit_mb(1)
            .with_precision(Precision::Fp32);

        let err = CpuRuntime::new().open(&path, &cfg).err().unwrap();
        assert!(matches!(err, EngineError::ModelLoad(_)));
    }

    #[test]
    fn weight_estimate_overflow_is_load_error() {
        assert_eq!(estimated_weight_bytes(100, Precision::Fp16), Some(6400));
        assert_eq!(estimated_weight_bytes(usize::MAX / 4, Precision::Fp32), None);

        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "m.bin", b"huge");
        let mut cfg = config(1 << 60);
        cfg.settings = InferenceSettings::new().with_memory_limit_mb(usize::MAX);
        let err = CpuRuntime::new().open(&path, &cfg).err().unwrap();
        assert!(matches!(err, EngineError::ModelLoad(_)));
    }

    #[test]
    fn missing_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CpuRuntime::new()
            .open(&dir.path().join("absent.onnx"), &config(90))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::ModelLoad(_)));
    }
}
