//! Scripted runtime for tests and demos.
//!
//! The forward pass puts all probability mass on the token a script picks for
//! the submitted sequence, so decode loops built on it are deterministic at
//! any temperature. Counters are shared across clones so a test can keep a
//! handle after moving the runtime into a session.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgegen_engine::{
    EngineError, ForwardPass, Logits, ModelRuntime, Result, SessionConfig, TokenId,
};

/// Picks the next token from the full submitted sequence.
pub type Script = Arc<dyn Fn(&[TokenId]) -> TokenId + Send + Sync>;

/// Logit given to the scripted token. Every other entry is 0, which leaves
/// them negligible probability at any practical temperature.
pub const SCRIPTED_LOGIT: f32 = 100.0;

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    forwards: AtomicUsize,
    live_ports: AtomicUsize,
}

#[derive(Clone)]
pub struct ScriptedRuntime {
    script: Script,
    open_error: Option<EngineError>,
    fail_forward_after: Option<usize>,
    latency: Duration,
    accelerated: bool,
    counters: Arc<Counters>,
}

impl ScriptedRuntime {
    pub fn new(script: impl Fn(&[TokenId]) -> TokenId + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            open_error: None,
            fail_forward_after: None,
            latency: Duration::ZERO,
            accelerated: false,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Always emits `token`.
    pub fn constant(token: TokenId) -> Self {
        Self::new(move |_| token)
    }

    /// Emits `tokens[len % tokens.len()]` for a submitted sequence of `len`.
    pub fn cycle(tokens: Vec<TokenId>) -> Self {
        Self::new(move |seq| {
            if tokens.is_empty() {
                0
            } else {
                tokens[seq.len() % tokens.len()]
            }
        })
    }

    /// Every `open` fails with `err`.
    pub fn fail_open(mut self, err: EngineError) -> Self {
        self.open_error = Some(err);
        self
    }

    /// Forward calls beyond the first `n` (counted across all ports) fail.
    pub fn fail_forward_after(mut self, n: usize) -> Self {
        self.fail_forward_after = Some(n);
        self
    }

    /// Sleep this long inside every forward call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report an accelerated execution provider.
    pub fn with_acceleration(mut self, accelerated: bool) -> Self {
        self.accelerated = accelerated;
        self
    }

    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn forward_calls(&self) -> usize {
        self.counters.forwards.load(Ordering::SeqCst)
    }

    /// Ports opened and not yet dropped.
    pub fn live_ports(&self) -> usize {
        self.counters.live_ports.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ScriptedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRuntime")
            .field("open_error", &self.open_error)
            .field("fail_forward_after", &self.fail_forward_after)
            .field("latency", &self.latency)
            .field("accelerated", &self.accelerated)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl ModelRuntime for ScriptedRuntime {
    fn open(&self, model_path: &Path, config: &SessionConfig) -> Result<Box<dyn ForwardPass>> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        std::fs::File::open(model_path).map_err(|e| {
            EngineError::ModelLoad(format!("failed to open {}: {e}", model_path.display()))
        })?;

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.counters.live_ports.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            path = %model_path.display(),
            vocab_size = config.vocab_size,
            "scripted model opened"
        );

        Ok(Box::new(ScriptedPort {
            script: Arc::clone(&self.script),
            fail_forward_after: self.fail_forward_after,
            latency: self.latency,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_acceleration(&self) -> bool {
        self.accelerated
    }
}

struct ScriptedPort {
    script: Script,
    fail_forward_after: Option<usize>,
    latency: Duration,
    counters: Arc<Counters>,
}

impl ForwardPass for ScriptedPort {
    fn forward(&mut self, tokens: &[TokenId], config: &SessionConfig) -> Result<Logits> {
        let call = self.counters.forwards.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.fail_forward_after.is_some_and(|n| call >= n) {
            return Err(EngineError::Inference(format!("scripted failure on call {}", call + 1)));
        }
        if tokens.is_empty() {
            return Err(EngineError::Inference("empty input sequence".into()));
        }

        let vocab = config.vocab_size;
        let mut data = vec![0.0f32; tokens.len() * vocab];
        for pos in 0..tokens.len() {
            let next = (self.script)(&tokens[..=pos]);
            let id = usize::try_from(next)
                .ok()
                .filter(|&id| id < vocab)
                .ok_or_else(|| {
                    EngineError::Inference(format!(
                        "script produced token {next} outside vocabulary of {vocab}"
                    ))
                })?;
            data[pos * vocab + id] = SCRIPTED_LOGIT;
        }

        Logits::new(data, tokens.len(), vocab)
    }
}

impl Drop for ScriptedPort {
    fn drop(&mut self) {
        self.counters.live_ports.fetch_sub(1, Ordering::SeqCst);
    }
}
