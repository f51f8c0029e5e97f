//! Session lifecycle management.
//!
//! A [`SessionManager`] owns one model session: the tokenizer, the opened
//! forward-pass port, the sampler and the metrics recorder. Every operation
//! takes `&mut self`, so at most one generation can run at a time.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use edgegen_engine::{
    EngineError, ForwardPass, InferenceSettings, ModelConfig, ModelRuntime, Result, SessionConfig,
    TokenId,
};
use edgegen_runtime::{
    Backend, BackendSelector, GenerationTimer, HardwareInfo, MemoryProbe, MetricsRecorder,
    NoopTelemetry, PerformanceMetrics, ProcessMemory, TelemetryHook,
};
use edgegen_sampling::Sampler;
use edgegen_tokenizer::{CharTokenizer, DecodingState, Tokenizer};
use uuid::Uuid;

use crate::generate::{decode, DecodeParams};
use crate::state::SessionState;

pub const DEFAULT_MAX_TOKENS: usize = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Warm-up run at the end of `initialize`.
const WARMUP_PROMPT: &str = "Hello";
const WARMUP_MAX_TOKENS: usize = 10;
const WARMUP_TEMPERATURE: f32 = 0.7;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationRequest {
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

    /// Reject requests that must never reach the session.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(EngineError::InvalidRequest("prompt is required".into()));
        }
        if self.temperature.is_nan() || self.temperature < 0.0 {
            return Err(EngineError::InvalidRequest(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// What one successful `generate` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    /// Generated ids, prompt excluded.
    pub tokens: Vec<TokenId>,
    /// Encoded prompt length, begin marker included.
    pub prompt_tokens: usize,
    pub stopped_on_eos: bool,
    pub elapsed: Duration,
}

/// Model description for callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub ready: bool,
    pub memory_usage_bytes: u64,
    pub parameters: String,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: "Not Initialized".to_string(),
            version: "N/A".to_string(),
            ready: false,
            memory_usage_bytes: 0,
            parameters: "0".to_string(),
        }
    }
}

/// Everything acquired by a successful load. Dropping it releases the port.
struct LoadedModel {
    model_config: ModelConfig,
    tokenizer: CharTokenizer,
    port: Box<dyn ForwardPass>,
    backend: Backend,
}

pub struct SessionManager {
    id: Uuid,
    state: SessionState,
    config: SessionConfig,
    runtime: Arc<dyn ModelRuntime>,
    loaded: Option<LoadedModel>,
    sampler: Sampler,
    metrics: MetricsRecorder,
    memory: Arc<dyn MemoryProbe>,
    telemetry: Arc<dyn TelemetryHook>,
}

impl SessionManager {
    pub fn new(runtime: Arc<dyn ModelRuntime>, config: SessionConfig) -> Self {
        let sampler = seeded_sampler(&config);
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Uninitialized,
            config,
            runtime,
            loaded: None,
            sampler,
            metrics: MetricsRecorder::new(),
            memory: Arc::new(ProcessMemory),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    /// A fresh, uninitialized session sharing this one's runtime, settings,
    /// seed and hooks.
    pub fn renew(&self) -> Self {
        Self::new(Arc::clone(&self.runtime), self.config.clone())
            .with_memory_probe(Arc::clone(&self.memory))
            .with_telemetry(Arc::clone(&self.telemetry))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Acceleration report for the runtime this session opens ports on.
    pub fn hardware_info(&self) -> HardwareInfo {
        BackendSelector::for_runtime(self.runtime.as_ref()).hardware_info()
    }

    /// Load configuration, build the vocabulary, open the port and warm it up.
    ///
    /// Only valid from `Uninitialized`. Any failure drops everything acquired
    /// so far and leaves the session `Uninitialized` with its configuration
    /// unchanged.
    pub fn initialize(&mut self, model_path: &Path, config_path: &Path) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(EngineError::InvalidState {
                operation: "initialize",
                state: self.state.to_string(),
            });
        }

        self.state = SessionState::Loading;
        let start = Instant::now();
        tracing::debug!(session = %self.id, model = %model_path.display(), "loading model");

        match self.load(model_path, config_path) {
            Ok((loaded, config)) => {
                tracing::info!(
                    session = %self.id,
                    model = %loaded.model_config.model_name,
                    vocab_size = config.vocab_size,
                    max_sequence_length = config.max_sequence_length,
                    backend = %loaded.backend,
                    runtime = self.runtime.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "model ready"
                );
                self.config = config;
                self.loaded = Some(loaded);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "initialize failed, rolling back");
                self.state = SessionState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Each step either succeeds or returns with everything it acquired dropped.
    fn load(
        &mut self,
        model_path: &Path,
        config_path: &Path,
    ) -> Result<(LoadedModel, SessionConfig)> {
        let model_config = ModelConfig::load(config_path).inspect_err(|e| {
            tracing::error!(session = %self.id, error = %e, "config load failed");
        })?;
        let mut config = self.config.clone();
        config.apply_model_config(&model_config);
        tracing::debug!(session = %self.id, "configuration loaded");

        let tokenizer = CharTokenizer::with_vocab_size(config.vocab_size)
            .map_err(|e| EngineError::ConfigLoad(e.to_string()))?;
        tracing::debug!(session = %self.id, entries = tokenizer.vocab_size(), "vocabulary built");

        let port = self.runtime.open(model_path, &config).inspect_err(|e| {
            tracing::error!(session = %self.id, error = %e, "model open failed");
        })?;
        let backend = BackendSelector::for_runtime(self.runtime.as_ref())
            .select(config.settings.use_acceleration);
        tracing::debug!(session = %self.id, %backend, "forward pass opened");

        let mut loaded = LoadedModel {
            model_config,
            tokenizer,
            port,
            backend,
        };

        let mut sampler = seeded_sampler(&config);
        let warmup = GenerationRequest::new(WARMUP_PROMPT)
            .with_max_tokens(WARMUP_MAX_TOKENS)
            .with_temperature(WARMUP_TEMPERATURE);
        let mut timer = GenerationTimer::start(backend, Arc::new(NoopTelemetry));
        run(&mut loaded, &mut sampler, &config, &warmup, &mut timer, |_| {})
            .map_err(|e| EngineError::ModelLoad(format!("warm-up generation failed: {e}")))?;
        tracing::debug!(
            session = %self.id,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "warm-up complete"
        );

        self.sampler = sampler;
        Ok((loaded, config))
    }

    /// Run one generation and record its latency.
    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationOutput> {
        self.generate_streaming(request, |_| {})
    }

    /// Like [`generate`](Self::generate), handing each decoded piece of text to
    /// `on_text` as soon as its token is sampled.
    pub fn generate_streaming(
        &mut self,
        request: &GenerationRequest,
        on_text: impl FnMut(&str),
    ) -> Result<GenerationOutput> {
        request.validate()?;
        if self.state != SessionState::Ready {
            return Err(EngineError::NotInitialized);
        }
        let loaded = self.loaded.as_mut().ok_or(EngineError::NotInitialized)?;

        let mut timer = GenerationTimer::start(loaded.backend, Arc::clone(&self.telemetry));
        let outcome = run(loaded, &mut self.sampler, &self.config, request, &mut timer, on_text);
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "generation failed");
                return Err(e);
            }
        };

        let (elapsed, stats) = timer.finish(output.tokens.len());
        self.metrics.record(elapsed, self.memory.used_bytes());
        tracing::debug!(
            session = %self.id,
            prompt_tokens = stats.prompt_tokens,
            generated = stats.generated_tokens,
            forward_passes = stats.forward_passes,
            elapsed_ms = stats.elapsed_ms,
            "generation recorded"
        );

        Ok(GenerationOutput { elapsed, ..output })
    }

    /// Replace the inference settings. Accepted in every state; returns the
    /// settings now in effect.
    ///
    /// A port that is already open keeps the precision, memory budget and
    /// backend it was constructed with until the session is reinitialized.
    pub fn reconfigure(&mut self, settings: InferenceSettings) -> Result<InferenceSettings> {
        settings.validate()?;

        let current = &self.config.settings;
        if self.state.is_ready()
            && (current.use_acceleration != settings.use_acceleration
                || current.precision != settings.precision
                || current.memory_limit_mb != settings.memory_limit_mb)
        {
            tracing::warn!(
                session = %self.id,
                "open model keeps its construction-time precision, memory budget and backend"
            );
        }

        tracing::debug!(
            session = %self.id,
            state = %self.state,
            use_acceleration = settings.use_acceleration,
            threads = settings.thread_count,
            memory_limit_mb = settings.memory_limit_mb,
            precision = %settings.precision,
            "settings updated"
        );
        self.config.settings = settings;
        Ok(self.config.settings.clone())
    }

    /// Release the model and clear metrics. Idempotent; the session cannot be
    /// initialized again afterwards.
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.loaded = None;
        self.metrics.reset();
        self.state = SessionState::Destroyed;
        tracing::info!(session = %self.id, "session destroyed");
    }

    pub fn metrics(&self) -> Result<PerformanceMetrics> {
        if !self.state.is_ready() {
            return Err(EngineError::NotInitialized);
        }
        Ok(self.metrics.snapshot())
    }

    /// Defaults when no model is loaded.
    pub fn model_info(&self) -> ModelInfo {
        match (&self.loaded, self.state) {
            (Some(loaded), SessionState::Ready) => ModelInfo {
                name: loaded.model_config.model_name.clone(),
                version: loaded.model_config.version.clone(),
                ready: true,
                memory_usage_bytes: self.memory.used_bytes().unwrap_or(0),
                parameters: loaded.model_config.parameters_count.clone(),
            },
            _ => ModelInfo::default(),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn seeded_sampler(config: &SessionConfig) -> Sampler {
    config.seed.map_or_else(Sampler::from_clock, Sampler::new)
}

/// Encode, decode-loop and detokenize one request against a loaded model.
fn run(
    loaded: &mut LoadedModel,
    sampler: &mut Sampler,
    config: &SessionConfig,
    request: &GenerationRequest,
    timer: &mut GenerationTimer,
    mut on_text: impl FnMut(&str),
) -> Result<GenerationOutput> {
    let LoadedModel {
        tokenizer, port, ..
    } = loaded;

    let prompt = tokenizer
        .encode(&request.prompt)
        .map_err(|e| EngineError::Tokenization(e.to_string()))?;
    timer.set_prompt_tokens(prompt.len());

    let params = DecodeParams {
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        eos: tokenizer.eos_id(),
    };
    let mut stream = DecodingState::new();
    let outcome = decode(port.as_mut(), sampler, &prompt, params, config, timer, |token| {
        let piece = tokenizer
            .decode_token(token, &mut stream)
            .map_err(|e| EngineError::Tokenization(e.to_string()))?;
        if !piece.is_empty() {
            on_text(&piece);
        }
        Ok(())
    })?;

    let text = tokenizer
        .decode(&outcome.tokens)
        .map_err(|e| EngineError::Tokenization(e.to_string()))?;

    Ok(GenerationOutput {
        text,
        tokens: outcome.tokens,
        prompt_tokens: prompt.len(),
        stopped_on_eos: outcome.stopped_on_eos,
        elapsed: timer.elapsed(),
    })
}
