//! Single-worker request queue in front of the session.
//!
//! The session lives on a dedicated OS thread so long generations never block
//! whoever dispatches requests. Requests reach it through a bounded queue and
//! are served one at a time.
//!
//! ```text
//! ┌──────────┐   bounded queue    ┌────────────────────┐
//! │  Caller   │ ──── Command ────>│  Session worker     │
//! │           │ <─── oneshot ─────│  (dedicated thread) │
//! └──────────┘                    │  Owns: Session      │
//!                                 └────────────────────┘
//! ```
//!
//! Submitting never blocks: a full queue is rejected with
//! [`BridgeError::Busy`]. Each submission returns a [`Pending`] reply that can
//! be waited on from synchronous code or awaited from async code.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use edgegen_engine::{EngineError, InferenceSettings};
use edgegen_runtime::HardwareInfo;
use edgegen_session::{GenerationRequest, SessionManager, SessionState};
use tokio::sync::oneshot;

use crate::chat::{estimate_token_count, format_chat_prompt};
use crate::error::{BridgeError, Result};
use crate::models::{
    ChatRequest, ChatResponse, ConfigureResponse, DestroyResponse, GenerateRequest,
    GenerateResponse, HardwareResponse, InitializeResponse, MetricsResponse, ModelFiles,
    ModelFilesResponse, ModelInfoResponse, SystemInfoResponse,
};

/// Requests that may wait behind the one being served.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands sent from callers to the session worker.
enum Command {
    Initialize {
        model_path: PathBuf,
        config_path: PathBuf,
        reply: Reply<InitializeResponse>,
    },
    Generate {
        request: GenerationRequest,
        reply: Reply<GenerateResponse>,
    },
    Chat {
        request: GenerationRequest,
        reply: Reply<ChatResponse>,
    },
    ModelInfo {
        reply: Reply<ModelInfoResponse>,
    },
    Metrics {
        reply: Reply<MetricsResponse>,
    },
    Configure {
        settings: InferenceSettings,
        reply: Reply<ConfigureResponse>,
    },
    Destroy {
        reply: Reply<DestroyResponse>,
    },
    Shutdown,
}

/// A reply that has not arrived yet.
#[must_use = "a pending reply does nothing unless waited on or awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block the current thread until the worker replies.
    ///
    /// Panics if called from within an async runtime; `.await` there instead.
    pub fn wait(self) -> Result<T> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(BridgeError::WorkerUnavailable))
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(BridgeError::WorkerUnavailable)))
    }
}

/// Handle to the session worker. Dropping it shuts the worker down and
/// destroys the session.
pub struct Bridge {
    cmd_tx: Sender<Command>,
    hardware: HardwareInfo,
    thread: Option<thread::JoinHandle<()>>,
}

impl Bridge {
    /// Move `session` onto a new worker thread.
    pub fn spawn(session: SessionManager) -> Result<Self> {
        Self::with_queue_capacity(session, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(session: SessionManager, capacity: usize) -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded::<Command>(capacity);
        let hardware = session.hardware_info();

        let thread = thread::Builder::new()
            .name("edgegen-session".into())
            .spawn(move || worker_loop(session, cmd_rx))
            .map_err(|e| {
                tracing::error!(error = %e, "failed to spawn session worker");
                BridgeError::WorkerUnavailable
            })?;

        Ok(Self {
            cmd_tx,
            hardware,
            thread: Some(thread),
        })
    }

    fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<Pending<T>> {
        let (reply, rx) = oneshot::channel();
        match self.cmd_tx.try_send(build(reply)) {
            Ok(()) => Ok(Pending { rx }),
            Err(TrySendError::Full(_)) => Err(BridgeError::Busy),
            Err(TrySendError::Disconnected(_)) => Err(BridgeError::WorkerUnavailable),
        }
    }

    /// Load the model. Load failures come back as `success: false`, not as
    /// errors.
    pub fn initialize(&self, files: ModelFiles) -> Result<Pending<InitializeResponse>> {
        self.submit(|reply| Command::Initialize {
            model_path: PathBuf::from(files.model_path),
            config_path: PathBuf::from(files.config_path),
            reply,
        })
    }

    pub fn generate(&self, request: GenerateRequest) -> Result<Pending<GenerateResponse>> {
        if request.prompt.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("Prompt is required".into()));
        }
        let request = to_generation(request.prompt, request.max_tokens, request.temperature)?;
        self.submit(|reply| Command::Generate { request, reply })
    }

    /// Flatten the conversation into one prompt and generate a reply.
    pub fn chat(&self, request: ChatRequest) -> Result<Pending<ChatResponse>> {
        if request.messages.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "Messages array is required and cannot be empty".into(),
            ));
        }
        let prompt = format_chat_prompt(&request.messages);
        let request = to_generation(prompt, request.max_tokens, request.temperature)?;
        self.submit(|reply| Command::Chat { request, reply })
    }

    pub fn model_info(&self) -> Result<Pending<ModelInfoResponse>> {
        self.submit(|reply| Command::ModelInfo { reply })
    }

    pub fn performance_metrics(&self) -> Result<Pending<MetricsResponse>> {
        self.submit(|reply| Command::Metrics { reply })
    }

    pub fn configure(&self, settings: InferenceSettings) -> Result<Pending<ConfigureResponse>> {
        self.submit(|reply| Command::Configure { settings, reply })
    }

    pub fn destroy(&self) -> Result<Pending<DestroyResponse>> {
        self.submit(|reply| Command::Destroy { reply })
    }

    pub fn hardware_acceleration(&self) -> HardwareResponse {
        self.hardware.clone().into()
    }

    pub fn check_model_files(&self, files: &ModelFiles) -> ModelFilesResponse {
        crate::system::check_model_files(
            Path::new(&files.model_path),
            Path::new(&files.config_path),
        )
    }

    pub fn system_info(&self) -> SystemInfoResponse {
        crate::system::system_info(&self.hardware)
    }

    /// Stop the worker after it drains the queue, destroying the session.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("session worker panicked");
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

fn to_generation(prompt: String, max_tokens: usize, temperature: f32) -> Result<GenerationRequest> {
    let request = GenerationRequest::new(prompt)
        .with_max_tokens(max_tokens)
        .with_temperature(temperature);
    request.validate()?;
    Ok(request)
}

/// Receivers that went away are ignored.
fn respond<T>(reply: Reply<T>, result: Result<T>) {
    let _ = reply.send(result);
}

/// Run `op` against the session. A panic is turned into an error and the
/// session is replaced by a fresh, uninitialized one.
fn guarded<T>(
    session: &mut SessionManager,
    operation: &'static str,
    op: impl FnOnce(&mut SessionManager) -> Result<T>,
) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| op(&mut *session))) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(session = %session.id(), operation, "session panicked, resetting it");
            *session = session.renew();
            Err(BridgeError::Engine(EngineError::Inference(format!(
                "{operation} panicked; the model must be initialized again"
            ))))
        }
    }
}

/// The main loop running on the session thread.
fn worker_loop(mut session: SessionManager, cmd_rx: Receiver<Command>) {
    tracing::debug!(session = %session.id(), "session worker started");

    while let Ok(command) = cmd_rx.recv() {
        match command {
            Command::Initialize {
                model_path,
                config_path,
                reply,
            } => {
                let response = guarded(&mut session, "initialize", |session| {
                    if session.state() == SessionState::Destroyed {
                        *session = session.renew();
                        tracing::debug!(session = %session.id(), "replaced destroyed session");
                    }
                    session.initialize(&model_path, &config_path)?;
                    Ok(InitializeResponse {
                        success: true,
                        message: "Model initialized successfully".to_string(),
                    })
                })
                .unwrap_or_else(|e| InitializeResponse {
                    success: false,
                    message: e.to_string(),
                });
                respond(reply, Ok(response));
            }

            Command::Generate { request, reply } => {
                let result = guarded(&mut session, "generate", |session| {
                    let out = session.generate(&request)?;
                    Ok(GenerateResponse {
                        tokens_generated: estimate_token_count(&out.text),
                        execution_time: out.elapsed.as_millis() as u64,
                        text: out.text,
                    })
                });
                respond(reply, result);
            }

            Command::Chat { request, reply } => {
                let result = guarded(&mut session, "chat", |session| {
                    let out = session.generate(&request)?;
                    Ok(ChatResponse {
                        tokens_generated: estimate_token_count(&out.text),
                        execution_time: out.elapsed.as_millis() as u64,
                        response: out.text.trim().to_string(),
                    })
                });
                respond(reply, result);
            }

            Command::ModelInfo { reply } => {
                respond(reply, Ok(session.model_info().into()));
            }

            Command::Metrics { reply } => {
                let result = session.metrics().map(MetricsResponse::from);
                respond(reply, result.map_err(BridgeError::from));
            }

            Command::Configure { settings, reply } => {
                let result = session.reconfigure(settings).map(|applied| ConfigureResponse {
                    success: true,
                    applied_settings: applied,
                });
                respond(reply, result.map_err(BridgeError::from));
            }

            Command::Destroy { reply } => {
                let result = guarded(&mut session, "destroy", |session| {
                    session.destroy();
                    Ok(DestroyResponse { success: true })
                });
                respond(reply, result);
            }

            Command::Shutdown => break,
        }
    }

    // Dropping queued commands closes their reply channels.
    let stranded = cmd_rx.try_iter().count();
    if stranded > 0 {
        tracing::debug!(
            session = %session.id(),
            stranded,
            "dropped requests queued behind shutdown"
        );
    }
    session.destroy();
    tracing::debug!(session = %session.id(), "session worker stopped");
}
