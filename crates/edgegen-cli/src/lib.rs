//! # edgegen-cli
//!
//! Wiring shared by the `edgegen` binary: logging setup, session
//! construction from command-line options and the chat REPL line grammar.

use std::path::PathBuf;
use std::sync::Arc;

use edgegen_bridge::{BridgeError, ChatMessage, ModelFiles, DEFAULT_CONFIG_PATH, DEFAULT_MODEL_PATH};
use edgegen_engine::{
    EngineError, InferenceSettings, Precision, SessionConfig, DEFAULT_MEMORY_LIMIT_MB,
    DEFAULT_THREAD_COUNT,
};
use edgegen_runtime::{CpuRuntime, LogTelemetry};
use edgegen_session::SessionManager;

/// Errors surfaced by the binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("initialization failed: {0}")]
    Initialize(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log to stderr so stdout carries only command output. Respects `RUST_LOG`,
/// defaulting to `info` with `--verbose` and `warn` otherwise.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Model location and inference settings shared by every subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionOptions {
    /// Model weights file.
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Model configuration (JSON).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Fixed sampling seed. Defaults to a clock-derived seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Forward-pass worker threads.
    #[arg(long, default_value_t = DEFAULT_THREAD_COUNT)]
    pub threads: usize,

    /// Memory budget for model weights, in MiB.
    #[arg(long, default_value_t = DEFAULT_MEMORY_LIMIT_MB)]
    pub memory_limit: usize,

    /// Weight precision: fp32, fp16 or int8.
    #[arg(long, default_value = "fp16")]
    pub precision: Precision,

    /// Request accelerated execution when the runtime offers it.
    #[arg(long)]
    pub accelerate: bool,
}

impl SessionOptions {
    pub fn files(&self) -> ModelFiles {
        ModelFiles::new(
            self.model.to_string_lossy().into_owned(),
            self.config.to_string_lossy().into_owned(),
        )
    }

    pub fn settings(&self) -> InferenceSettings {
        InferenceSettings::new()
            .with_acceleration(self.accelerate)
            .with_thread_count(self.threads)
            .with_memory_limit_mb(self.memory_limit)
            .with_precision(self.precision)
    }

    /// An uninitialized session on the CPU reference runtime.
    pub fn build_session(&self) -> SessionManager {
        let mut config = SessionConfig::new().with_settings(self.settings());
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        SessionManager::new(Arc::new(CpuRuntime::new()), config)
            .with_telemetry(Arc::new(LogTelemetry::new()))
    }
}

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Message(ChatMessage),
    /// Replace the system message.
    System(String),
    /// Forget the conversation, keeping the system message.
    Reset,
    Quit,
    Empty,
}

pub fn parse_repl_line(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    match line.split_once(char::is_whitespace) {
        Some(("/system", rest)) => ReplInput::System(rest.trim().to_string()),
        _ => match line {
            "/reset" => ReplInput::Reset,
            "/quit" | "/exit" => ReplInput::Quit,
            _ => ReplInput::Message(ChatMessage::user(line)),
        },
    }
}

/// Conversation state kept by the chat REPL.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    system: Option<String>,
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system: Option<String>) -> Self {
        Self {
            system: system.filter(|s| !s.trim().is_empty()),
            turns: Vec::new(),
        }
    }

    pub fn set_system(&mut self, system: String) {
        self.system = Some(system).filter(|s| !s.is_empty());
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.turns.push(message);
    }

    /// Drop the last turn, used when a reply could not be produced.
    pub fn pop(&mut self) -> Option<ChatMessage> {
        self.turns.pop()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.system
            .iter()
            .map(|s| ChatMessage::system(s.as_str()))
            .chain(self.turns.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        options: SessionOptions,
    }

    #[test]
    fn options_default_to_bundled_model() {
        let harness = Harness::try_parse_from(["edgegen"]).unwrap();
        let files = harness.options.files();
        assert_eq!(files.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(files.config_path, DEFAULT_CONFIG_PATH);
        assert_eq!(harness.options.settings(), InferenceSettings::default());
    }

    #[test]
    fn options_flow_into_session_config() {
        let harness = Harness::try_parse_from([
            "edgegen",
            "--seed",
            "9",
            "--threads",
            "2",
            "--precision",
            "int8",
            "--accelerate",
        ])
        .unwrap();
        let session = harness.options.build_session();
        assert_eq!(session.config().seed, Some(9));
        assert_eq!(session.config().settings.thread_count, 2);
        assert_eq!(session.config().settings.precision, Precision::Int8);
        assert!(session.config().settings.use_acceleration);
        assert_eq!(session.runtime_name(), "cpu-reference");
    }

    #[test]
    fn bad_precision_rejected() {
        assert!(Harness::try_parse_from(["edgegen", "--precision", "fp8"]).is_err());
    }

    #[test]
    fn repl_lines() {
        assert_eq!(parse_repl_line("  "), ReplInput::Empty);
        assert_eq!(parse_repl_line("/quit"), ReplInput::Quit);
        assert_eq!(parse_repl_line("/reset"), ReplInput::Reset);
        assert_eq!(
            parse_repl_line("/system Be brief "),
            ReplInput::System("Be brief".into())
        );
        assert_eq!(
            parse_repl_line(" Hello there "),
            ReplInput::Message(ChatMessage::user("Hello there"))
        );
    }

    #[test]
    fn conversation_keeps_system_first() {
        let mut convo = Conversation::new(Some("Be brief".into()));
        convo.push(ChatMessage::user("Hi"));
        convo.push(ChatMessage::assistant("Hello"));
        let messages = convo.messages();
        assert_eq!(messages[0], ChatMessage::system("Be brief"));
        assert_eq!(messages.len(), 3);

        convo.reset();
        assert_eq!(convo.messages(), vec![ChatMessage::system("Be brief")]);

        convo.set_system(String::new());
        assert!(convo.messages().is_empty());
    }
}
