use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use edgegen_bridge::{Bridge, BridgeError, ChatMessage, ChatRequest, GenerateRequest};
use edgegen_cli::{init_logging, parse_repl_line, CliError, Conversation, ReplInput, SessionOptions};
use edgegen_session::{GenerationRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use serde::Serialize;

/// edgegen: on-device text generation
#[derive(Parser)]
#[command(name = "edgegen", version)]
struct Cli {
    /// Log session activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Generate a completion for a prompt.
    Generate {
        #[command(flatten)]
        options: SessionOptions,

        /// Input prompt text.
        #[arg(short, long)]
        prompt: String,

        /// Maximum number of tokens to generate.
        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,

        /// Sampling temperature; 0 picks the most likely token every step.
        #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        /// Print text as it is produced instead of a JSON record.
        #[arg(long)]
        stream: bool,
    },

    /// Interactive chat. `/system <text>`, `/reset` and `/quit` are understood.
    Chat {
        #[command(flatten)]
        options: SessionOptions,

        /// Initial system message.
        #[arg(long)]
        system: Option<String>,

        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,

        #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,
    },

    /// Load the model and print its description.
    Info {
        #[command(flatten)]
        options: SessionOptions,
    },

    /// Report whether the model and config files are present.
    Check {
        #[command(flatten)]
        options: SessionOptions,
    },

    /// Describe the host and the available acceleration.
    System {
        #[command(flatten)]
        options: SessionOptions,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Bridge(e)) => {
            let rejection = e.to_rejection();
            match serde_json::to_string(&rejection) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("error: {}", rejection.message),
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Generate {
            options,
            prompt,
            max_tokens,
            temperature,
            stream: true,
        } => stream_generate(&options, prompt, max_tokens, temperature),

        Command::Generate {
            options,
            prompt,
            max_tokens,
            temperature,
            stream: false,
        } => {
            let bridge = initialized(&options)?;
            let request = GenerateRequest::new(prompt)
                .with_max_tokens(max_tokens)
                .with_temperature(temperature);
            let response = bridge.generate(request)?.wait()?;
            print_json(&response)
        }

        Command::Chat {
            options,
            system,
            max_tokens,
            temperature,
        } => {
            let bridge = initialized(&options)?;
            chat_loop(&bridge, Conversation::new(system), max_tokens, temperature)
        }

        Command::Info { options } => {
            let bridge = initialized(&options)?;
            print_json(&bridge.model_info()?.wait()?)
        }

        Command::Check { options } => {
            let bridge = Bridge::spawn(options.build_session())?;
            print_json(&bridge.check_model_files(&options.files()))
        }

        Command::System { options } => {
            let bridge = Bridge::spawn(options.build_session())?;
            print_json(&bridge.hardware_acceleration())?;
            print_json(&bridge.system_info())
        }
    }
}

/// Spawn a session worker and load the model into it.
fn initialized(options: &SessionOptions) -> Result<Bridge, CliError> {
    let bridge = Bridge::spawn(options.build_session())?;
    let response = bridge.initialize(options.files())?.wait()?;
    if !response.success {
        return Err(CliError::Initialize(response.message));
    }
    tracing::info!(model = %options.model.display(), "{}", response.message);
    Ok(bridge)
}

/// Streaming bypasses the worker queue and drives the session directly.
fn stream_generate(
    options: &SessionOptions,
    prompt: String,
    max_tokens: usize,
    temperature: f32,
) -> Result<(), CliError> {
    let mut session = options.build_session();
    session.initialize(&options.model, &options.config)?;

    let request = GenerationRequest::new(prompt)
        .with_max_tokens(max_tokens)
        .with_temperature(temperature);
    let mut stdout = std::io::stdout().lock();
    let output = session.generate_streaming(&request, |piece| {
        // A closed stdout only loses display output.
        let _ = stdout.write_all(piece.as_bytes());
        let _ = stdout.flush();
    })?;
    writeln!(stdout)?;

    tracing::info!(
        tokens = output.tokens.len(),
        stopped_on_eos = output.stopped_on_eos,
        elapsed_ms = output.elapsed.as_millis() as u64,
        "generation finished"
    );
    Ok(())
}

fn chat_loop(
    bridge: &Bridge,
    mut conversation: Conversation,
    max_tokens: usize,
    temperature: f32,
) -> Result<(), CliError> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match parse_repl_line(&line) {
            ReplInput::Empty => continue,
            ReplInput::Quit => break,
            ReplInput::Reset => conversation.reset(),
            ReplInput::System(system) => conversation.set_system(system),
            ReplInput::Message(message) => {
                conversation.push(message);
                let request = ChatRequest::new(conversation.messages())
                    .with_max_tokens(max_tokens)
                    .with_temperature(temperature);
                match bridge.chat(request).and_then(|pending| pending.wait()) {
                    Ok(reply) => {
                        writeln!(stdout, "{}", reply.response)?;
                        conversation.push(ChatMessage::assistant(reply.response));
                    }
                    Err(BridgeError::Engine(e)) => {
                        // The session stays usable after a failed turn.
                        conversation.pop();
                        eprintln!("error: {e}");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
