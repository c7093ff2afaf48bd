//! Run a tool-call relay against the Anthropic Messages API and print the
//! final response.
//!
//! Reads the API key from the `ANTHROPIC_API_KEY` environment variable.
//! Weather tools are registered by default; `--editor-tools` adds the file
//! editing and shell tools.
//!
//! # Examples
//!
//! ```sh
//! # Basic request with the weather tools
//! parley --prompt "What's the weather in Tokyo right now?"
//!
//! # With system prompt and model selection
//! parley --system "You are a terse weather reporter." \
//!   --prompt "Any alerts for Miami?" \
//!   --model claude-3-7-sonnet-20250219
//!
//! # Pipe content from stdin
//! cat notes.md | parley --system "Summarize these notes." --stdin
//!
//! # File editing and shell tools, extended thinking
//! parley --prompt "Fix the typo in /repo/README.md" \
//!   --editor-tools --thinking-budget 2048 --max-rounds 20
//!
//! # One-shot streaming (no tool loop)
//! parley --prompt "Write a haiku about rain" --stream
//! ```

use clap::Parser;
use parley_rs::api::stream::StreamEvent;
use parley_rs::prelude::*;
use std::io::{self, Read, Write};
use std::process;

/// Run a tool-call relay against the Anthropic Messages API.
///
/// Reads the API key from the ANTHROPIC_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "parley")]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// User request to send
    #[arg(long)]
    prompt: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    /// System prompt to set the assistant's behavior
    #[arg(long)]
    system: Option<String>,

    // ── Model selection ────────────────────────────────────────
    /// Model to use
    #[arg(long, default_value = parley_rs::DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens in each model reply
    #[arg(long, default_value_t = 4000)]
    max_tokens: u32,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Extended-thinking token budget (enables thinking)
    #[arg(long)]
    thinking_budget: Option<u32>,

    // ── Relay control ──────────────────────────────────────────
    /// Maximum request/response rounds before stopping
    #[arg(long, default_value_t = 10)]
    max_rounds: u32,

    /// Retries for transient API failures
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Register the file editing and shell tools
    #[arg(long)]
    editor_tools: bool,

    /// Request the 128k extended-output beta
    #[arg(long)]
    extended_output: bool,

    // ── Output mode ────────────────────────────────────────────
    /// Stream a single reply as it arrives (disables the tool loop)
    #[arg(long)]
    stream: bool,
}

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_prompt(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.prompt, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --prompt, --stdin, or both".to_string()),
    }
}

fn build_config(cli: &Cli) -> RelayConfig {
    let mut config = RelayConfig::new(&cli.model)
        .with_max_rounds(cli.max_rounds)
        .with_max_tokens(cli.max_tokens)
        .with_retries(cli.retries);
    if let Some(system) = &cli.system {
        config = config.with_system_prompt(system);
    }
    if let Some(temperature) = cli.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(budget) = cli.thinking_budget {
        config = config.with_thinking(budget);
    }
    if cli.extended_output {
        config = config.with_betas(vec![parley_rs::EXTENDED_OUTPUT_BETA.to_string()]);
    }
    config
}

/// One-shot streaming print. Thinking goes to stderr, text to stdout.
async fn stream_once(client: &AnthropicClient, cli: &Cli, prompt: String) -> Result<(), String> {
    let config = build_config(cli);
    let request = MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.effective_max_tokens(),
        messages: vec![Message::user(prompt)],
        system: config.system_prompt.clone(),
        temperature: config.temperature,
        thinking: config.thinking.clone(),
        tools: None,
        betas: config.betas,
    };

    client
        .messages_stream(&request, |event| match event {
            StreamEvent::TextDelta(text) => {
                print!("{text}");
                let _ = io::stdout().flush();
            }
            StreamEvent::ThinkingDelta(text) => {
                eprint!("{text}");
            }
            _ => {}
        })
        .await?;
    println!();
    Ok(())
}

async fn run(cli: &Cli) -> Result<(), String> {
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        return Err("ANTHROPIC_API_KEY environment variable is not set".to_string());
    }

    let prompt = build_prompt(cli)?;
    let client = AnthropicClient::from_env()?;

    if cli.stream {
        return stream_once(&client, cli, prompt).await;
    }

    let mut tools = ToolRegistry::new().with_weather_tools()?;
    if cli.editor_tools {
        tools = tools.with_agent_tools();
    }

    let handler = LoggingHandler;
    let result = Relay::new(&client, &tools, build_config(cli))
        .with_event_handler(&handler)
        .run(prompt)
        .await?;

    println!("{}", result.text());
    eprintln!("{}", result.summary());
    if !result.finished {
        eprintln!("Warning: run stopped at the round limit without finishing");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
