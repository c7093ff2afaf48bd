//! Streaming with extended thinking — print deltas as they arrive.
//!
//! Sends a single request with a thinking budget and renders the thinking
//! stream to stderr and the text stream to stdout.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-ant-... cargo run --example thinking_stream
//! ```

use parley_rs::api::stream::{StreamEvent, extract_usage};
use parley_rs::prelude::*;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), String> {
    let client = AnthropicClient::from_env()?;

    let request = MessagesRequest {
        max_tokens: 4000,
        messages: vec![Message::user(
            "Which is larger, 3^40 or 4^30? Think it through, then answer in one sentence.",
        )],
        thinking: Some(ThinkingConfig::enabled(2048)),
        ..Default::default()
    };

    let events = client
        .messages_stream(&request, |event| match event {
            StreamEvent::ThinkingDelta(text) => {
                eprint!("{text}");
            }
            StreamEvent::TextDelta(text) => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            _ => {}
        })
        .await?;
    println!();

    if let Some(usage) = extract_usage(&events) {
        eprintln!(
            "\n--- tokens: {} input + {} output ---",
            usage.input_tokens, usage.output_tokens
        );
    }

    Ok(())
}
