//! Minimal weather agent — the relay with the built-in weather tools.
//!
//! Registers the forecast and alerts tools, sends a user prompt, and prints
//! the model's answer along with token usage and cost.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-ant-... cargo run --example weather_agent
//! ```

use parley_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    // 1. Create the API client from the environment.
    let client = AnthropicClient::from_env()?;

    // 2. Register the weather tools.
    let tools = ToolRegistry::new().with_weather_tools()?;

    // 3. Configure the relay.
    let config = RelayConfig::default()
        .with_system_prompt("You are a concise weather assistant.")
        .with_max_rounds(5)
        .with_max_tokens(4000);

    // 4. Run the loop.
    let result = Relay::new(&client, &tools, config)
        .with_event_handler(&LoggingHandler)
        .run("What's the weather in San Francisco, and are there any alerts?")
        .await?;

    // 5. Print results.
    println!("\n{}", result.text());
    println!(
        "\n--- {} rounds | {} tokens | ${:.4} ---",
        result.rounds_used,
        result.total_tokens(),
        result.estimated_cost_usd
    );

    Ok(())
}
