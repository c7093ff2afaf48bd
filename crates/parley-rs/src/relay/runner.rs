//! The relay loop: send the conversation, execute requested tools, append
//! results, repeat.
//!
//! A run moves between two states: waiting on the model and dispatching
//! tool calls. It ends in one of three ways — a text-only reply or a
//! terminal tool finishes the run, a transport failure aborts it with
//! `Err`, or the round limit stops it with `finished = false`. Tool
//! failures never abort: unknown names and handler errors go back to the
//! model as result strings, and the model decides what to do next.

use crate::api::cost::{
    CostTracker, approximate_tokens, generate_span_id, generate_trace_id, pricing_for_model,
};
use crate::api::retry::{is_permanent_error, is_transient_error};
use crate::relay::config::RelayConfig;
use crate::relay::events::{EventHandler, NoopHandler, RelayEvent};
use crate::tools::core::ToolRegistry;
use crate::{Block, Message, MessagesRequest, MessagesResponse, ModelTransport};
use tracing::{debug, info, warn};

/// The bounded tool-call loop.
///
/// Borrows its transport, tool registry, and event handler; owns its
/// config. One `Relay` drives one run.
///
/// # Example
///
/// ```ignore
/// let result = Relay::new(&client, &tools, config)
///     .with_event_handler(&LoggingHandler)
///     .run("What's the weather in Paris?")
///     .await?;
/// println!("{}", result.text());
/// ```
pub struct Relay<'a> {
    transport: &'a dyn ModelTransport,
    tools: &'a ToolRegistry,
    config: RelayConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> Relay<'a> {
    pub fn new(
        transport: &'a dyn ModelTransport,
        tools: &'a ToolRegistry,
        config: RelayConfig,
    ) -> Self {
        Self {
            transport,
            tools,
            config,
            event_handler: &NoopHandler,
        }
    }

    /// Attach an event handler (builder pattern).
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Run the loop starting from a single user request.
    pub async fn run(self, user_request: impl Into<String>) -> Result<RelayResult, String> {
        self.run_messages(vec![Message::user(user_request)]).await
    }

    /// Run the loop starting from a pre-built conversation.
    pub async fn run_messages(self, mut messages: Vec<Message>) -> Result<RelayResult, String> {
        let trace_id = generate_trace_id();
        let pricing = pricing_for_model(&self.config.model);
        let mut costs = CostTracker::new();
        let mut text_output: Vec<String> = Vec::new();
        let mut rounds_used = 0;
        let mut finished = false;

        let definitions = self.tools.definitions();

        info!(
            "[{trace_id}] relay start: model={}, tools={}, max_rounds={}",
            self.config.model,
            definitions.len(),
            self.config.max_rounds,
        );

        for round in 0..self.config.max_rounds {
            rounds_used = round + 1;
            let span_id = generate_span_id(&trace_id, rounds_used);
            debug!("[{span_id}] round start, {} message(s)", messages.len());
            self.event_handler.on_event(&RelayEvent::RoundStart {
                round: rounds_used,
                max_rounds: self.config.max_rounds,
            });

            let request = MessagesRequest {
                model: self.config.model.clone(),
                max_tokens: self.config.effective_max_tokens(),
                messages: messages.clone(),
                system: self.config.system_prompt.clone(),
                temperature: self.config.temperature,
                thinking: self.config.thinking.clone(),
                tools: if definitions.is_empty() {
                    None
                } else {
                    Some(definitions.clone())
                },
                betas: self.config.betas.clone(),
            };

            let response = self.send_with_retry(&request, &trace_id).await?;

            let (input_tokens, output_tokens) = match &response.usage {
                Some(u) => (u.input_tokens, u.output_tokens),
                None => (
                    approximate_conversation_tokens(&messages),
                    approximate_tokens(&response.text()),
                ),
            };
            costs.record(input_tokens, output_tokens, &pricing);
            self.event_handler.on_event(&RelayEvent::TokenUsage {
                input_tokens,
                output_tokens,
            });

            for block in &response.content {
                match block {
                    Block::Thinking { thinking, .. } => {
                        self.event_handler.on_event(&RelayEvent::Thinking(thinking));
                    }
                    Block::Text { text } => {
                        self.event_handler.on_event(&RelayEvent::Text(text));
                    }
                    _ => {}
                }
            }
            let round_text = response.text();
            if !round_text.is_empty() {
                text_output.push(round_text);
            }

            let tool_uses: Vec<(String, String, serde_json::Value)> = response
                .tool_uses()
                .iter()
                .map(|t| (t.id.to_string(), t.name.to_string(), t.input.clone()))
                .collect();

            // Replay the assistant turn verbatim. Thinking blocks must be
            // included unmodified for thinking-enabled tool use.
            messages.push(Message::assistant_blocks(response.content));

            if tool_uses.is_empty() {
                finished = true;
                self.event_handler
                    .on_event(&RelayEvent::Finished { rounds_used });
                break;
            }

            // Dispatch every requested call sequentially; all results go
            // back in one user turn. A terminal tool ends the run after its
            // result, skipping any calls queued behind it.
            let mut results: Vec<(String, String)> = Vec::new();
            let mut terminal = false;
            for (id, name, input) in tool_uses {
                self.event_handler.on_event(&RelayEvent::ToolRequested {
                    name: &name,
                    id: &id,
                    input: &input,
                });
                let result = self.tools.execute(&name, &input).await;
                self.event_handler.on_event(&RelayEvent::ToolResult {
                    name: &name,
                    id: &id,
                    result: &result,
                });
                let is_terminal = self.tools.is_terminal(&name);
                results.push((id, result));
                if is_terminal {
                    terminal = true;
                    break;
                }
            }
            messages.push(Message::tool_results(results));

            if terminal {
                finished = true;
                self.event_handler
                    .on_event(&RelayEvent::Finished { rounds_used });
                break;
            }
        }

        if !finished {
            self.event_handler.on_event(&RelayEvent::RoundLimitReached {
                max_rounds: self.config.max_rounds,
            });
        }

        info!("[{trace_id}] relay done: {}", costs.summary());

        Ok(RelayResult {
            trace_id,
            messages,
            text_output,
            rounds_used,
            finished,
            total_input_tokens: costs.total_input_tokens,
            total_output_tokens: costs.total_output_tokens,
            estimated_cost_usd: costs.estimated_cost_usd,
        })
    }

    async fn send_with_retry(
        &self,
        request: &MessagesRequest,
        trace_id: &str,
    ) -> Result<MessagesResponse, String> {
        let mut attempt = 0;
        loop {
            match self.transport.send(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = attempt < self.config.retry.max_retries
                        && is_transient_error(&e)
                        && !is_permanent_error(&e);
                    if !retryable {
                        return Err(e);
                    }
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(
                        "[{trace_id}] transient API error (attempt {}/{}): {e}; retrying in {:?}",
                        attempt + 1,
                        self.config.retry.max_retries,
                        delay,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Rough input-token count for a conversation, used when the API response
/// carries no usage data.
fn approximate_conversation_tokens(messages: &[Message]) -> u32 {
    messages
        .iter()
        .flat_map(|m| &m.content)
        .map(|b| match b {
            Block::Text { text } => approximate_tokens(text),
            Block::Thinking { thinking, .. } => approximate_tokens(thinking),
            Block::ToolResult { content, .. } => approximate_tokens(content),
            Block::ToolUse { .. } => 0,
        })
        .sum()
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of a complete [`Relay::run`].
#[derive(Debug)]
pub struct RelayResult {
    /// Unique trace ID for this run.
    pub trace_id: String,
    /// The full conversation transcript, including the initial request.
    pub messages: Vec<Message>,
    /// Text output from the model, one entry per round that produced any.
    pub text_output: Vec<String>,
    /// Number of rounds executed.
    pub rounds_used: u32,
    /// Whether the run finished naturally (vs hitting the round limit).
    pub finished: bool,
    /// Total input tokens consumed across all rounds.
    pub total_input_tokens: u64,
    /// Total output tokens consumed across all rounds.
    pub total_output_tokens: u64,
    /// Estimated cost in USD for the run.
    pub estimated_cost_usd: f64,
}

impl RelayResult {
    /// Concatenated text output from all rounds.
    pub fn text(&self) -> String {
        self.text_output.join("\n\n")
    }

    /// Total tokens (input + output).
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// One-line run summary: rounds, tokens, and estimated cost.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} round(s), tokens: {} input + {} output, est. cost: ${:.4}",
            self.trace_id,
            self.rounds_used,
            self.total_input_tokens,
            self.total_output_tokens,
            self.estimated_cost_usd,
        )
    }
}
