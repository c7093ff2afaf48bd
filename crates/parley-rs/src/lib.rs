//! Tool-call relay for the Anthropic Messages API.
//!
//! `parley-rs` provides a small agent runtime on top of the Anthropic
//! [Messages API](https://docs.anthropic.com/en/api/messages). The core
//! abstraction is the [`Relay`](relay::runner::Relay) — a bounded loop that
//! sends a conversation to the model, executes the tool calls it requests,
//! appends the results, and repeats until the model produces a text-only
//! reply or the round limit is reached.
//!
//! # Getting started
//!
//! ```ignore
//! use parley_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let client = AnthropicClient::from_env()?;
//!     let tools = ToolRegistry::new().with_weather_tools()?;
//!
//!     let config = RelayConfig::new(DEFAULT_MODEL)
//!         .with_max_rounds(10)
//!         .with_max_tokens(4000);
//!
//!     let result = Relay::new(&client, &tools, config)
//!         .with_event_handler(&LoggingHandler)
//!         .run("What's the weather in Paris?")
//!         .await?;
//!
//!     println!("{}", result.text());
//!     println!("Cost: ${:.4}", result.estimated_cost_usd);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Define tools for the model to call:** the [`Tool`](tools::core::Tool)
//!   trait, [`ToolRegistry`](tools::core::ToolRegistry) for collection and
//!   dispatch, [`FnTool`](tools::core::FnTool) for closure-based tools. Built-in
//!   tools live in [`tools::weather`], [`tools::editor`], and [`tools::shell`].
//! - **Run the loop:** [`Relay`](relay::runner::Relay) and
//!   [`RelayConfig`](relay::config::RelayConfig).
//! - **Observe a run:** implement [`EventHandler`](relay::events::EventHandler),
//!   or use [`LoggingHandler`](relay::events::LoggingHandler) for
//!   tracing-based logging.
//! - **Stream responses:** [`AnthropicClient::messages_stream`] and the SSE
//!   parser in [`api::stream`].
//! - **Retry and cost:** [`api::retry`] and [`api::cost`].

pub mod api;
pub mod prelude;
pub mod relay;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value required by the Messages API.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model for all calls.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Smallest extended-thinking budget the API accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

/// Beta flag for 128k extended output, sent via the `anthropic-beta` header.
pub const EXTENDED_OUTPUT_BETA: &str = "output-128k-2025-02-19";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types and
/// the `input_schema` field of a tool definition.
///
/// # Example
///
/// ```
/// use parley_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct LookupArgs {
///     location: String,
/// }
///
/// let schema = json_schema_for::<LookupArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"location".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation. The Messages API has no system
/// role — the system prompt is a top-level request field.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A content block in a message or response.
///
/// This is a closed union: an unrecognized `type` on the wire is a
/// deserialization error, and every consumer matches exhaustively.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        text: String,
    },
    /// Extended-thinking block. The signature must be replayed verbatim when
    /// the block is sent back in a later request.
    Thinking {
        thinking: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Block::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Block>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Block::text(content)],
        }
    }

    /// Assistant turn replayed verbatim, thinking and tool-use blocks included.
    pub fn assistant_blocks(content: Vec<Block>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// User turn consisting solely of tool results answering the preceding
    /// assistant turn. `results` pairs are `(tool_use_id, content)`.
    pub fn tool_results(results: Vec<(String, String)>) -> Self {
        Self {
            role: Role::User,
            content: results
                .into_iter()
                .map(|(id, content)| Block::tool_result(id, content))
                .collect(),
        }
    }
}

// ── Tool definition ────────────────────────────────────────────────

/// Tool definition sent to the API (Anthropic tool-use format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ── Thinking configuration ─────────────────────────────────────────

/// Extended-thinking configuration (`{"type":"enabled","budget_tokens":N}`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub thinking_type: String,
    pub budget_tokens: u32,
}

impl ThinkingConfig {
    /// Enable extended thinking with the given token budget. Budgets below
    /// [`MIN_THINKING_BUDGET`] are clamped with a warning.
    pub fn enabled(budget_tokens: u32) -> Self {
        let budget_tokens = if budget_tokens < MIN_THINKING_BUDGET {
            warn!(
                "thinking budget {} below minimum, clamping to {}",
                budget_tokens, MIN_THINKING_BUDGET
            );
            MIN_THINKING_BUDGET
        } else {
            budget_tokens
        };
        Self {
            thinking_type: "enabled".to_string(),
            budget_tokens,
        }
    }
}

// ── Request / response types ───────────────────────────────────────

/// Messages API request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Clone, Debug)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Beta features requested via the `anthropic-beta` header. Not part of
    /// the JSON body.
    #[serde(skip)]
    pub betas: Vec<String>,
}

impl Default for MessagesRequest {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            messages: vec![],
            system: None,
            temperature: None,
            thinking: None,
            tools: None,
            betas: Vec::new(),
        }
    }
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// A tool-use block borrowed out of a response.
#[derive(Clone, Copy, Debug)]
pub struct ToolUseRef<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub input: &'a serde_json::Value,
}

/// Messages API response.
#[derive(Deserialize, Clone, Debug)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub content: Vec<Block>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// All text blocks joined with blank lines.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|b| match b {
                Block::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        parts.join("\n\n")
    }

    /// The first thinking block, if any.
    pub fn thinking(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            Block::Thinking { thinking, .. } => Some(thinking.as_str()),
            _ => None,
        })
    }

    /// All tool-use blocks, in order.
    pub fn tool_uses(&self) -> Vec<ToolUseRef<'_>> {
        self.content
            .iter()
            .filter_map(|b| match b {
                Block::ToolUse { id, name, input } => Some(ToolUseRef { id, name, input }),
                _ => None,
            })
            .collect()
    }
}

/// Error envelope returned by the API (`{"type":"error","error":{...}}`).
#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("parley/0.2")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Create a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| "ANTHROPIC_API_KEY not set".to_string())?;
        Self::new(api_key)
    }

    /// Send a Messages API request.
    pub async fn messages(&self, body: &MessagesRequest) -> Result<MessagesResponse, String> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "model request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            tool_count,
            body.max_tokens,
        );
        trace!(
            "request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let mut req = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if !body.betas.is_empty() {
            req = req.header("anthropic-beta", body.betas.join(","));
        }
        let resp = req
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "model response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            // Surface the structured error message when the envelope parses.
            if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&text) {
                return Err(format!(
                    "Anthropic API HTTP {status}: {}: {}",
                    envelope.error.error_type, envelope.error.message
                ));
            }
            return Err(format!("Anthropic API HTTP {status}: {text}"));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(ref usage) = parsed.usage {
            debug!(
                "token usage: input={}, output={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        debug!(
            "model output: {} block(s), {} tool call(s), stop_reason={}",
            parsed.content.len(),
            parsed.tool_uses().len(),
            parsed.stop_reason.as_deref().unwrap_or("(none)")
        );

        Ok(parsed)
    }
}

// ── Transport seam ─────────────────────────────────────────────────

/// Boxed future returned by [`ModelTransport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<MessagesResponse, String>> + Send + 'a>>;

/// The seam between the relay loop and the HTTP client. The relay only ever
/// talks to this trait, so a run can be driven by a scripted transport in
/// tests.
pub trait ModelTransport: Send + Sync {
    fn send<'a>(&'a self, request: &MessagesRequest) -> TransportFuture<'a>;
}

impl ModelTransport for AnthropicClient {
    fn send<'a>(&'a self, request: &MessagesRequest) -> TransportFuture<'a> {
        let request = request.clone();
        Box::pin(async move { self.messages(&request).await })
    }
}

// ── Convenience ────────────────────────────────────────────────────

/// Run a quick one-shot completion with no tools.
///
/// Reads the API key from the `ANTHROPIC_API_KEY` environment variable.
/// Returns `Err` if the key is not set or the API call fails.
pub async fn quick_message(system: &str, user: &str, model: &str) -> Result<String, String> {
    let client = AnthropicClient::from_env()?;

    let body = MessagesRequest {
        model: model.to_string(),
        max_tokens: 1024,
        messages: vec![Message::user(user)],
        system: Some(system.to_string()),
        ..Default::default()
    };

    let response = client.messages(&body).await?;
    let text = response.text();
    if text.is_empty() {
        Err("empty model response".to_string())
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, vec![Block::text("hello")]);

        let assist = Message::assistant_blocks(vec![Block::text("hi")]);
        assert_eq!(assist.role, Role::Assistant);

        let results = Message::tool_results(vec![("toolu_1".into(), "42".into())]);
        assert_eq!(results.role, Role::User);
        assert_eq!(results.content, vec![Block::tool_result("toolu_1", "42")]);
    }

    #[test]
    fn block_serializes_with_type_tag() {
        let text = serde_json::to_value(Block::text("hi")).unwrap();
        assert_eq!(text, json!({"type": "text", "text": "hi"}));

        let tool_use = serde_json::to_value(Block::ToolUse {
            id: "toolu_1".into(),
            name: "get_forecast".into(),
            input: json!({"location": "Paris"}),
        })
        .unwrap();
        assert_eq!(tool_use["type"], "tool_use");
        assert_eq!(tool_use["input"]["location"], "Paris");

        let result = serde_json::to_value(Block::tool_result("toolu_1", "ok")).unwrap();
        assert_eq!(
            result,
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "ok"})
        );
    }

    #[test]
    fn thinking_block_omits_absent_signature() {
        let block = Block::Thinking {
            thinking: "let me see".into(),
            signature: None,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert!(json.get("signature").is_none());

        let parsed: Block = serde_json::from_value(json!({
            "type": "thinking",
            "thinking": "hmm",
            "signature": "sig-abc"
        }))
        .unwrap();
        assert_eq!(
            parsed,
            Block::Thinking {
                thinking: "hmm".into(),
                signature: Some("sig-abc".into())
            }
        );
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let err = serde_json::from_value::<Block>(json!({"type": "server_tool_use"}));
        assert!(err.is_err());
    }

    #[test]
    fn request_skips_absent_optional_fields() {
        let req = MessagesRequest {
            model: "test-model".into(),
            max_tokens: 100,
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("thinking").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn betas_never_serialize_into_the_body() {
        let req = MessagesRequest {
            betas: vec![EXTENDED_OUTPUT_BETA.to_string()],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("betas").is_none());
    }

    #[test]
    fn thinking_config_clamps_to_minimum() {
        let thinking = ThinkingConfig::enabled(100);
        assert_eq!(thinking.budget_tokens, MIN_THINKING_BUDGET);
        let json = serde_json::to_value(&thinking).unwrap();
        assert_eq!(json["type"], "enabled");
        assert_eq!(json["budget_tokens"], 1024);

        assert_eq!(ThinkingConfig::enabled(4000).budget_tokens, 4000);
    }

    #[test]
    fn response_helpers() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "thinking", "thinking": "checking the map", "signature": "s"},
                {"type": "text", "text": "Looking it up."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_alerts",
                 "input": {"location": "Oslo"}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        }))
        .unwrap();

        assert_eq!(response.text(), "Looking it up.");
        assert_eq!(response.thinking(), Some("checking the map"));
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "get_alerts");
        assert_eq!(uses[0].input["location"], "Oslo");
        assert_eq!(response.usage.unwrap().output_tokens, 34);
    }

    #[test]
    fn json_schema_for_generates_object_schema() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Args {
            location: String,
        }
        let schema = json_schema_for::<Args>();
        assert_eq!(schema["type"], "object");
        assert!(
            schema["required"]
                .as_array()
                .unwrap()
                .contains(&"location".into())
        );
    }
}
