//! Server-Sent Events (SSE) streaming for the Anthropic Messages API.
//!
//! Provides [`StreamEvent`] and the [`AnthropicClient::messages_stream`]
//! method for receiving incremental text and thinking deltas from the model,
//! so a caller can display output as it arrives rather than waiting for the
//! full response.
//!
//! The Anthropic stream interleaves typed events: `message_start`, then for
//! each content block a `content_block_start`, a run of
//! `content_block_delta`s (`text_delta`, `thinking_delta`,
//! `input_json_delta`, `signature_delta`), and a `content_block_stop`;
//! finally `message_delta` with the stop reason and output usage, then
//! `message_stop`. `ping` events may appear anywhere.

use crate::{ANTHROPIC_MESSAGES_URL, ANTHROPIC_VERSION, AnthropicClient, Block, MessagesRequest, Usage};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The stream opened; carries the input token count.
    MessageStart { input_tokens: u32 },
    /// A new content block began at the given index.
    BlockStart { index: usize, block: Block },
    /// An incremental text delta.
    TextDelta(String),
    /// An incremental extended-thinking delta.
    ThinkingDelta(String),
    /// A fragment of a tool-use block's JSON input.
    InputJsonDelta(String),
    /// Final stop reason and output token count.
    MessageDelta {
        stop_reason: Option<String>,
        output_tokens: u32,
    },
    /// The stream is complete.
    Done,
}

// Raw wire shapes. `signature_delta` and `content_block_stop` carry nothing
// a consumer needs, so they parse but emit no event.

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawStreamEvent {
    MessageStart {
        message: RawMessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: Block,
    },
    ContentBlockDelta {
        #[allow(dead_code)]
        index: usize,
        delta: RawDelta,
    },
    ContentBlockStop {
        #[allow(dead_code)]
        index: usize,
    },
    MessageDelta {
        delta: RawMessageDelta,
        #[serde(default)]
        usage: Option<RawOutputUsage>,
    },
    MessageStop,
    Ping,
}

#[derive(Deserialize, Debug)]
struct RawMessageStart {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    SignatureDelta {
        #[allow(dead_code)]
        signature: String,
    },
}

#[derive(Deserialize, Debug)]
struct RawMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawOutputUsage {
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicClient {
    /// Send a Messages API request with SSE streaming, invoking `on_event`
    /// for each event as it arrives off the wire. The full event list is
    /// also returned for post-hoc assembly of text, thinking, and usage.
    pub async fn messages_stream(
        &self,
        body: &MessagesRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>, String> {
        let mut stream_body =
            serde_json::to_value(body).map_err(|e| format!("failed to serialize request: {e}"))?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!("sending streaming messages request");

        let mut req = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if !body.betas.is_empty() {
            req = req.header("anthropic-beta", body.betas.join(","));
        }
        let mut resp = req
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| format!("streaming request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("Anthropic API HTTP {status}: {text}"));
        }

        // Read the SSE stream incrementally via chunk() so long responses
        // don't hit a single-body timeout.
        let mut events = Vec::new();
        let mut buffer = String::new();
        let mut done = false;

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process all complete lines in the buffer. The `event:` lines
            // are redundant with the `type` field inside each data payload.
            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                let line = line.trim();
                if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
                    continue;
                }
                if let Some(data) = line.strip_prefix("data: ") {
                    let before = events.len();
                    parse_sse_data(data, &mut events);
                    for ev in &events[before..] {
                        on_event(ev);
                    }
                    if events.iter().any(|e| matches!(e, StreamEvent::Done)) {
                        done = true;
                        break;
                    }
                }
            }

            if done {
                break;
            }
        }

        // Process any remaining data in the buffer (incomplete final line).
        let remaining = buffer.trim();
        if !remaining.is_empty()
            && let Some(data) = remaining.strip_prefix("data: ")
        {
            let before = events.len();
            parse_sse_data(data, &mut events);
            for ev in &events[before..] {
                on_event(ev);
            }
        }

        // Ensure Done event at the end.
        if !events.iter().any(|e| matches!(e, StreamEvent::Done)) {
            let ev = StreamEvent::Done;
            on_event(&ev);
            events.push(ev);
        }

        debug!("stream completed with {} events", events.len());
        Ok(events)
    }
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    match serde_json::from_str::<RawStreamEvent>(data) {
        Ok(RawStreamEvent::MessageStart { message }) => {
            events.push(StreamEvent::MessageStart {
                input_tokens: message.usage.map_or(0, |u| u.input_tokens),
            });
        }
        Ok(RawStreamEvent::ContentBlockStart {
            index,
            content_block,
        }) => {
            events.push(StreamEvent::BlockStart {
                index,
                block: content_block,
            });
        }
        Ok(RawStreamEvent::ContentBlockDelta { delta, .. }) => match delta {
            RawDelta::TextDelta { text } if !text.is_empty() => {
                events.push(StreamEvent::TextDelta(text));
            }
            RawDelta::ThinkingDelta { thinking } if !thinking.is_empty() => {
                events.push(StreamEvent::ThinkingDelta(thinking));
            }
            RawDelta::InputJsonDelta { partial_json } if !partial_json.is_empty() => {
                events.push(StreamEvent::InputJsonDelta(partial_json));
            }
            _ => {}
        },
        Ok(RawStreamEvent::ContentBlockStop { .. }) => {}
        Ok(RawStreamEvent::MessageDelta { delta, usage }) => {
            trace!("stream stop_reason: {:?}", delta.stop_reason);
            events.push(StreamEvent::MessageDelta {
                stop_reason: delta.stop_reason,
                output_tokens: usage.map_or(0, |u| u.output_tokens),
            });
        }
        Ok(RawStreamEvent::MessageStop) => {
            events.push(StreamEvent::Done);
        }
        Ok(RawStreamEvent::Ping) => {}
        Err(e) => {
            warn!("failed to parse SSE chunk: {e} (data: {data})");
        }
    }
}

/// Assemble a complete text string from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Assemble complete thinking output from a sequence of stream events.
pub fn collect_thinking(events: &[StreamEvent]) -> String {
    let mut thinking = String::new();
    for event in events {
        if let StreamEvent::ThinkingDelta(delta) = event {
            thinking.push_str(delta);
        }
    }
    thinking
}

/// Extract combined token usage from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<Usage> {
    let mut usage = None;
    for event in events {
        match event {
            StreamEvent::MessageStart { input_tokens } => {
                usage.get_or_insert(Usage::default()).input_tokens = *input_tokens;
            }
            StreamEvent::MessageDelta { output_tokens, .. } => {
                usage.get_or_insert(Usage::default()).output_tokens = *output_tokens;
            }
            _ => {}
        }
    }
    usage
}
