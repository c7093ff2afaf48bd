//! Events and handlers for the [`Relay`](super::runner::Relay).
//!
//! The relay communicates with callers through [`RelayEvent`] variants that
//! cover the full lifecycle of a run, from round start through tool
//! dispatch to completion. Callers implement [`EventHandler`] to observe
//! these events for logging, UI rendering, or metrics. Handlers are pure
//! observers; nothing they return can alter the run.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the relay during a run.
#[derive(Debug)]
pub enum RelayEvent<'a> {
    /// A new round is starting (1-indexed).
    RoundStart { round: u32, max_rounds: u32 },
    /// The model produced extended-thinking content.
    Thinking(&'a str),
    /// The model produced text output (may be alongside tool calls).
    Text(&'a str),
    /// The model requested a tool call.
    ToolRequested {
        name: &'a str,
        id: &'a str,
        input: &'a serde_json::Value,
    },
    /// A tool call finished and its result will be sent back.
    ToolResult {
        name: &'a str,
        id: &'a str,
        result: &'a str,
    },
    /// Token usage for this round.
    TokenUsage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// The run finished (text-only reply or terminal tool).
    Finished { rounds_used: u32 },
    /// The run hit the round limit without finishing.
    RoundLimitReached { max_rounds: u32 },
}

impl RelayEvent<'_> {
    /// Extract total tokens from a `TokenUsage` event as `u64`.
    /// Returns `None` for all other variants.
    pub fn total_tokens(&self) -> Option<u64> {
        if let RelayEvent::TokenUsage {
            input_tokens,
            output_tokens,
        } = self
        {
            Some(*input_tokens as u64 + *output_tokens as u64)
        } else {
            None
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────

/// Handler for relay events.
///
/// Implement this trait to react to loop events. The default
/// implementation ignores everything.
///
/// # Example
///
/// ```ignore
/// struct MyHandler;
///
/// impl EventHandler for MyHandler {
///     fn on_event(&self, event: &RelayEvent<'_>) {
///         match event {
///             RelayEvent::Text(text) => println!("{text}"),
///             RelayEvent::ToolResult { name, result, .. } => {
///                 println!("[{name}] {} bytes", result.len());
///             }
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event during the run.
    fn on_event(&self, event: &RelayEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// Wraps a `Fn(&RelayEvent)` closure into an [`EventHandler`]
/// implementation, avoiding the boilerplate of defining a full struct and
/// impl for simple event handling.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&RelayEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&RelayEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&RelayEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &RelayEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers.
///
/// Events are dispatched to all handlers in registration order.
///
/// # Example
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, DebugHandler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain. When `condition` is
    /// `false`, this is a no-op.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &RelayEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &RelayEvent<'_>) {
        match event {
            RelayEvent::RoundStart { round, max_rounds } => {
                info!("[round {round}/{max_rounds}]");
            }
            RelayEvent::Thinking(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "model thinking: {preview}{}",
                    if text.len() > 200 { "..." } else { "" }
                );
            }
            RelayEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "model text: {preview}{}",
                    if text.len() > 200 { "..." } else { "" }
                );
            }
            RelayEvent::ToolRequested { name, id, .. } => {
                debug!("tool requested: {name} ({id})");
            }
            RelayEvent::ToolResult { name, result, .. } => {
                debug!("tool {name} result: {} bytes", result.len());
            }
            RelayEvent::TokenUsage {
                input_tokens,
                output_tokens,
            } => {
                debug!("tokens: input={input_tokens}, output={output_tokens}");
            }
            RelayEvent::Finished { rounds_used } => {
                info!("relay finished in {rounds_used} round(s)");
            }
            RelayEvent::RoundLimitReached { max_rounds } => {
                warn!("relay hit round limit ({max_rounds})");
            }
        }
    }
}
