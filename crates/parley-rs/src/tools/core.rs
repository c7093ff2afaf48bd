//! Tool abstraction for model tool-use.
//!
//! The [`Tool`] trait defines the interface that every tool must implement:
//! a static API definition (name, description, input schema) and an async
//! `execute` method. Tools are collected into a [`ToolRegistry`] which
//! handles dispatch, definition export, and result truncation.

use crate::ToolDefinition;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for tool execution (60 seconds).
pub const DEFAULT_TOOL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool that the model can invoke via tool-use blocks.
///
/// Implementors provide:
/// - A static definition ([`Tool::definition`]) describing the tool's name,
///   description, and JSON Schema input for the model.
/// - An async [`Tool::execute`] method that receives the parsed JSON input
///   object and returns a result string.
///
/// # Example
///
/// ```ignore
/// struct ViewFile;
///
/// impl Tool for ViewFile {
///     fn definition(&self) -> ToolDefinition { /* ... */ }
///
///     fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
///         let input = input.clone();
///         Box::pin(async move {
///             // parse args, read file, return content
///             todo!()
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition sent to the API.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input object.
    ///
    /// Returns the tool result as a string. Errors should be returned as
    /// `"Error: ..."` strings rather than panicking — the relay passes the
    /// string back to the model as a tool result regardless.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible (object-safe).
    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_>;

    /// The tool's name (convenience — delegates to definition).
    fn name(&self) -> String {
        self.definition().name.clone()
    }

    /// Whether dispatching this tool ends the run. Terminal tools signal
    /// task completion; their result is appended and the loop stops.
    /// Defaults to `false`.
    fn is_terminal(&self) -> bool {
        false
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// A collection of tools that can be dispatched by name.
///
/// Manages tool registration, definition export (for the API), and dispatch
/// with timing, validation, and truncation. This is the tool-side
/// counterpart to the [`Relay`](crate::relay::runner::Relay).
///
/// # Example
///
/// ```ignore
/// let tools = ToolRegistry::new()
///     .with_max_result_bytes(15_000)
///     .with_arg_validation(true)
///     .with_weather_tools()?
///     .with(MyCustomTool::new())
///     .with_if(verbose, DebugTool::new());
///
/// let defs = tools.definitions();
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Whether to validate tool input against JSON Schema before execution.
    validate_args: bool,
    /// Default timeout for tool execution. `None` disables timeouts.
    default_timeout: Option<std::time::Duration>,
    /// Tool names that end the run (populated from `Tool::is_terminal()`).
    terminal_tools: HashSet<String>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            default_timeout: None,
            terminal_tools: HashSet::new(),
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema input validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a default timeout for tool execution. Applies to all tools unless
    /// disabled by passing `None`.
    pub fn with_default_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        if tool.is_terminal() {
            self.terminal_tools.insert(name.clone());
        }
        self.tools.insert(name, Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Register the weather lookup tools (`get_forecast`, `get_alerts`)
    /// sharing one HTTP client.
    pub fn with_weather_tools(self) -> Result<Self, String> {
        use crate::tools::weather::{AlertsTool, ForecastTool, WeatherClient};
        let weather = std::sync::Arc::new(WeatherClient::new()?);
        Ok(self
            .with(ForecastTool::new(weather.clone()))
            .with(AlertsTool::new(weather)))
    }

    /// Register the file-editing and shell tools plus the terminal
    /// `complete_task` tool. Shell tools share one [`ExecutionContext`].
    ///
    /// [`ExecutionContext`]: crate::tools::shell::ExecutionContext
    pub fn with_agent_tools(self) -> Self {
        use crate::tools::editor::{CreateFile, InsertLine, StrReplace, ViewFile};
        use crate::tools::shell::{CompleteTask, ExecuteBash, ExecutionContext, RestartSession};
        let ctx = ExecutionContext::shared();
        self.with(ViewFile)
            .with(CreateFile)
            .with(StrReplace)
            .with(InsertLine)
            .with(ExecuteBash::new(ctx.clone()))
            .with(RestartSession::new(ctx))
            .with(CompleteTask)
    }

    /// Return all tool definitions for the API.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether dispatching the named tool ends the run.
    pub fn is_terminal(&self, tool_name: &str) -> bool {
        self.terminal_tools.contains(tool_name)
    }

    /// Execute a tool call by name, with optional validation, timing, and
    /// truncation.
    ///
    /// If input validation is enabled, validates the input against the
    /// tool's declared JSON Schema before execution. Returns a structured
    /// error on validation failure so the model can self-correct.
    ///
    /// Returns the (possibly truncated) result string.
    /// Returns an error string if the tool name is unknown.
    pub async fn execute(&self, name: &str, input: &serde_json::Value) -> String {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => return format!("Error: unknown tool '{name}'"),
        };

        if self.validate_args
            && let Some(error) = validate_tool_input(tool.as_ref(), input)
        {
            return error;
        }

        log_tool_call(name, input);
        let start = std::time::Instant::now();

        // Execute with optional timeout.
        let result = if let Some(timeout_duration) = self.default_timeout {
            match tokio::time::timeout(timeout_duration, tool.execute(input)).await {
                Ok(r) => r,
                Err(_) => {
                    let elapsed = start.elapsed();
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        elapsed.as_secs_f64(),
                        timeout_duration.as_secs_f64(),
                    );
                    format!(
                        "Error: tool '{name}' timed out after {:.0} seconds. \
                         Consider breaking the task into smaller steps or using \
                         different arguments.",
                        timeout_duration.as_secs_f64(),
                    )
                }
            }
        } else {
            tool.execute(input).await
        };

        let elapsed = start.elapsed();
        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            elapsed.as_secs_f64() * 1000.0,
            result.len()
        );
        trace!(
            "Tool {name} result preview: {}",
            result.chars().take(300).collect::<String>()
        );

        truncate_result(result, self.max_result_bytes)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler = Box<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync,
>;

/// A closure-based tool that auto-parses input and delegates to a handler.
///
/// Eliminates the boilerplate of defining a struct + `impl Tool` for simple
/// tools whose execute logic is a pure async function. The generic
/// constructor performs type erasure so `FnTool` is a concrete,
/// dyn-compatible type.
///
/// Use [`FnTool`] for stateless tools. For tools that need shared state
/// (API clients, an execution context), define a struct and implement the
/// [`Tool`] trait directly.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct TimeArgs {
///     /// IANA timezone name.
///     timezone: String,
/// }
///
/// let tool = FnTool::new(
///     ToolDefinition::new("get_time", "Current time in a timezone",
///         json_schema_for::<TimeArgs>()),
///     |args: TimeArgs| async move { format!("12:00 in {}", args.timezone) },
/// );
/// ```
pub struct FnTool {
    def: ToolDefinition,
    handler: ErasedToolHandler,
    terminal: bool,
}

impl FnTool {
    /// Create a new closure-based tool.
    ///
    /// The handler receives parsed input of type `A` (auto-deserialized
    /// from the JSON input object) and returns a future that produces the
    /// result string. Parse errors are automatically formatted for the model.
    pub fn new<A, F, Fut>(def: ToolDefinition, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let erased =
            move |input: serde_json::Value| -> Pin<Box<dyn Future<Output = String> + Send>> {
                let args: A = match serde_json::from_value(input) {
                    Ok(a) => a,
                    Err(e) => {
                        return Box::pin(async move {
                            format!(
                                "Error: invalid tool input: {e}. \
                                 Please provide valid JSON matching the tool's input schema."
                            )
                        });
                    }
                };
                Box::pin(handler(args))
            };

        Self {
            def,
            handler: Box::new(erased),
            terminal: false,
        }
    }

    /// Mark this tool as terminal (builder pattern).
    pub fn terminal(mut self, is_terminal: bool) -> Self {
        self.terminal = is_terminal;
        self
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDefinition {
        self.def.clone()
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let fut = (self.handler)(input.clone());
        Box::pin(fut)
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.name)
            .field("terminal", &self.terminal)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool input against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` if validation fails.
/// The error string is formatted for the model to understand and
/// self-correct.
pub fn validate_tool_input(tool: &dyn Tool, input: &serde_json::Value) -> Option<String> {
    let schema = tool.definition().input_schema;

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return None, // If schema itself is invalid, skip validation.
    };

    let errors: Vec<String> = validator
        .iter_errors(input)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: input validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of its input.
pub fn log_tool_call(name: &str, input: &serde_json::Value) {
    let raw = input.to_string();
    let preview: String = raw.chars().take(120).collect();
    info!(
        "[tool] {}({preview}{})",
        name,
        if raw.len() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} input: {raw}");
}

/// Truncate a string to at most `max` bytes, appending a notice if trimmed.
/// The cut is backed off to the nearest character boundary.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..cut).unwrap_or_default(),
        s.len()
    )
}

/// Parse a JSON input object into a typed struct.
///
/// Returns a formatted error string suitable for returning directly from
/// [`Tool::execute`] — the model will see the error and self-correct.
///
/// # Example
///
/// ```ignore
/// fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
///     let input = input.clone();
///     Box::pin(async move {
///         let args: MyArgs = match parse_tool_args(&input) {
///             Ok(a) => a,
///             Err(e) => return e,
///         };
///         // ... use args
///     })
/// }
/// ```
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(
    input: &serde_json::Value,
) -> Result<T, String> {
    serde_json::from_value(input.clone()).map_err(|e| {
        format!(
            "Error: invalid tool input: {e}. \
             Please provide valid JSON matching the tool's input schema."
        )
    })
}

/// Extract a string value from a tool input object.
pub fn parse_string_arg(input: &serde_json::Value, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Extract an integer value from a tool input object.
pub fn parse_int_arg(input: &serde_json::Value, key: &str) -> Option<i64> {
    input.get(key).and_then(|v| v.as_i64())
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(
                "echo",
                "Echo the input",
                json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            )
        }

        fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
            let result = parse_string_arg(input, "text").unwrap_or_else(|| "Error: no text".into());
            Box::pin(async move { result })
        }
    }

    struct DoneTool;

    impl Tool for DoneTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("done", "Finish up", json!({"type": "object", "properties": {}}))
        }

        fn execute(&self, _input: &serde_json::Value) -> ToolFuture<'_> {
            Box::pin(async { "Task completed".into() })
        }

        fn is_terminal(&self) -> bool {
            true
        }
    }

    #[test]
    fn tool_name_from_definition() {
        let tool = EchoTool;
        assert_eq!(tool.name(), "echo");
    }

    #[test]
    fn registry_register_and_definitions() {
        let registry = ToolRegistry::new().with(EchoTool).with(DoneTool);
        assert_eq!(registry.len(), 2);

        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"done"));
    }

    #[test]
    fn registry_tracks_terminal_tools() {
        let registry = ToolRegistry::new().with(EchoTool).with(DoneTool);
        assert!(registry.is_terminal("done"));
        assert!(!registry.is_terminal("echo"));
        assert!(!registry.is_terminal("nonexistent"));
    }

    #[tokio::test]
    async fn registry_execute_known_tool() {
        let registry = ToolRegistry::new().with(EchoTool);
        let result = registry.execute("echo", &json!({"text": "hello"})).await;
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn registry_execute_unknown_tool() {
        let registry = ToolRegistry::new().with(EchoTool);
        let result = registry.execute("nonexistent", &json!({})).await;
        assert_eq!(result, "Error: unknown tool 'nonexistent'");
    }

    #[tokio::test]
    async fn registry_validates_input_when_enabled() {
        let registry = ToolRegistry::new().with_arg_validation(true).with(EchoTool);
        let result = registry.execute("echo", &json!({"wrong": 1})).await;
        assert!(result.contains("input validation failed"));
    }

    #[tokio::test]
    async fn registry_truncates_long_results() {
        struct BigTool;
        impl Tool for BigTool {
            fn definition(&self) -> ToolDefinition {
                ToolDefinition::new(
                    "big",
                    "Returns a big result",
                    json!({"type": "object", "properties": {}}),
                )
            }
            fn execute(&self, _input: &serde_json::Value) -> ToolFuture<'_> {
                Box::pin(async { "a".repeat(200) })
            }
        }

        let registry = ToolRegistry::new().with_max_result_bytes(50).with(BigTool);
        let result = registry.execute("big", &json!({})).await;
        assert!(result.contains("[truncated: 200 bytes total]"));
    }

    #[test]
    fn truncate_short_unchanged() {
        assert_eq!(truncate_result("hello".into(), 100), "hello");
    }

    #[test]
    fn truncate_long_is_cut() {
        let s = "a".repeat(200);
        let result = truncate_result(s, 50);
        assert!(result.starts_with(&"a".repeat(50)));
        assert!(result.contains("[truncated: 200 bytes total]"));
    }

    #[test]
    fn parse_helpers() {
        let input = json!({"name": "test", "count": 42});
        assert_eq!(parse_string_arg(&input, "name"), Some("test".into()));
        assert_eq!(parse_int_arg(&input, "count"), Some(42));
        assert_eq!(parse_string_arg(&input, "missing"), None);
    }

    #[test]
    fn with_if_true_registers_tool() {
        let registry = ToolRegistry::new().with_if(true, EchoTool);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn with_if_false_skips_tool() {
        let registry = ToolRegistry::new().with_if(false, EchoTool);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn fn_tool_parses_typed_args() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        struct Args {
            text: String,
        }
        let tool = FnTool::new(
            ToolDefinition::new("shout", "Uppercase the text", crate::json_schema_for::<Args>()),
            |args: Args| async move { args.text.to_uppercase() },
        );
        let result = tool.execute(&json!({"text": "hi"})).await;
        assert_eq!(result, "HI");

        let bad = tool.execute(&json!({"text": 5})).await;
        assert!(bad.starts_with("Error: invalid tool input"));
    }

    #[test]
    fn fn_tool_terminal_builder() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        struct Empty {}
        let tool = FnTool::new(
            ToolDefinition::new("finish", "Finish", crate::json_schema_for::<Empty>()),
            |_: Empty| async move { "done".to_string() },
        )
        .terminal(true);
        assert!(tool.is_terminal());

        let registry = ToolRegistry::new().with(tool);
        assert!(registry.is_terminal("finish"));
    }
}
