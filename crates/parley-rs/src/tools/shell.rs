//! Shell execution tools: `execute_bash`, `restart_session`, and the
//! terminal `complete_task`.
//!
//! Commands run under an explicit [`ExecutionContext`] holding the
//! environment snapshot for the session. `restart_session` resets the
//! snapshot to the current process environment; nothing else mutates it,
//! so runs are reproducible and the state is inspectable.

use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::{ToolDefinition, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ── ExecutionContext ───────────────────────────────────────────────

/// Environment state shared by the shell tools for one session.
pub struct ExecutionContext {
    env: Mutex<HashMap<String, String>>,
}

impl ExecutionContext {
    /// Snapshot the current process environment.
    pub fn new() -> Self {
        Self {
            env: Mutex::new(std::env::vars().collect()),
        }
    }

    /// A shared context for registering across multiple tools.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Replace the snapshot with the current process environment.
    pub fn reset(&self) {
        let mut env = self.env.lock().unwrap_or_else(|e| e.into_inner());
        *env = std::env::vars().collect();
    }

    /// A copy of the environment snapshot.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.env
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

// ── execute_bash ───────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct ExecuteBashArgs {
    /// Why this command needs to run.
    pub reasoning: String,
    /// The bash command to execute.
    pub command: String,
}

/// `execute_bash`: run a command via `bash -c` under the session environment.
pub struct ExecuteBash {
    ctx: Arc<ExecutionContext>,
}

impl ExecuteBash {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ExecuteBash {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "execute_bash",
            "Execute a bash command and return its output. \
             \"/repo\" in the command refers to the working directory root.",
            json_schema_for::<ExecuteBashArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let ctx = self.ctx.clone();
        let input = input.clone();
        Box::pin(async move {
            let args: ExecuteBashArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.command.trim().is_empty() {
                return "Error: no command specified: 'command' is empty.".to_string();
            }
            debug!("execute_bash: {} ({})", args.command, args.reasoning);

            let command = crate::tools::editor::resolve_repo_refs(&args.command);
            let output = match tokio::process::Command::new("bash")
                .arg("-c")
                .arg(&command)
                .env_clear()
                .envs(ctx.snapshot())
                .output()
                .await
            {
                Ok(o) => o,
                Err(e) => return format!("Error: failed to spawn bash: {e}"),
            };

            if output.status.success() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if stderr.is_empty() {
                    format!(
                        "Error: command exited with status {}",
                        output.status.code().unwrap_or(-1)
                    )
                } else {
                    format!("Error: {stderr}")
                }
            }
        })
    }
}

// ── restart_session ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct RestartSessionArgs {
    /// Why the session needs restarting.
    pub reasoning: String,
}

/// `restart_session`: reset the session environment snapshot.
pub struct RestartSession {
    ctx: Arc<ExecutionContext>,
}

impl RestartSession {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for RestartSession {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "restart_session",
            "Restart the shell session, resetting the environment to a clean snapshot.",
            json_schema_for::<RestartSessionArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let ctx = self.ctx.clone();
        let input = input.clone();
        Box::pin(async move {
            let args: RestartSessionArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.reasoning.trim().is_empty() {
                return "Error: no reasoning provided for restarting the session.".to_string();
            }
            debug!("restart_session: {}", args.reasoning);
            ctx.reset();
            "Bash session restarted.".to_string()
        })
    }
}

// ── complete_task ──────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct CompleteTaskArgs {
    /// Why the task is considered complete.
    pub reasoning: String,
}

/// `complete_task`: terminal tool signalling the task is done. Dispatching
/// it ends the run after its result is appended.
pub struct CompleteTask;

impl Tool for CompleteTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "complete_task",
            "Declare the task complete. Call this once the user's request is fully done.",
            json_schema_for::<CompleteTaskArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let input = input.clone();
        Box::pin(async move {
            let args: CompleteTaskArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.reasoning.trim().is_empty() {
                return "Error: no reasoning provided for task completion.".to_string();
            }
            debug!("complete_task: {}", args.reasoning);
            "Task completed".to_string()
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_snapshot_carries_process_env() {
        let ctx = ExecutionContext::new();
        let snapshot = ctx.snapshot();
        assert!(snapshot.contains_key("PATH"));
        ctx.reset();
        assert!(ctx.snapshot().contains_key("PATH"));
    }

    #[tokio::test]
    async fn execute_bash_captures_stdout() {
        let tool = ExecuteBash::new(ExecutionContext::shared());
        let result = tool
            .execute(&json!({"reasoning": "check", "command": "echo hello"}))
            .await;
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn execute_bash_nonzero_exit_reports_stderr() {
        let tool = ExecuteBash::new(ExecutionContext::shared());
        let result = tool
            .execute(&json!({
                "reasoning": "check",
                "command": "echo oops >&2; exit 3"
            }))
            .await;
        assert_eq!(result, "Error: oops");
    }

    #[tokio::test]
    async fn execute_bash_nonzero_exit_without_stderr() {
        let tool = ExecuteBash::new(ExecutionContext::shared());
        let result = tool
            .execute(&json!({"reasoning": "check", "command": "exit 2"}))
            .await;
        assert_eq!(result, "Error: command exited with status 2");
    }

    #[tokio::test]
    async fn execute_bash_empty_command_names_field() {
        let tool = ExecuteBash::new(ExecutionContext::shared());
        let result = tool
            .execute(&json!({"reasoning": "check", "command": "  "}))
            .await;
        assert_eq!(result, "Error: no command specified: 'command' is empty.");
    }

    #[tokio::test]
    async fn restart_session_requires_reasoning() {
        let tool = RestartSession::new(ExecutionContext::shared());
        let result = tool.execute(&json!({"reasoning": ""})).await;
        assert_eq!(
            result,
            "Error: no reasoning provided for restarting the session."
        );

        let result = tool.execute(&json!({"reasoning": "stale env"})).await;
        assert_eq!(result, "Bash session restarted.");
    }

    #[tokio::test]
    async fn complete_task_is_terminal() {
        assert!(CompleteTask.is_terminal());
        let result = CompleteTask
            .execute(&json!({"reasoning": "all done"}))
            .await;
        assert_eq!(result, "Task completed");
    }

    #[test]
    fn agent_tools_register() {
        let registry = crate::tools::core::ToolRegistry::new().with_agent_tools();
        assert_eq!(registry.len(), 7);
        assert!(registry.is_terminal("complete_task"));
        assert!(!registry.is_terminal("execute_bash"));
    }
}
