//! File-editing tools: view, create, replace, insert.
//!
//! Every tool takes a `reasoning` argument so runs are auditable from the
//! event stream alone. Arguments are validated before any I/O, and the
//! error names the offending field so the model can self-correct.
//!
//! Paths starting with `/repo` are rewritten to the process working
//! directory, giving the model a stable root alias across machines.

use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::{ToolDefinition, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

/// Alias the model may use for the working directory root.
pub const REPO_ALIAS: &str = "/repo";

/// Rewrite a `/repo`-prefixed path to the current working directory.
pub fn resolve_path(path: &str) -> String {
    match path.strip_prefix(REPO_ALIAS) {
        Some(rest) => {
            let cwd = std::env::current_dir()
                .map_or_else(|_| ".".to_string(), |p| p.display().to_string());
            format!("{cwd}{rest}")
        }
        None => path.to_string(),
    }
}

/// Rewrite every `/repo` occurrence in free text (e.g. a shell command) to
/// the current working directory.
pub fn resolve_repo_refs(text: &str) -> String {
    if !text.contains(REPO_ALIAS) {
        return text.to_string();
    }
    let cwd = std::env::current_dir().map_or_else(|_| ".".to_string(), |p| p.display().to_string());
    text.replace(REPO_ALIAS, &cwd)
}

// ── view_file ──────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct ViewFileArgs {
    /// Why this file needs to be viewed.
    pub reasoning: String,
    /// Path to the file. "/repo" refers to the working directory root.
    pub path: String,
}

/// `view_file`: return a file's contents.
pub struct ViewFile;

impl Tool for ViewFile {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "view_file",
            "View the contents of a file.",
            json_schema_for::<ViewFileArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let input = input.clone();
        Box::pin(async move {
            let args: ViewFileArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.path.trim().is_empty() {
                return "Error: invalid file path: 'path' is empty.".to_string();
            }
            debug!("view_file: {} ({})", args.path, args.reasoning);

            let path = resolve_path(&args.path);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    format!("Error: file {path} does not exist")
                }
                Err(e) => format!("Error: failed to read {path}: {e}"),
            }
        })
    }
}

// ── create_file ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct CreateFileArgs {
    /// Why this file needs to be created.
    pub reasoning: String,
    /// Path for the new file. "/repo" refers to the working directory root.
    pub path: String,
    /// Full contents of the file.
    pub file_text: String,
}

/// `create_file`: write a new file, creating parent directories as needed.
/// Overwrites an existing file at the same path.
pub struct CreateFile;

impl Tool for CreateFile {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "create_file",
            "Create a new file with the given contents. Overwrites if the file exists.",
            json_schema_for::<CreateFileArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let input = input.clone();
        Box::pin(async move {
            let args: CreateFileArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.path.trim().is_empty() {
                return "Error: invalid file path: 'path' is empty.".to_string();
            }
            debug!("create_file: {} ({})", args.path, args.reasoning);

            let path = resolve_path(&args.path);
            if let Some(parent) = std::path::Path::new(&path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = tokio::fs::create_dir_all(parent).await
            {
                return format!("Error: failed to create parent directories for {path}: {e}");
            }
            match tokio::fs::write(&path, &args.file_text).await {
                Ok(()) => format!("File created at {path}"),
                Err(e) => format!("Error: failed to write {path}: {e}"),
            }
        })
    }
}

// ── str_replace ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct StrReplaceArgs {
    /// Why this replacement is being made.
    pub reasoning: String,
    /// Path to the file. "/repo" refers to the working directory root.
    pub path: String,
    /// Exact text to find.
    pub old_str: String,
    /// Replacement text. May be empty to delete the matched text.
    #[serde(default)]
    pub new_str: String,
}

/// `str_replace`: replace every occurrence of `old_str` in a file.
pub struct StrReplace;

impl Tool for StrReplace {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "str_replace",
            "Replace text in a file. Replaces every occurrence of old_str with new_str.",
            json_schema_for::<StrReplaceArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let input = input.clone();
        Box::pin(async move {
            let args: StrReplaceArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.path.trim().is_empty() {
                return "Error: invalid file path: 'path' is empty.".to_string();
            }
            if args.old_str.is_empty() {
                return "Error: no text to replace: 'old_str' is empty.".to_string();
            }
            debug!("str_replace: {} ({})", args.path, args.reasoning);

            let path = resolve_path(&args.path);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return format!("Error: file {path} does not exist");
                }
                Err(e) => return format!("Error: failed to read {path}: {e}"),
            };
            if !content.contains(&args.old_str) {
                return format!("Error: '{}' not found in {path}", args.old_str);
            }

            let updated = content.replace(&args.old_str, &args.new_str);
            match tokio::fs::write(&path, updated).await {
                Ok(()) => "Text replaced successfully".to_string(),
                Err(e) => format!("Error: failed to write {path}: {e}"),
            }
        })
    }
}

// ── insert_line ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct InsertLineArgs {
    /// Why this insertion is being made.
    pub reasoning: String,
    /// Path to the file. "/repo" refers to the working directory root.
    pub path: String,
    /// Line number to insert after (0 inserts at the top of the file).
    #[serde(default)]
    pub insert_line: Option<u32>,
    /// Text of the line to insert.
    #[serde(default)]
    pub new_str: String,
}

/// `insert_line`: insert a line of text after the given line number.
pub struct InsertLine;

impl Tool for InsertLine {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "insert_line",
            "Insert a line of text after the given line number (0 inserts at the top).",
            json_schema_for::<InsertLineArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let input = input.clone();
        Box::pin(async move {
            let args: InsertLineArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.path.trim().is_empty() {
                return "Error: invalid file path: 'path' is empty.".to_string();
            }
            let Some(insert_line) = args.insert_line else {
                return "Error: no line number: 'insert_line' is missing.".to_string();
            };
            if args.new_str.is_empty() {
                return "Error: no text to insert: 'new_str' is empty.".to_string();
            }
            debug!("insert_line: {}:{insert_line} ({})", args.path, args.reasoning);

            let path = resolve_path(&args.path);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return format!("Error: file {path} does not exist");
                }
                Err(e) => return format!("Error: failed to read {path}: {e}"),
            };

            let mut lines: Vec<&str> = content.lines().collect();
            let idx = insert_line as usize;
            if idx > lines.len() {
                return format!(
                    "Error: insert line {insert_line} out of range (0-{})",
                    lines.len()
                );
            }
            lines.insert(idx, &args.new_str);

            let mut updated = lines.join("\n");
            if content.ends_with('\n') {
                updated.push('\n');
            }
            match tokio::fs::write(&path, updated).await {
                Ok(()) => "Line inserted successfully".to_string(),
                Err(e) => format!("Error: failed to write {path}: {e}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_file(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt").display().to_string();
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn view_file_returns_contents() {
        let (_dir, path) = temp_file("line one\nline two\n");
        let result = ViewFile
            .execute(&json!({"reasoning": "check", "path": path}))
            .await;
        assert_eq!(result, "line one\nline two\n");
    }

    #[tokio::test]
    async fn view_file_missing_file() {
        let result = ViewFile
            .execute(&json!({"reasoning": "check", "path": "/nonexistent/file.txt"}))
            .await;
        assert!(result.contains("does not exist"));
    }

    #[tokio::test]
    async fn view_file_empty_path_names_field() {
        let result = ViewFile
            .execute(&json!({"reasoning": "check", "path": "  "}))
            .await;
        assert_eq!(result, "Error: invalid file path: 'path' is empty.");
    }

    #[tokio::test]
    async fn create_file_writes_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/new.txt").display().to_string();
        let result = CreateFile
            .execute(&json!({
                "reasoning": "new module",
                "path": path,
                "file_text": "hello"
            }))
            .await;
        assert_eq!(result, format!("File created at {path}"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn str_replace_replaces_all_occurrences() {
        let (_dir, path) = temp_file("foo bar foo\n");
        let result = StrReplace
            .execute(&json!({
                "reasoning": "rename",
                "path": path,
                "old_str": "foo",
                "new_str": "baz"
            }))
            .await;
        assert_eq!(result, "Text replaced successfully");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "baz bar baz\n");
    }

    #[tokio::test]
    async fn str_replace_missing_old_str_reported() {
        let (_dir, path) = temp_file("content\n");
        let result = StrReplace
            .execute(&json!({
                "reasoning": "rename",
                "path": path,
                "old_str": "absent",
                "new_str": "x"
            }))
            .await;
        assert_eq!(result, format!("Error: 'absent' not found in {path}"));
    }

    #[tokio::test]
    async fn str_replace_empty_old_str_names_field() {
        let (_dir, path) = temp_file("content\n");
        let result = StrReplace
            .execute(&json!({
                "reasoning": "rename",
                "path": path,
                "old_str": "",
                "new_str": "x"
            }))
            .await;
        assert_eq!(result, "Error: no text to replace: 'old_str' is empty.");
    }

    #[tokio::test]
    async fn insert_line_at_top_and_middle() {
        let (_dir, path) = temp_file("a\nb\n");
        let result = InsertLine
            .execute(&json!({
                "reasoning": "add header",
                "path": path,
                "insert_line": 0,
                "new_str": "top"
            }))
            .await;
        assert_eq!(result, "Line inserted successfully");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "top\na\nb\n");

        let result = InsertLine
            .execute(&json!({
                "reasoning": "add middle",
                "path": path,
                "insert_line": 2,
                "new_str": "mid"
            }))
            .await;
        assert_eq!(result, "Line inserted successfully");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "top\na\nmid\nb\n");
    }

    #[tokio::test]
    async fn insert_line_out_of_range() {
        let (_dir, path) = temp_file("a\nb\n");
        let result = InsertLine
            .execute(&json!({
                "reasoning": "add",
                "path": path,
                "insert_line": 10,
                "new_str": "x"
            }))
            .await;
        assert_eq!(result, "Error: insert line 10 out of range (0-2)");
    }

    #[tokio::test]
    async fn insert_line_missing_number_names_field() {
        let (_dir, path) = temp_file("a\n");
        let result = InsertLine
            .execute(&json!({
                "reasoning": "add",
                "path": path,
                "new_str": "x"
            }))
            .await;
        assert_eq!(result, "Error: no line number: 'insert_line' is missing.");
    }

    #[test]
    fn resolve_path_rewrites_repo_alias() {
        let cwd = std::env::current_dir().unwrap().display().to_string();
        assert_eq!(resolve_path("/repo/src/lib.rs"), format!("{cwd}/src/lib.rs"));
        assert_eq!(resolve_path("/tmp/other.txt"), "/tmp/other.txt");
    }

    #[test]
    fn resolve_repo_refs_rewrites_all_occurrences() {
        let cwd = std::env::current_dir().unwrap().display().to_string();
        assert_eq!(
            resolve_repo_refs("ls /repo/src && cat /repo/Cargo.toml"),
            format!("ls {cwd}/src && cat {cwd}/Cargo.toml")
        );
        assert_eq!(resolve_repo_refs("echo hi"), "echo hi");
    }
}
