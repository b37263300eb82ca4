//! Shell-style file operations: read, list, targeted edit.
//!
//! Every path argument is resolved against the workspace root before any
//! filesystem access; escapes abort the call as argument errors.

use std::fs;

use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::context::ExecContext;
use crate::core::paths::resolve_within;
use crate::core::registry::Tool;
use crate::core::result::ToolResult;
use crate::core::schema::{ParamType, ToolDefinition, positive_arg, required_str, str_arg};

/// Read a file under the workspace root, capped at a byte limit.
pub struct ReadFile;

impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("read_file", "Read a file under the workspace root.")
            .required("path", ParamType::String, "Workspace-relative file path.")
            .optional(
                "max_bytes",
                ParamType::Integer,
                "Truncate content beyond this many bytes.",
            )
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let raw_path = required_str(args, "path")?;
        let path = resolve_within(&ctx.workspace_root, raw_path)?;
        let limit = positive_arg(args, "max_bytes")?
            .map(|v| v as usize)
            .unwrap_or(ctx.output_limit_bytes);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(ToolResult::fail(format!("read {}: {err}", path.display()))),
        };

        let truncated = bytes.len() > limit;
        let kept = &bytes[..bytes.len().min(limit)];
        let mut content = String::from_utf8_lossy(kept).to_string();
        if truncated {
            content.push_str(&format!("\n[truncated {} bytes]\n", bytes.len() - kept.len()));
        }
        debug!(bytes = bytes.len(), truncated, "read file");
        Ok(ToolResult::ok(content)
            .with_field("bytes", json!(bytes.len()))
            .with_field("truncated", json!(truncated)))
    }
}

/// List a directory under the workspace root, sorted, directories marked.
pub struct ListFiles;

impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_files", "List a directory under the workspace root.").optional(
            "path",
            ParamType::String,
            "Workspace-relative directory; defaults to the root.",
        )
    }

    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let raw_path = str_arg(args, "path").unwrap_or(".");
        let path = resolve_within(&ctx.workspace_root, raw_path)?;

        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(err) => return Ok(ToolResult::fail(format!("list {}: {err}", path.display()))),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Ok(ToolResult::fail(format!("list {}: {err}", path.display()))),
            };
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        let content = if names.is_empty() {
            format!("{} is empty", path.display())
        } else {
            names.join("\n")
        };
        Ok(ToolResult::ok(content).with_field("entries", json!(names)))
    }
}

/// Replace exactly one occurrence of an exact substring in a file.
///
/// The exact-one-match requirement is the safety invariant that prevents
/// unintended mass edits; zero matches and multiple matches both leave the
/// file untouched.
pub struct EditFile;

impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "edit_file",
            "Replace exactly one occurrence of an exact substring in a file.",
        )
        .required("path", ParamType::String, "Workspace-relative file path.")
        .required(
            "old_string",
            ParamType::String,
            "Exact substring to replace; must occur exactly once.",
        )
        .required("new_string", ParamType::String, "Replacement text.")
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let raw_path = required_str(args, "path")?;
        let path = resolve_within(&ctx.workspace_root, raw_path)?;
        let old = required_str(args, "old_string")?;
        let new = required_str(args, "new_string")?;
        if old.is_empty() {
            bail!("old_string must not be empty");
        }

        let current = match fs::read_to_string(&path) {
            Ok(current) => current,
            Err(err) => return Ok(ToolResult::fail(format!("read {}: {err}", path.display()))),
        };

        let matches = current.matches(old).count();
        if matches == 0 {
            return Ok(ToolResult::fail(format!(
                "target not found in {}: old_string does not occur",
                path.display()
            ))
            .with_field("matches", json!(0)));
        }
        if matches > 1 {
            return Ok(ToolResult::fail(format!(
                "ambiguous edit: {matches} matches in {}; extend old_string until it is unique",
                path.display()
            ))
            .with_field("matches", json!(matches)));
        }

        let updated = current.replacen(old, new, 1);
        if let Err(err) = fs::write(&path, updated) {
            return Ok(ToolResult::fail(format!("write {}: {err}", path.display())));
        }
        debug!(path = %path.display(), "replaced one occurrence");
        Ok(ToolResult::ok(format!(
            "replaced 1 occurrence in {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_for;

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str(raw).expect("parse args") {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn edit_replaces_single_occurrence() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("main.rs"), "fn main() {}\n").expect("write");

        let ctx = context_for(temp.path());
        let result = EditFile
            .exec(
                &ctx,
                &args(r#"{"path": "main.rs", "old_string": "main", "new_string": "start"}"#),
            )
            .expect("exec");
        assert!(result.success);

        let updated = std::fs::read_to_string(temp.path().join("main.rs")).expect("read");
        assert_eq!(updated, "fn start() {}\n");
    }

    #[test]
    fn edit_fails_when_target_is_missing_and_leaves_file_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "alpha\n").expect("write");

        let ctx = context_for(temp.path());
        let result = EditFile
            .exec(
                &ctx,
                &args(r#"{"path": "a.txt", "old_string": "beta", "new_string": "gamma"}"#),
            )
            .expect("exec");
        assert!(!result.success);
        assert!(result.content.contains("not found"));
        assert_eq!(std::fs::read_to_string(&file).expect("read"), "alpha\n");
    }

    #[test]
    fn edit_fails_on_ambiguous_target_and_leaves_file_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "x x\n").expect("write");

        let ctx = context_for(temp.path());
        let result = EditFile
            .exec(
                &ctx,
                &args(r#"{"path": "a.txt", "old_string": "x", "new_string": "y"}"#),
            )
            .expect("exec");
        assert!(!result.success);
        assert!(result.content.contains("2 matches"));
        assert_eq!(std::fs::read_to_string(&file).expect("read"), "x x\n");
    }

    #[test]
    fn edit_round_trips_quotes_and_newlines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "before MARK after\n").expect("write");

        let ctx = context_for(temp.path());
        let replacement = "\"quoted\"\n'single'\n$(not a shell)\n";
        let mut call = args(r#"{"path": "a.txt", "old_string": "MARK"}"#);
        call.insert("new_string".to_string(), Value::String(replacement.to_string()));
        let result = EditFile.exec(&ctx, &call).expect("exec");
        assert!(result.success);

        let updated = std::fs::read_to_string(&file).expect("read");
        assert_eq!(updated, format!("before {replacement} after\n"));
    }

    #[test]
    fn path_escape_is_rejected_before_any_file_access() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(temp.path());

        for (tool, call) in [
            (
                &EditFile as &dyn Tool,
                args(r#"{"path": "../x", "old_string": "a", "new_string": "b"}"#),
            ),
            (&ReadFile as &dyn Tool, args(r#"{"path": "../x"}"#)),
            (&ListFiles as &dyn Tool, args(r#"{"path": "../x"}"#)),
        ] {
            let err = tool.exec(&ctx, &call).unwrap_err();
            assert!(err.to_string().contains("escapes"), "{err}");
        }
    }

    #[test]
    fn read_truncates_at_byte_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("big.txt"), "a".repeat(100)).expect("write");

        let ctx = context_for(temp.path());
        let result = ReadFile
            .exec(&ctx, &args(r#"{"path": "big.txt", "max_bytes": 10}"#))
            .expect("exec");
        assert!(result.success);
        assert_eq!(result.fields["truncated"], json!(true));
        assert!(result.content.contains("[truncated 90 bytes]"));
    }

    #[test]
    fn list_marks_directories_and_sorts() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(temp.path().join("src")).expect("mkdir");
        std::fs::write(temp.path().join("a.txt"), "a").expect("write");

        let ctx = context_for(temp.path());
        let result = ListFiles.exec(&ctx, &args("{}")).expect("exec");
        assert!(result.success);
        assert_eq!(result.fields["entries"], json!(["a.txt", "src/"]));
    }
}
