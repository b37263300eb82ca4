//! Workspace diff against a branch-relative baseline.

use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::context::ExecContext;
use crate::core::paths::clean_relative;
use crate::core::registry::Tool;
use crate::core::result::ToolResult;
use crate::core::schema::{ParamType, ToolDefinition, list_arg, positive_arg, str_arg};
use crate::io::git::Git;

/// Diff the workspace against an explicit ref or the merge-base of the
/// remote tracking branch and HEAD.
///
/// The merge-base default isolates exactly what this branch contributes:
/// changes made by others on the tracked branch after the branch point never
/// pollute the diff. Caller-supplied refs are resolved to a commit SHA
/// before they reach the diff command; unresolvable refs are an explicit
/// failure, never a silent fallback.
pub struct WorkspaceDiff;

impl Tool for WorkspaceDiff {
    fn name(&self) -> &str {
        "workspace_diff"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "workspace_diff",
            "Diff workspace changes against a branch-relative baseline.",
        )
        .optional(
            "base_ref",
            ParamType::String,
            "Explicit baseline ref; defaults to the merge-base of the remote tracking branch and HEAD.",
        )
        .optional(
            "paths",
            ParamType::StringList,
            "Restrict the diff to these workspace-relative paths.",
        )
        .optional(
            "max_lines",
            ParamType::Integer,
            "Truncate the diff beyond this many lines.",
        )
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        // Path filters are validated before any command sees them.
        let mut pathspecs = Vec::new();
        if let Some(paths) = list_arg(args, "paths") {
            for path in &paths {
                let cleaned = clean_relative(path)?;
                if cleaned.as_os_str().is_empty() {
                    // "." cleans to nothing; an empty pathspec is invalid.
                    pathspecs.push(".".to_string());
                } else {
                    pathspecs.push(cleaned.display().to_string());
                }
            }
        }
        let max_lines = positive_arg(args, "max_lines")?
            .map(|v| v as usize)
            .unwrap_or(ctx.diff_max_lines);

        let git = Git::new(ctx);
        let base = match str_arg(args, "base_ref") {
            Some(reference) => match git.resolve_commit(reference) {
                Ok(Some(sha)) => sha,
                Ok(None) => {
                    return Ok(ToolResult::fail(format!(
                        "invalid ref '{reference}': does not resolve to a commit"
                    )));
                }
                Err(err) => {
                    return Ok(ToolResult::fail(format!("git unavailable: {err:#}")));
                }
            },
            None => {
                let tracking = ctx.tracking_ref();
                match git.merge_base(&tracking, "HEAD") {
                    Ok(Some(sha)) => sha,
                    Ok(None) => {
                        return Ok(ToolResult::fail(format!(
                            "could not resolve the merge-base of {tracking} and HEAD; supply base_ref explicitly"
                        )));
                    }
                    Err(err) => {
                        return Ok(ToolResult::fail(format!("git unavailable: {err:#}")));
                    }
                }
            }
        };

        let outcome = match git.diff(&base, &pathspecs) {
            Ok(outcome) => outcome,
            Err(err) => return Ok(ToolResult::fail(format!("git unavailable: {err:#}"))),
        };
        if !outcome.success() {
            return Ok(ToolResult::fail(format!(
                "git diff failed (exit {:?}): {}",
                outcome.exit_code,
                outcome.stderr_text().trim()
            )));
        }

        let full = outcome.stdout_text();
        let line_count = full.lines().count();
        let truncated = line_count > max_lines;
        let limited = if truncated {
            full.lines().take(max_lines).collect::<Vec<_>>().join("\n")
        } else {
            full.trim_end().to_string()
        };
        debug!(base = %base, line_count, truncated, "diff computed");

        let content = if line_count == 0 {
            format!("no changes against {base}")
        } else if truncated {
            format!("diff against {base} ({line_count} lines, truncated to {max_lines}):\n\n{limited}")
        } else {
            format!("diff against {base} ({line_count} lines):\n\n{limited}")
        };
        Ok(ToolResult::ok(content)
            .with_field("diff", json!(limited))
            .with_field("truncated", json!(truncated))
            .with_field("line_count", json!(line_count))
            .with_field("base", json!(base)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{branched_repo, context_for};

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str(raw).expect("parse args") {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn default_baseline_isolates_branch_local_changes() {
        let (_temp, root) = branched_repo(2).expect("repo");
        let ctx = context_for(&root);

        let result = WorkspaceDiff.exec(&ctx, &args("{}")).expect("exec");
        assert!(result.success, "{}", result.content);

        let diff = result.fields["diff"].as_str().expect("diff field");
        assert!(diff.contains("local_0.txt"));
        assert!(diff.contains("local_1.txt"));
        // The remote-side change landed after the branch point and must not
        // appear against the merge-base baseline.
        assert!(!diff.contains("remote.txt"), "{diff}");
    }

    #[test]
    fn invalid_explicit_ref_is_an_explicit_failure() {
        let (_temp, root) = branched_repo(1).expect("repo");
        let ctx = context_for(&root);

        let result = WorkspaceDiff
            .exec(&ctx, &args(r#"{"base_ref": "no-such-ref"}"#))
            .expect("exec");
        assert!(!result.success);
        assert!(result.content.contains("invalid ref"));
    }

    #[test]
    fn truncation_is_reported_with_the_observed_line_count() {
        let (_temp, root) = branched_repo(2).expect("repo");
        let ctx = context_for(&root);

        let result = WorkspaceDiff
            .exec(&ctx, &args(r#"{"max_lines": 3}"#))
            .expect("exec");
        assert!(result.success);
        assert_eq!(result.fields["truncated"], json!(true));
        let line_count = result.fields["line_count"].as_u64().expect("count");
        assert!(line_count > 3);
        assert_eq!(result.fields["diff"].as_str().expect("diff").lines().count(), 3);
    }

    #[test]
    fn path_filter_restricts_the_diff() {
        let (_temp, root) = branched_repo(2).expect("repo");
        let ctx = context_for(&root);

        let result = WorkspaceDiff
            .exec(&ctx, &args(r#"{"paths": ["local_0.txt"]}"#))
            .expect("exec");
        assert!(result.success);
        let diff = result.fields["diff"].as_str().expect("diff");
        assert!(diff.contains("local_0.txt"));
        assert!(!diff.contains("local_1.txt"));
    }

    #[test]
    fn escaping_path_filter_aborts_the_call() {
        let (_temp, root) = branched_repo(1).expect("repo");
        let ctx = context_for(&root);

        let err = WorkspaceDiff
            .exec(&ctx, &args(r#"{"paths": ["../outside"]}"#))
            .unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }
}
