//! Lifecycle operations: workspace bootstrap and review verdict recording.

use std::fs;

use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::context::ExecContext;
use crate::core::registry::Tool;
use crate::core::result::{Effect, ToolResult, signals};
use crate::core::schema::{ToolDefinition, ParamType, required_str, str_arg};
use crate::io::git::Git;

const BOOTSTRAP_COMMITTER_NAME: &str = "Actuator Agent";
const BOOTSTRAP_COMMITTER_EMAIL: &str = "agent@actuator.invalid";

/// Idempotently prepare a workspace for agent work.
///
/// Creates the root if missing, initializes a repository on the target
/// branch, sets a local committer identity, and publishes a bootstrap commit
/// plus the tracking ref when history is absent. Re-invocation on a prepared
/// workspace is a no-op.
pub struct Bootstrap;

impl Tool for Bootstrap {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("bootstrap", "Prepare the workspace for agent work.")
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, _args: &Map<String, Value>) -> Result<ToolResult> {
        if let Err(err) = fs::create_dir_all(&ctx.workspace_root) {
            return Ok(ToolResult::fail(format!(
                "create workspace root {}: {err}",
                ctx.workspace_root.display()
            )));
        }

        let git = Git::new(ctx);
        if !git.available() {
            return Ok(ToolResult::fail(
                "git is not runnable; the workspace cannot be bootstrapped",
            ));
        }

        let mut actions = Vec::new();

        let is_repo = match git.is_repo() {
            Ok(is_repo) => is_repo,
            Err(err) => return Ok(ToolResult::fail(format!("probe repository: {err:#}"))),
        };
        if !is_repo {
            if let Err(err) = git.init(&ctx.target_branch) {
                return Ok(ToolResult::fail(format!("initialize repository: {err:#}")));
            }
            actions.push("initialized repository");
        }

        match git.config_get("user.email") {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(err) = git
                    .config_set("user.name", BOOTSTRAP_COMMITTER_NAME)
                    .and_then(|()| git.config_set("user.email", BOOTSTRAP_COMMITTER_EMAIL))
                {
                    return Ok(ToolResult::fail(format!("set committer identity: {err:#}")));
                }
                actions.push("configured committer identity");
            }
            Err(err) => return Ok(ToolResult::fail(format!("probe committer identity: {err:#}"))),
        }

        let head = match git.resolve_commit("HEAD") {
            Ok(head) => head,
            Err(err) => return Ok(ToolResult::fail(format!("probe HEAD: {err:#}"))),
        };
        if head.is_none() {
            if let Err(err) = git.commit_empty("bootstrap workspace") {
                return Ok(ToolResult::fail(format!("create bootstrap commit: {err:#}")));
            }
            actions.push("created bootstrap commit");
        }

        let tracking = ctx.tracking_ref();
        let tracking_exists = match git.resolve_commit(&tracking) {
            Ok(existing) => existing.is_some(),
            Err(err) => return Ok(ToolResult::fail(format!("probe {tracking}: {err:#}"))),
        };
        if !tracking_exists {
            let name = format!("refs/remotes/{tracking}");
            if let Err(err) = git.update_ref(&name, "HEAD") {
                return Ok(ToolResult::fail(format!("publish {tracking}: {err:#}")));
            }
            actions.push("published tracking ref");
        }

        debug!(actions = actions.len(), "bootstrap finished");
        if actions.is_empty() {
            return Ok(ToolResult::ok("workspace already bootstrapped")
                .with_field("bootstrapped", json!(false)));
        }
        Ok(ToolResult::ok(format!("bootstrapped workspace: {}", actions.join(", ")))
            .with_field("bootstrapped", json!(true))
            .with_field("actions", json!(actions)))
    }
}

/// Record a review verdict for the orchestrator.
pub struct ReviewComplete;

impl Tool for ReviewComplete {
    fn name(&self) -> &str {
        "review_complete"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("review_complete", "Record a review verdict.")
            .enumerated(
                "verdict",
                &["approve", "revise"],
                true,
                "Outcome of the review.",
            )
            .optional("notes", ParamType::String, "Reviewer notes for the next turn.")
    }

    fn exec(&self, _ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let verdict = required_str(args, "verdict")?;
        let mut effect = Effect::new(signals::REVIEW_COMPLETE).with("verdict", verdict);
        if let Some(notes) = str_arg(args, "notes") {
            effect = effect.with("notes", notes);
        }
        Ok(ToolResult::ok(format!("review recorded: {verdict}")).with_effect(effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Registry;
    use crate::ops::register_builtin;
    use crate::test_support::{context_for, run_git};

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str(raw).expect("parse args") {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn bootstrap_prepares_an_empty_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(temp.path());

        let result = Bootstrap.exec(&ctx, &args("{}")).expect("exec");
        assert!(result.success, "{}", result.content);
        assert_eq!(result.fields["bootstrapped"], json!(true));

        assert!(temp.path().join(".git").exists());
        let head = run_git(temp.path(), &["rev-parse", "HEAD"]).expect("head");
        let tracking = run_git(temp.path(), &["rev-parse", "refs/remotes/origin/main"])
            .expect("tracking ref");
        assert_eq!(head.trim(), tracking.trim());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(temp.path());

        Bootstrap.exec(&ctx, &args("{}")).expect("first");
        let second = Bootstrap.exec(&ctx, &args("{}")).expect("second");
        assert!(second.success);
        assert_eq!(second.fields["bootstrapped"], json!(false));
        assert!(second.content.contains("already bootstrapped"));
    }

    #[test]
    fn review_complete_emits_the_verdict_effect() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(temp.path());

        let result = ReviewComplete
            .exec(&ctx, &args(r#"{"verdict": "revise", "notes": "tighten error paths"}"#))
            .expect("exec");
        assert!(result.success);

        let effect = result.effect.expect("effect");
        assert_eq!(effect.signal, signals::REVIEW_COMPLETE);
        assert_eq!(effect.data["verdict"], json!("revise"));
        assert_eq!(effect.data["notes"], json!("tighten error paths"));
    }

    #[test]
    fn review_verdict_outside_the_closed_set_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new();
        register_builtin(&registry).expect("register");
        let ctx = context_for(temp.path());

        let err = registry
            .invoke("review_complete", &ctx, &args(r#"{"verdict": "maybe"}"#))
            .unwrap_err();
        assert!(err.to_string().contains("invalid arguments"));
    }
}
