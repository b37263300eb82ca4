//! Completion detector: commit pending work and pick the next signal.

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::core::context::ExecContext;
use crate::core::registry::Tool;
use crate::core::result::{Effect, ToolResult, signals};
use crate::core::schema::{ParamType, ToolDefinition, required_str, str_arg};
use crate::io::git::Git;

/// History state of the branch relative to the tracking merge-base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum History {
    /// Commits exist beyond the merge-base.
    Present(u64),
    /// HEAD sits exactly at the merge-base.
    Empty,
    /// A probe failed or produced ambiguous output.
    Unknown,
}

/// Close out a unit of work.
///
/// Three terminal classifications per invocation: staged changes are
/// committed (advance to testing), no staged changes but prior commits exist
/// (advance to testing), or no changes at all (story complete, with the
/// caller's explanation as medium-confidence evidence). The detector infers
/// completion from an empty diff; it does not assess sufficiency.
pub struct Done;

impl Tool for Done {
    fn name(&self) -> &str {
        "done"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("done", "Commit pending workspace changes and close out the task.")
            .required(
                "summary",
                ParamType::String,
                "One-line summary used as the commit message.",
            )
            .optional(
                "task_id",
                ParamType::String,
                "Task identifier prefixed onto the commit message.",
            )
            .optional(
                "explanation",
                ParamType::String,
                "Why no code change was required, when none was.",
            )
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let summary = required_str(args, "summary")?;
        let git = Git::new(ctx);

        if !git.available() {
            warn!("execution primitive unavailable, degrading to advance signal");
            return Ok(ToolResult::ok(
                "execution primitive unavailable; recorded completion without touching git",
            )
            .with_effect(advance_effect(summary, args)));
        }

        // Staging failure is fatal: no sensible signal can be derived from a
        // workspace we could not stage.
        git.add_all().context("stage workspace changes")?;
        let staged = git.staged_files().context("inspect staged changes")?;

        if !staged.is_empty() {
            let message = match str_arg(args, "task_id") {
                Some(task_id) => format!("{task_id}: {summary}"),
                None => summary.to_string(),
            };
            let outcome = match git.commit(&message) {
                Ok(outcome) => outcome,
                Err(err) => {
                    return Ok(ToolResult::fail(format!(
                        "staging succeeded but committing failed: {err:#}"
                    )));
                }
            };
            if !outcome.success() {
                return Ok(ToolResult::fail(format!(
                    "staging succeeded but committing failed (exit {:?}): {}",
                    outcome.exit_code,
                    outcome.stderr_text().trim()
                )));
            }
            debug!(files = staged.len(), "committed staged changes");
            return Ok(ToolResult::ok(format!(
                "committed {} file(s): {message}",
                staged.len()
            ))
            .with_field("committed", json!(true))
            .with_field("files", json!(staged))
            .with_effect(advance_effect(summary, args)));
        }

        match classify_history(&git, &ctx.tracking_ref()) {
            History::Present(count) => Ok(ToolResult::ok(format!(
                "no new changes; {count} commit(s) beyond {} are sufficient",
                ctx.tracking_ref()
            ))
            .with_field("committed", json!(false))
            .with_effect(advance_effect(summary, args))),
            History::Unknown => Ok(ToolResult::ok(
                "no new changes; history probes were inconclusive, assuming prior work exists",
            )
            .with_field("committed", json!(false))
            .with_effect(advance_effect(summary, args))),
            History::Empty => {
                let explanation = str_arg(args, "explanation").unwrap_or(summary);
                Ok(
                    ToolResult::ok("no changes detected; the task required no code change")
                        .with_field("committed", json!(false))
                        .with_effect(
                            Effect::new(signals::STORY_COMPLETE)
                                .with("evidence", explanation)
                                .with("confidence", "medium"),
                        ),
                )
            }
        }
    }
}

fn advance_effect(summary: &str, args: &Map<String, Value>) -> Effect {
    let mut effect = Effect::new(signals::ADVANCE_TO_TESTING).with("summary", summary);
    if let Some(task_id) = str_arg(args, "task_id") {
        effect = effect.with("task_id", task_id);
    }
    effect
}

/// Probe failures classify as [`History::Unknown`], which is treated the
/// same as prior history existing: a "story complete" signal is only ever
/// derived from an unambiguously empty range.
fn classify_history(git: &Git, tracking: &str) -> History {
    let base = match git.merge_base(tracking, "HEAD") {
        Ok(Some(base)) => base,
        Ok(None) | Err(_) => {
            warn!(tracking, "merge-base probe failed, assuming prior history");
            return History::Unknown;
        }
    };
    match git.commits_ahead(&base) {
        Ok(Some(0)) => History::Empty,
        Ok(Some(count)) => History::Present(count),
        Ok(None) | Err(_) => {
            warn!("rev-list probe failed, assuming prior history");
            History::Unknown
        }
    }
}
