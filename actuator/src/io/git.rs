//! Git adapter for workspace operations.
//!
//! Baselines are resolved and commits created deterministically, so we keep
//! a small, explicit wrapper around `git` subprocess calls. Every invocation
//! is argument-vector based; caller-supplied refs are never interpolated into
//! a shell string, and ref arguments are fenced with `--end-of-options` where
//! caller input can reach them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::context::ExecContext;
use crate::core::exec::{CancelToken, CommandRunner, CommandSpec, ExecOutcome};

/// Wrapper for executing git commands in a workspace root.
///
/// `Err` from any method means the command could not run at all (primitive
/// unavailable); a git command that ran and failed surfaces through the
/// returned outcome or an explicit error message with captured stderr.
#[derive(Clone)]
pub struct Git {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    cancel: CancelToken,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Git {
    pub fn new(ctx: &ExecContext) -> Self {
        Self {
            root: ctx.workspace_root.clone(),
            runner: ctx.runner.clone(),
            cancel: ctx.cancel.clone(),
            timeout: ctx.command_timeout,
            output_limit_bytes: ctx.output_limit_bytes,
        }
    }

    /// True when the git client is callable at all.
    pub fn available(&self) -> bool {
        self.run(&["--version"]).is_ok()
    }

    /// True when the workspace root is inside a git repository.
    pub fn is_repo(&self) -> Result<bool> {
        Ok(self.run(&["rev-parse", "--git-dir"])?.success())
    }

    /// Resolve a ref to a commit SHA, or `None` when it names no commit.
    #[instrument(skip_all, fields(reference))]
    pub fn resolve_commit(&self, reference: &str) -> Result<Option<String>> {
        let spec = format!("{reference}^{{commit}}");
        let out = self.run(&["rev-parse", "--verify", "--quiet", "--end-of-options", &spec])?;
        if !out.success() {
            debug!(reference, "ref does not resolve to a commit");
            return Ok(None);
        }
        let sha = out.stdout_text().trim().to_string();
        if sha.is_empty() {
            return Ok(None);
        }
        Ok(Some(sha))
    }

    /// Merge-base of two commits, or `None` when unrelated or unresolvable.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        let out = self.run(&["merge-base", a, b])?;
        if !out.success() {
            return Ok(None);
        }
        let sha = out.stdout_text().trim().to_string();
        if sha.is_empty() {
            return Ok(None);
        }
        Ok(Some(sha))
    }

    /// Number of commits on HEAD not reachable from `base`.
    ///
    /// `None` when the probe fails or produces unparseable output; callers
    /// decide how to classify that.
    pub fn commits_ahead(&self, base: &str) -> Result<Option<u64>> {
        let range = format!("{base}..HEAD");
        let out = self.run(&["rev-list", "--count", &range])?;
        if !out.success() {
            return Ok(None);
        }
        Ok(out.stdout_text().trim().parse().ok())
    }

    /// Unified diff of the working tree against `base` (a resolved SHA),
    /// optionally restricted to workspace-relative pathspecs.
    pub fn diff(&self, base: &str, pathspecs: &[String]) -> Result<ExecOutcome> {
        let mut args: Vec<String> = vec!["diff".to_string(), base.to_string()];
        if !pathspecs.is_empty() {
            args.push("--".to_string());
            args.extend(pathspecs.iter().cloned());
        }
        self.run_owned(&args)
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// Paths currently staged for commit.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        let out = self.run_checked(&["diff", "--cached", "--name-only"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Commit staged changes with a message; the outcome carries exit code
    /// and stderr for the caller to classify.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> Result<ExecOutcome> {
        self.run(&["commit", "-m", message])
    }

    /// Initialize a repository with HEAD on `branch`.
    pub fn init(&self, branch: &str) -> Result<()> {
        self.run_checked(&["init"])?;
        let head = format!("refs/heads/{branch}");
        self.run_checked(&["symbolic-ref", "HEAD", &head])?;
        Ok(())
    }

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let out = self.run(&["config", "--get", key])?;
        if !out.success() {
            return Ok(None);
        }
        let value = out.stdout_text().trim().to_string();
        Ok((!value.is_empty()).then_some(value))
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.run_checked(&["config", key, value])?;
        Ok(())
    }

    /// Commit with no staged changes required (bootstrap marker commits).
    pub fn commit_empty(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "--allow-empty", "-m", message])?;
        Ok(())
    }

    pub fn update_ref(&self, name: &str, target: &str) -> Result<()> {
        self.run_checked(&["update-ref", name, target])?;
        Ok(())
    }

    fn run(&self, args: &[&str]) -> Result<ExecOutcome> {
        let owned: Vec<String> = args.iter().map(ToString::to_string).collect();
        self.run_owned(&owned)
    }

    fn run_owned(&self, args: &[String]) -> Result<ExecOutcome> {
        let spec = CommandSpec::new("git", args.iter().cloned())
            .cwd(self.root.clone())
            .timeout(self.timeout)
            .output_limit(self.output_limit_bytes);
        self.runner.run(&spec, &self.cancel)
    }

    fn run_checked(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args)?;
        if !out.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                out.stderr_text().trim()
            ));
        }
        Ok(out.stdout_text())
    }
}
