//! Test-only helpers: temp git repositories, contexts, and scripted runners.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};

use crate::config::ActuatorConfig;
use crate::core::context::ExecContext;
use crate::core::exec::{CancelToken, CommandRunner, CommandSpec, ExecOutcome};
use crate::io::process::SystemRunner;

/// Run git in `root`, failing loudly on non-zero exit.
pub fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("run git {args:?}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {args:?} failed: {}", stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Initialize a repository on `main` with a deterministic committer identity.
pub fn init_repo(root: &Path) -> Result<()> {
    run_git(root, &["init"])?;
    run_git(root, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    run_git(root, &["config", "user.name", "Actuator Test"])?;
    run_git(root, &["config", "user.email", "actuator-test@local.invalid"])?;
    Ok(())
}

/// Write a file and commit it.
pub fn commit_file(root: &Path, rel: &str, contents: &str, message: &str) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    run_git(root, &["add", "-A"])?;
    run_git(root, &["commit", "-m", message])?;
    Ok(())
}

/// Point the `origin/main` tracking ref at the current HEAD.
pub fn set_tracking_ref(root: &Path) -> Result<()> {
    run_git(root, &["update-ref", "refs/remotes/origin/main", "HEAD"])?;
    Ok(())
}

pub fn head_sha(root: &Path) -> Result<String> {
    Ok(run_git(root, &["rev-parse", "HEAD"])?.trim().to_string())
}

/// Context over a real workspace with the production runner.
pub fn context_for(root: &Path) -> ExecContext {
    let config = ActuatorConfig {
        workspace_root: root.to_path_buf(),
        ..ActuatorConfig::default()
    };
    ExecContext::new(&config, Arc::new(SystemRunner))
}

/// Context over a real workspace with a custom runner.
pub fn context_with_runner(root: &Path, runner: Arc<dyn CommandRunner>) -> ExecContext {
    let config = ActuatorConfig {
        workspace_root: root.to_path_buf(),
        ..ActuatorConfig::default()
    };
    ExecContext::new(&config, runner)
}

/// Context with a default [`ScriptedRunner`] and the default workspace root;
/// for tests that never touch the filesystem.
pub fn scripted_context() -> ExecContext {
    ExecContext::new(&ActuatorConfig::default(), Arc::new(ScriptedRunner::new()))
}

/// Scripted [`CommandRunner`] that records invocations and returns
/// predetermined outcomes without spawning processes.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    unavailable: bool,
    fail_containing: Vec<String>,
    stdout_for: Vec<(String, String)>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run fails to spawn, as if the primitive is missing.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Commands whose rendered argv contains `pattern` exit non-zero.
    pub fn fail_when(mut self, pattern: &str) -> Self {
        self.fail_containing.push(pattern.to_string());
        self
    }

    /// Commands whose rendered argv contains `pattern` print `stdout`.
    pub fn stdout_when(mut self, pattern: &str, stdout: &str) -> Self {
        self.stdout_for.push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Rendered argv of every recorded invocation, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec, _cancel: &CancelToken) -> Result<ExecOutcome> {
        let rendered = spec.display();
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(rendered.clone());

        if self.unavailable {
            bail!("scripted runner unavailable");
        }
        if self
            .fail_containing
            .iter()
            .any(|pattern| rendered.contains(pattern))
        {
            return Ok(ExecOutcome::exited(1, "", "scripted failure"));
        }
        let stdout = self
            .stdout_for
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern))
            .map(|(_, stdout)| stdout.as_str())
            .unwrap_or("");
        Ok(ExecOutcome::exited(0, stdout, ""))
    }
}

/// Create a temp workspace with: one commit shared with `origin/main`, one
/// extra commit on the tracking branch only, and `local_commits` additional
/// local commits on `main`. Returns the workspace handle (keep it alive).
pub fn branched_repo(local_commits: usize) -> Result<(tempfile::TempDir, PathBuf)> {
    let temp = tempfile::tempdir().context("tempdir")?;
    let root = temp.path().to_path_buf();
    init_repo(&root)?;
    commit_file(&root, "shared.txt", "shared\n", "shared base")?;

    // Advance the tracking branch past the branch point, then return to it.
    run_git(&root, &["checkout", "-b", "remote-work"])?;
    commit_file(&root, "remote.txt", "remote-only\n", "remote-side change")?;
    run_git(&root, &["update-ref", "refs/remotes/origin/main", "HEAD"])?;
    run_git(&root, &["checkout", "main"])?;
    run_git(&root, &["branch", "-D", "remote-work"])?;

    for i in 0..local_commits {
        commit_file(
            &root,
            &format!("local_{i}.txt"),
            &format!("local {i}\n"),
            &format!("local change {i}"),
        )?;
    }
    Ok((temp, root))
}
