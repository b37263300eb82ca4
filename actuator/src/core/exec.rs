//! Execution-primitive contract.
//!
//! The subprocess layer is an external collaborator: everything above it
//! depends only on [`CommandRunner`]. Production code uses
//! [`crate::io::process::SystemRunner`]; tests substitute scripted runners
//! that return predetermined outcomes without spawning processes.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;

/// An argv command to execute. Arguments are never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the parent's when `None`.
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    /// Stored stdout/stderr are each capped at this many bytes.
    pub output_limit_bytes: usize,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: Duration::from_secs(120),
            output_limit_bytes: 100_000,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    /// Render as `program arg ...` for diagnostics.
    pub fn display(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }
}

/// Captured outcome of a completed (or killed) command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ExecOutcome {
    /// Outcome for a process that exited normally (fake/test construction).
    pub fn exited(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.cancelled
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Cooperative cancellation shared between an agent loop and an operation.
///
/// Cancelling while a subprocess is running terminates that subprocess; a
/// cancelled wait never abandons a live child.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Abstraction over subprocess execution.
///
/// `Err` means the command could not be run at all (spawn failure, primitive
/// unavailable); a command that ran and failed is an `Ok` outcome with a
/// non-zero exit code.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec, cancel: &CancelToken) -> Result<ExecOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("git", ["rev-parse", "HEAD"]);
        assert_eq!(spec.display(), "git rev-parse HEAD");
    }

    #[test]
    fn success_requires_zero_exit_without_interruption() {
        assert!(ExecOutcome::exited(0, "", "").success());
        assert!(!ExecOutcome::exited(1, "", "").success());

        let timed_out = ExecOutcome {
            exit_code: Some(0),
            timed_out: true,
            ..ExecOutcome::default()
        };
        assert!(!timed_out.success());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
