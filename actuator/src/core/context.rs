//! Per-invocation execution context handed to every operation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ActuatorConfig;
use crate::core::exec::{CancelToken, CommandRunner};

/// Everything an operation needs to act on a workspace: the workspace root,
/// the execution primitive, a cancellation token, and resolved limits.
///
/// Contexts are cheap to clone and immutable; operations hold no state of
/// their own, so one context can serve concurrent invocations. Workspace
/// state itself is a snapshot valid only at resolution time.
#[derive(Clone)]
pub struct ExecContext {
    pub workspace_root: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
    pub cancel: CancelToken,
    pub remote: String,
    pub target_branch: String,
    pub diff_max_lines: usize,
    pub command_timeout: Duration,
    pub build_timeout: Duration,
    pub container_check_timeout: Duration,
    pub output_limit_bytes: usize,
    pub agent_uid: u32,
}

impl ExecContext {
    pub fn new(config: &ActuatorConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            workspace_root: config.workspace_root.clone(),
            runner,
            cancel: CancelToken::new(),
            remote: config.remote.clone(),
            target_branch: config.target_branch.clone(),
            diff_max_lines: config.diff_max_lines,
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            container_check_timeout: Duration::from_secs(config.container_check_timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            agent_uid: config.agent_uid,
        }
    }

    /// Remote tracking ref for the configured target branch (e.g. `origin/main`).
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.target_branch)
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRunner;

    #[test]
    fn tracking_ref_combines_remote_and_branch() {
        let ctx = ExecContext::new(&ActuatorConfig::default(), Arc::new(ScriptedRunner::new()));
        assert_eq!(ctx.tracking_ref(), "origin/main");
    }
}
