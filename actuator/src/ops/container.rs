//! Container capability gate.
//!
//! Certifies that an image provides the minimum runtime contract before the
//! orchestrator entrusts it with agent work. All checks run in ephemeral
//! containers; the gate never mutates the image. The report is written for
//! an LLM agent that must self-correct the image definition without human
//! help, so every failed check carries remediation text.

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::context::ExecContext;
use crate::core::exec::CommandSpec;
use crate::core::registry::Tool;
use crate::core::result::ToolResult;
use crate::core::schema::{ParamType, ToolDefinition, required_str};

/// One capability check's outcome within the report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Validate that a container image can host agent work.
pub struct ContainerCheck;

impl Tool for ContainerCheck {
    fn name(&self) -> &str {
        "container_check"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "container_check",
            "Certify that a container image meets the agent runtime contract.",
        )
        .required("image", ParamType::String, "Resolvable container image reference.")
    }

    #[instrument(skip_all)]
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        let image = required_str(args, "image")?;
        if image.trim().is_empty() || image.starts_with('-') {
            bail!("'image' must be a plain image reference, got '{image}'");
        }

        let uid = ctx.agent_uid;
        // Every check runs regardless of earlier failures so the report is
        // complete; each has its own timeout.
        let checks = vec![
            run_check(
                ctx,
                "git_client",
                &[],
                image,
                &["git", "--version"],
                "install a git client in the image (e.g. add `RUN apt-get update && apt-get install -y git` to the Dockerfile)",
            ),
            run_check(
                ctx,
                "agent_user",
                &[],
                image,
                &["id", &uid.to_string()],
                &format!(
                    "create the agent account at image build time (e.g. `RUN useradd --uid {uid} --create-home agent`); the container later runs under uid {uid} with a read-only root filesystem, so the account cannot be created at run time"
                ),
            ),
            run_check(
                ctx,
                "tmp_writable",
                &["--user", &uid.to_string()],
                image,
                &["touch", "/tmp/.actuator-probe"],
                &format!("make /tmp writable by uid {uid} (e.g. `RUN chmod 1777 /tmp`)"),
            ),
        ];

        let passed = checks.iter().all(|check| check.passed);
        debug!(passed, "container checks finished");

        let mut report = format!(
            "container image '{image}': {}",
            if passed { "all checks passed" } else { "checks failed" }
        );
        for check in &checks {
            let marker = if check.passed { "ok" } else { "FAIL" };
            report.push_str(&format!("\n[{marker}] {}: {}", check.name, check.detail));
        }

        let result = if passed {
            ToolResult::ok(report)
        } else {
            ToolResult::fail(report)
        };
        Ok(result
            .with_field("image", json!(image))
            .with_field("checks", serde_json::to_value(&checks)?))
    }
}

fn run_check(
    ctx: &ExecContext,
    name: &'static str,
    docker_flags: &[&str],
    image: &str,
    probe: &[&str],
    remediation: &str,
) -> CheckOutcome {
    let mut args: Vec<String> = vec!["run".to_string(), "--rm".to_string()];
    args.extend(docker_flags.iter().map(ToString::to_string));
    args.push(image.to_string());
    args.extend(probe.iter().map(ToString::to_string));

    let spec = CommandSpec::new("docker", args)
        .timeout(ctx.container_check_timeout)
        .output_limit(ctx.output_limit_bytes);

    let outcome = match ctx.runner.run(&spec, &ctx.cancel) {
        Ok(outcome) => outcome,
        Err(err) => {
            return CheckOutcome {
                name,
                passed: false,
                detail: format!("docker is not runnable: {err:#}"),
            };
        }
    };

    if outcome.timed_out {
        return CheckOutcome {
            name,
            passed: false,
            detail: format!(
                "timed out after {}s; {remediation}",
                ctx.container_check_timeout.as_secs()
            ),
        };
    }
    if !outcome.success() {
        let stderr = outcome.stderr_text();
        let diagnostic = stderr.trim();
        return CheckOutcome {
            name,
            passed: false,
            detail: if diagnostic.is_empty() {
                format!("exit {:?}; {remediation}", outcome.exit_code)
            } else {
                format!("exit {:?}: {diagnostic}; {remediation}", outcome.exit_code)
            },
        };
    }

    let stdout = outcome.stdout_text();
    let detail = stdout.trim();
    CheckOutcome {
        name,
        passed: true,
        detail: if detail.is_empty() {
            "ok".to_string()
        } else {
            detail.lines().next().unwrap_or("ok").to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedRunner, context_with_runner};
    use std::sync::Arc;

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str(raw).expect("parse args") {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn image_args() -> Map<String, Value> {
        args(r#"{"image": "agent-runtime:latest"}"#)
    }

    #[test]
    fn all_checks_passing_yields_an_aggregate_pass() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::new().stdout_when("git --version", "git version 2.44.0"));
        let ctx = context_with_runner(temp.path(), runner.clone());

        let result = ContainerCheck.exec(&ctx, &image_args()).expect("exec");
        assert!(result.success);
        assert_eq!(runner.call_count(), 3);

        let checks = result.fields["checks"].as_array().expect("checks");
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|check| check["passed"] == json!(true)));
    }

    #[test]
    fn one_failing_check_does_not_short_circuit_the_others() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::new().fail_when("git --version"));
        let ctx = context_with_runner(temp.path(), runner.clone());

        let result = ContainerCheck.exec(&ctx, &image_args()).expect("exec");
        assert!(!result.success);
        // All three checks still ran and are all reported.
        assert_eq!(runner.call_count(), 3);

        let checks = result.fields["checks"].as_array().expect("checks");
        assert_eq!(checks.len(), 3);
        let failed: Vec<&str> = checks
            .iter()
            .filter(|check| check["passed"] == json!(false))
            .map(|check| check["name"].as_str().expect("name"))
            .collect();
        assert_eq!(failed, vec!["git_client"]);
    }

    #[test]
    fn failed_check_carries_remediation_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::new().fail_when(" id "));
        let ctx = context_with_runner(temp.path(), runner);

        let result = ContainerCheck.exec(&ctx, &image_args()).expect("exec");
        assert!(!result.success);
        assert!(result.content.contains("useradd --uid 10001"));
    }

    #[test]
    fn checks_run_in_ephemeral_containers_without_mutating_flags() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = context_with_runner(temp.path(), runner.clone());

        ContainerCheck.exec(&ctx, &image_args()).expect("exec");
        for call in runner.calls() {
            assert!(call.starts_with("docker run --rm"), "{call}");
            assert!(call.contains("agent-runtime:latest"), "{call}");
        }
    }

    #[test]
    fn unrunnable_docker_fails_every_check_with_a_complete_report() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::unavailable());
        let ctx = context_with_runner(temp.path(), runner);

        let result = ContainerCheck.exec(&ctx, &image_args()).expect("exec");
        assert!(!result.success);
        let checks = result.fields["checks"].as_array().expect("checks");
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|check| check["passed"] == json!(false)));
    }

    #[test]
    fn flag_like_image_reference_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_with_runner(temp.path(), Arc::new(ScriptedRunner::new()));

        let err = ContainerCheck
            .exec(&ctx, &args(r#"{"image": "--privileged"}"#))
            .unwrap_err();
        assert!(err.to_string().contains("image"));
    }
}
