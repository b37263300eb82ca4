//! Build backend detection, the task-class validation gate, and the uniform
//! build/test/lint/backend-info operations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::core::context::ExecContext;
use crate::core::exec::CommandSpec;
use crate::core::registry::Tool;
use crate::core::result::ToolResult;
use crate::core::schema::{ParamType, ToolDefinition, positive_arg, str_arg};
use crate::core::targets::{TaskClass, missing_targets, scan_targets};

/// Closed set of recognized build backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Just,
    Cargo,
    Npm,
    Go,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Just => "just",
            Self::Cargo => "cargo",
            Self::Npm => "npm",
            Self::Go => "go",
        }
    }

    /// Fixed argv for a uniform operation; never assembled from caller input.
    fn argv(self, op: BackendOp) -> &'static [&'static str] {
        match (self, op) {
            (Self::Just, BackendOp::Build) => &["just", "build"],
            (Self::Just, BackendOp::Test) => &["just", "test"],
            (Self::Just, BackendOp::Lint) => &["just", "lint"],
            (Self::Cargo, BackendOp::Build) => &["cargo", "build"],
            (Self::Cargo, BackendOp::Test) => &["cargo", "test"],
            (Self::Cargo, BackendOp::Lint) => &["cargo", "clippy", "--", "-D", "warnings"],
            (Self::Npm, BackendOp::Build) => &["npm", "run", "build"],
            (Self::Npm, BackendOp::Test) => &["npm", "test"],
            (Self::Npm, BackendOp::Lint) => &["npm", "run", "lint"],
            (Self::Go, BackendOp::Build) => &["go", "build", "./..."],
            (Self::Go, BackendOp::Test) => &["go", "test", "./..."],
            (Self::Go, BackendOp::Lint) => &["go", "vet", "./..."],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendOp {
    Build,
    Test,
    Lint,
}

impl BackendOp {
    fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Lint => "lint",
        }
    }
}

/// Detect the build system for `root`.
///
/// A justfile wins over language manifests; detection is recomputed per
/// request because project structure can change between calls.
pub fn detect_backend(root: &Path) -> Option<Backend> {
    if justfile_path(root).is_some() {
        return Some(Backend::Just);
    }
    if root.join("Cargo.toml").is_file() {
        return Some(Backend::Cargo);
    }
    if root.join("package.json").is_file() {
        return Some(Backend::Npm);
    }
    if root.join("go.mod").is_file() {
        return Some(Backend::Go);
    }
    None
}

fn justfile_path(root: &Path) -> Option<PathBuf> {
    ["justfile", "Justfile", ".justfile"]
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Task-class-aware validation that runs before `build` only.
///
/// Returns `Some(failure)` when the build must not run; the backend is never
/// invoked on a failed gate.
fn validate_build(root: &Path, class: TaskClass) -> Result<Option<ToolResult>> {
    if let Some(path) = justfile_path(root) {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                return Ok(Some(ToolResult::fail(format!(
                    "read {}: {err}",
                    path.display()
                ))));
            }
        };
        let declared = scan_targets(&contents);
        let missing = missing_targets(&declared, class);
        if !missing.is_empty() {
            let message = format!(
                "justfile is missing required target(s) {missing:?}: task class '{}' requires {:?}",
                class.as_str(),
                class.required_targets()
            );
            return Ok(Some(
                ToolResult::fail(message).with_field("missing_targets", json!(missing)),
            ));
        }
        return Ok(None);
    }

    if has_language_manifest(root) {
        // Lenient: the backend's own tooling is trusted to fail appropriately.
        return Ok(None);
    }

    match class {
        TaskClass::Application => Ok(Some(ToolResult::fail(format!(
            "no build system detected in {}: add a justfile or language manifest before building application work",
            root.display()
        )))),
        TaskClass::Operations => {
            warn!(root = %root.display(), "no build system detected");
            Ok(None)
        }
    }
}

fn has_language_manifest(root: &Path) -> bool {
    ["Cargo.toml", "package.json", "go.mod"]
        .iter()
        .any(|name| root.join(name).is_file())
}

fn task_class_from(args: &Map<String, Value>) -> TaskClass {
    str_arg(args, "task_class")
        .and_then(TaskClass::parse)
        .unwrap_or(TaskClass::Application)
}

fn timeout_from(args: &Map<String, Value>, ctx: &ExecContext) -> Result<Duration> {
    Ok(positive_arg(args, "timeout_secs")?
        .map(Duration::from_secs)
        .unwrap_or(ctx.build_timeout))
}

#[instrument(skip_all, fields(op = op.name()))]
fn run_backend_op(
    ctx: &ExecContext,
    args: &Map<String, Value>,
    op: BackendOp,
    gated: bool,
) -> Result<ToolResult> {
    if gated {
        let class = task_class_from(args);
        if let Some(failure) = validate_build(&ctx.workspace_root, class)? {
            debug!(class = class.as_str(), "validation gate rejected the build");
            return Ok(failure);
        }
    }

    let Some(backend) = detect_backend(&ctx.workspace_root) else {
        return Ok(ToolResult::fail(format!(
            "no build backend detected in {}",
            ctx.workspace_root.display()
        )));
    };

    let argv = backend.argv(op);
    let spec = CommandSpec::new(argv[0], argv[1..].iter().copied())
        .cwd(ctx.workspace_root.clone())
        .timeout(timeout_from(args, ctx)?)
        .output_limit(ctx.output_limit_bytes);

    let started = Instant::now();
    let outcome = match ctx.runner.run(&spec, &ctx.cancel) {
        Ok(outcome) => outcome,
        Err(err) => {
            return Ok(ToolResult::fail(format!(
                "{} is not runnable: {err:#}",
                backend.name()
            ))
            .with_field("backend", json!(backend.name())));
        }
    };
    let duration = started.elapsed();

    let stdout = outcome.stdout_text();
    let stderr = outcome.stderr_text();
    let mut output = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(stderr.trim_end());
    }

    let base_fields = |result: ToolResult| {
        result
            .with_field("backend", json!(backend.name()))
            .with_field("stdout", json!(stdout))
            .with_field("duration_secs", json!(duration.as_secs_f64()))
    };

    if outcome.timed_out {
        return Ok(base_fields(ToolResult::fail(format!(
            "{} {} timed out after {:.0}s\n{output}",
            backend.name(),
            op.name(),
            duration.as_secs_f64()
        ))));
    }
    if !outcome.success() {
        return Ok(base_fields(ToolResult::fail(format!(
            "{} {} failed (exit {:?}) in {:.1}s:\n{output}",
            backend.name(),
            op.name(),
            outcome.exit_code,
            duration.as_secs_f64()
        ))));
    }

    debug!(backend = backend.name(), "backend operation succeeded");
    let mut content = format!(
        "{} {} succeeded in {:.1}s",
        backend.name(),
        op.name(),
        duration.as_secs_f64()
    );
    if !output.is_empty() {
        content.push('\n');
        content.push_str(&output);
    }
    Ok(base_fields(ToolResult::ok(content)))
}

/// Build the workspace, after the task-class validation gate.
pub struct Build;

impl Tool for Build {
    fn name(&self) -> &str {
        "build"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("build", "Build the workspace with the detected backend.")
            .enumerated(
                "task_class",
                &["application", "operations"],
                false,
                "Strictness of build-target validation; defaults to application.",
            )
            .optional("timeout_secs", ParamType::Integer, "Build timeout override.")
    }

    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        run_backend_op(ctx, args, BackendOp::Build, true)
    }
}

/// Run the workspace test suite. Not subject to the validation gate.
pub struct Test;

impl Tool for Test {
    fn name(&self) -> &str {
        "test"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("test", "Run tests with the detected backend.").optional(
            "timeout_secs",
            ParamType::Integer,
            "Test timeout override.",
        )
    }

    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        run_backend_op(ctx, args, BackendOp::Test, false)
    }
}

/// Lint the workspace. Not subject to the validation gate.
pub struct Lint;

impl Tool for Lint {
    fn name(&self) -> &str {
        "lint"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("lint", "Lint with the detected backend.").optional(
            "timeout_secs",
            ParamType::Integer,
            "Lint timeout override.",
        )
    }

    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult> {
        run_backend_op(ctx, args, BackendOp::Lint, false)
    }
}

/// Report the detected backend without invoking it.
pub struct BackendInfo;

impl Tool for BackendInfo {
    fn name(&self) -> &str {
        "backend_info"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("backend_info", "Report the detected build backend.")
    }

    fn exec(&self, ctx: &ExecContext, _args: &Map<String, Value>) -> Result<ToolResult> {
        let Some(backend) = detect_backend(&ctx.workspace_root) else {
            return Ok(ToolResult::fail(format!(
                "no build backend detected in {}",
                ctx.workspace_root.display()
            )));
        };
        let detected_at = Utc::now().to_rfc3339();
        Ok(ToolResult::ok(format!(
            "backend '{}' detected in {}",
            backend.name(),
            ctx.workspace_root.display()
        ))
        .with_field("backend", json!(backend.name()))
        .with_field("root", json!(ctx.workspace_root.display().to_string()))
        .with_field("operations", json!(["build", "test", "lint"]))
        .with_field("detected_at", json!(detected_at)))
    }
}
