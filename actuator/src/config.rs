//! Layer configuration stored in `actuator.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Action-layer configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Workspace root that relative paths are resolved against.
    pub workspace_root: PathBuf,

    /// Git remote holding the tracked baseline branch.
    pub remote: String,

    /// Branch whose merge-base with HEAD is the default diff baseline.
    pub target_branch: String,

    /// Diffs are truncated beyond this many lines.
    pub diff_max_lines: usize,

    /// Default timeout for short subprocess calls (git plumbing, probes).
    pub command_timeout_secs: u64,

    /// Default timeout for build/test/lint invocations.
    pub build_timeout_secs: u64,

    /// Per-check timeout for container capability checks.
    pub container_check_timeout_secs: u64,

    /// Truncate captured subprocess output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Fixed non-root uid that agent containers run under.
    pub agent_uid: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("/workspace"),
            remote: "origin".to_string(),
            target_branch: "main".to_string(),
            diff_max_lines: 400,
            command_timeout_secs: 120,
            build_timeout_secs: 900,
            container_check_timeout_secs: 60,
            output_limit_bytes: 100_000,
            agent_uid: 10001,
        }
    }
}

impl ActuatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.diff_max_lines == 0 {
            return Err(anyhow!("diff_max_lines must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.build_timeout_secs == 0 {
            return Err(anyhow!("build_timeout_secs must be > 0"));
        }
        if self.container_check_timeout_secs == 0 {
            return Err(anyhow!("container_check_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        validate_ref_component("remote", &self.remote)?;
        validate_ref_component("target_branch", &self.target_branch)?;
        if self.agent_uid == 0 {
            return Err(anyhow!("agent_uid must be a non-root uid"));
        }
        Ok(())
    }
}

/// Remote and branch names end up as git argv elements; refuse anything that
/// could parse as a flag or malformed ref.
fn validate_ref_component(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must be non-empty"));
    }
    if value.starts_with('-') {
        return Err(anyhow!("{field} must not start with '-'"));
    }
    if value.chars().any(char::is_whitespace) || value.contains("..") {
        return Err(anyhow!("{field} contains invalid characters"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ActuatorConfig::default()`.
pub fn load_config(path: &Path) -> Result<ActuatorConfig> {
    if !path.exists() {
        let cfg = ActuatorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ActuatorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ActuatorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
