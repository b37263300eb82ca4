//! The closed, statically known set of built-in operations.
//!
//! Operations are registered once at startup; agents discover them through
//! the registry catalog and invoke them by name.

pub mod build;
pub mod container;
pub mod diff;
pub mod done;
pub mod files;
pub mod lifecycle;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::registry::{Registry, Tool, global};

/// Register every built-in operation into `registry`.
pub fn register_builtin(registry: &Registry) -> Result<()> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(files::ReadFile),
        Arc::new(files::ListFiles),
        Arc::new(files::EditFile),
        Arc::new(diff::WorkspaceDiff),
        Arc::new(done::Done),
        Arc::new(build::Build),
        Arc::new(build::Test),
        Arc::new(build::Lint),
        Arc::new(build::BackendInfo),
        Arc::new(container::ContainerCheck),
        Arc::new(lifecycle::Bootstrap),
        Arc::new(lifecycle::ReviewComplete),
    ];
    for tool in tools {
        let name = tool.name().to_string();
        registry
            .register(tool)
            .with_context(|| format!("register '{name}'"))?;
    }
    Ok(())
}

/// Populate the process-wide registry. Idempotent: a registry that already
/// holds operations is left untouched, matching its populate-once lifecycle.
pub fn install() -> Result<()> {
    if !global().is_empty() {
        return Ok(());
    }
    register_builtin(global())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_registers_every_operation_once() {
        let registry = Registry::new();
        register_builtin(&registry).expect("register");

        let mut names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|def| def.name)
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "backend_info",
                "bootstrap",
                "build",
                "container_check",
                "done",
                "edit_file",
                "lint",
                "list_files",
                "read_file",
                "review_complete",
                "test",
                "workspace_diff",
            ]
        );

        // Registering the catalog twice collides on every name.
        assert!(register_builtin(&registry).is_err());
    }
}
