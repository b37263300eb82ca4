//! Tool contract and registry.
//!
//! The registry stores trait objects, never concrete types, so the operation
//! set stays additive. A private registry can be constructed freely (tests
//! do); the process-wide one is populated once at startup, read many times,
//! and cleared only from tests.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::context::ExecContext;
use crate::core::result::ToolResult;
use crate::core::schema::ToolDefinition;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    DuplicateName(String),
    #[error("operation has an empty name")]
    EmptyName,
    #[error("operation '{0}' not found")]
    NotFound(String),
}

/// A named, schema-described action an agent can invoke.
///
/// Implementations are stateless or own only immutable configuration, so one
/// instance can serve concurrent invocations without locking. Runtime
/// failures the caller should reason about come back as a structured
/// `success=false` result; malformed arguments and fatal local failures
/// abort with an error.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    fn exec(&self, ctx: &ExecContext, args: &Map<String, Value>) -> Result<ToolResult>;
}

/// Mapping from operation name to operation instance.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name.
    ///
    /// Fails on duplicate or empty names; a failed registration inserts
    /// nothing, so retrying with the same name keeps failing.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut inner = self.write_lock();
        if inner.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        inner.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.read_lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Snapshot of every registered tool as of call time.
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.read_lock().values().cloned().collect()
    }

    /// Snapshot of the full catalog as of call time.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.read_lock()
            .values()
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Remove every registration.
    ///
    /// Reserved for test isolation; production code populates once at
    /// startup and never clears.
    pub fn clear(&self) {
        self.write_lock().clear();
    }

    /// Look up `name`, validate `args` against its definition, and execute.
    ///
    /// This is the canonical invocation path: argument validation happens
    /// here so no operation executes with malformed input.
    pub fn invoke(
        &self,
        name: &str,
        ctx: &ExecContext,
        args: &Map<String, Value>,
    ) -> Result<ToolResult> {
        let tool = self.get(name)?;
        tool.definition().validate_args(args)?;
        tool.exec(ctx, args)
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<dyn Tool>>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn Tool>>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Process-wide shared registry: populate once at startup, read many times,
/// clear only in tests.
pub fn global() -> &'static Registry {
    static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);
    &GLOBAL
}
