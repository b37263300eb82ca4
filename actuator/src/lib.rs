//! Action-execution layer for a multi-agent engineering orchestrator.
//!
//! Autonomous coding agents act on git workspaces and containers exclusively
//! through a registry of named, schema-described operations. Every operation
//! validates untrusted structured input, executes against a real
//! workspace/container/process boundary without shell interpolation, and
//! returns a dual-channel result: human-readable text for the agent's
//! reasoning loop plus an optional machine-actionable signal for the
//! orchestrating state machine. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: the execution contract (tool trait, registry, result and
//!   signal protocol, schemas, path rules). Pure logic, no I/O.
//! - **[`io`]**: side-effecting adapters (the production execution primitive
//!   and the git wrapper built on it). Isolated to enable scripted fakes in
//!   tests.
//! - **[`ops`]**: the closed set of built-in operations (file, diff,
//!   completion, build, container, lifecycle).

pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod ops;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
