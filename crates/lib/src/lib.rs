//! kiln-lib: task graph and execution engine for kiln.
//!
//! This crate provides the core of a build orchestrator:
//! - `Task`: a named unit of work with dependencies, criteria and handlers
//! - `TaskGraph`: the dependency graph and target-scoped traversal
//! - `Engine`: runs a target through global and per-task lifetimes and
//!   produces a `RunReport`
//!
//! Declaring tasks (scripts, config files, code) is left to the host, which
//! hands the engine a flat list of tasks.

pub mod execute;
pub mod graph;
pub mod task;
