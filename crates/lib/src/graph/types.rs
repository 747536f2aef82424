//! Error types for task graph construction and traversal.

use thiserror::Error;

/// Errors raised while building or walking a task graph.
///
/// All of these are configuration errors: they are detected before any
/// lifetime hook or task action runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  /// A node with the same (case-insensitive) name is already in the graph.
  #[error("node has already been added to graph: {0}")]
  DuplicateNode(String),

  /// An edge from a node to itself.
  #[error("reflexive edges in graph are not allowed: {0}")]
  ReflexiveEdge(String),

  /// The exact reverse of the requested edge already exists.
  #[error("unidirectional edges in graph are not allowed: {start} -> {end} reverses existing edge {end} -> {start}")]
  UnidirectionalEdge { start: String, end: String },

  /// A node was reached again while still on the current traversal path.
  #[error("graph contains circular reference at task '{0}'")]
  CircularReference(String),

  /// A required dependency names a task that was never registered.
  #[error("Task '{task}' is dependent on task '{dependency}' which do not exist.")]
  UnresolvedDependency { task: String, dependency: String },

  /// A required dependee names a task that was never registered.
  #[error("Task '{task}' is dependee of task '{dependee}' which do not exist.")]
  UnresolvedDependee { task: String, dependee: String },
}
