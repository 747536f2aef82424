//! Turns a flat list of tasks into a [`TaskGraph`].

use tracing::debug;

use crate::task::Task;

use super::{GraphError, TaskGraph};

/// Build a dependency graph from a set of tasks.
///
/// Every task becomes a node. Each dependency `d` of task `t` becomes the
/// edge `(d, t)`, and each dependee `e` of `t` becomes `(t, e)`.
///
/// # Errors
///
/// - `DuplicateNode` if two tasks share a name (ignoring case).
/// - `UnresolvedDependency` / `UnresolvedDependee` if a required reference
///   names a task that is not in `tasks`. Optional references to missing
///   tasks are skipped.
/// - Any edge error from [`TaskGraph::connect`].
pub fn build_graph<C>(tasks: &[Task<C>]) -> Result<TaskGraph, GraphError> {
  let mut graph = TaskGraph::new();

  for task in tasks {
    graph.add(task.name())?;
  }

  for task in tasks {
    for dependency in task.dependencies() {
      if !graph.exists(&dependency.name) {
        if dependency.required {
          return Err(GraphError::UnresolvedDependency {
            task: task.name().to_string(),
            dependency: dependency.name.clone(),
          });
        }
        debug!(task = task.name(), dependency = %dependency.name, "ignoring missing optional dependency");
        continue;
      }
      graph.connect(&dependency.name, task.name())?;
    }

    for dependee in task.dependees() {
      if !graph.exists(&dependee.name) {
        if dependee.required {
          return Err(GraphError::UnresolvedDependee {
            task: task.name().to_string(),
            dependee: dependee.name.clone(),
          });
        }
        debug!(task = task.name(), dependee = %dependee.name, "ignoring missing optional dependee");
        continue;
      }
      graph.connect(task.name(), &dependee.name)?;
    }
  }

  Ok(graph)
}
