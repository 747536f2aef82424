//! Dependency graph over task names.
//!
//! Nodes are task names, compared case-insensitively. An edge `(start, end)`
//! means `start` must run before `end`, i.e. `end` depends on `start`.
//!
//! Two-node cycles are rejected eagerly by [`TaskGraph::connect`]; longer
//! cycles are only reported when [`TaskGraph::traverse`] walks into them.

pub mod builder;
pub mod types;

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

pub use builder::build_graph;
pub use types::GraphError;

/// Normalized lookup key for a task name.
pub(crate) fn node_key(name: &str) -> String {
  name.to_lowercase()
}

/// A directed graph of task names.
///
/// Node weights keep the spelling a name was first added with; lookups go
/// through the lowercased key.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
  /// The underlying graph. Edge indices follow declaration order.
  graph: DiGraph<String, ()>,

  /// Map from normalized name to node index.
  nodes: HashMap<String, NodeIndex>,
}

impl TaskGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node with no edges.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateNode` if a node with the same name already exists.
  pub fn add(&mut self, node: &str) -> Result<(), GraphError> {
    if self.exists(node) {
      return Err(GraphError::DuplicateNode(node.to_string()));
    }
    self.insert(node);
    Ok(())
  }

  /// Add the edge `(start, end)`, creating either endpoint if needed.
  ///
  /// Connecting an existing pair again is a no-op.
  ///
  /// # Errors
  ///
  /// - `ReflexiveEdge` if `start` and `end` name the same node.
  /// - `UnidirectionalEdge` if the edge `(end, start)` already exists.
  pub fn connect(&mut self, start: &str, end: &str) -> Result<(), GraphError> {
    if node_key(start) == node_key(end) {
      return Err(GraphError::ReflexiveEdge(start.to_string()));
    }

    if let (Some(&start_idx), Some(&end_idx)) = (self.index(start), self.index(end)) {
      if self.graph.contains_edge(end_idx, start_idx) {
        return Err(GraphError::UnidirectionalEdge {
          start: start.to_string(),
          end: end.to_string(),
        });
      }
      if self.graph.contains_edge(start_idx, end_idx) {
        return Ok(());
      }
    }

    let start_idx = self.index_or_insert(start);
    let end_idx = self.index_or_insert(end);
    self.graph.add_edge(start_idx, end_idx, ());
    Ok(())
  }

  /// Check whether a node exists.
  pub fn exists(&self, node: &str) -> bool {
    self.index(node).is_some()
  }

  /// Walk the ancestors of `target` depth-first and return them in run order.
  ///
  /// Every transitive dependency appears exactly once and before anything
  /// that depends on it; `target` comes last. Dependencies of a node are
  /// visited in edge declaration order. Nodes that are not ancestors of
  /// `target` are left out, and an unknown target yields an empty list.
  ///
  /// # Errors
  ///
  /// Returns `CircularReference` if the walk reaches a node that is still on
  /// the current walk path.
  pub fn traverse(&self, target: &str) -> Result<Vec<String>, GraphError> {
    let Some(&root) = self.index(target) else {
      return Ok(Vec::new());
    };

    let incoming = self.incoming();
    let mut on_path = vec![false; self.graph.node_count()];
    let mut emitted = vec![false; self.graph.node_count()];
    let mut order = Vec::new();

    // Each frame is a node and the position of its next dependency to visit.
    let mut stack = vec![(root, 0usize)];
    on_path[root.index()] = true;

    while let Some(frame) = stack.last_mut() {
      let (idx, next) = *frame;
      frame.1 += 1;

      match incoming[idx.index()].get(next) {
        Some(&dep) => {
          if emitted[dep.index()] {
            continue;
          }
          if on_path[dep.index()] {
            return Err(GraphError::CircularReference(self.graph[dep].clone()));
          }
          on_path[dep.index()] = true;
          stack.push((dep, 0));
        }
        None => {
          stack.pop();
          on_path[idx.index()] = false;
          emitted[idx.index()] = true;
          order.push(idx);
        }
      }
    }

    Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
  }

  /// Direct dependencies of every node, indexed by node, in edge declaration
  /// order.
  ///
  /// `raw_edges` is indexed by insertion and edges are never removed, so one
  /// pass over it keeps the declared order.
  fn incoming(&self) -> Vec<Vec<NodeIndex>> {
    let mut incoming = vec![Vec::new(); self.graph.node_count()];
    for edge in self.graph.raw_edges() {
      incoming[edge.target().index()].push(edge.source());
    }
    incoming
  }

  /// All node names in insertion order.
  pub fn nodes(&self) -> Vec<&str> {
    self.graph.node_weights().map(String::as_str).collect()
  }

  /// All edges as `(start, end)` pairs in declaration order.
  pub fn edges(&self) -> Vec<(&str, &str)> {
    self
      .graph
      .raw_edges()
      .iter()
      .map(|edge| (self.graph[edge.source()].as_str(), self.graph[edge.target()].as_str()))
      .collect()
  }

  /// Get the number of nodes in the graph.
  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  fn index(&self, node: &str) -> Option<&NodeIndex> {
    self.nodes.get(&node_key(node))
  }

  fn insert(&mut self, node: &str) -> NodeIndex {
    let idx = self.graph.add_node(node.to_string());
    self.nodes.insert(node_key(node), idx);
    idx
  }

  fn index_or_insert(&mut self, node: &str) -> NodeIndex {
    if let Some(&idx) = self.index(node) {
      return idx;
    }
    self.insert(node)
  }
}
