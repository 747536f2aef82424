//! Types for task execution.
//!
//! This module defines the error types and configuration for running a
//! target through the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphError;

use super::report::RunReport;

/// Errors that can occur when running a target.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The task graph could not be built or traversed. Raised before any
  /// lifetime hook runs.
  #[error("invalid task graph: {0}")]
  Configuration(#[from] GraphError),

  /// A task with the same name (ignoring case) is already registered.
  #[error("task '{0}' has already been registered")]
  DuplicateTask(String),

  /// The target is not a registered task and the config requires one.
  #[error("target task '{0}' was not found")]
  TargetNotFound(String),

  /// The run finished with a terminal failure. Teardown has already run; the
  /// report holds the full per-task breakdown.
  #[error("{}", .0.failure_message())]
  Failed(Box<RunReport>),
}

impl ExecuteError {
  /// The run report, if the error was raised after the run started.
  pub fn report(&self) -> Option<&RunReport> {
    match self {
      ExecuteError::Failed(report) => Some(report),
      _ => None,
    }
  }

  pub fn into_report(self) -> Option<RunReport> {
    match self {
      ExecuteError::Failed(report) => Some(*report),
      _ => None,
    }
  }

  /// Returns true for errors detected before the run started.
  pub fn is_configuration(&self) -> bool {
    !matches!(self, ExecuteError::Failed(_))
  }
}

/// Configuration for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteConfig {
  /// Run only the target, not its dependencies. The graph is still built and
  /// checked for cycles.
  pub exclusive: bool,

  /// Treat an unknown target as a configuration error instead of an empty
  /// run.
  pub require_target: bool,
}
