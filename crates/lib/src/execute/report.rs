//! Run report: what ran, what was skipped, and how the run ended.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::graph::node_key;

/// An error shared between a task record and the run's failure list.
pub type SharedError = Arc<anyhow::Error>;

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskOutcome {
  /// The action ran. It may still carry an error its handler recovered.
  Executed,
  /// A criterion was false; nothing for the task was invoked.
  Skipped,
  /// The task failed and the failure was not handled.
  Errored,
}

impl fmt::Display for TaskOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskOutcome::Executed => write!(f, "executed"),
      TaskOutcome::Skipped => write!(f, "skipped"),
      TaskOutcome::Errored => write!(f, "errored"),
    }
  }
}

/// Result of one task in a run.
#[derive(Debug, Clone)]
pub struct TaskRecord {
  pub name: String,
  pub outcome: TaskOutcome,

  /// Description of the criterion that failed, for skipped tasks.
  pub skip_reason: Option<String>,

  /// Time from task setup to the end of task teardown. Zero when skipped.
  pub duration: Duration,

  /// The failure, for errored tasks and for executed tasks whose error
  /// handler recovered it.
  pub error: Option<SharedError>,
}

impl TaskRecord {
  pub(crate) fn skipped(name: &str, reason: String) -> Self {
    Self {
      name: name.to_string(),
      outcome: TaskOutcome::Skipped,
      skip_reason: Some(reason),
      duration: Duration::ZERO,
      error: None,
    }
  }
}

/// Where in the run a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
  Setup,
  TaskSetup,
  Action,
  Finally,
  TaskTeardown,
  Teardown,
}

impl fmt::Display for FailureStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailureStage::Setup => write!(f, "setup"),
      FailureStage::TaskSetup => write!(f, "task setup"),
      FailureStage::Action => write!(f, "action"),
      FailureStage::Finally => write!(f, "finally handler"),
      FailureStage::TaskTeardown => write!(f, "task teardown"),
      FailureStage::Teardown => write!(f, "teardown"),
    }
  }
}

/// An unrecovered failure.
#[derive(Debug, Clone)]
pub struct RunFailure {
  pub stage: FailureStage,

  /// The task being run, for task-scoped stages.
  pub task: Option<String>,

  pub error: SharedError,
}

impl RunFailure {
  pub(crate) fn new(stage: FailureStage, task: Option<&str>, error: SharedError) -> Self {
    Self {
      stage,
      task: task.map(str::to_string),
      error,
    }
  }
}

impl fmt::Display for RunFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.task {
      Some(task) => write!(f, "task '{}' failed in {}: {}", task, self.stage, self.error),
      None => write!(f, "{} failed: {}", self.stage, self.error),
    }
  }
}

/// Structured record of one run of the engine.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
  /// The requested target.
  pub target: String,

  /// One record per attempted task, in run order. Tasks after an abort have
  /// no record.
  pub records: Vec<TaskRecord>,

  /// The first unrecovered failure; `None` means the run succeeded.
  pub failure: Option<RunFailure>,

  /// Failures raised after the terminal one (teardown, finally handlers).
  pub secondary: Vec<RunFailure>,

  /// Wall time of the whole run, lifetimes included.
  pub duration: Duration,
}

impl RunReport {
  pub(crate) fn new(target: &str) -> Self {
    Self {
      target: target.to_string(),
      ..Self::default()
    }
  }

  /// Returns true if the run has no terminal failure.
  pub fn is_success(&self) -> bool {
    self.failure.is_none()
  }

  /// Look up a task's record by name, ignoring case.
  pub fn get(&self, name: &str) -> Option<&TaskRecord> {
    let key = node_key(name);
    self.records.iter().find(|r| node_key(&r.name) == key)
  }

  pub fn outcome_of(&self, name: &str) -> Option<TaskOutcome> {
    self.get(name).map(|r| r.outcome)
  }

  /// Names of the tasks with the given outcome, in run order.
  pub fn tasks_with(&self, outcome: TaskOutcome) -> Vec<&str> {
    self
      .records
      .iter()
      .filter(|r| r.outcome == outcome)
      .map(|r| r.name.as_str())
      .collect()
  }

  /// Returns the number of tasks attempted.
  pub fn total(&self) -> usize {
    self.records.len()
  }

  /// Record a failure: the first one becomes terminal, later ones are kept
  /// as secondary. Returns true if it became terminal.
  pub(crate) fn record_failure(&mut self, failure: RunFailure) -> bool {
    if self.failure.is_none() {
      self.failure = Some(failure);
      true
    } else {
      self.secondary.push(failure);
      false
    }
  }

  pub(crate) fn failure_message(&self) -> String {
    match &self.failure {
      Some(failure) => {
        let mut message = failure.to_string();
        if !self.secondary.is_empty() {
          message.push_str(&format!(" ({} further failure(s) during cleanup)", self.secondary.len()));
        }
        message
      }
      None => "run succeeded".to_string(),
    }
  }

  /// Serializable snapshot for downstream consumers.
  pub fn summary(&self) -> ReportSummary {
    ReportSummary {
      target: self.target.clone(),
      successful: self.is_success(),
      duration_ms: millis(self.duration),
      tasks: self
        .records
        .iter()
        .map(|r| TaskSummary {
          name: r.name.clone(),
          outcome: r.outcome,
          skip_reason: r.skip_reason.clone(),
          duration_ms: millis(r.duration),
          error: r.error.as_ref().map(|e| e.to_string()),
        })
        .collect(),
      failure: self.failure.as_ref().map(|f| f.to_string()),
      secondary: self.secondary.iter().map(|f| f.to_string()).collect(),
    }
  }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
  pub target: String,
  pub successful: bool,
  pub duration_ms: u64,
  pub tasks: Vec<TaskSummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub secondary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
  pub name: String,
  pub outcome: TaskOutcome,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip_reason: Option<String>,
  pub duration_ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}
