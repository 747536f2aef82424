//! Lifetime hooks run around the whole run and around each task.

use std::fmt;
use std::time::Duration;

/// Runs once before the first task.
pub type SetupHook<C> = Box<dyn Fn(&mut C) -> anyhow::Result<()>>;

/// Runs once after the run, whatever happened.
pub type TeardownHook<C> = Box<dyn Fn(&mut C, &TeardownContext<'_>) -> anyhow::Result<()>>;

/// Runs before each task that passed its criteria.
pub type TaskSetupHook<C> = Box<dyn Fn(&mut C, &TaskSetupContext<'_>) -> anyhow::Result<()>>;

/// Runs after each task whose setup ran.
pub type TaskTeardownHook<C> = Box<dyn Fn(&mut C, &TaskTeardownContext<'_>) -> anyhow::Result<()>>;

/// What global teardown hooks get to see about the run.
#[derive(Debug, Clone, Copy)]
pub struct TeardownContext<'a> {
  /// False if the run has a terminal failure.
  pub successful: bool,

  /// The terminal failure, if any.
  pub error: Option<&'a anyhow::Error>,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskSetupContext<'a> {
  pub task: &'a str,
  pub description: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskTeardownContext<'a> {
  pub task: &'a str,
  pub description: Option<&'a str>,

  /// False if the task ended up errored.
  pub successful: bool,

  /// Time since the task's setup started.
  pub duration: Duration,
}

/// Hooks registered on an engine.
pub struct Lifetimes<C> {
  pub setup: Vec<SetupHook<C>>,
  pub teardown: Vec<TeardownHook<C>>,
  pub task_setup: Vec<TaskSetupHook<C>>,
  pub task_teardown: Vec<TaskTeardownHook<C>>,
}

impl<C> Default for Lifetimes<C> {
  fn default() -> Self {
    Self {
      setup: Vec::new(),
      teardown: Vec::new(),
      task_setup: Vec::new(),
      task_teardown: Vec::new(),
    }
  }
}

impl<C> fmt::Debug for Lifetimes<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lifetimes")
      .field("setup", &self.setup.len())
      .field("teardown", &self.teardown.len())
      .field("task_setup", &self.task_setup.len())
      .field("task_teardown", &self.task_teardown.len())
      .finish()
  }
}
