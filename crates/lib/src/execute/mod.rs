//! Task execution module.
//!
//! This module provides the [`Engine`], which turns a target name into an
//! ordered run. It handles:
//! - Graph resolution and target-scoped ordering
//! - Global and per-task setup/teardown lifetimes
//! - Criteria evaluation and skip tracking
//! - Error recovery through error handlers and `continue_on_error`
//!
//! Execution is single-threaded: one task's whole lifecycle completes before
//! the next one starts.

pub mod lifetime;
pub mod report;
pub mod strategy;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::graph::{GraphError, TaskGraph, build_graph};
use crate::task::Task;

use lifetime::{Lifetimes, TaskSetupContext, TaskTeardownContext, TeardownContext};
use report::{FailureStage, RunFailure, RunReport, TaskOutcome, TaskRecord, millis};

pub use report::{ReportSummary, SharedError, TaskSummary};
pub use strategy::{DefaultExecutionStrategy, DryRunExecutionStrategy, ExecutionStrategy};
pub use types::{ExecuteConfig, ExecuteError};

/// Holds the registered tasks and lifetime hooks, and runs targets.
///
/// `C` is the host's run context. The engine keeps no run state of its own,
/// so one engine can serve any number of runs.
pub struct Engine<C> {
  tasks: Vec<Task<C>>,
  lifetimes: Lifetimes<C>,
}

impl<C> Default for Engine<C> {
  fn default() -> Self {
    Self {
      tasks: Vec::new(),
      lifetimes: Lifetimes::default(),
    }
  }
}

impl<C> std::fmt::Debug for Engine<C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("tasks", &self.tasks)
      .field("lifetimes", &self.lifetimes)
      .finish()
  }
}

/// Outcome of a task's action after error recovery.
struct ActionOutcome {
  outcome: TaskOutcome,
  error: Option<SharedError>,
  /// The failure is terminal and the run must stop after this task.
  abort: bool,
}

impl<C> Engine<C> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a task.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateTask` if a task with the same name (ignoring case) is
  /// already registered.
  pub fn register(&mut self, task: Task<C>) -> Result<&mut Self, ExecuteError> {
    if self.task(task.name()).is_some() {
      return Err(ExecuteError::DuplicateTask(task.name().to_string()));
    }
    debug!(task = task.name(), "registered task");
    self.tasks.push(task);
    Ok(self)
  }

  pub fn tasks(&self) -> &[Task<C>] {
    &self.tasks
  }

  /// Look up a registered task by name, ignoring case.
  pub fn task(&self, name: &str) -> Option<&Task<C>> {
    self.tasks.iter().find(|t| t.is_named(name))
  }

  /// Register a hook to run once before any task.
  pub fn setup(&mut self, hook: impl Fn(&mut C) -> anyhow::Result<()> + 'static) -> &mut Self {
    self.lifetimes.setup.push(Box::new(hook));
    self
  }

  /// Register a hook to run once after the run, even when it failed.
  pub fn teardown(
    &mut self,
    hook: impl Fn(&mut C, &TeardownContext<'_>) -> anyhow::Result<()> + 'static,
  ) -> &mut Self {
    self.lifetimes.teardown.push(Box::new(hook));
    self
  }

  /// Register a hook to run before every task whose criteria are met.
  pub fn task_setup(
    &mut self,
    hook: impl Fn(&mut C, &TaskSetupContext<'_>) -> anyhow::Result<()> + 'static,
  ) -> &mut Self {
    self.lifetimes.task_setup.push(Box::new(hook));
    self
  }

  /// Register a hook to run after every task whose setup ran.
  pub fn task_teardown(
    &mut self,
    hook: impl Fn(&mut C, &TaskTeardownContext<'_>) -> anyhow::Result<()> + 'static,
  ) -> &mut Self {
    self.lifetimes.task_teardown.push(Box::new(hook));
    self
  }

  /// Build the dependency graph of all registered tasks.
  pub fn graph(&self) -> Result<TaskGraph, GraphError> {
    build_graph(&self.tasks)
  }

  /// Compute the ordered list of tasks a run of `target` would attempt.
  ///
  /// # Errors
  ///
  /// - `Configuration` if the graph cannot be built or has a cycle among the
  ///   target's ancestors.
  /// - `TargetNotFound` if the target is unknown and `config.require_target`
  ///   is set.
  pub fn plan(&self, target: &str, config: &ExecuteConfig) -> Result<Vec<String>, ExecuteError> {
    let graph = self.graph()?;

    if config.require_target && !graph.exists(target) {
      return Err(ExecuteError::TargetNotFound(target.to_string()));
    }

    let mut order = graph.traverse(target)?;
    if config.exclusive {
      order = order.pop().into_iter().collect();
    }
    Ok(order)
  }

  /// Run `target` and its dependencies with the default config.
  pub fn run<S>(&self, target: &str, ctx: &mut C, strategy: &mut S) -> Result<RunReport, ExecuteError>
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    self.run_with_config(target, ctx, strategy, &ExecuteConfig::default())
  }

  /// Run `target`.
  ///
  /// The run goes through these steps:
  /// 1. Resolve the task order. Failures here return before any hook runs.
  /// 2. Run global setup hooks. If one fails, no task runs.
  /// 3. For each task in order: check criteria, run task setup, the action,
  ///    error recovery, the finally handler and task teardown.
  /// 4. Stop the loop at the first terminal failure.
  /// 5. Run global teardown hooks, always.
  ///
  /// # Errors
  ///
  /// Configuration errors from step 1, or `Failed` carrying the report once
  /// teardown has completed if the run recorded a terminal failure.
  pub fn run_with_config<S>(
    &self,
    target: &str,
    ctx: &mut C,
    strategy: &mut S,
    config: &ExecuteConfig,
  ) -> Result<RunReport, ExecuteError>
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    let order = self.plan(target, config)?;

    info!(target_task = target, task_count = order.len(), exclusive = config.exclusive, "starting run");
    if order.is_empty() {
      warn!(target_task = target, "target not found, nothing to run");
    }

    let started = Instant::now();
    let mut report = RunReport::new(target);

    if self.perform_setup(ctx, strategy, &mut report) {
      // The graph is built from the registered tasks, so every name resolves.
      let tasks: Vec<&Task<C>> = order.iter().filter_map(|name| self.task(name)).collect();
      debug_assert_eq!(tasks.len(), order.len());

      for task in tasks {
        if !self.run_task(task, ctx, strategy, &mut report) {
          warn!(
            task = task.name(),
            remaining = order.len() - report.total(),
            "aborting run after task failure"
          );
          break;
        }
      }
    }

    self.perform_teardown(ctx, strategy, &mut report);
    report.duration = started.elapsed();

    info!(
      target_task = target,
      executed = report.tasks_with(TaskOutcome::Executed).len(),
      skipped = report.tasks_with(TaskOutcome::Skipped).len(),
      errored = report.tasks_with(TaskOutcome::Errored).len(),
      success = report.is_success(),
      duration_ms = millis(report.duration),
      "run complete"
    );

    if report.is_success() {
      Ok(report)
    } else {
      Err(ExecuteError::Failed(Box::new(report)))
    }
  }

  /// Run global setup hooks in order. Returns false if one failed.
  fn perform_setup<S>(&self, ctx: &mut C, strategy: &mut S, report: &mut RunReport) -> bool
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    for hook in &self.lifetimes.setup {
      if let Err(e) = strategy.setup(hook, ctx) {
        error!(error = %e, "setup failed, no tasks will run");
        report.record_failure(RunFailure::new(FailureStage::Setup, None, Arc::new(e)));
        return false;
      }
    }
    true
  }

  /// Run every global teardown hook, even if an earlier one fails.
  fn perform_teardown<S>(&self, ctx: &mut C, strategy: &mut S, report: &mut RunReport)
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    let terminal = report.failure.as_ref().map(|f| f.error.clone());
    let info = TeardownContext {
      successful: terminal.is_none(),
      error: terminal.as_deref(),
    };

    for hook in &self.lifetimes.teardown {
      if let Err(e) = strategy.teardown(hook, ctx, &info) {
        error!(error = %e, "teardown failed");
        report.record_failure(RunFailure::new(FailureStage::Teardown, None, Arc::new(e)));
      }
    }
  }

  /// Run one task through its whole lifecycle. Returns false if the run must
  /// stop.
  fn run_task<S>(&self, task: &Task<C>, ctx: &mut C, strategy: &mut S, report: &mut RunReport) -> bool
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    let name = task.name();

    for (position, criterion) in task.criteria().iter().enumerate() {
      if !criterion.evaluate(ctx) {
        let reason = criterion.skip_reason(position);
        info!(task = name, reason = %reason, "skipping task");
        strategy.skip(task, &reason);
        report.records.push(TaskRecord::skipped(name, reason));
        return true;
      }
    }

    info!(task = name, "running task");
    let started = Instant::now();

    let setup_info = TaskSetupContext {
      task: name,
      description: task.description(),
    };
    let setup_error = self
      .lifetimes
      .task_setup
      .iter()
      .find_map(|hook| strategy.task_setup(hook, ctx, &setup_info).err());

    let mut result = match setup_error {
      Some(e) => {
        error!(task = name, error = %e, "task setup failed");
        let e = Arc::new(e);
        report.record_failure(RunFailure::new(FailureStage::TaskSetup, Some(name), e.clone()));
        ActionOutcome {
          outcome: TaskOutcome::Errored,
          error: Some(e),
          abort: true,
        }
      }
      None => {
        let mut result = self.perform_action(task, ctx, strategy, report);
        if let Some(handler) = task.finally_handler()
          && let Err(e) = strategy.invoke_finally(handler, ctx)
        {
          error!(task = name, error = %e, "finally handler failed");
          self.task_failed(&mut result, FailureStage::Finally, name, e, report);
        }
        result
      }
    };

    let teardown_info = TaskTeardownContext {
      task: name,
      description: task.description(),
      successful: result.outcome != TaskOutcome::Errored,
      duration: started.elapsed(),
    };
    for hook in &self.lifetimes.task_teardown {
      if let Err(e) = strategy.task_teardown(hook, ctx, &teardown_info) {
        error!(task = name, error = %e, "task teardown failed");
        self.task_failed(&mut result, FailureStage::TaskTeardown, name, e, report);
      }
    }

    let duration = started.elapsed();
    debug!(task = name, outcome = %result.outcome, duration_ms = millis(duration), "task finished");

    report.records.push(TaskRecord {
      name: name.to_string(),
      outcome: result.outcome,
      skip_reason: None,
      duration,
      error: result.error,
    });

    !result.abort
  }

  /// Invoke the task's action and apply its error policy.
  fn perform_action<S>(&self, task: &Task<C>, ctx: &mut C, strategy: &mut S, report: &mut RunReport) -> ActionOutcome
  where
    S: ExecutionStrategy<C> + ?Sized,
  {
    let name = task.name();

    let error = match strategy.execute(task, ctx) {
      Ok(()) => {
        return ActionOutcome {
          outcome: TaskOutcome::Executed,
          error: None,
          abort: false,
        };
      }
      Err(e) => e,
    };

    warn!(task = name, error = %error, "task failed");

    if let Some(reporter) = task.error_reporter()
      && let Err(e) = strategy.report_error(reporter, &error, ctx)
    {
      warn!(task = name, error = %e, "error reporter failed");
    }

    let error = match task.error_handler() {
      Some(handler) => match strategy.handle_error(handler, &error, ctx) {
        Ok(()) => {
          info!(task = name, "task error handled");
          return ActionOutcome {
            outcome: TaskOutcome::Executed,
            error: Some(Arc::new(error)),
            abort: false,
          };
        }
        Err(rethrown) => rethrown,
      },
      None => error,
    };
    let error = Arc::new(error);

    if task.is_continue_on_error() {
      warn!(task = name, "continuing after task failure");
      return ActionOutcome {
        outcome: TaskOutcome::Errored,
        error: Some(error),
        abort: false,
      };
    }

    report.record_failure(RunFailure::new(FailureStage::Action, Some(name), error.clone()));
    ActionOutcome {
      outcome: TaskOutcome::Errored,
      error: Some(error),
      abort: true,
    }
  }

  /// Record a failure raised after the action (finally handler or task
  /// teardown). It never replaces an error already on the task or the run.
  fn task_failed(
    &self,
    result: &mut ActionOutcome,
    stage: FailureStage,
    name: &str,
    error: anyhow::Error,
    report: &mut RunReport,
  ) {
    let error = Arc::new(error);
    report.record_failure(RunFailure::new(stage, Some(name), error.clone()));
    result.outcome = TaskOutcome::Errored;
    if result.error.is_none() {
      result.error = Some(error);
    }
    result.abort = true;
  }
}
