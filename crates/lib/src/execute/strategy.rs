//! Execution strategies.
//!
//! The engine never calls a hook, action or handler itself; it goes through
//! an [`ExecutionStrategy`]. This keeps the orchestration in one place while
//! letting callers swap how the work is actually performed:
//!
//! - [`DefaultExecutionStrategy`] calls everything directly.
//! - [`DryRunExecutionStrategy`] only logs what would run.
//! - Tests implement the trait to record the call sequence.

use tracing::{debug, info};

use crate::task::{ErrorHandler, FinallyHandler, Task};

use super::lifetime::{
  SetupHook, TaskSetupContext, TaskSetupHook, TaskTeardownContext, TaskTeardownHook, TeardownContext, TeardownHook,
};

/// Performs the work the engine schedules.
///
/// Only [`execute`](Self::execute) and [`skip`](Self::skip) are required; the
/// hook and handler methods default to calling through directly.
pub trait ExecutionStrategy<C> {
  /// Run a task's actions.
  fn execute(&mut self, task: &Task<C>, ctx: &mut C) -> anyhow::Result<()>;

  /// Called for a task whose criteria were not met. Reporting only.
  fn skip(&mut self, task: &Task<C>, reason: &str);

  fn setup(&mut self, hook: &SetupHook<C>, ctx: &mut C) -> anyhow::Result<()> {
    hook(ctx)
  }

  fn teardown(&mut self, hook: &TeardownHook<C>, ctx: &mut C, info: &TeardownContext<'_>) -> anyhow::Result<()> {
    hook(ctx, info)
  }

  fn task_setup(&mut self, hook: &TaskSetupHook<C>, ctx: &mut C, info: &TaskSetupContext<'_>) -> anyhow::Result<()> {
    hook(ctx, info)
  }

  fn task_teardown(
    &mut self,
    hook: &TaskTeardownHook<C>,
    ctx: &mut C,
    info: &TaskTeardownContext<'_>,
  ) -> anyhow::Result<()> {
    hook(ctx, info)
  }

  fn report_error(&mut self, reporter: &ErrorHandler<C>, error: &anyhow::Error, ctx: &mut C) -> anyhow::Result<()> {
    reporter(error, ctx)
  }

  fn handle_error(&mut self, handler: &ErrorHandler<C>, error: &anyhow::Error, ctx: &mut C) -> anyhow::Result<()> {
    handler(error, ctx)
  }

  fn invoke_finally(&mut self, handler: &FinallyHandler<C>, ctx: &mut C) -> anyhow::Result<()> {
    handler(ctx)
  }
}

/// Runs tasks and hooks directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExecutionStrategy;

impl<C> ExecutionStrategy<C> for DefaultExecutionStrategy {
  fn execute(&mut self, task: &Task<C>, ctx: &mut C) -> anyhow::Result<()> {
    debug!(task = task.name(), actions = task.action_count(), "executing task");
    task.execute(ctx)
  }

  fn skip(&mut self, task: &Task<C>, reason: &str) {
    debug!(task = task.name(), reason, "task skipped");
  }
}

/// Walks the run without doing any work.
///
/// Neither lifetime hooks nor actions nor handlers are invoked, so a dry run
/// succeeds as soon as the graph resolves. Criteria are still evaluated by
/// the engine, so the report shows which tasks would be skipped.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutionStrategy {
  /// Tasks that would have run, in order.
  pub planned: Vec<String>,
}

impl DryRunExecutionStrategy {
  pub fn new() -> Self {
    Self::default()
  }
}

impl<C> ExecutionStrategy<C> for DryRunExecutionStrategy {
  fn execute(&mut self, task: &Task<C>, _ctx: &mut C) -> anyhow::Result<()> {
    info!(task = task.name(), "dry run: would execute task");
    self.planned.push(task.name().to_string());
    Ok(())
  }

  fn skip(&mut self, task: &Task<C>, reason: &str) {
    info!(task = task.name(), reason, "dry run: would skip task");
  }

  fn setup(&mut self, _hook: &SetupHook<C>, _ctx: &mut C) -> anyhow::Result<()> {
    Ok(())
  }

  fn teardown(&mut self, _hook: &TeardownHook<C>, _ctx: &mut C, _info: &TeardownContext<'_>) -> anyhow::Result<()> {
    Ok(())
  }

  fn task_setup(
    &mut self,
    _hook: &TaskSetupHook<C>,
    _ctx: &mut C,
    _info: &TaskSetupContext<'_>,
  ) -> anyhow::Result<()> {
    Ok(())
  }

  fn task_teardown(
    &mut self,
    _hook: &TaskTeardownHook<C>,
    _ctx: &mut C,
    _info: &TaskTeardownContext<'_>,
  ) -> anyhow::Result<()> {
    Ok(())
  }

  fn report_error(&mut self, _reporter: &ErrorHandler<C>, _error: &anyhow::Error, _ctx: &mut C) -> anyhow::Result<()> {
    Ok(())
  }

  fn handle_error(&mut self, _handler: &ErrorHandler<C>, _error: &anyhow::Error, _ctx: &mut C) -> anyhow::Result<()> {
    Ok(())
  }

  fn invoke_finally(&mut self, _handler: &FinallyHandler<C>, _ctx: &mut C) -> anyhow::Result<()> {
    Ok(())
  }
}
