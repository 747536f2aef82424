//! Task model.
//!
//! A [`Task`] is a named unit of work plus the policy around it: what it
//! depends on, when it is eligible to run, and how its failures are handled.
//! Tasks are plain configuration. The engine reads them but never mutates
//! them, and evaluating criteria or handlers is the engine's job.

use std::fmt;

use thiserror::Error;

use crate::graph::node_key;

/// A unit of work. Receives the run context.
pub type Action<C> = Box<dyn Fn(&mut C) -> anyhow::Result<()>>;

/// Gate deciding whether a task is eligible to run.
pub type Predicate<C> = Box<dyn Fn(&C) -> bool>;

/// Callback receiving a task's failure along with the run context.
///
/// Used both for error handlers (which may recover the error by returning
/// `Ok`) and error reporters (which never recover).
pub type ErrorHandler<C> = Box<dyn Fn(&anyhow::Error, &mut C) -> anyhow::Result<()>>;

/// Callback run after a task's action, whatever the outcome.
pub type FinallyHandler<C> = Box<dyn Fn(&mut C) -> anyhow::Result<()>>;

/// A named reference from one task to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDependency {
  /// Name of the referenced task.
  pub name: String,

  /// Whether a missing referenced task is a configuration error.
  /// Optional references to missing tasks are ignored.
  pub required: bool,
}

/// A criterion gating a task, with an optional human readable description.
pub struct Criterion<C> {
  description: Option<String>,
  predicate: Predicate<C>,
}

impl<C> Criterion<C> {
  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn evaluate(&self, ctx: &C) -> bool {
    (self.predicate)(ctx)
  }

  /// Text recorded as the skip reason when this criterion fails.
  ///
  /// `position` is the zero-based index of the criterion within its task.
  pub fn skip_reason(&self, position: usize) -> String {
    match &self.description {
      Some(description) => description.clone(),
      None => format!("criteria #{} was not met", position + 1),
    }
  }
}

impl<C> fmt::Debug for Criterion<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Criterion")
      .field("description", &self.description)
      .finish_non_exhaustive()
  }
}

/// Raised by [`Task::execute`] when a task deferring its errors had one or
/// more actions fail.
#[derive(Debug, Error)]
#[error("{} action(s) failed: {}", .errors.len(), join_errors(.errors))]
pub struct DeferredActionErrors {
  /// Failures in the order the actions ran.
  pub errors: Vec<anyhow::Error>,
}

fn join_errors(errors: &[anyhow::Error]) -> String {
  errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// A named unit of work with dependencies, criteria and handlers.
///
/// `C` is the host's run context type; it is handed by `&mut` to every action
/// and handler.
pub struct Task<C> {
  name: String,
  description: Option<String>,
  dependencies: Vec<TaskDependency>,
  dependees: Vec<TaskDependency>,
  criteria: Vec<Criterion<C>>,
  actions: Vec<Action<C>>,
  error_handler: Option<ErrorHandler<C>>,
  error_reporter: Option<ErrorHandler<C>>,
  finally_handler: Option<FinallyHandler<C>>,
  continue_on_error: bool,
  defer_on_error: bool,
}

impl<C> Task<C> {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: None,
      dependencies: Vec::new(),
      dependees: Vec::new(),
      criteria: Vec::new(),
      actions: Vec::new(),
      error_handler: None,
      error_reporter: None,
      finally_handler: None,
      continue_on_error: false,
      defer_on_error: false,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Require `name` to run before this task. Adding the same name twice is a
  /// no-op, except that a required reference wins over an optional one.
  pub fn depends_on(mut self, name: impl Into<String>) -> Self {
    add_reference(&mut self.dependencies, name.into(), true);
    self
  }

  /// Like [`Task::depends_on`], but a missing task is ignored.
  pub fn depends_on_optional(mut self, name: impl Into<String>) -> Self {
    add_reference(&mut self.dependencies, name.into(), false);
    self
  }

  /// Declare that `name` depends on this task.
  pub fn dependee_of(mut self, name: impl Into<String>) -> Self {
    add_reference(&mut self.dependees, name.into(), true);
    self
  }

  pub fn dependee_of_optional(mut self, name: impl Into<String>) -> Self {
    add_reference(&mut self.dependees, name.into(), false);
    self
  }

  pub fn with_criteria(mut self, predicate: impl Fn(&C) -> bool + 'static) -> Self {
    self.criteria.push(Criterion {
      description: None,
      predicate: Box::new(predicate),
    });
    self
  }

  pub fn with_described_criteria(
    mut self,
    description: impl Into<String>,
    predicate: impl Fn(&C) -> bool + 'static,
  ) -> Self {
    self.criteria.push(Criterion {
      description: Some(description.into()),
      predicate: Box::new(predicate),
    });
    self
  }

  /// Append an action. Actions run in the order they were added.
  pub fn does(mut self, action: impl Fn(&mut C) -> anyhow::Result<()> + 'static) -> Self {
    self.actions.push(Box::new(action));
    self
  }

  /// Set the handler invoked when the task's action fails.
  ///
  /// Returning `Ok` marks the failure as handled. Returning an error replaces
  /// the original failure.
  pub fn on_error(mut self, handler: impl Fn(&anyhow::Error, &mut C) -> anyhow::Result<()> + 'static) -> Self {
    self.error_handler = Some(Box::new(handler));
    self
  }

  /// Set a callback that sees the task's failure before the error handler.
  /// It cannot recover the failure.
  pub fn report_error(mut self, reporter: impl Fn(&anyhow::Error, &mut C) -> anyhow::Result<()> + 'static) -> Self {
    self.error_reporter = Some(Box::new(reporter));
    self
  }

  pub fn finally(mut self, handler: impl Fn(&mut C) -> anyhow::Result<()> + 'static) -> Self {
    self.finally_handler = Some(Box::new(handler));
    self
  }

  pub fn continue_on_error(mut self) -> Self {
    self.continue_on_error = true;
    self
  }

  /// Run every action even if an earlier one fails, then raise the collected
  /// failures as one [`DeferredActionErrors`].
  pub fn defer_on_error(mut self) -> Self {
    self.defer_on_error = true;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn dependencies(&self) -> &[TaskDependency] {
    &self.dependencies
  }

  pub fn dependees(&self) -> &[TaskDependency] {
    &self.dependees
  }

  pub fn criteria(&self) -> &[Criterion<C>] {
    &self.criteria
  }

  pub fn action_count(&self) -> usize {
    self.actions.len()
  }

  pub fn error_handler(&self) -> Option<&ErrorHandler<C>> {
    self.error_handler.as_ref()
  }

  pub fn error_reporter(&self) -> Option<&ErrorHandler<C>> {
    self.error_reporter.as_ref()
  }

  pub fn finally_handler(&self) -> Option<&FinallyHandler<C>> {
    self.finally_handler.as_ref()
  }

  pub fn is_continue_on_error(&self) -> bool {
    self.continue_on_error
  }

  pub fn is_defer_on_error(&self) -> bool {
    self.defer_on_error
  }

  /// Check whether this task answers to `name`, ignoring case.
  pub fn is_named(&self, name: &str) -> bool {
    node_key(&self.name) == node_key(name)
  }

  /// Run the task's actions in order.
  ///
  /// Stops at the first failure unless the task defers its errors.
  pub fn execute(&self, ctx: &mut C) -> anyhow::Result<()> {
    if !self.defer_on_error {
      for action in &self.actions {
        action(ctx)?;
      }
      return Ok(());
    }

    let errors: Vec<anyhow::Error> = self.actions.iter().filter_map(|action| action(ctx).err()).collect();
    if errors.is_empty() {
      Ok(())
    } else {
      Err(DeferredActionErrors { errors }.into())
    }
  }
}

impl<C> fmt::Debug for Task<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("name", &self.name)
      .field("description", &self.description)
      .field("dependencies", &self.dependencies)
      .field("dependees", &self.dependees)
      .field("criteria", &self.criteria)
      .field("actions", &self.actions.len())
      .field("error_handler", &self.error_handler.is_some())
      .field("error_reporter", &self.error_reporter.is_some())
      .field("finally_handler", &self.finally_handler.is_some())
      .field("continue_on_error", &self.continue_on_error)
      .field("defer_on_error", &self.defer_on_error)
      .finish()
  }
}

fn add_reference(references: &mut Vec<TaskDependency>, name: String, required: bool) {
  let key = node_key(&name);
  match references.iter_mut().find(|r| node_key(&r.name) == key) {
    Some(existing) => existing.required |= required,
    None => references.push(TaskDependency { name, required }),
  }
}
