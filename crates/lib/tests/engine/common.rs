use anyhow::bail;
use kiln_lib::execute::report::{RunReport, TaskRecord};
use kiln_lib::execute::{DefaultExecutionStrategy, Engine, ExecuteError, ExecutionStrategy};
use kiln_lib::task::Task;

/// Run context shared by the integration tests. Every hook and action
/// appends to `log` so tests can assert on the exact call sequence.
#[derive(Debug, Default)]
pub struct BuildContext {
  pub log: Vec<String>,
  pub on_ci: bool,
}

impl BuildContext {
  pub fn push(&mut self, entry: impl Into<String>) {
    self.log.push(entry.into());
  }
}

/// A task whose single action logs `run <name>`.
pub fn task(name: &'static str) -> Task<BuildContext> {
  Task::new(name).does(move |ctx: &mut BuildContext| {
    ctx.push(format!("run {name}"));
    Ok(())
  })
}

/// A task whose single action logs `run <name>` and then fails.
pub fn failing(name: &'static str) -> Task<BuildContext> {
  Task::new(name).does(move |ctx: &mut BuildContext| {
    ctx.push(format!("run {name}"));
    bail!("{name} failed")
  })
}

/// An engine with logging global and per-task lifetimes registered.
pub fn engine_with_lifetimes() -> Engine<BuildContext> {
  let mut engine = Engine::<BuildContext>::new();
  engine
    .setup(|ctx| {
      ctx.push("setup");
      Ok(())
    })
    .teardown(|ctx, info| {
      ctx.push(format!("teardown successful={}", info.successful));
      Ok(())
    })
    .task_setup(|ctx, info| {
      ctx.push(format!("setup {}", info.task));
      Ok(())
    })
    .task_teardown(|ctx, info| {
      ctx.push(format!("teardown {}", info.task));
      Ok(())
    });
  engine
}

/// Strategy that records every call before delegating to the default one.
#[derive(Debug, Default)]
pub struct RecordingStrategy {
  pub calls: Vec<String>,
}

impl ExecutionStrategy<BuildContext> for RecordingStrategy {
  fn execute(&mut self, task: &Task<BuildContext>, ctx: &mut BuildContext) -> anyhow::Result<()> {
    self.calls.push(format!("execute {}", task.name()));
    DefaultExecutionStrategy.execute(task, ctx)
  }

  fn skip(&mut self, task: &Task<BuildContext>, reason: &str) {
    self.calls.push(format!("skip {} ({reason})", task.name()));
  }
}

pub fn run(engine: &Engine<BuildContext>, target: &str) -> (Result<RunReport, ExecuteError>, BuildContext) {
  let mut ctx = BuildContext::default();
  let result = engine.run(target, &mut ctx, &mut DefaultExecutionStrategy);
  (result, ctx)
}

pub fn names(records: &[TaskRecord]) -> Vec<&str> {
  records.iter().map(|r| r.name.as_str()).collect()
}
