use anyhow::bail;
use kiln_lib::execute::report::{FailureStage, TaskOutcome};
use kiln_lib::execute::{DryRunExecutionStrategy, Engine, ExecuteConfig};
use kiln_lib::task::DeferredActionErrors;

use super::common::{BuildContext, RecordingStrategy, engine_with_lifetimes, failing, names, run, task};

fn count(log: &[String], entry: &str) -> usize {
  log.iter().filter(|l| *l == entry).count()
}

#[test]
fn global_teardown_runs_once_whatever_fails() {
  // clean run, failing setup, failing task
  let clean = engine_with_lifetimes();

  let mut broken_setup = engine_with_lifetimes();
  broken_setup.setup(|_| bail!("setup broke"));

  let mut broken_task = engine_with_lifetimes();
  broken_task.register(failing("Build")).unwrap();

  for (engine, successful) in [(clean, true), (broken_setup, false), (broken_task, false)] {
    let mut engine = engine;
    if engine.task("Build").is_none() {
      engine.register(task("Build")).unwrap();
    }

    let (result, ctx) = run(&engine, "Build");

    assert_eq!(result.is_ok(), successful);
    let teardowns = ctx.log.iter().filter(|l| l.starts_with("teardown successful=")).count();
    assert_eq!(teardowns, 1, "log: {:?}", ctx.log);
    assert_eq!(
      ctx.log.last().cloned(),
      Some(format!("teardown successful={successful}"))
    );
  }
}

#[test]
fn task_teardown_matches_task_setup() {
  let mut engine = engine_with_lifetimes();
  engine.register(task("Restore")).unwrap();
  engine.register(task("Lint").depends_on("Restore").with_criteria(|_| false)).unwrap();
  engine
    .register(failing("Build").depends_on("Restore").continue_on_error())
    .unwrap();
  engine.register(failing("Test").depends_on("Build")).unwrap();
  engine
    .register(task("Package").depends_on("Test").depends_on("Lint"))
    .unwrap();

  let (result, ctx) = run(&engine, "Package");
  assert!(result.is_err());

  for name in ["Restore", "Build", "Test"] {
    assert_eq!(count(&ctx.log, &format!("setup {name}")), 1, "{name}");
    assert_eq!(count(&ctx.log, &format!("teardown {name}")), 1, "{name}");
  }
  for name in ["Lint", "Package"] {
    assert_eq!(count(&ctx.log, &format!("setup {name}")), 0, "{name}");
    assert_eq!(count(&ctx.log, &format!("teardown {name}")), 0, "{name}");
  }
}

#[test]
fn skipped_task_goes_through_strategy_skip_only() {
  let mut engine = engine_with_lifetimes();
  engine
    .register(
      task("Publish")
        .with_described_criteria("only on CI", |ctx: &BuildContext| ctx.on_ci)
        .finally(|ctx| {
          ctx.push("finally Publish");
          Ok(())
        }),
    )
    .unwrap();

  let mut ctx = BuildContext::default();
  let mut strategy = RecordingStrategy::default();
  let report = engine.run("Publish", &mut ctx, &mut strategy).unwrap();

  assert_eq!(strategy.calls, vec!["skip Publish (only on CI)"]);
  assert_eq!(ctx.log, vec!["setup", "teardown successful=true"]);
  let record = report.get("publish").unwrap();
  assert_eq!(record.outcome, TaskOutcome::Skipped);
  assert_eq!(record.skip_reason.as_deref(), Some("only on CI"));

  let mut ctx = BuildContext {
    on_ci: true,
    ..BuildContext::default()
  };
  let mut strategy = RecordingStrategy::default();
  engine.run("Publish", &mut ctx, &mut strategy).unwrap();
  assert_eq!(strategy.calls, vec!["execute Publish"]);
  assert!(ctx.log.contains(&"finally Publish".to_string()));
}

#[test]
fn first_false_criterion_is_reported() {
  let mut engine = Engine::new();
  engine
    .register(
      task("Deploy")
        .with_described_criteria("has credentials", |_| true)
        .with_described_criteria("branch is main", |_| false)
        .with_described_criteria("never evaluated", |_| panic!("short circuit expected")),
    )
    .unwrap();

  let (result, _) = run(&engine, "Deploy");
  let report = result.unwrap();
  assert_eq!(
    report.get("Deploy").unwrap().skip_reason.as_deref(),
    Some("branch is main")
  );
}

#[test]
fn dependees_order_the_run() {
  let mut engine = Engine::new();
  engine.register(task("Build")).unwrap();
  engine.register(task("Restore").dependee_of("Build")).unwrap();
  engine.register(task("Telemetry").dependee_of_optional("Missing")).unwrap();

  let (result, ctx) = run(&engine, "build");

  assert_eq!(names(&result.unwrap().records), vec!["Restore", "Build"]);
  assert_eq!(ctx.log, vec!["run Restore", "run Build"]);
}

#[test]
fn optional_dependency_on_missing_task_is_ignored() {
  let mut engine = Engine::new();
  engine.register(task("Build").depends_on_optional("GenerateCode")).unwrap();

  let (result, _) = run(&engine, "Build");
  assert_eq!(names(&result.unwrap().records), vec!["Build"]);
}

#[test]
fn deferred_errors_surface_as_one_failure() {
  let mut engine = Engine::new();
  engine
    .register(
      failing("Check")
        .defer_on_error()
        .does(|ctx| {
          ctx.push("second check");
          Ok(())
        })
        .does(|_| bail!("third check failed")),
    )
    .unwrap();

  let (result, ctx) = run(&engine, "Check");

  assert_eq!(ctx.log, vec!["run Check", "second check"]);
  let report = result.unwrap_err().into_report().unwrap();
  let error = report.failure.unwrap().error;
  let deferred = error.downcast_ref::<DeferredActionErrors>().unwrap();
  assert_eq!(deferred.errors.len(), 2);
}

#[test]
fn handler_sees_context_and_error() {
  let mut engine = Engine::new();
  engine
    .register(failing("Build").on_error(|error, ctx: &mut BuildContext| {
      ctx.push(format!("recovered from '{error}'"));
      Ok(())
    }))
    .unwrap();

  let (result, ctx) = run(&engine, "Build");

  let report = result.unwrap();
  assert!(report.is_success());
  assert_eq!(ctx.log, vec!["run Build", "recovered from 'Build failed'"]);
}

#[test]
fn exclusive_run_still_validates_the_graph() {
  let mut engine = Engine::new();
  engine.register(task("Build").depends_on("Nope")).unwrap();

  let config = ExecuteConfig {
    exclusive: true,
    ..ExecuteConfig::default()
  };
  let mut ctx = BuildContext::default();
  let err = engine
    .run_with_config("Build", &mut ctx, &mut RecordingStrategy::default(), &config)
    .unwrap_err();

  assert!(err.is_configuration());
}

#[test]
fn dry_run_plans_full_order() {
  let mut engine = engine_with_lifetimes();
  engine.register(task("Clean")).unwrap();
  engine.register(failing("Build").depends_on("Clean")).unwrap();
  engine.register(task("Test").depends_on("Build")).unwrap();

  let mut ctx = BuildContext::default();
  let mut strategy = DryRunExecutionStrategy::new();
  let report = engine.run("Test", &mut ctx, &mut strategy).unwrap();

  assert_eq!(strategy.planned, vec!["Clean", "Build", "Test"]);
  assert_eq!(report.tasks_with(TaskOutcome::Executed).len(), 3);
  assert!(ctx.log.is_empty());
}

#[test]
fn summary_describes_a_failed_run() {
  let mut engine = Engine::new();
  engine.register(failing("X").continue_on_error()).unwrap();
  engine.register(failing("Y").depends_on("X")).unwrap();
  engine.register(task("Z").depends_on("Y")).unwrap();
  engine.teardown(|_, _| bail!("cleanup failed"));

  let (result, _) = run(&engine, "Z");
  let report = result.unwrap_err().into_report().unwrap();
  assert_eq!(report.failure.as_ref().unwrap().stage, FailureStage::Action);

  let json = serde_json::to_value(report.summary()).unwrap();
  assert_eq!(json["target"], "Z");
  assert_eq!(json["successful"], false);
  assert_eq!(json["tasks"].as_array().unwrap().len(), 2);
  assert_eq!(json["tasks"][0]["outcome"], "errored");
  assert_eq!(json["tasks"][0]["error"], "X failed");
  assert_eq!(json["tasks"][1]["outcome"], "errored");
  assert_eq!(json["failure"], "task 'Y' failed in action: Y failed");
  assert_eq!(json["secondary"][0], "teardown failed: cleanup failed");
}
