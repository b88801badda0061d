// ABOUTME: Integration tests for the workflow executor across all execution modes
// ABOUTME: Covers restart-safe reruns, compare mismatches, failure isolation and guards

mod common;

use common::{registry_with, tamper_recorded_output, RecordingAction, TestStep, TestWorkflowBuilder};
use gridflow::actions::Action;
use gridflow::engine::{ExecutionError, ExecutionMode, JobStatus, StepStatus, WorkflowExecutor};
use gridflow::matrix::JobOrigin;
use gridflow::parser::WorkflowDocument;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Fixture {
    document: WorkflowDocument,
    executor: WorkflowExecutor,
    learn: Arc<RecordingAction>,
    /// Invocations of the `learn` action.
    executions: Arc<AtomicUsize>,
}

fn structure_learning_workflow() -> TestWorkflowBuilder {
    TestWorkflowBuilder::new("structure-learning")
        .description("Learn and score causal graphs")
        .data_root("/data")
        .output_root("/results/{{id}}/{{dataset}}-{{algorithm}}")
        .axis("dataset", &["asia", "sachs"])
        .axis("algorithm", &["pc", "ges"])
        .step(
            TestStep::action("learn", "test/learn")
                .with("data", "{{data_root}}/{{dataset}}/{{algorithm}}.csv")
                .with("out", "{{output_root}}/graph.xml"),
        )
        .step(TestStep::action("evaluate", "test/evaluate").with("graph", "{{learn.graph}}"))
}

fn fixture(builder: TestWorkflowBuilder, learn: RecordingAction) -> Fixture {
    let evaluate = RecordingAction::new("test/evaluate", &["graph"], &["score"]);
    let executions = learn.executions();
    let learn = Arc::new(learn);

    let registry = registry_with(vec![
        Arc::clone(&learn) as Arc<dyn Action>,
        Arc::new(evaluate) as Arc<dyn Action>,
    ]);

    let document = WorkflowDocument::from_yaml(&builder.generate_yaml()).unwrap();
    Fixture {
        document,
        executor: WorkflowExecutor::new(Arc::new(registry)),
        learn,
        executions,
    }
}

fn learn_action() -> RecordingAction {
    RecordingAction::new("test/learn", &["data", "out"], &["graph"])
}

#[tokio::test]
async fn test_dry_run_invokes_nothing() {
    let fixture = fixture(structure_learning_workflow(), learn_action());

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.summary.total_jobs, 4);
    assert_eq!(report.summary.executed_steps, 0);
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 0);
    for job in &report.jobs {
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job
            .steps
            .iter()
            .all(|step| step.status == StepStatus::WouldExecute));
    }
    assert!(fixture.learn.store().read().await.is_empty());
}

#[tokio::test]
async fn test_inputs_resolve_against_job_axes() {
    let fixture = fixture(structure_learning_workflow(), learn_action());

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();

    let first = &report.jobs[0];
    assert_eq!(first.job.get("dataset"), Some(&json!("asia")));
    assert_eq!(first.job.get("algorithm"), Some(&json!("pc")));
    assert_eq!(first.steps[0].inputs["data"], json!("/data/asia/pc.csv"));
    assert_eq!(
        first.steps[0].inputs["out"],
        json!("/results/structure-learning/asia-pc/graph.xml")
    );
    assert_eq!(
        first.steps[1].inputs["graph"],
        first.steps[0].outputs["graph"]
    );

    let last = &report.jobs[3];
    assert_eq!(last.steps[0].inputs["data"], json!("/data/sachs/ges.csv"));
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    let fixture = fixture(structure_learning_workflow(), learn_action());

    let first = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();
    assert!(first.is_success());
    assert_eq!(first.summary.executed_steps, 8);
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 4);

    let second = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();
    assert!(second.is_success());
    assert_eq!(second.summary.executed_steps, 0);
    assert_eq!(second.summary.skipped_jobs, 4);
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 4);

    for (before, after) in first.jobs.iter().zip(&second.jobs) {
        assert_eq!(after.status, JobStatus::Skipped);
        assert!(after
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Skipped));
        assert_eq!(before.context, after.context);
    }
}

#[tokio::test]
async fn test_dry_run_after_run_would_skip() {
    let fixture = fixture(structure_learning_workflow(), learn_action());

    fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();
    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await
        .unwrap();

    for job in &report.jobs {
        assert!(job
            .steps
            .iter()
            .all(|step| step.status == StepStatus::WouldSkip));
    }
}

#[tokio::test]
async fn test_compare_detects_changed_recording() {
    let fixture = fixture(structure_learning_workflow(), learn_action());

    fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();

    let unchanged = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Compare)
        .await
        .unwrap();
    assert!(unchanged.is_success());
    for job in &unchanged.jobs {
        assert!(job
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Identical));
    }

    let changed = tamper_recorded_output(&fixture.learn.store(), "asia/ges.csv", "graph", "stale").await;
    assert_eq!(changed, 1);

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Compare)
        .await
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.summary.failed_jobs, 1);

    let failed = &report.jobs[1];
    assert_eq!(failed.job.get("algorithm"), Some(&json!("ges")));
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.steps.len(), 1);
    assert_eq!(failed.steps[0].status, StepStatus::Different);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].step.as_deref(), Some("learn"));
    assert!(failures[0].message.contains("recorded stale"));
}

#[tokio::test]
async fn test_failing_job_does_not_stop_others() {
    let fixture = fixture(
        structure_learning_workflow(),
        learn_action().failing_when("data", "/data/sachs/pc.csv"),
    );

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.summary.total_jobs, 4);
    assert_eq!(report.summary.succeeded_jobs, 3);
    assert_eq!(report.summary.failed_jobs, 1);

    let failed = &report.jobs[2];
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.steps.len(), 1);
    assert_eq!(failed.steps[0].status, StepStatus::Failed);

    let failures = report.failures();
    assert_eq!(failures[0].ordinal, failed.job.ordinal);
    assert_eq!(failures[0].inputs["data"], json!("/data/sachs/pc.csv"));
    assert!(failures[0].job.contains("dataset=sachs"));
}

#[tokio::test]
async fn test_exclude_rule_removes_jobs() {
    let document = WorkflowDocument::from_yaml(
        r#"
id: sizes
description: Algorithm by sample size
matrix:
  algorithm: [pc, ges]
  size: [100, 500]
exclude:
  - algorithm: ges
    size: 100
steps:
  - name: learn
    uses: test/learn
    with:
      data: "{{algorithm}}-{{size}}"
"#,
    )
    .unwrap();

    let learn = RecordingAction::new("test/learn", &["data"], &["graph"]);
    let executor = WorkflowExecutor::new(Arc::new(registry_with(vec![Arc::new(learn) as Arc<dyn Action>])));
    let jobs = executor.prepare(&document).unwrap();

    let assignments: Vec<(serde_json::Value, serde_json::Value)> = jobs
        .iter()
        .map(|job| (job.assignment["algorithm"].clone(), job.assignment["size"].clone()))
        .collect();
    assert_eq!(
        assignments,
        vec![
            (json!("pc"), json!(100)),
            (json!("pc"), json!(500)),
            (json!("ges"), json!(500)),
        ]
    );

    let report = executor.execute(&document, ExecutionMode::Run).await.unwrap();
    let data: Vec<_> = report
        .jobs
        .iter()
        .map(|job| job.steps[0].inputs["data"].clone())
        .collect();
    assert_eq!(data, vec![json!("pc-100"), json!("pc-500"), json!("ges-500")]);
}

#[tokio::test]
async fn test_include_appends_job() {
    let builder = structure_learning_workflow().include(&[("dataset", "alarm"), ("algorithm", "fci")]);
    let fixture = fixture(builder, learn_action());

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await
        .unwrap();

    assert_eq!(report.summary.total_jobs, 5);
    let extra = &report.jobs[4].job;
    assert_eq!(extra.origin, JobOrigin::Include);
    assert_eq!(report.jobs[4].steps[0].inputs["data"], json!("/data/alarm/fci.csv"));
}

#[tokio::test]
async fn test_unknown_action_is_invalid_uses() {
    let builder = TestWorkflowBuilder::new("unknown")
        .axis("dataset", &["asia"])
        .step(TestStep::action("learn", "test/missing").with("data", "{{dataset}}"));
    let fixture = fixture(builder, learn_action());

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.jobs[0].steps[0].status, StepStatus::InvalidUses);
    assert!(report.failures()[0].message.contains("test/missing"));
}

#[tokio::test]
async fn test_undeclared_input_is_invalid_parameter() {
    let builder = TestWorkflowBuilder::new("bad-input")
        .axis("dataset", &["asia"])
        .step(
            TestStep::action("learn", "test/learn")
                .with("data", "{{dataset}}")
                .with("alpha", "0.05"),
        );
    let fixture = fixture(builder, learn_action());

    let report = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();

    assert_eq!(report.jobs[0].steps[0].status, StepStatus::InvalidParameter);
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_guard_skips_step() {
    let builder = TestWorkflowBuilder::new("guarded")
        .axis("algorithm", &["pc", "ges"])
        .step(
            TestStep::action("learn", "test/learn")
                .with("data", "{{algorithm}}")
                .when("{{algorithm}} == pc"),
        );
    let fixture = fixture(builder, learn_action());

    let dry = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await
        .unwrap();
    assert_eq!(dry.jobs[0].steps[0].status, StepStatus::WouldExecute);
    assert_eq!(dry.jobs[1].steps[0].status, StepStatus::WouldSkip);

    let run = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::Run)
        .await
        .unwrap();
    assert!(run.is_success());
    assert_eq!(run.jobs[0].steps[0].status, StepStatus::Executed);
    assert_eq!(run.jobs[1].steps[0].status, StepStatus::Skipped);
    assert_eq!(run.jobs[1].status, JobStatus::Skipped);
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undeclared_output_fails_preflight() {
    let builder = structure_learning_workflow()
        .step(TestStep::action("report", "test/evaluate").with("graph", "{{learn.adjacency}}"));
    let fixture = fixture(builder, learn_action());

    let result = fixture
        .executor
        .execute(&fixture.document, ExecutionMode::DryRun)
        .await;

    match result {
        Err(ExecutionError::Preflight(report)) => {
            assert_eq!(report.len(), 1);
            assert!(report.to_string().contains("adjacency"));
        }
        other => panic!("Expected pre-flight failure, got {:?}", other.map(|r| r.run_id)),
    }
    assert_eq!(fixture.executions.load(Ordering::SeqCst), 0);
}
