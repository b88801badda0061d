// ABOUTME: Integration tests for the CLI application
// ABOUTME: Tests command-line interface functionality and end-to-end workflow execution

use std::path::Path;
use std::process::{Command, Output};

mod common;
use common::{TestEnvironment, TestStep, TestWorkflowBuilder};

fn gridflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gridflow"))
        .args(args)
        .current_dir(dir)
        .env_remove("GRIDFLOW_MODE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn marker_workflow(env: &TestEnvironment) -> TestWorkflowBuilder {
    TestWorkflowBuilder::new("cli_markers")
        .description("CLI marker workflow")
        .output_root(&format!("{}/out/{{{{dataset}}}}", env.path().display()))
        .axis("dataset", &["asia", "sachs"])
        .step(
            TestStep::shell("write", "mkdir -p {{output_root}} && echo {{dataset}} > {{output_root}}/done")
                .with("creates", "{{output_root}}/done"),
        )
}

#[test]
fn test_cli_help_command() {
    let env = TestEnvironment::new();
    let output = gridflow(env.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gridflow"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("--help"));
}

#[test]
fn test_cli_version_command() {
    let env = TestEnvironment::new();
    let output = gridflow(env.path(), &["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_cli_validate_workflow() {
    let env = TestEnvironment::new();
    let workflow_file = env
        .create_workflow_file("markers", &marker_workflow(&env))
        .await;

    let output = gridflow(env.path(), &["validate", workflow_file.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Workflow 'cli_markers' is valid"));
    assert!(stdout.contains("Jobs: 2"));
}

#[tokio::test]
async fn test_cli_validate_rejects_unknown_action() {
    let env = TestEnvironment::new();
    let builder = TestWorkflowBuilder::new("unknown_action")
        .axis("dataset", &["asia"])
        .step(TestStep::action("learn", "causal/learn").with("data", "{{dataset}}"));
    let workflow_file = env.create_workflow_file("unknown", &builder).await;

    let output = gridflow(env.path(), &["validate", workflow_file.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown action 'causal/learn'"));
}

#[tokio::test]
async fn test_cli_dry_run_is_default_mode() {
    let env = TestEnvironment::new();
    let workflow_file = env
        .create_workflow_file("markers", &marker_workflow(&env))
        .await;

    let output = gridflow(env.path(), &["run", workflow_file.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry-run mode"));
    assert!(stdout.contains("would execute"));
    assert!(!env.path().join("out").exists());
}

#[tokio::test]
async fn test_cli_run_writes_report() {
    let env = TestEnvironment::new();
    let workflow_file = env
        .create_workflow_file("markers", &marker_workflow(&env))
        .await;
    let report_file = env.output_file("markers");

    let output = gridflow(
        env.path(),
        &[
            "run",
            workflow_file.to_str().unwrap(),
            "--mode",
            "run",
            "--output",
            report_file.to_str().unwrap(),
        ],
    );

    assert!(output.status.success());
    assert!(env.path().join("out/asia/done").exists());
    assert!(env.path().join("out/sachs/done").exists());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_file).unwrap()).unwrap();
    assert_eq!(report["workflow_id"], "cli_markers");
    assert_eq!(report["mode"], "run");
    assert_eq!(report["summary"]["executed_steps"], 2);

    let rerun = gridflow(
        env.path(),
        &["run", workflow_file.to_str().unwrap(), "--mode", "run"],
    );
    assert!(rerun.status.success());
    let stdout = String::from_utf8_lossy(&rerun.stdout);
    assert!(stdout.contains("2 skipped"));
}

#[tokio::test]
async fn test_cli_run_failure_exit_code() {
    let env = TestEnvironment::new();
    let builder = TestWorkflowBuilder::new("failing")
        .axis("dataset", &["asia"])
        .step(TestStep::shell("boom", "exit 3"));
    let workflow_file = env.create_workflow_file("failing", &builder).await;

    let output = gridflow(
        env.path(),
        &["run", workflow_file.to_str().unwrap(), "--mode", "run"],
    );

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Failures:"));
    assert!(stdout.contains("step 'boom'"));
}

#[test]
fn test_cli_invalid_mode() {
    let env = TestEnvironment::new();
    let output = gridflow(env.path(), &["run", "flow.yaml", "--mode", "replay"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_actions_command() {
    let env = TestEnvironment::new();
    let output = gridflow(env.path(), &["actions"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("core:"));
    assert!(stdout.contains("shell@"));
    assert!(stdout.contains("command (string, required)"));
}

#[test]
fn test_cli_init_creates_valid_workflow() {
    let env = TestEnvironment::new();
    let output = gridflow(env.path(), &["init", "starter", "--output-dir", "flows"]);

    assert!(output.status.success());
    let workflow_file = env.path().join("flows/starter.yaml");
    assert!(workflow_file.exists());

    let validate = gridflow(env.path(), &["validate", workflow_file.to_str().unwrap()]);
    assert!(validate.status.success());
    assert!(String::from_utf8_lossy(&validate.stdout).contains("Jobs: 3"));

    let again = gridflow(env.path(), &["init", "starter", "--output-dir", "flows"]);
    assert!(!again.status.success());
}
