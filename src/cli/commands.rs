// ABOUTME: Command implementations for the gridflow CLI
// ABOUTME: Handles execution of run, validate, actions and init commands

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::actions::ActionRegistry;
use crate::engine::{ExecutionMode, RunReport, WorkflowExecutor};
use crate::parser::WorkflowParser;

/// Settings for one `run` invocation after config and flags are merged
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    pub output: Option<PathBuf>,
    pub max_concurrent_jobs: usize,
    pub step_timeout: Duration,
}

/// Execute a workflow command
pub async fn run_workflow(
    workflow_path: PathBuf,
    options: RunOptions,
    registry: Arc<ActionRegistry>,
) -> Result<()> {
    info!(
        "Starting workflow execution: {} ({} mode)",
        workflow_path.display(),
        options.mode
    );

    let workflow = WorkflowParser::new()
        .parse_file(&workflow_path)
        .await
        .map_err(|e| anyhow!("Failed to parse workflow: {}", e))?;
    info!("Loaded workflow: {}", workflow.id);

    let executor = WorkflowExecutor::new(registry)
        .with_max_concurrent_jobs(options.max_concurrent_jobs)
        .with_default_timeout(options.step_timeout);

    let report = executor
        .execute(&workflow, options.mode)
        .await
        .map_err(|e| anyhow!("Workflow execution failed: {}", e))?;

    if let Some(ref output_path) = options.output {
        let json_content = report
            .to_json()
            .context("Failed to serialize run report to JSON")?;
        std::fs::write(output_path, json_content).with_context(|| {
            format!("Failed to write output file '{}'", output_path.display())
        })?;
        info!("Run report written to: {}", output_path.display());
    }

    print_report(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} jobs failed",
            report.summary.failed_jobs,
            report.summary.total_jobs
        ))
    }
}

fn print_report(report: &RunReport) {
    println!(
        "Workflow '{}' ({} mode): {} jobs - {} succeeded, {} skipped, {} failed",
        report.workflow_id,
        report.mode,
        report.summary.total_jobs,
        report.summary.succeeded_jobs,
        report.summary.skipped_jobs,
        report.summary.failed_jobs
    );

    for job in &report.jobs {
        println!("  {}: {}", job.job, job.status);
        for step in &job.steps {
            println!("    {}: {}", step.step, step.status);
        }
    }

    let failures = report.failures();
    if !failures.is_empty() {
        println!("Failures:");
        for failure in failures {
            println!("  - {}", failure);
            for (name, value) in &failure.inputs {
                println!("      {} = {}", name, crate::template::stringify(value));
            }
        }
    }
}

/// Validate a workflow file
pub async fn validate_workflow(workflow_path: PathBuf, registry: Arc<ActionRegistry>) -> Result<()> {
    info!("Validating workflow: {}", workflow_path.display());

    let workflow = WorkflowParser::new()
        .parse_file(&workflow_path)
        .await
        .map_err(|e| anyhow!("Workflow validation failed: {}", e))?;

    let unknown: Vec<String> = workflow
        .steps
        .iter()
        .filter(|step| !registry.contains(step.action_reference()))
        .map(|step| format!("step '{}' uses unknown action '{}'", step.name, step.action_reference()))
        .collect();
    if !unknown.is_empty() {
        return Err(anyhow!("Workflow validation failed: {}", unknown.join("; ")));
    }

    let executor = WorkflowExecutor::new(registry);
    let jobs = executor
        .prepare(&workflow)
        .map_err(|e| anyhow!("Workflow validation failed: {}", e))?;

    println!("✓ Workflow '{}' is valid", workflow.id);
    println!("  Axes: {}", workflow.matrix.len());
    println!("  Jobs: {}", jobs.len());
    println!("  Steps: {}", workflow.steps.len());

    info!("Workflow validation completed successfully");
    Ok(())
}

/// List registered actions grouped by package
pub fn list_actions(registry: &ActionRegistry) -> Result<()> {
    for (package, descriptors) in registry.actions_by_package() {
        println!("{}:", package);
        for descriptor in descriptors {
            println!("  {}", descriptor.summary());
            for input in &descriptor.inputs {
                let requirement = if input.required { "required" } else { "optional" };
                println!("      {} ({}, {})", input.name, input.kind, requirement);
            }
            if !descriptor.outputs.is_empty() {
                println!("      outputs: {}", descriptor.outputs.join(", "));
            }
        }
    }
    Ok(())
}

/// Initialize a new workflow file
pub async fn init_workflow(name: String, output_dir: PathBuf) -> Result<()> {
    info!(
        "Initializing workflow '{}' in {}",
        name,
        output_dir.display()
    );

    if name.trim().is_empty() {
        return Err(anyhow!("Workflow name cannot be empty"));
    }

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
    }

    let workflow_file = output_dir.join(format!("{}.yaml", name));
    if workflow_file.exists() {
        return Err(anyhow!(
            "Workflow file already exists: {}",
            workflow_file.display()
        ));
    }

    std::fs::write(&workflow_file, generate_workflow_template(&name))?;
    println!("Created workflow file: {}", workflow_file.display());
    info!("Created workflow file: {}", workflow_file.display());

    Ok(())
}

/// Generate a starter matrix workflow
fn generate_workflow_template(name: &str) -> String {
    format!(
        r#"id: {}
description: Matrix workflow generated by gridflow init
output_root: "results/{{{{id}}}}/{{{{dataset}}}}-{{{{method}}}}"

matrix:
  dataset: [small, large]
  method: [fast, thorough]

exclude:
  - dataset: large
    method: thorough

steps:
  - name: prepare
    run: "mkdir -p {{{{output_root}}}}"
    with:
      creates: "{{{{output_root}}}}"

  - name: analyse
    description: Replace with a registered action via `uses:`
    run: "echo {{{{dataset}}}} {{{{method}}}} > {{{{output_root}}}}/result.txt"
    with:
      creates: "{{{{output_root}}}}/result.txt"
"#,
        name
    )
}
