// ABOUTME: Workflow executor driving matrix Jobs through their steps
// ABOUTME: Dispatches each step by mode with conservative skipping, timeouts and output comparison

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::context::ExecutionContext;
use super::error::{ExecutionError, Result};
use super::mode::ExecutionMode;
use super::result::{JobResult, RunReport, SkipReason, StepResult, StepState, StepStatus};
use crate::actions::{Action, ActionInputs, ActionOutputs, ActionRegistry};
use crate::matrix::{Job, MatrixExpander};
use crate::parser::{Step, WorkflowDocument};
use crate::template::{self, resolver, Reference, TemplateReport};

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

pub struct WorkflowExecutor {
    registry: Arc<ActionRegistry>,
    default_timeout: Duration,
    max_concurrent_jobs: usize,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            default_timeout: DEFAULT_STEP_TIMEOUT,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }

    /// Set the deadline for steps that declare no `timeout`
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set how many Jobs the local driver runs at once
    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs.max(1);
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Expand the matrix and run every check that must pass before any Job starts.
    pub fn prepare(&self, document: &WorkflowDocument) -> Result<Vec<Job>> {
        let jobs =
            MatrixExpander::new().expand(&document.matrix, &document.include, &document.exclude)?;

        let available = template::available_names(document);
        let mut report = template::validate_workflow(document, &available);
        self.check_declared_outputs(document, &mut report);
        check_job_coverage(document, &jobs, &mut report);

        if !report.is_empty() {
            error!("Pre-flight check failed with {} problems", report.len());
            return Err(ExecutionError::Preflight(report));
        }
        Ok(jobs)
    }

    /// Run every Job of `document`, preserving Job order in the report.
    #[instrument(skip(self, document, mode), fields(workflow_id = %document.id, mode = %mode))]
    pub async fn execute(
        &self,
        document: &WorkflowDocument,
        mode: ExecutionMode,
    ) -> Result<RunReport> {
        let jobs = self.prepare(document)?;
        let mut report = RunReport::new(document.id.clone(), mode);

        info!(
            "Starting workflow '{}' in {} mode: {} jobs, {} steps each (run_id: {})",
            document.id,
            mode,
            jobs.len(),
            document.steps.len(),
            report.run_id
        );

        let results: Vec<JobResult> = stream::iter(
            jobs.into_iter()
                .map(|job| self.run_job(document, job, mode)),
        )
        .buffered(self.max_concurrent_jobs)
        .collect()
        .await;

        for result in results {
            report.add_job(result);
        }
        report.mark_completed();

        info!(
            "Workflow '{}' finished: {} succeeded, {} skipped, {} failed",
            document.id,
            report.summary.succeeded_jobs,
            report.summary.skipped_jobs,
            report.summary.failed_jobs
        );
        Ok(report)
    }

    /// Run the steps of one Job in order, halting at the first failure.
    #[instrument(skip(self, document, job), fields(job = job.ordinal))]
    pub async fn run_job(
        &self,
        document: &WorkflowDocument,
        job: Job,
        mode: ExecutionMode,
    ) -> JobResult {
        let mut context = match ExecutionContext::for_job(document, &job) {
            Ok(context) => context,
            Err(e) => {
                error!("Job {} failed before its first step: {}", job, e);
                return JobResult::failed_before_steps(job, ExecutionContext::new(), e.to_string());
            }
        };

        debug!("Running job {}", job);
        let mut steps = Vec::with_capacity(document.steps.len());
        for step in &document.steps {
            let result = self.run_step(step, &mut context, mode).await;
            let failed = result.status.is_error();
            steps.push(result);
            if failed {
                warn!("Job {} halted at step '{}'", job, step.name);
                break;
            }
        }

        let result = JobResult::from_steps(job, steps, context);
        info!("Job {} {}", result.job, result.status);
        result
    }

    async fn run_step(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
        mode: ExecutionMode,
    ) -> StepResult {
        let reference = step.action_reference();
        let mut result = StepResult::new(&step.name, reference);

        if let Some(ref condition) = step.condition {
            match context.evaluate_condition(condition) {
                Ok(true) => {}
                Ok(false) => {
                    info!("Step '{}' condition not met, skipping", step.name);
                    let status = match mode {
                        ExecutionMode::DryRun => StepStatus::WouldSkip,
                        _ => StepStatus::Skipped,
                    };
                    return result.skip(status, SkipReason::ConditionFalse);
                }
                Err(e) => {
                    return result.fail(StepStatus::InvalidParameter, format!("guard: {}", e));
                }
            }
        }

        let mut raw = step.inputs.clone();
        if let Some(ref command) = step.run {
            raw.insert("command".to_string(), Value::String(command.clone()));
        }
        let resolved = match resolve_inputs(&raw, context) {
            Ok(resolved) => resolved,
            Err(e) => {
                result.inputs = raw;
                return result.fail(StepStatus::InvalidParameter, e.to_string());
            }
        };
        result.inputs = resolved;

        let action = match self.registry.resolve(reference) {
            Ok(action) => action,
            Err(e) => return result.fail(StepStatus::InvalidUses, e.to_string()),
        };

        let inputs = match action.validate_inputs(&result.inputs) {
            Ok(inputs) => inputs,
            Err(e) => return result.fail(StepStatus::InvalidParameter, e.to_string()),
        };
        result.inputs = inputs;

        debug!(
            "Step '{}' using {} with {} inputs",
            step.name,
            action.descriptor(),
            result.inputs.len()
        );

        match mode {
            ExecutionMode::DryRun => self.dry_run_step(step, action.as_ref(), result, context).await,
            ExecutionMode::Run => self.run_action(step, action.as_ref(), result, context).await,
            ExecutionMode::Compare => self.compare_step(step, action.as_ref(), result, context).await,
        }
    }

    async fn dry_run_step(
        &self,
        step: &Step,
        action: &dyn Action,
        mut result: StepResult,
        context: &mut ExecutionContext,
    ) -> StepResult {
        result.transition(StepState::Validating);

        match action.existing_outputs(&result.inputs).await {
            Ok(Some(outputs)) => {
                if let Err(e) = check_outputs(action, &outputs) {
                    return result.fail(StepStatus::Failed, e.to_string());
                }
                context.record_outputs(&step.name, &outputs);
                result.outputs = outputs;
                result.succeed(StepStatus::WouldSkip)
            }
            Ok(None) => {
                for output in &action.descriptor().outputs {
                    let placeholder = Reference::step_output(&step.name, output);
                    context.set(placeholder.key(), Value::String(placeholder.to_string()));
                }
                result.succeed(StepStatus::WouldExecute)
            }
            Err(e) => result.fail(StepStatus::Failed, e.to_string()),
        }
    }

    async fn run_action(
        &self,
        step: &Step,
        action: &dyn Action,
        mut result: StepResult,
        context: &mut ExecutionContext,
    ) -> StepResult {
        match action.existing_outputs(&result.inputs).await {
            Ok(Some(outputs)) => {
                if let Err(e) = check_outputs(action, &outputs) {
                    return result.fail(StepStatus::Failed, e.to_string());
                }
                info!("Step '{}' outputs exist, skipping", step.name);
                context.record_outputs(&step.name, &outputs);
                result.outputs = outputs;
                return result.skip(StepStatus::Skipped, SkipReason::OutputsExist);
            }
            Ok(None) => {}
            Err(e) => return result.fail(StepStatus::Failed, e.to_string()),
        }

        result.transition(StepState::Running);
        info!("Executing step '{}' ({})", step.name, action.descriptor());

        let outputs = match self
            .invoke(step, action, &result.inputs, ExecutionMode::Run)
            .await
            .and_then(|outputs| check_outputs(action, &outputs).map(|_| outputs))
        {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Step '{}' failed: {}", step.name, e);
                return result.fail(failure_status(&e), e.to_string());
            }
        };

        context.record_outputs(&step.name, &outputs);
        result.outputs = outputs;
        result.succeed(StepStatus::Executed)
    }

    async fn compare_step(
        &self,
        step: &Step,
        action: &dyn Action,
        mut result: StepResult,
        context: &mut ExecutionContext,
    ) -> StepResult {
        let recorded = match action.existing_outputs(&result.inputs).await {
            Ok(recorded) => recorded,
            Err(e) => return result.fail(StepStatus::Failed, e.to_string()),
        };

        result.transition(StepState::Comparing);
        info!("Re-executing step '{}' for comparison", step.name);

        let fresh = match self
            .invoke(step, action, &result.inputs, ExecutionMode::Compare)
            .await
            .and_then(|outputs| check_outputs(action, &outputs).map(|_| outputs))
        {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Step '{}' failed: {}", step.name, e);
                return result.fail(failure_status(&e), e.to_string());
            }
        };

        let differences = match recorded {
            Some(ref recorded) => diff_outputs(recorded, &fresh),
            None => vec!["no recorded outputs to compare against".to_string()],
        };

        context.record_outputs(&step.name, &fresh);
        result.outputs = fresh;

        if differences.is_empty() {
            result.succeed(StepStatus::Identical)
        } else {
            let mismatch = ExecutionError::CompareMismatch {
                step: step.name.clone(),
                differences,
            };
            warn!("{}", mismatch);
            result.fail(StepStatus::Different, mismatch.to_string())
        }
    }

    async fn invoke(
        &self,
        step: &Step,
        action: &dyn Action,
        inputs: &ActionInputs,
        mode: ExecutionMode,
    ) -> Result<ActionOutputs> {
        let limit = step.timeout.unwrap_or(self.default_timeout);
        match timeout(limit, action.execute(inputs, mode)).await {
            Ok(outputs) => Ok(outputs?),
            Err(_) => Err(ExecutionError::Timeout {
                step: step.name.clone(),
                timeout: limit,
            }),
        }
    }

    /// Every `{{step.output}}` must name an output the referenced step's action declares.
    fn check_declared_outputs(&self, document: &WorkflowDocument, report: &mut TemplateReport) {
        for (index, step) in document.steps.iter().enumerate() {
            for (location, text) in template::validation::step_templates(index, step) {
                let Ok(references) = resolver::references(&text) else {
                    continue;
                };
                for reference in references {
                    let Some(ref output) = reference.field else {
                        continue;
                    };
                    let Some(target) = document.get_step(&reference.name) else {
                        continue;
                    };
                    let Ok(action) = self.registry.resolve(target.action_reference()) else {
                        continue;
                    };
                    let descriptor = action.descriptor();
                    if !descriptor.declares_output(output) {
                        report.push(
                            location.clone(),
                            format!(
                                "{} is not an output of step '{}' ({} declares: {})",
                                reference,
                                target.name,
                                descriptor,
                                if descriptor.outputs.is_empty() {
                                    "none".to_string()
                                } else {
                                    descriptor.outputs.join(", ")
                                }
                            ),
                        );
                    }
                }
            }
        }
    }
}

/// Axes referenced by templates must be assigned in every Job.
fn check_job_coverage(document: &WorkflowDocument, jobs: &[Job], report: &mut TemplateReport) {
    let mut referenced: BTreeMap<String, String> = BTreeMap::new();
    let mut templates: Vec<(String, String)> = document
        .root_templates()
        .into_iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();
    for (index, step) in document.steps.iter().enumerate() {
        templates.extend(template::validation::step_templates(index, step));
    }

    for (location, text) in templates {
        let Ok(references) = resolver::references(&text) else {
            continue;
        };
        for reference in references {
            if !reference.is_step_output() && document.matrix.contains_key(&reference.name) {
                referenced.entry(reference.name).or_insert_with(|| location.clone());
            }
        }
    }

    for job in jobs {
        for (axis, location) in &referenced {
            if !job.has_axis(axis) {
                report.push(
                    location.clone(),
                    format!(
                        "axis '{}' is referenced but job #{} [{}] does not assign it",
                        axis,
                        job.ordinal,
                        job.label()
                    ),
                );
            }
        }
    }
}

fn resolve_inputs(raw: &ActionInputs, context: &ExecutionContext) -> template::Result<ActionInputs> {
    raw.iter()
        .map(|(name, value)| Ok((name.clone(), context.resolve_value(value)?)))
        .collect()
}

fn check_outputs(action: &dyn Action, outputs: &ActionOutputs) -> Result<()> {
    let descriptor = action.descriptor();
    match descriptor
        .outputs
        .iter()
        .find(|output| !outputs.contains_key(*output))
    {
        Some(output) => Err(ExecutionError::MissingOutput {
            action: descriptor.to_string(),
            output: output.clone(),
        }),
        None => Ok(()),
    }
}

fn failure_status(error: &ExecutionError) -> StepStatus {
    match error {
        ExecutionError::Timeout { .. } => StepStatus::TimedOut,
        _ => StepStatus::Failed,
    }
}

/// Describe every output that differs between a recorded and a fresh run.
fn diff_outputs(recorded: &ActionOutputs, fresh: &ActionOutputs) -> Vec<String> {
    let mut differences = Vec::new();
    for (name, before) in recorded {
        match fresh.get(name) {
            Some(after) if after == before => {}
            Some(after) => differences.push(format!(
                "{}: recorded {}, got {}",
                name,
                resolver::stringify(before),
                resolver::stringify(after)
            )),
            None => differences.push(format!("{}: missing from fresh outputs", name)),
        }
    }
    for name in fresh.keys() {
        if !recorded.contains_key(name) {
            differences.push(format!("{}: not in recorded outputs", name));
        }
    }
    differences
}
