// ABOUTME: Step, job and run result types with the step state machine
// ABOUTME: Aggregates per-job outcomes into a run report with structured failure diagnostics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::context::ExecutionContext;
use super::mode::ExecutionMode;
use crate::actions::{ActionInputs, ActionOutputs};
use crate::matrix::Job;

/// Outcome of one step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Dry-run: the action would be invoked.
    WouldExecute,
    /// Dry-run: outputs already exist, the action would be skipped.
    WouldSkip,
    Executed,
    Skipped,
    Identical,
    Different,
    InvalidUses,
    InvalidParameter,
    Failed,
    TimedOut,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StepStatus::WouldExecute
                | StepStatus::WouldSkip
                | StepStatus::Executed
                | StepStatus::Skipped
                | StepStatus::Identical
        )
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// True when the action was actually invoked.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            StepStatus::Executed | StepStatus::Identical | StepStatus::Different
        )
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, StepStatus::WouldExecute | StepStatus::WouldSkip)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepStatus::WouldExecute => "would execute",
            StepStatus::WouldSkip => "would skip",
            StepStatus::Executed => "executed",
            StepStatus::Skipped => "skipped",
            StepStatus::Identical => "identical",
            StepStatus::Different => "different",
            StepStatus::InvalidUses => "invalid uses",
            StepStatus::InvalidParameter => "invalid parameter",
            StepStatus::Failed => "failed",
            StepStatus::TimedOut => "timed out",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OutputsExist,
    ConditionFalse,
}

/// Lifecycle state of a step within its Job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Validating,
    Skipped,
    Running,
    Comparing,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Pending, Skipped)
                | (Pending, Running)
                | (Pending, Comparing)
                | (Pending, Failed)
                | (Validating, Succeeded)
                | (Validating, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Comparing, Succeeded)
                | (Comparing, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Skipped | StepState::Succeeded | StepState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub action: String,
    pub status: StepStatus,
    pub skip_reason: Option<SkipReason>,
    pub states: Vec<StepState>,
    pub inputs: ActionInputs,
    pub outputs: ActionOutputs,
    pub diagnostic: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration: Option<Duration>,
}

impl StepResult {
    pub fn new(step: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            action: action.into(),
            status: StepStatus::Failed,
            skip_reason: None,
            states: vec![StepState::Pending],
            inputs: ActionInputs::new(),
            outputs: ActionOutputs::new(),
            diagnostic: None,
            started_at: Utc::now(),
            duration: None,
        }
    }

    pub fn state(&self) -> StepState {
        self.states.last().copied().unwrap_or(StepState::Pending)
    }

    /// Move to `next`, ignoring transitions the state machine does not allow.
    pub fn transition(&mut self, next: StepState) -> bool {
        if self.state().can_transition_to(next) {
            self.states.push(next);
            true
        } else {
            false
        }
    }

    pub fn succeed(mut self, status: StepStatus) -> Self {
        self.transition(StepState::Succeeded);
        self.finish(status, None)
    }

    pub fn skip(mut self, status: StepStatus, reason: SkipReason) -> Self {
        self.transition(StepState::Skipped);
        self.skip_reason = Some(reason);
        self.finish(status, None)
    }

    pub fn fail(mut self, status: StepStatus, diagnostic: impl Into<String>) -> Self {
        self.transition(StepState::Failed);
        self.finish(status, Some(diagnostic.into()))
    }

    fn finish(mut self, status: StepStatus, diagnostic: Option<String>) -> Self {
        self.status = status;
        self.diagnostic = diagnostic;
        self.duration = Some(
            (Utc::now() - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Skipped,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Skipped => "skipped",
            JobStatus::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// First failing step of a Job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobFailure {
    pub step: Option<String>,
    pub inputs: ActionInputs,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job: Job,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
    pub context: ExecutionContext,
    pub failure: Option<JobFailure>,
}

impl JobResult {
    /// Derive the Job status from its step results.
    pub fn from_steps(job: Job, steps: Vec<StepResult>, context: ExecutionContext) -> Self {
        let failure = steps
            .iter()
            .find(|step| step.status.is_error())
            .map(|step| JobFailure {
                step: Some(step.step.clone()),
                inputs: step.inputs.clone(),
                message: step
                    .diagnostic
                    .clone()
                    .unwrap_or_else(|| step.status.to_string()),
            });

        let status = if failure.is_some() {
            JobStatus::Failed
        } else if !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Skipped) {
            JobStatus::Skipped
        } else {
            JobStatus::Succeeded
        };

        Self {
            job,
            status,
            steps,
            context,
            failure,
        }
    }

    /// A Job that failed before any step ran.
    pub fn failed_before_steps(job: Job, context: ExecutionContext, message: String) -> Self {
        Self {
            job,
            status: JobStatus::Failed,
            steps: Vec::new(),
            context,
            failure: Some(JobFailure {
                step: None,
                inputs: ActionInputs::new(),
                message,
            }),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status != JobStatus::Failed
    }

    pub fn executions(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_execution()).count()
    }
}

/// Structured description of one failed Job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDiagnostic {
    pub job: String,
    pub ordinal: usize,
    pub step: Option<String>,
    pub inputs: ActionInputs,
    pub message: String,
}

impl fmt::Display for FailureDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(
                f,
                "job #{} [{}] step '{}': {}",
                self.ordinal, self.job, step, self.message
            ),
            None => write!(f, "job #{} [{}]: {}", self.ordinal, self.job, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub total_jobs: usize,
    pub succeeded_jobs: usize,
    pub skipped_jobs: usize,
    pub failed_jobs: usize,
    pub executed_steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub workflow_id: String,
    pub run_id: String,
    pub mode: ExecutionMode,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub jobs: Vec<JobResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(workflow_id: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            jobs: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn add_job(&mut self, job: JobResult) {
        self.jobs.push(job);
        self.update_summary();
    }

    pub fn mark_completed(&mut self) {
        let end_time = Utc::now();
        self.end_time = Some(end_time);
        self.duration = Some(
            (end_time - self.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.update_summary();
    }

    fn update_summary(&mut self) {
        let count = |status: JobStatus| self.jobs.iter().filter(|j| j.status == status).count();
        self.summary = RunSummary {
            total_jobs: self.jobs.len(),
            succeeded_jobs: count(JobStatus::Succeeded),
            skipped_jobs: count(JobStatus::Skipped),
            failed_jobs: count(JobStatus::Failed),
            executed_steps: self.jobs.iter().map(JobResult::executions).sum(),
        };
    }

    /// Success iff every Job succeeded or was skipped.
    pub fn is_success(&self) -> bool {
        self.jobs.iter().all(JobResult::is_successful)
    }

    pub fn failures(&self) -> Vec<FailureDiagnostic> {
        self.jobs
            .iter()
            .filter_map(|job| {
                job.failure.as_ref().map(|failure| FailureDiagnostic {
                    job: job.job.label(),
                    ordinal: job.job.ordinal,
                    step: failure.step.clone(),
                    inputs: failure.inputs.clone(),
                    message: failure.message.clone(),
                })
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
