// ABOUTME: Execution engine module for the gridflow workflow engine
// ABOUTME: Handles per-job contexts, mode dispatch, step state tracking and run reports

pub mod context;
pub mod error;
pub mod executor;
pub mod mode;
pub mod result;

pub use context::ExecutionContext;
pub use error::{ExecutionError, Result};
pub use executor::{WorkflowExecutor, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_STEP_TIMEOUT};
pub use mode::ExecutionMode;
pub use result::{
    FailureDiagnostic, JobFailure, JobResult, JobStatus, RunReport, RunSummary, SkipReason,
    StepResult, StepState, StepStatus,
};
