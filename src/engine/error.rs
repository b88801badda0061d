// ABOUTME: Error types for workflow execution engine operations
// ABOUTME: Wraps lower-level module errors and adds run-level and step-level failures

use std::time::Duration;
use thiserror::Error;

use crate::template::TemplateReport;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Parser error: {0}")]
    ParserError(#[from] crate::parser::ParserError),

    #[error("Matrix configuration error: {0}")]
    MatrixError(#[from] crate::matrix::MatrixError),

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Action registry error: {0}")]
    RegistryError(#[from] crate::actions::RegistryError),

    #[error("Action error: {0}")]
    ActionError(#[from] crate::actions::ActionError),

    #[error("Workflow pre-flight check failed:\n{0}")]
    Preflight(TemplateReport),

    #[error("Step '{step}' timed out after {timeout:?}")]
    Timeout { step: String, timeout: Duration },

    #[error("Step '{step}' outputs differ from recorded outputs: {}", .differences.join("; "))]
    CompareMismatch {
        step: String,
        differences: Vec<String>,
    },

    #[error("Action '{action}' did not produce declared output '{output}'")]
    MissingOutput { action: String, output: String },
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
