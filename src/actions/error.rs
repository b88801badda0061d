// ABOUTME: Error types for action lookup, input validation and execution
// ABOUTME: Registry errors are kept apart from errors raised by an action itself

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Invalid inputs for action '{action}': {}", .problems.join("; "))]
    Validation {
        action: String,
        problems: Vec<String>,
    },

    #[error("Action '{action}' failed: {message}")]
    Execution { action: String, message: String },

    #[error("Action '{action}' I/O error: {message}")]
    IoError { action: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Action not found: '{reference}'")]
    NotFound { reference: String },

    #[error("Action '{name}' is already registered as {existing}, cannot register {incoming}")]
    Conflict {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("Invalid action reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Action discovery failed: {}", join_errors(.0))]
    Discovery(Vec<RegistryError>),
}

impl ActionError {
    pub fn execution(action: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::Execution {
            action: action.into(),
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[RegistryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ActionError>;
