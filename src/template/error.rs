// ABOUTME: Error types for template extraction, validation and resolution
// ABOUTME: Distinguishes malformed references from variables missing at resolution time

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Malformed template reference in '{text}' at offset {position}: {reason}")]
    Malformed {
        text: String,
        position: usize,
        reason: String,
    },

    #[error("Unresolved template variable '{name}' in '{text}'")]
    MissingVariable { name: String, text: String },

    #[error("Invalid condition '{condition}': {reason}")]
    InvalidCondition { condition: String, reason: String },
}

/// A single problem found while validating the templates of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDiagnostic {
    pub location: String,
    pub message: String,
}

/// Every template problem found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateReport {
    pub diagnostics: Vec<TemplateDiagnostic>,
}

impl TemplateDiagnostic {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TemplateDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl TemplateReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(TemplateDiagnostic::new(location, message));
    }

    pub fn extend(&mut self, other: TemplateReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

impl fmt::Display for TemplateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.diagnostics.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", diagnostic)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
