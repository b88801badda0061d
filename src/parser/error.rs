// ABOUTME: Error types for workflow parsing and validation
// ABOUTME: Schema and template problems carry the full list of diagnostics found in one pass

use thiserror::Error;

use super::schema::ValidationReport;
use crate::template::TemplateReport;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read workflow file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported workflow file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Workflow failed schema validation:\n{0}")]
    SchemaError(ValidationReport),

    #[error("Workflow has invalid template references:\n{0}")]
    TemplateError(TemplateReport),
}

pub type Result<T> = std::result::Result<T, ParserError>;
