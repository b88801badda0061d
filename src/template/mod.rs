// ABOUTME: Template module for {{variable}} and {{step.output}} references in workflow parameters
// ABOUTME: Provides extraction, pre-flight validation, guard evaluation and per-job resolution

pub mod condition;
pub mod error;
pub mod resolver;
pub mod validation;

use indexmap::IndexMap;
use serde_json::Value;

pub use condition::evaluate as evaluate_condition;
pub use error::{Result, TemplateDiagnostic, TemplateError, TemplateReport};
pub use resolver::{
    extract, extract_value, has_templates, is_identifier, resolve, resolve_value, stringify,
    Reference,
};
pub use validation::{available_names, validate_workflow};

/// Name to value bindings visible to templates while a job runs.
pub type Variables = IndexMap<String, Value>;
