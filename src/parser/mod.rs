// ABOUTME: Parser module for YAML and JSON workflow definitions
// ABOUTME: Exports schema validation, the typed workflow document and the file parser

pub mod error;
pub mod schema;
pub mod workflow;

pub use error::{ParserError, Result};
pub use schema::{SchemaValidator, SchemaViolation, ValidationReport};
pub use workflow::{Step, WorkflowDocument, WorkflowParser, ROOT_PROPERTIES};
