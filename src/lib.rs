// ABOUTME: Main library module for the gridflow matrix workflow engine
// ABOUTME: Exports all core modules and provides the public API

pub mod actions;
pub mod cli;
pub mod engine;
pub mod matrix;
pub mod parser;
pub mod template;

// Re-export commonly used types
pub use actions::{Action, ActionDescriptor, ActionInput, ActionRegistry, InputKind};
pub use cli::{App, Args, Config};
pub use engine::{ExecutionMode, RunReport, StepStatus, WorkflowExecutor};
pub use matrix::{Job, MatrixExpander};
pub use parser::{SchemaValidator, WorkflowDocument, WorkflowParser};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
