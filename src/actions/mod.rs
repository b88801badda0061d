// ABOUTME: Action contract, descriptors and registry for pluggable step execution
// ABOUTME: Actions are looked up by reference and invoked with resolved inputs and an execution mode

pub mod descriptor;
pub mod error;
pub mod registry;
pub mod shell;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::engine::ExecutionMode;

pub use descriptor::{ActionDescriptor, ActionInput, InputKind};
pub use error::{ActionError, RegistryError, Result};
pub use registry::{ActionReference, ActionRegistry, CORE_PACKAGE};
pub use shell::ShellAction;

/// Registry name of the built-in action that runs `run:` steps.
pub const SHELL_ACTION: &str = "shell";

pub type ActionInputs = IndexMap<String, Value>;
pub type ActionOutputs = IndexMap<String, Value>;

#[async_trait]
pub trait Action: Send + Sync {
    fn descriptor(&self) -> &ActionDescriptor;

    /// Check resolved inputs before anything runs.
    ///
    /// Returns the inputs the action should be invoked with.
    fn validate_inputs(&self, inputs: &ActionInputs) -> Result<ActionInputs> {
        self.descriptor().check_inputs(inputs)
    }

    async fn execute(&self, inputs: &ActionInputs, mode: ExecutionMode) -> Result<ActionOutputs>;

    /// Read-only lookup of outputs a previous invocation already produced.
    ///
    /// `Some` means the work for these inputs is done and the returned
    /// outputs can be reused.
    async fn existing_outputs(&self, inputs: &ActionInputs) -> Result<Option<ActionOutputs>>;
}
