// ABOUTME: Built-in shell action backing raw `run:` steps
// ABOUTME: Runs the command through a shell and treats an optional `creates` path as its existing-output marker

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::descriptor::{ActionDescriptor, ActionInput, InputKind};
use super::error::{ActionError, Result};
use super::{Action, ActionInputs, ActionOutputs, SHELL_ACTION};
use crate::engine::ExecutionMode;

const DEFAULT_SHELL: &str = "/bin/sh";

/// Runs `command` with `shell -c`.
///
/// The action declares no outputs. When `creates` names a path that already
/// exists, the step counts as done and is skipped in run mode.
pub struct ShellAction {
    descriptor: ActionDescriptor,
}

impl ShellAction {
    pub fn new() -> Self {
        let descriptor = ActionDescriptor::new(SHELL_ACTION, env!("CARGO_PKG_VERSION"))
            .with_description("Run a shell command")
            .with_input(
                ActionInput::new("command")
                    .required()
                    .with_kind(InputKind::String)
                    .with_description("Command line passed to the shell"),
            )
            .with_input(
                ActionInput::new("shell")
                    .with_kind(InputKind::String)
                    .with_default(Value::String(DEFAULT_SHELL.to_string()))
                    .with_description("Shell interpreter"),
            )
            .with_input(
                ActionInput::new("working_dir")
                    .with_kind(InputKind::String)
                    .with_description("Directory to run the command in"),
            )
            .with_input(
                ActionInput::new("env")
                    .with_kind(InputKind::Mapping)
                    .with_description("Extra environment variables"),
            )
            .with_input(
                ActionInput::new("creates")
                    .with_kind(InputKind::String)
                    .with_description("Path whose existence means the command already ran"),
            );
        Self { descriptor }
    }

    fn string_input<'a>(inputs: &'a ActionInputs, name: &str) -> Option<&'a str> {
        inputs.get(name).and_then(Value::as_str)
    }

    fn build_command(&self, inputs: &ActionInputs) -> Result<Command> {
        let command = Self::string_input(inputs, "command").ok_or_else(|| {
            ActionError::execution(SHELL_ACTION, "input 'command' must be a string")
        })?;
        let shell = Self::string_input(inputs, "shell").unwrap_or(DEFAULT_SHELL);

        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(command);

        if let Some(dir) = Self::string_input(inputs, "working_dir") {
            cmd.current_dir(dir);
        }
        if let Some(Value::Object(env)) = inputs.get("env") {
            for (key, value) in env {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                cmd.env(key, value);
            }
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        // A timed-out step drops the pending invocation; the process must die with it.
        cmd.kill_on_drop(true);
        Ok(cmd)
    }
}

impl Default for ShellAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for ShellAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, inputs: &ActionInputs, mode: ExecutionMode) -> Result<ActionOutputs> {
        if mode == ExecutionMode::DryRun {
            debug!("Dry run, not executing shell command");
            return Ok(ActionOutputs::new());
        }

        let mut cmd = self.build_command(inputs)?;
        info!(
            "Executing shell command: {}",
            Self::string_input(inputs, "command").unwrap_or_default()
        );

        let output = cmd.output().await.map_err(|e| ActionError::IoError {
            action: SHELL_ACTION.to_string(),
            message: format!("failed to start shell: {}", e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("stdout: {}", stdout.trim_end());
        }

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ActionError::execution(
                SHELL_ACTION,
                format!("command exited with {}: {}", code, stderr.trim()),
            ));
        }

        Ok(ActionOutputs::new())
    }

    async fn existing_outputs(&self, inputs: &ActionInputs) -> Result<Option<ActionOutputs>> {
        let Some(marker) = Self::string_input(inputs, "creates") else {
            return Ok(None);
        };
        match tokio::fs::metadata(marker).await {
            Ok(_) => {
                debug!("Marker '{}' exists", marker);
                Ok(Some(ActionOutputs::new()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ActionError::IoError {
                action: SHELL_ACTION.to_string(),
                message: format!("cannot check '{}': {}", marker, e),
            }),
        }
    }
}
