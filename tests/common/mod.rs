// ABOUTME: Common test utilities and helpers for gridflow integration tests
// ABOUTME: Provides a workflow YAML builder, temp environments and an in-memory recording action

#![allow(dead_code)]

use async_trait::async_trait;
use gridflow::actions::{
    Action, ActionDescriptor, ActionError, ActionInput, ActionInputs, ActionOutputs,
    ActionRegistry, InputKind,
};
use gridflow::engine::ExecutionMode;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::RwLock;

pub struct TestWorkflowBuilder {
    id: String,
    description: String,
    data_root: Option<String>,
    output_root: Option<String>,
    axes: Vec<(String, Vec<String>)>,
    include: Vec<Vec<(String, String)>>,
    exclude: Vec<Vec<(String, String)>>,
    steps: Vec<TestStep>,
}

#[derive(Clone)]
pub struct TestStep {
    name: String,
    uses: Option<String>,
    run: Option<String>,
    condition: Option<String>,
    timeout: Option<String>,
    inputs: Vec<(String, String)>,
}

impl TestStep {
    pub fn action(name: &str, uses: &str) -> Self {
        Self {
            name: name.to_string(),
            uses: Some(uses.to_string()),
            run: None,
            condition: None,
            timeout: None,
            inputs: Vec::new(),
        }
    }

    pub fn shell(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            uses: None,
            run: Some(command.to_string()),
            condition: None,
            timeout: None,
            inputs: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.inputs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn when(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.timeout = Some(timeout.to_string());
        self
    }
}

impl TestWorkflowBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: "Test workflow".to_string(),
            data_root: None,
            output_root: None,
            axes: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn data_root(mut self, data_root: &str) -> Self {
        self.data_root = Some(data_root.to_string());
        self
    }

    pub fn output_root(mut self, output_root: &str) -> Self {
        self.output_root = Some(output_root.to_string());
        self
    }

    pub fn axis(mut self, name: &str, values: &[&str]) -> Self {
        self.axes.push((
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn include(mut self, rule: &[(&str, &str)]) -> Self {
        self.include.push(to_pairs(rule));
        self
    }

    pub fn exclude(mut self, rule: &[(&str, &str)]) -> Self {
        self.exclude.push(to_pairs(rule));
        self
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, self.generate_yaml()).await?;
        Ok(())
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = format!(
            "id: {}\ndescription: \"{}\"\n",
            self.id, self.description
        );
        if let Some(ref data_root) = self.data_root {
            yaml.push_str(&format!("data_root: \"{}\"\n", data_root));
        }
        if let Some(ref output_root) = self.output_root {
            yaml.push_str(&format!("output_root: \"{}\"\n", output_root));
        }

        if !self.axes.is_empty() {
            yaml.push_str("\nmatrix:\n");
            for (name, values) in &self.axes {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                yaml.push_str(&format!("  {}: [{}]\n", name, quoted.join(", ")));
            }
        }

        write_rules(&mut yaml, "include", &self.include);
        write_rules(&mut yaml, "exclude", &self.exclude);

        yaml.push_str("\nsteps:\n");
        for step in &self.steps {
            yaml.push_str(&format!("  - name: {}\n", step.name));
            if let Some(ref uses) = step.uses {
                yaml.push_str(&format!("    uses: {}\n", uses));
            }
            if let Some(ref run) = step.run {
                yaml.push_str(&format!("    run: \"{}\"\n", run));
            }
            if let Some(ref condition) = step.condition {
                yaml.push_str(&format!("    if: \"{}\"\n", condition));
            }
            if let Some(ref timeout) = step.timeout {
                yaml.push_str(&format!("    timeout: {}\n", timeout));
            }
            if !step.inputs.is_empty() {
                yaml.push_str("    with:\n");
                for (key, value) in &step.inputs {
                    yaml.push_str(&format!("      {}: \"{}\"\n", key, value));
                }
            }
        }

        yaml
    }
}

fn to_pairs(rule: &[(&str, &str)]) -> Vec<(String, String)> {
    rule.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn write_rules(yaml: &mut String, key: &str, rules: &[Vec<(String, String)>]) {
    if rules.is_empty() {
        return;
    }
    yaml.push_str(&format!("\n{}:\n", key));
    for rule in rules {
        for (i, (axis, value)) in rule.iter().enumerate() {
            let prefix = if i == 0 { "  - " } else { "    " };
            yaml.push_str(&format!("{}{}: \"{}\"\n", prefix, axis, value));
        }
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workflow_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yaml", name))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_report.json", name))
    }

    pub async fn create_workflow_file(&self, name: &str, builder: &TestWorkflowBuilder) -> PathBuf {
        let workflow_file = self.workflow_file(name);
        builder
            .write_to_file(&workflow_file)
            .await
            .expect("Failed to write workflow file");
        workflow_file
    }

    pub async fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content)
            .await
            .expect("Failed to write test file");
        path
    }
}

/// Outputs recorded per action, keyed by the serialized inputs that produced them.
pub type OutputStore = Arc<RwLock<HashMap<String, ActionOutputs>>>;

/// Deterministic in-memory action.
///
/// Every declared output is `"<output>:<input>=<value>,..."`, so equal inputs
/// always produce equal outputs. Run mode records outputs in a shared store
/// that `existing_outputs` reads back.
pub struct RecordingAction {
    descriptor: ActionDescriptor,
    store: OutputStore,
    executions: Arc<AtomicUsize>,
    fail_when: Option<(String, String)>,
}

impl RecordingAction {
    pub fn new(name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        let mut descriptor = ActionDescriptor::new(name, "1.0.0")
            .with_description(format!("Recording test action {}", name));
        for input in inputs {
            descriptor = descriptor.with_input(ActionInput::new(*input).with_kind(InputKind::Any));
        }
        for output in outputs {
            descriptor = descriptor.with_output(*output);
        }
        Self {
            descriptor,
            store: Arc::new(RwLock::new(HashMap::new())),
            executions: Arc::new(AtomicUsize::new(0)),
            fail_when: None,
        }
    }

    /// Fail any invocation whose `input` resolves to `value`.
    pub fn failing_when(mut self, input: &str, value: &str) -> Self {
        self.fail_when = Some((input.to_string(), value.to_string()));
        self
    }

    pub fn store(&self) -> OutputStore {
        Arc::clone(&self.store)
    }

    pub fn executions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.executions)
    }

    fn key(inputs: &ActionInputs) -> String {
        serde_json::to_string(inputs).unwrap_or_default()
    }

    fn compute(&self, inputs: &ActionInputs) -> ActionOutputs {
        let signature: Vec<String> = inputs
            .iter()
            .map(|(name, value)| format!("{}={}", name, render(value)))
            .collect();
        self.descriptor
            .outputs
            .iter()
            .map(|output| {
                (
                    output.clone(),
                    Value::String(format!("{}:{}", output, signature.join(","))),
                )
            })
            .collect()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        inputs: &ActionInputs,
        mode: ExecutionMode,
    ) -> Result<ActionOutputs, ActionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some((ref input, ref value)) = self.fail_when {
            if inputs.get(input).map(render).as_deref() == Some(value.as_str()) {
                return Err(ActionError::execution(
                    &self.descriptor.name,
                    format!("refusing {}={}", input, value),
                ));
            }
        }

        let outputs = self.compute(inputs);
        if mode == ExecutionMode::Run {
            self.store
                .write()
                .await
                .insert(Self::key(inputs), outputs.clone());
        }
        Ok(outputs)
    }

    async fn existing_outputs(
        &self,
        inputs: &ActionInputs,
    ) -> Result<Option<ActionOutputs>, ActionError> {
        Ok(self.store.read().await.get(&Self::key(inputs)).cloned())
    }
}

/// Overwrite one recorded output of every record whose key contains `needle`.
pub async fn tamper_recorded_output(store: &OutputStore, needle: &str, output: &str, value: &str) -> usize {
    let mut records = store.write().await;
    let mut changed = 0;
    for (key, outputs) in records.iter_mut() {
        if key.contains(needle) {
            outputs.insert(output.to_string(), Value::String(value.to_string()));
            changed += 1;
        }
    }
    changed
}

/// Registry with the built-in actions plus the given test actions.
pub fn registry_with(actions: Vec<Arc<dyn Action>>) -> ActionRegistry {
    let mut registry = ActionRegistry::with_builtins();
    for action in actions {
        registry
            .register(action)
            .expect("Failed to register test action");
    }
    registry
}
