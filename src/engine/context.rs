// ABOUTME: Per-job execution context holding the variables templates resolve against
// ABOUTME: Seeded from workflow properties and the Job's axes, then extended with step outputs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::ActionOutputs;
use crate::matrix::Job;
use crate::parser::WorkflowDocument;
use crate::template::{self, Variables};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    variables: Variables,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the starting context for `job`.
    ///
    /// Root path templates are resolved against the Job's axes, `id` and
    /// `description` before any step runs.
    pub fn for_job(document: &WorkflowDocument, job: &Job) -> template::Result<Self> {
        let mut context = Self::new();
        context.set("id", Value::String(document.id.clone()));
        context.set("description", Value::String(document.description.clone()));
        for (axis, value) in &job.assignment {
            context.set(axis.clone(), value.clone());
        }

        let mut roots = Vec::new();
        for (name, root) in document.root_templates() {
            roots.push((name, context.resolve(root)?));
        }
        for (name, resolved) in roots {
            context.set(name, Value::String(resolved));
        }

        Ok(context)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Publish `outputs` of `step` as `step.output` variables.
    pub fn record_outputs(&mut self, step: &str, outputs: &ActionOutputs) {
        for (output, value) in outputs {
            self.set(format!("{}.{}", step, output), value.clone());
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn resolve(&self, text: &str) -> template::Result<String> {
        template::resolve(text, &self.variables)
    }

    pub fn resolve_value(&self, value: &Value) -> template::Result<Value> {
        template::resolve_value(value, &self.variables)
    }

    pub fn evaluate_condition(&self, condition: &str) -> template::Result<bool> {
        template::evaluate_condition(condition, &self.variables)
    }
}
