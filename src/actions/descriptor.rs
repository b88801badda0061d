// ABOUTME: Declarative description of an action's name, version, inputs and outputs
// ABOUTME: Provides the default input check that fills defaults and coerces templated scalars

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::{ActionError, Result};
use super::ActionInputs;

/// Expected kind of an input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Any,
    String,
    Integer,
    Number,
    Boolean,
    List,
    Mapping,
}

impl InputKind {
    /// Convert `value` to this kind, or `None` if it cannot be.
    ///
    /// Resolved templates are always strings, so numeric and boolean kinds
    /// also accept strings that parse as such.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (InputKind::Any, v) => Some(v.clone()),
            (InputKind::String, Value::String(_)) => Some(value.clone()),
            (InputKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (InputKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (InputKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Some(value.clone())
            }
            (InputKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (InputKind::Number, Value::Number(_)) => Some(value.clone()),
            (InputKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (InputKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (InputKind::Boolean, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (InputKind::List, Value::Array(_)) => Some(value.clone()),
            (InputKind::Mapping, Value::Object(_)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Any => "any",
            InputKind::String => "string",
            InputKind::Integer => "integer",
            InputKind::Number => "number",
            InputKind::Boolean => "boolean",
            InputKind::List => "list",
            InputKind::Mapping => "mapping",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub kind: InputKind,
}

impl ActionInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            default: None,
            kind: InputKind::Any,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Everything the engine knows about an action before invoking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<ActionInput>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, input: ActionInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn declares_output(&self, output: &str) -> bool {
        self.outputs.iter().any(|o| o == output)
    }

    pub fn input(&self, name: &str) -> Option<&ActionInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// One-line summary used in listings.
    pub fn summary(&self) -> String {
        if self.description.is_empty() {
            self.to_string()
        } else {
            format!("{} - {}", self, self.description)
        }
    }

    /// Check `inputs` against the declared input specs.
    ///
    /// Returns the inputs with defaults filled in and values coerced to
    /// their declared kind. Every problem is reported at once.
    pub fn check_inputs(&self, inputs: &ActionInputs) -> Result<ActionInputs> {
        let mut checked = ActionInputs::new();
        let mut problems = Vec::new();

        for spec in &self.inputs {
            match inputs.get(&spec.name) {
                Some(value) => match spec.kind.coerce(value) {
                    Some(coerced) => {
                        checked.insert(spec.name.clone(), coerced);
                    }
                    None => problems.push(format!(
                        "input '{}' expects {}, got {}",
                        spec.name, spec.kind, value
                    )),
                },
                None => {
                    if let Some(ref default) = spec.default {
                        checked.insert(spec.name.clone(), default.clone());
                    } else if spec.required {
                        problems.push(format!("missing required input '{}'", spec.name));
                    }
                }
            }
        }

        for name in inputs.keys() {
            if self.input(name).is_none() {
                problems.push(format!("unexpected input '{}'", name));
            }
        }

        if problems.is_empty() {
            Ok(checked)
        } else {
            Err(ActionError::Validation {
                action: self.name.clone(),
                problems,
            })
        }
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
