// ABOUTME: Structural schema validation of raw workflow documents
// ABOUTME: Accumulates every shape violation with its path before typed deserialization runs

use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;

use super::workflow::ROOT_PROPERTIES;
use crate::template::is_identifier;

pub const TOP_LEVEL_FIELDS: &[&str] = &[
    "id",
    "description",
    "matrix",
    "include",
    "exclude",
    "steps",
    "data_root",
    "output_root",
];

pub const STEP_FIELDS: &[&str] = &["name", "description", "uses", "run", "with", "if", "timeout"];

const DOCUMENT_PATH: &str = "<document>";

/// One structural problem, located by a dotted/indexed path.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<SchemaViolation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(SchemaViolation {
            path: path.into(),
            message: message.into(),
        });
    }

    /// True when some violation is reported at exactly `path`.
    pub fn has_violation_at(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", violation)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the shape of a raw document without rejecting at the first problem.
    pub fn validate(&self, document: &Value) -> ValidationReport {
        let mut report = ValidationReport::new();

        let Some(root) = document.as_mapping() else {
            report.push(
                DOCUMENT_PATH,
                format!("workflow must be a mapping, found {}", kind_of(document)),
            );
            return report;
        };

        for key in root.keys() {
            match key.as_str() {
                Some(name) if TOP_LEVEL_FIELDS.contains(&name) => {}
                Some(name) => report.push(name, format!("unknown top-level field '{}'", name)),
                None => report.push(
                    DOCUMENT_PATH,
                    format!("field names must be strings, found {}", kind_of(key)),
                ),
            }
        }

        self.check_required_string(root, "id", &mut report);
        self.check_required_string(root, "description", &mut report);
        for field in ["data_root", "output_root"] {
            if let Some(value) = root.get(field) {
                if !value.is_string() {
                    report.push(field, format!("must be a string, found {}", kind_of(value)));
                }
            }
        }

        if let Some(matrix) = root.get("matrix") {
            self.check_matrix(matrix, &mut report);
        }
        for rule in ["include", "exclude"] {
            if let Some(rules) = root.get(rule) {
                self.check_rules(rule, rules, &mut report);
            }
        }
        if let Some(steps) = root.get("steps") {
            self.check_steps(steps, &mut report);
        }

        report
    }

    fn check_required_string(&self, root: &Mapping, field: &str, report: &mut ValidationReport) {
        match root.get(field) {
            None => report.push(field, "required field is missing"),
            Some(Value::String(text)) if text.trim().is_empty() => {
                report.push(field, "must not be empty")
            }
            Some(Value::String(_)) => {}
            Some(other) => report.push(field, format!("must be a string, found {}", kind_of(other))),
        }
    }

    fn check_matrix(&self, matrix: &Value, report: &mut ValidationReport) {
        let Some(axes) = matrix.as_mapping() else {
            report.push("matrix", format!("must be a mapping, found {}", kind_of(matrix)));
            return;
        };

        for (key, values) in axes {
            let Some(axis) = key.as_str() else {
                report.push(
                    "matrix",
                    format!("axis names must be strings, found {}", kind_of(key)),
                );
                continue;
            };
            let path = format!("matrix.{}", axis);

            if !is_identifier(axis) {
                report.push(path.clone(), format!("'{}' is not a valid axis name", axis));
            } else if ROOT_PROPERTIES.contains(&axis) {
                report.push(
                    path.clone(),
                    format!("axis '{}' shadows a workflow property", axis),
                );
            }

            let Some(values) = values.as_sequence() else {
                report.push(path, format!("must be a list, found {}", kind_of(values)));
                continue;
            };
            if values.is_empty() {
                report.push(path, "axis must have at least one value");
                continue;
            }

            let mut seen = HashSet::new();
            for (index, value) in values.iter().enumerate() {
                let value_path = format!("{}[{}]", path, index);
                if !is_scalar(value) {
                    report.push(
                        value_path,
                        format!("must be a string, number or boolean, found {}", kind_of(value)),
                    );
                } else if !seen.insert(scalar_text(value)) {
                    report.push(value_path, format!("duplicate value {}", scalar_text(value)));
                }
            }
        }
    }

    fn check_rules(&self, kind: &str, rules: &Value, report: &mut ValidationReport) {
        let Some(rules) = rules.as_sequence() else {
            report.push(kind, format!("must be a list, found {}", kind_of(rules)));
            return;
        };

        for (index, rule) in rules.iter().enumerate() {
            let path = format!("{}[{}]", kind, index);
            let Some(pairs) = rule.as_mapping() else {
                report.push(path, format!("must be a mapping, found {}", kind_of(rule)));
                continue;
            };
            if pairs.is_empty() {
                report.push(path, "rule must assign at least one axis");
                continue;
            }
            for (key, value) in pairs {
                let Some(axis) = key.as_str() else {
                    report.push(
                        path.clone(),
                        format!("axis names must be strings, found {}", kind_of(key)),
                    );
                    continue;
                };
                if !is_scalar(value) {
                    report.push(
                        format!("{}.{}", path, axis),
                        format!("must be a string, number or boolean, found {}", kind_of(value)),
                    );
                }
            }
        }
    }

    fn check_steps(&self, steps: &Value, report: &mut ValidationReport) {
        let Some(steps) = steps.as_sequence() else {
            report.push("steps", format!("must be a list, found {}", kind_of(steps)));
            return;
        };

        let mut names = HashSet::new();
        for (index, step) in steps.iter().enumerate() {
            let path = format!("steps[{}]", index);
            let Some(fields) = step.as_mapping() else {
                report.push(path, format!("must be a mapping, found {}", kind_of(step)));
                continue;
            };
            self.check_step(&path, fields, &mut names, report);
        }
    }

    fn check_step(
        &self,
        path: &str,
        fields: &Mapping,
        names: &mut HashSet<String>,
        report: &mut ValidationReport,
    ) {
        for key in fields.keys() {
            match key.as_str() {
                Some(name) if STEP_FIELDS.contains(&name) => {}
                Some(name) => report.push(
                    format!("{}.{}", path, name),
                    format!("unknown step field '{}'", name),
                ),
                None => report.push(
                    path,
                    format!("field names must be strings, found {}", kind_of(key)),
                ),
            }
        }

        match fields.get("name") {
            None => report.push(format!("{}.name", path), "required field is missing"),
            Some(Value::String(name)) => {
                if !is_identifier(name) {
                    report.push(
                        format!("{}.name", path),
                        format!("'{}' is not a valid step name", name),
                    );
                } else if !names.insert(name.clone()) {
                    report.push(
                        format!("{}.name", path),
                        format!("duplicate step name '{}'", name),
                    );
                }
            }
            Some(other) => report.push(
                format!("{}.name", path),
                format!("must be a string, found {}", kind_of(other)),
            ),
        }

        let uses = fields.get("uses");
        let run = fields.get("run");
        match (uses, run) {
            (Some(_), Some(_)) => report.push(path, "step must declare only one of 'uses' or 'run'"),
            (None, None) => report.push(path, "step must declare one of 'uses' or 'run'"),
            (Some(value), None) => self.check_non_empty_string(&format!("{}.uses", path), value, report),
            (None, Some(value)) => self.check_non_empty_string(&format!("{}.run", path), value, report),
        }

        if let Some(description) = fields.get("description") {
            if !description.is_string() {
                report.push(
                    format!("{}.description", path),
                    format!("must be a string, found {}", kind_of(description)),
                );
            }
        }

        if let Some(inputs) = fields.get("with") {
            match inputs.as_mapping() {
                Some(inputs) => {
                    if inputs.keys().any(|key| !key.is_string()) {
                        report.push(format!("{}.with", path), "input names must be strings");
                    }
                }
                None => report.push(
                    format!("{}.with", path),
                    format!("must be a mapping, found {}", kind_of(inputs)),
                ),
            }
        }

        if let Some(condition) = fields.get("if") {
            if !condition.is_string() && !condition.is_bool() {
                report.push(
                    format!("{}.if", path),
                    format!("must be a string or boolean, found {}", kind_of(condition)),
                );
            }
        }

        if let Some(timeout) = fields.get("timeout") {
            match timeout.as_str() {
                Some(text) => {
                    if let Err(e) = humantime_serde::re::humantime::parse_duration(text) {
                        report.push(
                            format!("{}.timeout", path),
                            format!("invalid duration '{}': {}", text, e),
                        );
                    }
                }
                None => report.push(
                    format!("{}.timeout", path),
                    format!("must be a duration string such as '30s', found {}", kind_of(timeout)),
                ),
            }
        }
    }

    fn check_non_empty_string(&self, path: &str, value: &Value, report: &mut ValidationReport) {
        match value {
            Value::String(text) if text.trim().is_empty() => report.push(path, "must not be empty"),
            Value::String(_) => {}
            other => report.push(path, format!("must be a string, found {}", kind_of(other))),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
