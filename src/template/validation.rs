// ABOUTME: Pre-flight validation of every template reference in a workflow document
// ABOUTME: Cross-checks references against matrix axes, workflow properties and earlier steps

use serde_json::Value;
use std::collections::BTreeSet;

use super::error::{TemplateError, TemplateReport};
use super::resolver::{self, Reference};
use crate::parser::{Step, WorkflowDocument, ROOT_PROPERTIES};

/// Variables any step may reference: matrix axes plus workflow properties.
pub fn available_names(document: &WorkflowDocument) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = document.matrix.keys().cloned().collect();
    names.extend(document.properties().into_iter().map(|(name, _)| name));
    names
}

/// Validate every template in `document` against the `available` names.
///
/// Step output references (`{{step.output}}`) must name a step declared
/// earlier in the workflow. All problems are collected; nothing is resolved.
pub fn validate_workflow(document: &WorkflowDocument, available: &BTreeSet<String>) -> TemplateReport {
    let mut report = TemplateReport::new();

    validate_roots(document, &mut report);

    for (index, step) in document.steps.iter().enumerate() {
        for (location, text) in step_templates(index, step) {
            match resolver::references(&text) {
                Ok(references) => {
                    for reference in references {
                        if let Some(message) =
                            check_reference(&reference, index, &document.steps, available)
                        {
                            report.push(location.clone(), message);
                        }
                    }
                }
                Err(error) => report.push(location, malformed_message(&error)),
            }
        }
    }

    report
}

/// Root path templates may only use axes, `id` and `description`.
fn validate_roots(document: &WorkflowDocument, report: &mut TemplateReport) {
    let mut allowed: BTreeSet<String> = document.matrix.keys().cloned().collect();
    allowed.insert("id".to_string());
    allowed.insert("description".to_string());

    for (name, template) in document.root_templates() {
        match resolver::references(template) {
            Ok(references) => {
                for reference in references {
                    if reference.is_step_output() {
                        report.push(
                            name,
                            format!("{} cannot reference step outputs", reference),
                        );
                    } else if !allowed.contains(&reference.name) {
                        let message = if ROOT_PROPERTIES.contains(&reference.name.as_str()) {
                            format!("{} cannot reference another root path", reference)
                        } else {
                            format!(
                                "unknown variable {} (available: {})",
                                reference,
                                join(&allowed)
                            )
                        };
                        report.push(name, message);
                    }
                }
            }
            Err(error) => report.push(name, malformed_message(&error)),
        }
    }
}

fn check_reference(
    reference: &Reference,
    step_index: usize,
    steps: &[Step],
    available: &BTreeSet<String>,
) -> Option<String> {
    if !reference.is_step_output() {
        if available.contains(&reference.name) {
            return None;
        }
        return Some(format!(
            "unknown variable {} (available: {})",
            reference,
            join(available)
        ));
    }

    let target = reference.name.as_str();
    if let Some(producer) = steps[..step_index].iter().find(|s| s.name == target) {
        // A guarded producer records no outputs in jobs where its guard is false;
        // only a consumer behind the same guard is sure to see them.
        return match producer.condition {
            Some(ref guard) if steps[step_index].condition.as_ref() != Some(guard) => {
                Some(format!(
                    "{} references guarded step '{}' whose outputs may be absent (guard: {})",
                    reference, target, guard
                ))
            }
            _ => None,
        };
    }

    let message = match steps.iter().position(|s| s.name == target) {
        Some(position) if position == step_index => {
            format!("{} references the step's own outputs", reference)
        }
        Some(_) => format!(
            "{} is a forward reference to step '{}', which is declared later",
            reference, target
        ),
        None if available.contains(target) => format!(
            "{} uses '{}' as a step, but it is a variable",
            reference, target
        ),
        None => format!("{} references unknown step '{}'", reference, target),
    };
    Some(message)
}

/// Every template-bearing string of a step with its location.
pub fn step_templates(index: usize, step: &Step) -> Vec<(String, String)> {
    let mut templates = Vec::new();
    let base = format!("steps[{}]", index);

    if let Some(ref command) = step.run {
        templates.push((format!("{}.run", base), command.clone()));
    }
    if let Some(ref condition) = step.condition {
        templates.push((format!("{}.if", base), condition.clone()));
    }
    for (key, value) in &step.inputs {
        collect_strings(&format!("{}.with.{}", base, key), value, &mut templates);
    }

    templates
}

fn collect_strings(location: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(text) => out.push((location.to_string(), text.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_strings(&format!("{}[{}]", location, index), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_strings(&format!("{}.{}", location, key), item, out);
            }
        }
        _ => {}
    }
}

fn malformed_message(error: &TemplateError) -> String {
    match error {
        TemplateError::Malformed {
            text,
            position,
            reason,
        } => format!("malformed reference in '{}' at offset {}: {}", text, position, reason),
        other => other.to_string(),
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}
