// ABOUTME: Flat {{name}} / {{step.output}} template parsing, extraction and substitution
// ABOUTME: Resolves step parameters against a per-job variable map without a general template language

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use super::error::{Result, TemplateError};
use super::Variables;

/// A `{{name}}` or `{{step.output}}` reference found in a template string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub name: String,
    pub field: Option<String>,
}

/// Parsed piece of a template string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Reference(Reference),
}

impl Reference {
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: None,
        }
    }

    pub fn step_output(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: step.into(),
            field: Some(output.into()),
        }
    }

    /// Context key this reference is looked up under.
    pub fn key(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{}", self.name, field),
            None => self.name.clone(),
        }
    }

    pub fn is_step_output(&self) -> bool {
        self.field.is_some()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}", self.key())
    }
}

/// Check whether `text` is a valid variable, axis or step identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Split a template string into literal text and references.
pub fn parse(text: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let remaining = &text[cursor..];
        let open = remaining.find("{{");
        let close = remaining.find("}}");

        let Some(open) = open else {
            if let Some(close) = close {
                return Err(malformed(text, cursor + close, "unmatched '}}'"));
            }
            segments.push(Segment::Literal(remaining));
            break;
        };

        if let Some(close) = close {
            if close < open {
                return Err(malformed(text, cursor + close, "unmatched '}}'"));
            }
        }

        if open > 0 {
            segments.push(Segment::Literal(&remaining[..open]));
        }

        let body_start = open + 2;
        let Some(body_len) = remaining[body_start..].find("}}") else {
            return Err(malformed(text, cursor + open, "unmatched '{{'"));
        };

        let body = &remaining[body_start..body_start + body_len];
        let reference =
            parse_reference(body).map_err(|reason| malformed(text, cursor + open, &reason))?;
        segments.push(Segment::Reference(reference));

        cursor += body_start + body_len + 2;
    }

    Ok(segments)
}

fn parse_reference(body: &str) -> std::result::Result<Reference, String> {
    let body = body.trim();
    if body.is_empty() {
        return Err("empty reference".to_string());
    }
    if body.contains("{{") {
        return Err("nested '{{' inside reference".to_string());
    }

    let parts: Vec<&str> = body.split('.').collect();
    if parts.len() > 2 {
        return Err(format!(
            "'{}' has more than one '.'; only name or step.output is allowed",
            body
        ));
    }
    for part in &parts {
        if !is_identifier(part) {
            return Err(format!("'{}' is not a valid identifier", part));
        }
    }

    Ok(match parts.as_slice() {
        [name] => Reference::variable(*name),
        [name, field] => Reference::step_output(*name, *field),
        _ => unreachable!("reference split into at most two parts"),
    })
}

fn malformed(text: &str, position: usize, reason: &str) -> TemplateError {
    TemplateError::Malformed {
        text: text.to_string(),
        position,
        reason: reason.to_string(),
    }
}

/// All references in a template string, in order of appearance.
pub fn references(text: &str) -> Result<Vec<Reference>> {
    Ok(parse(text)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Reference(reference) => Some(reference),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Names referenced by a template string, without resolving them.
pub fn extract(text: &str) -> Result<BTreeSet<String>> {
    Ok(references(text)?.iter().map(Reference::key).collect())
}

/// Names referenced anywhere inside a parameter value.
///
/// Strings nested in mappings and sequences are scanned; mapping keys and
/// non-string scalars are not.
pub fn extract_value(value: &Value) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    collect_value(value, &mut names)?;
    Ok(names)
}

fn collect_value(value: &Value, names: &mut BTreeSet<String>) -> Result<()> {
    match value {
        Value::String(text) => names.extend(extract(text)?),
        Value::Array(items) => {
            for item in items {
                collect_value(item, names)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_value(item, names)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Substitute every reference in `text` with its stringified value.
///
/// A reference missing from `variables` is an error; nothing is partially
/// substituted.
pub fn resolve(text: &str, variables: &Variables) -> Result<String> {
    if !has_templates(text) {
        return Ok(text.to_string());
    }

    let mut resolved = String::with_capacity(text.len());
    for segment in parse(text)? {
        match segment {
            Segment::Literal(literal) => resolved.push_str(literal),
            Segment::Reference(reference) => {
                let key = reference.key();
                let value =
                    variables
                        .get(&key)
                        .ok_or_else(|| TemplateError::MissingVariable {
                            name: key.clone(),
                            text: text.to_string(),
                        })?;
                resolved.push_str(&stringify(value));
            }
        }
    }
    Ok(resolved)
}

/// Recursively resolve templates in a parameter value.
pub fn resolve_value(value: &Value, variables: &Variables) -> Result<Value> {
    match value {
        Value::String(text) => Ok(Value::String(resolve(text, variables)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, variables))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, variables)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Render a context value the way it is substituted into a template.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Check if a string contains anything that looks like template syntax.
pub fn has_templates(text: &str) -> bool {
    text.contains("{{") || text.contains("}}")
}
