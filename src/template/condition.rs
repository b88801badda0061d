// ABOUTME: Evaluation of step `if` guard conditions against a job context
// ABOUTME: Supports `lhs == rhs`, `lhs != rhs` and bare boolean-like values only

use super::error::{Result, TemplateError};
use super::resolver;
use super::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
}

/// Resolve the templates in a guard condition and evaluate it.
pub fn evaluate(condition: &str, variables: &Variables) -> Result<bool> {
    match split_comparison(condition)? {
        Some((lhs, comparison, rhs)) => {
            let lhs = resolver::resolve(lhs, variables)?;
            let rhs = resolver::resolve(rhs, variables)?;
            let equal = unquote(lhs.trim()) == unquote(rhs.trim());
            Ok(match comparison {
                Comparison::Equal => equal,
                Comparison::NotEqual => !equal,
            })
        }
        None => {
            let value = resolver::resolve(condition, variables)?;
            truthiness(unquote(value.trim())).ok_or_else(|| TemplateError::InvalidCondition {
                condition: condition.to_string(),
                reason: format!("'{}' is not a boolean value", value.trim()),
            })
        }
    }
}

fn split_comparison(condition: &str) -> Result<Option<(&str, Comparison, &str)>> {
    let equal = condition.find("==");
    let not_equal = condition.find("!=");

    let (position, comparison) = match (equal, not_equal) {
        (None, None) => return Ok(None),
        (Some(position), None) => (position, Comparison::Equal),
        (None, Some(position)) => (position, Comparison::NotEqual),
        (Some(_), Some(_)) => {
            return Err(TemplateError::InvalidCondition {
                condition: condition.to_string(),
                reason: "only one comparison operator is allowed".to_string(),
            })
        }
    };

    let lhs = &condition[..position];
    let rhs = &condition[position + 2..];
    if rhs.contains("==") || rhs.contains("!=") {
        return Err(TemplateError::InvalidCondition {
            condition: condition.to_string(),
            reason: "only one comparison operator is allowed".to_string(),
        });
    }
    if lhs.trim().is_empty() || rhs.trim().is_empty() {
        return Err(TemplateError::InvalidCondition {
            condition: condition.to_string(),
            reason: "comparison needs a value on both sides".to_string(),
        });
    }

    Ok(Some((lhs, comparison, rhs)))
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn truthiness(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}
