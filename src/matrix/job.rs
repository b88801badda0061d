// ABOUTME: Job type produced by matrix expansion
// ABOUTME: A Job is one concrete axis assignment plus its position in the expansion

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::template::stringify;

/// Where a Job came from during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOrigin {
    Product,
    Include,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub ordinal: usize,
    pub assignment: IndexMap<String, Value>,
    pub origin: JobOrigin,
}

impl Job {
    pub fn new(ordinal: usize, assignment: IndexMap<String, Value>, origin: JobOrigin) -> Self {
        Self {
            ordinal,
            assignment,
            origin,
        }
    }

    /// Human readable identification, e.g. `dataset=asia, algorithm=pc`.
    pub fn label(&self) -> String {
        if self.assignment.is_empty() {
            return format!("job {}", self.ordinal);
        }
        self.assignment
            .iter()
            .map(|(axis, value)| format!("{}={}", axis, stringify(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get(&self, axis: &str) -> Option<&Value> {
        self.assignment.get(axis)
    }

    pub fn has_axis(&self, axis: &str) -> bool {
        self.assignment.contains_key(axis)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}]", self.ordinal, self.label())
    }
}
