// ABOUTME: Cartesian expansion of a parameter matrix into an ordered list of Jobs
// ABOUTME: Applies exclude rules to the product, then appends de-duplicated include rules

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::error::{MatrixError, Result};
use super::job::{Job, JobOrigin};
use crate::template::stringify;

/// Ordered axis name to value list mapping.
pub type Matrix = IndexMap<String, Vec<Value>>;

/// Partial axis assignment used by include and exclude rules.
pub type MatrixRule = IndexMap<String, Value>;

#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand `matrix` into Jobs.
    ///
    /// The product varies the first declared axis slowest. Every rule is
    /// checked before any Job is produced.
    pub fn expand(
        &self,
        matrix: &Matrix,
        include: &[MatrixRule],
        exclude: &[MatrixRule],
    ) -> Result<Vec<Job>> {
        self.check_axes(matrix)?;
        self.check_rules("include", include, matrix)?;
        self.check_rules("exclude", exclude, matrix)?;

        let product = self.product(matrix);
        let product_size = product.len();

        let mut assignments: Vec<(IndexMap<String, Value>, JobOrigin)> = product
            .into_iter()
            .filter(|assignment| !exclude.iter().any(|rule| rule_matches(assignment, rule)))
            .map(|assignment| (assignment, JobOrigin::Product))
            .collect();
        let excluded = product_size - assignments.len();

        let mut included = 0;
        for rule in include {
            let ordered = order_by_axes(rule, matrix);
            let duplicate = assignments
                .iter()
                .any(|(existing, _)| same_assignment(existing, &ordered));
            if duplicate {
                debug!("Include rule {:?} already present, skipping", rule);
                continue;
            }
            assignments.push((ordered, JobOrigin::Include));
            included += 1;
        }

        debug!(
            "Expanded matrix: {} product points, {} excluded, {} included, {} jobs",
            product_size,
            excluded,
            included,
            assignments.len()
        );

        Ok(assignments
            .into_iter()
            .enumerate()
            .map(|(ordinal, (assignment, origin))| Job::new(ordinal, assignment, origin))
            .collect())
    }

    fn check_axes(&self, matrix: &Matrix) -> Result<()> {
        for (axis, values) in matrix {
            if values.is_empty() {
                return Err(MatrixError::EmptyAxis { axis: axis.clone() });
            }
        }
        Ok(())
    }

    fn check_rules(&self, kind: &str, rules: &[MatrixRule], matrix: &Matrix) -> Result<()> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.is_empty() {
                return Err(MatrixError::EmptyRule {
                    rule: kind.to_string(),
                    index,
                });
            }
            if let Some(axis) = rule.keys().find(|axis| !matrix.contains_key(*axis)) {
                return Err(MatrixError::UndeclaredAxis {
                    rule: kind.to_string(),
                    index,
                    axis: axis.clone(),
                    declared: matrix.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            }
        }
        Ok(())
    }

    fn product(&self, matrix: &Matrix) -> Vec<IndexMap<String, Value>> {
        let mut combinations = vec![IndexMap::new()];
        for (axis, values) in matrix {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for combination in &combinations {
                for value in values {
                    let mut extended = combination.clone();
                    extended.insert(axis.clone(), value.clone());
                    next.push(extended);
                }
            }
            combinations = next;
        }
        combinations
    }
}

/// True when every pair of `rule` agrees with `assignment`.
fn rule_matches(assignment: &IndexMap<String, Value>, rule: &MatrixRule) -> bool {
    rule.iter().all(|(axis, expected)| {
        assignment
            .get(axis)
            .map(|actual| values_match(actual, expected))
            .unwrap_or(false)
    })
}

/// Matrix values match when equal or when they render to the same text,
/// so `100` in a rule matches `"100"` on an axis.
fn values_match(actual: &Value, expected: &Value) -> bool {
    actual == expected || stringify(actual) == stringify(expected)
}

fn same_assignment(existing: &IndexMap<String, Value>, candidate: &IndexMap<String, Value>) -> bool {
    existing.len() == candidate.len() && rule_matches(existing, candidate)
}

fn order_by_axes(rule: &MatrixRule, matrix: &Matrix) -> IndexMap<String, Value> {
    matrix
        .keys()
        .filter_map(|axis| rule.get(axis).map(|value| (axis.clone(), value.clone())))
        .collect()
}
