// src/condition/expr.rs

//! Expression conditions over job outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GatedagError, Result};
use crate::graph::JobId;

/// Comparison operator for expression conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equality check.
    #[default]
    Eq,
    /// Inequality check.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Gte,
    /// Less than or equal.
    Lte,
    /// String or array contains.
    Contains,
    /// Regex match.
    Matches,
    /// Value is truthy.
    Truthy,
    /// Value is falsy.
    Falsy,
    /// Value is in list.
    In,
    /// Value is not in list.
    NotIn,
}

/// A single comparison against a prior job's output.
///
/// `path` is a dot-separated path into the output JSON (empty = the whole
/// output). A missing job output or path reads as JSON null; operators
/// treat null like any other value, so `truthy` on a job that never ran
/// is simply `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprCondition {
    /// Id of the job whose output is inspected.
    pub job: JobId,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub op: Operator,

    /// Right-hand side literal; unused by `truthy`/`falsy`.
    #[serde(default)]
    pub value: Option<Value>,
}

impl ExprCondition {
    /// Evaluate against the referenced job's output (if any).
    pub fn evaluate(&self, output: Option<&Value>) -> Result<bool> {
        let actual = output
            .and_then(|root| lookup_path(root, &self.path))
            .unwrap_or(&Value::Null);

        let expected = self.value.as_ref().unwrap_or(&Value::Null);

        let result = match self.op {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Gt => compare_numbers(actual, expected, |a, b| a > b),
            Operator::Lt => compare_numbers(actual, expected, |a, b| a < b),
            Operator::Gte => compare_numbers(actual, expected, |a, b| a >= b),
            Operator::Lte => compare_numbers(actual, expected, |a, b| a <= b),
            Operator::Contains => contains(actual, expected),
            Operator::Matches => self.regex_matches(actual, expected)?,
            Operator::Truthy => is_truthy(actual),
            Operator::Falsy => !is_truthy(actual),
            Operator::In => self.in_list(actual)?,
            Operator::NotIn => !self.in_list(actual)?,
        };

        Ok(result)
    }

    fn regex_matches(&self, actual: &Value, expected: &Value) -> Result<bool> {
        let pattern = expected.as_str().ok_or_else(|| {
            GatedagError::ConditionEvaluation(
                "'matches' operator requires a string pattern".to_string(),
            )
        })?;
        let re = regex::Regex::new(pattern).map_err(|e| {
            GatedagError::ConditionEvaluation(format!("invalid regex '{pattern}': {e}"))
        })?;

        Ok(actual.as_str().is_some_and(|s| re.is_match(s)))
    }

    fn in_list(&self, actual: &Value) -> Result<bool> {
        let list = self.value.as_ref().and_then(|v| v.as_array()).ok_or_else(|| {
            GatedagError::ConditionEvaluation(
                "'in'/'not_in' operators require an array value".to_string(),
            )
        })?;

        Ok(list.contains(actual))
    }
}

/// Descend a dot-separated path into a JSON value.
///
/// Numeric segments index into arrays.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn compare_numbers(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected.as_str().is_some_and(|needle| s.contains(needle)),
        Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
