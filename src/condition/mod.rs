// src/condition/mod.rs

//! Data-dependent branching.
//!
//! Conditions gate whether a job's handler runs at all. Because job
//! configuration must survive persistence and cross-process resumption,
//! a condition is never a closure: it is either a small serializable
//! expression interpreted over prior job outputs ([`expr`]), a boolean
//! combination of those, or a reference to a predicate registered by
//! name ([`registry`]).
//!
//! The [`evaluator`] resolves either form asynchronously with read-only
//! access to already-terminal sibling outputs.

pub mod evaluator;
pub mod expr;
pub mod registry;

use serde::{Deserialize, Serialize};

pub use evaluator::{CONDITION_TIMEOUT, ConditionEvaluator};
pub use expr::{ExprCondition, Operator};
pub use registry::{PredicateFn, PredicateRegistry};

/// A serializable "should this job execute" decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Compare a value inside another job's output against a literal.
    Expr(ExprCondition),

    /// True iff every sub-condition is true.
    All { conditions: Vec<Condition> },

    /// True iff at least one sub-condition is true.
    Any { conditions: Vec<Condition> },

    /// Resolve a predicate function registered by name.
    Predicate {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl Condition {
    /// Shorthand for the common "field in job output equals value" gate.
    pub fn output_eq(
        job: impl Into<String>,
        path: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Condition::Expr(ExprCondition {
            job: job.into(),
            path: path.into(),
            op: Operator::Eq,
            value: Some(value),
        })
    }
}
