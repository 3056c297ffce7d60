// src/condition/evaluator.rs

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use crate::condition::{Condition, PredicateRegistry};
use crate::errors::{GatedagError, Result};
use crate::handlers::JobContext;

/// Upper bound on a single condition evaluation.
///
/// Conditions are expected to be cheap lookups over already-terminal
/// outputs; a predicate that blocks longer than this fails the owning job
/// with a `ConditionEvaluation` error (never retried).
pub const CONDITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves [`Condition`]s against a read-only view of prior job outputs.
///
/// Must not mutate execution state; the engine invokes it before any retry
/// budget is consumed.
#[derive(Debug, Default, Clone)]
pub struct ConditionEvaluator {
    predicates: Arc<PredicateRegistry>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicates(predicates: PredicateRegistry) -> Self {
        Self {
            predicates: Arc::new(predicates),
        }
    }

    /// Evaluate a condition, bounded by [`CONDITION_TIMEOUT`].
    pub async fn evaluate(&self, condition: &Condition, ctx: &JobContext) -> Result<bool> {
        match tokio::time::timeout(CONDITION_TIMEOUT, self.eval(condition, ctx)).await {
            Ok(result) => {
                if let Ok(decision) = &result {
                    debug!(
                        job = %ctx.job_id,
                        execution = %ctx.execution_id,
                        decision,
                        "condition evaluated"
                    );
                }
                result
            }
            Err(_) => Err(GatedagError::ConditionEvaluation(format!(
                "condition for job '{}' timed out after {}s",
                ctx.job_id,
                CONDITION_TIMEOUT.as_secs()
            ))),
        }
    }

    fn eval<'a>(&'a self, condition: &'a Condition, ctx: &'a JobContext) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            match condition {
                Condition::Expr(expr) => expr.evaluate(ctx.job_output(&expr.job)),
                Condition::All { conditions } => {
                    for sub in conditions {
                        if !self.eval(sub, ctx).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Condition::Any { conditions } => {
                    for sub in conditions {
                        if self.eval(sub, ctx).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Condition::Predicate { name, params } => {
                    let predicate = self.predicates.get(name).ok_or_else(|| {
                        GatedagError::ConditionEvaluation(format!(
                            "unknown predicate '{name}'"
                        ))
                    })?;
                    predicate(params.clone(), ctx.clone()).await
                }
            }
        })
    }
}
