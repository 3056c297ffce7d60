// src/engine/worker.rs

//! Per-job worker pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::condition::ConditionEvaluator;
use crate::engine::{JobOutcome, WorkerEvent};
use crate::errors::{GatedagError, Result};
use crate::graph::Job;
use crate::handlers::{HandlerRegistry, JobContext};

/// Run a single job to a terminal outcome and report it to the runner.
///
/// Exactly one [`WorkerEvent`] is emitted per invocation.
pub(crate) async fn run_job(
    job: Job,
    ctx: JobContext,
    registry: Arc<HandlerRegistry>,
    evaluator: Arc<ConditionEvaluator>,
    tx: mpsc::Sender<WorkerEvent>,
) {
    let job_id = job.id.clone();
    let (attempts, outcome) = run_job_inner(job, &ctx, &registry, &evaluator).await;
    let _ = tx
        .send(WorkerEvent {
            job_id,
            attempts,
            outcome,
        })
        .await;
}

async fn run_job_inner(
    job: Job,
    ctx: &JobContext,
    registry: &HandlerRegistry,
    evaluator: &ConditionEvaluator,
) -> (u32, JobOutcome) {
    // Condition gate runs before any retry budget is consumed. A false
    // result skips the job without invoking the handler; an evaluation
    // error fails the job immediately and is never retried.
    if let Some(condition) = &job.condition {
        match evaluator.evaluate(condition, ctx).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    execution = %ctx.execution_id,
                    job = %job.id,
                    "condition not met; skipping job"
                );
                return (
                    0,
                    JobOutcome::Skipped {
                        output: json!({"skipped": true, "reason": "condition not met"}),
                    },
                );
            }
            Err(err) => {
                warn!(
                    execution = %ctx.execution_id,
                    job = %job.id,
                    error = %err,
                    "condition evaluation failed"
                );
                return (
                    0,
                    JobOutcome::Failed {
                        error: err.to_string(),
                    },
                );
            }
        }
    }

    let Some(handler) = registry.get(&job.job_type) else {
        return (
            0,
            JobOutcome::Failed {
                error: GatedagError::NoHandler(job.job_type.clone()).to_string(),
            },
        );
    };

    let policy = job.retry_policy();
    let max_attempts = policy.effective_max_attempts();

    for attempt in 1..=max_attempts {
        debug!(
            execution = %ctx.execution_id,
            job = %job.id,
            attempt,
            max_attempts,
            "invoking handler"
        );

        let fut = handler.execute(job.config.clone(), ctx.clone());
        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return (attempt, JobOutcome::Cancelled {
                    reason: "execution cancelled".to_string(),
                });
            }
            result = run_attempt(fut, job.timeout_ms, &job.id) => result,
        };

        match result {
            Ok(output) => return (attempt, JobOutcome::Completed { output }),
            Err(GatedagError::JobCancelled(reason)) => {
                return (attempt, JobOutcome::Cancelled { reason });
            }
            Err(err) => {
                if !err.is_retryable() || attempt == max_attempts {
                    return (
                        attempt,
                        JobOutcome::Failed {
                            error: err.to_string(),
                        },
                    );
                }

                // Earlier attempt errors are discarded; only the last
                // one surfaces.
                warn!(
                    execution = %ctx.execution_id,
                    job = %job.id,
                    attempt,
                    error = %err,
                    backoff_ms = policy.backoff_ms,
                    "attempt failed; retrying"
                );

                if policy.backoff_ms > 0 {
                    tokio::select! {
                        _ = ctx.cancel.cancelled() => {
                            return (attempt, JobOutcome::Cancelled {
                                reason: "execution cancelled".to_string(),
                            });
                        }
                        _ = tokio::time::sleep(Duration::from_millis(policy.backoff_ms)) => {}
                    }
                }
            }
        }
    }

    // The loop always returns from its last iteration.
    unreachable!("retry loop exited without an outcome")
}

async fn run_attempt(
    fut: impl Future<Output = Result<Value>>,
    timeout_ms: Option<u64>,
    job_id: &str,
) -> Result<Value> {
    match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(GatedagError::HandlerTimeout {
                job: job_id.to_string(),
                timeout_ms: ms,
            }),
        },
        None => fut.await,
    }
}
