// src/engine/runner.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::condition::ConditionEvaluator;
use crate::engine::worker::run_job;
use crate::engine::{EngineOptions, Execution, ExecutionState, WorkerEvent};
use crate::errors::Result;
use crate::graph::Job;
use crate::handlers::{HandlerRegistry, JobContext};

/// Drives an execution: validates the graph, dispatches ready jobs to
/// concurrently running workers (honouring the fan-out cap), applies
/// their outcomes and finalizes once every job is terminal.
///
/// All runtime semantics live in the pure [`ExecutionState`]; this struct
/// handles async IO: spawning workers and reading their outcome events.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    evaluator: Arc<ConditionEvaluator>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            evaluator: Arc::new(ConditionEvaluator::new()),
            options: EngineOptions::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: ConditionEvaluator) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run a job graph to completion.
    pub async fn execute(&self, name: &str, jobs: Vec<Job>) -> Result<Execution> {
        self.execute_with_cancel(name, jobs, CancellationToken::new())
            .await
    }

    /// Run a job graph to completion, subject to external cancellation.
    ///
    /// When `cancel` fires, pending jobs are marked cancelled immediately
    /// and no new workers are dispatched; running workers observe the
    /// token and report their own terminal outcome, so the returned
    /// execution never contains a non-terminal job.
    pub async fn execute_with_cancel(
        &self,
        name: &str,
        jobs: Vec<Job>,
        cancel: CancellationToken,
    ) -> Result<Execution> {
        let mut state = ExecutionState::new(name, jobs)?;
        info!(
            execution = %state.id(),
            name,
            jobs = state.job_count(),
            "execution started"
        );

        let (tx, mut rx) = mpsc::channel::<WorkerEvent>(64);
        let mut cancel_seen = false;

        loop {
            if cancel.is_cancelled() && !cancel_seen {
                cancel_seen = true;
                state.cancel_pending("execution cancelled");
            }

            if !cancel_seen {
                let capacity = self
                    .options
                    .max_parallel
                    .saturating_sub(state.running_count());
                for job_id in state.take_ready(capacity) {
                    self.dispatch(&state, &job_id, &cancel, tx.clone());
                }
            }

            if state.is_settled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !cancel_seen => {
                    // Handled at the top of the loop.
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            debug!(
                                execution = %state.id(),
                                job = %event.job_id,
                                "runner received worker event"
                            );
                            state.apply_outcome(event);
                        }
                        // The runner holds `tx`, so this only happens on
                        // runtime teardown.
                        None => break,
                    }
                }
            }
        }

        let execution = state.finish();
        info!(
            execution = %execution.id,
            status = ?execution.status,
            "execution finished"
        );
        Ok(execution)
    }

    fn dispatch(
        &self,
        state: &ExecutionState,
        job_id: &str,
        cancel: &CancellationToken,
        tx: mpsc::Sender<WorkerEvent>,
    ) {
        let Some(job) = state.job(job_id).cloned() else {
            return;
        };

        let ctx = JobContext::new(
            state.id(),
            job_id,
            state.outputs_snapshot(),
            cancel.clone(),
        );

        debug!(execution = %state.id(), job = %job_id, "dispatching worker");
        tokio::spawn(run_job(
            job,
            ctx,
            Arc::clone(&self.registry),
            Arc::clone(&self.evaluator),
            tx,
        ));
    }
}
