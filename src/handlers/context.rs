// src/handlers/context.rs

//! Read-only execution context handed to handlers and conditions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::graph::JobId;

/// Context for a single handler invocation.
///
/// `outputs` is a snapshot of terminal sibling outputs taken at dispatch
/// time; because a job is only dispatched once its dependencies are
/// terminal, neither handlers nor conditions can ever observe a
/// non-terminal output through it.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub execution_id: String,
    pub job_id: JobId,
    outputs: Arc<HashMap<JobId, Value>>,
    /// Fires when the owning execution is cancelled. Handlers running
    /// long operations should observe it and wind down promptly.
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn new(
        execution_id: impl Into<String>,
        job_id: impl Into<JobId>,
        outputs: Arc<HashMap<JobId, Value>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            job_id: job_id.into(),
            outputs,
            cancel,
        }
    }

    /// Output of an already-terminal job, or `None` if the job has not
    /// produced one.
    pub fn job_output(&self, job_id: &str) -> Option<&Value> {
        self.outputs.get(job_id)
    }

    /// Convenience constructor for tests: plain map, fresh token.
    pub fn for_tests(
        execution_id: &str,
        job_id: &str,
        outputs: HashMap<JobId, Value>,
    ) -> Self {
        Self::new(
            execution_id,
            job_id,
            Arc::new(outputs),
            CancellationToken::new(),
        )
    }
}
