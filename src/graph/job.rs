// src/graph/job.rs

//! Job definition types.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Canonical job identifier type used throughout the engine.
pub type JobId = String;

/// Retry policy for a job's handler invocations.
///
/// `max_attempts` counts the total number of runs (1 = no retries).
/// A fixed `backoff_ms` delay is applied between attempts; errors from
/// earlier attempts are discarded, only the last one survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Attempt budget, clamped so a misconfigured `max_attempts = 0` still
    /// runs the handler once.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// A single unit of work in an execution graph.
///
/// Immutable once an execution starts. The `config` payload is opaque to
/// the engine and interpreted only by the handler registered for
/// `job_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    /// Display name; defaults to the id when not set explicitly.
    pub name: String,

    /// Discriminates which registered handler executes this job.
    #[serde(rename = "type")]
    pub job_type: String,

    /// Ids of jobs that must reach `completed` or `skipped` before this
    /// one may run.
    #[serde(default)]
    pub depends_on: Vec<JobId>,

    /// Opaque configuration payload handed to the handler.
    #[serde(default)]
    pub config: serde_json::Value,

    /// Optional data-dependent gate, evaluated before the handler runs.
    #[serde(default)]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    /// Per-attempt handler timeout. A timed-out attempt counts as a
    /// failure and is eligible for retry under the same policy.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Job {
    /// Minimal constructor for programmatic graph building; config and
    /// policies are filled in via the builder-style methods below.
    pub fn new(id: impl Into<JobId>, job_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            job_type: job_type.into(),
            depends_on: Vec::new(),
            config: serde_json::Value::Null,
            condition: None,
            retry: None,
            timeout_ms: None,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<JobId>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_default()
    }
}
