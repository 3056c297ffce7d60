// src/handlers/registry.rs

//! Pluggable job handler abstraction.
//!
//! Production code registers the built-in `command` and `approval`
//! handlers; tests register fakes that record invocations and return
//! canned outputs.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::errors::Result;
use crate::handlers::JobContext;

/// Trait implemented by every job-type owner.
///
/// The handler receives the job's opaque `config` payload and a read-only
/// [`JobContext`]. It returns the job's output value or an error; errors
/// are retried under the job's retry policy unless the error kind is a
/// terminal decision (see `GatedagError::is_retryable`).
///
/// Handlers must be safe to re-run, or the owning job must opt out of
/// retries with `retry.max_attempts = 1`.
pub trait JobHandler: Send + Sync {
    fn execute(&self, config: Value, ctx: JobContext) -> BoxFuture<'static, Result<Value>>;
}

/// Explicit mapping from job type name to handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
