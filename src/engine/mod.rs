// src/engine/mod.rs

//! Dependency-aware execution engine.
//!
//! This module ties together:
//! - the pure execution-state machine ([`state`]): ready-set computation,
//!   status transitions, cascade cancellation, settlement detection
//! - the per-job worker pipeline ([`worker`]): condition gate, handler
//!   lookup, retry/timeout policy
//! - the async runner shell ([`runner`]) that dispatches workers and
//!   consumes their outcome events
//!
//! The state machine is synchronous and deterministic so it can be unit
//! tested without Tokio, channels, or handlers; all IO lives in the shell.

pub mod runner;
pub mod state;
pub mod worker;

use serde_json::Value;

use crate::graph::JobId;

pub use runner::Engine;
pub use state::{
    Execution, ExecutionEvent, ExecutionState, ExecutionStatus, JobExecution, JobStatus,
};

/// Terminal outcome of a single worker invocation.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed { output: Value },
    Skipped { output: Value },
    Failed { error: String },
    Cancelled { reason: String },
}

/// Event flowing from a worker back into the runner loop.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub job_id: JobId,
    /// Handler attempts consumed (0 when the condition gate decided).
    pub attempts: u32,
    pub outcome: JobOutcome,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Maximum number of concurrently running jobs per execution.
    pub max_parallel: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { max_parallel: 8 }
    }
}
