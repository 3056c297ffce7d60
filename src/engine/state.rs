// src/engine/state.rs

//! Pure per-execution state management.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{JobOutcome, WorkerEvent};
use crate::errors::Result;
use crate::graph::{Job, JobGraph, JobId};

/// Runtime status of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Whether a dependent of this job may run.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Skipped)
    }
}

/// Runtime record for one job within an execution.
#[derive(Debug, Clone, Serialize)]
pub struct JobExecution {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Present only for `completed`/`skipped`.
    pub output: Option<Value>,
    /// Present only for `failed`/`cancelled`.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl JobExecution {
    fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }
}

/// Overall status of an execution, derived from its job statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A timestamped human-readable event in the execution log.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Finalized view of one DAG run, returned by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub id: String,
    pub name: String,
    pub status: ExecutionStatus,
    pub jobs: HashMap<JobId, JobExecution>,
    pub events: Vec<ExecutionEvent>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn job(&self, id: &str) -> Option<&JobExecution> {
        self.jobs.get(id)
    }
}

/// Mutable state machine for an in-flight execution.
///
/// Owns the immutable job definitions, the validated graph, and the
/// per-job runtime records. All transitions happen through the methods
/// below; the runner never touches records directly, so a job can only
/// ever receive one terminal outcome.
#[derive(Debug)]
pub struct ExecutionState {
    id: String,
    name: String,
    defs: HashMap<JobId, Job>,
    graph: JobGraph,
    records: HashMap<JobId, JobExecution>,
    events: Vec<ExecutionEvent>,
    created_at: DateTime<Utc>,
    cancelled: bool,
}

impl ExecutionState {
    /// Validate the job set and build the initial (all-pending) state.
    pub fn new(name: &str, jobs: Vec<Job>) -> Result<Self> {
        let graph = JobGraph::build(&jobs)?;

        let mut defs = HashMap::new();
        let mut records = HashMap::new();
        for job in jobs {
            records.insert(job.id.clone(), JobExecution::pending(job.id.clone()));
            defs.insert(job.id.clone(), job);
        }

        let mut state = Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            defs,
            graph,
            records,
            events: Vec::new(),
            created_at: Utc::now(),
            cancelled: false,
        };
        state.log(format!(
            "execution '{}' created with {} job(s)",
            state.name,
            state.defs.len()
        ));
        Ok(state)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.defs.get(id)
    }

    pub fn record(&self, id: &str) -> Option<&JobExecution> {
        self.records.get(id)
    }

    pub fn job_count(&self) -> usize {
        self.defs.len()
    }

    pub fn running_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == JobStatus::Running)
            .count()
    }

    /// Whether no job remains `pending`/`running`.
    pub fn is_settled(&self) -> bool {
        !self
            .records
            .values()
            .any(|r| matches!(r.status, JobStatus::Pending | JobStatus::Running))
    }

    /// Snapshot of terminal outputs, for handing to a dispatched worker.
    pub fn outputs_snapshot(&self) -> Arc<HashMap<JobId, Value>> {
        let map = self
            .records
            .values()
            .filter_map(|r| {
                r.output
                    .as_ref()
                    .map(|out| (r.job_id.clone(), out.clone()))
            })
            .collect();
        Arc::new(map)
    }

    fn deps_satisfied(&self, id: &str) -> bool {
        self.graph.dependencies_of(id).iter().all(|dep| {
            self.records
                .get(dep)
                .is_some_and(|r| r.status.satisfies_dependents())
        })
    }

    /// Collect up to `limit` pending jobs whose dependencies are all
    /// terminal-successful, mark them `running`, and return their ids.
    ///
    /// Candidates are sorted by id so dispatch order is deterministic.
    pub fn take_ready(&mut self, limit: usize) -> Vec<JobId> {
        if limit == 0 {
            return Vec::new();
        }

        // Decide first, then mutate.
        let mut candidates: Vec<JobId> = self
            .records
            .values()
            .filter(|r| r.status == JobStatus::Pending && self.deps_satisfied(&r.job_id))
            .map(|r| r.job_id.clone())
            .collect();
        candidates.sort();
        candidates.truncate(limit);

        for id in &candidates {
            if let Some(record) = self.records.get_mut(id) {
                record.status = JobStatus::Running;
                record.started_at = Some(Utc::now());
            }
            debug!(execution = %self.id, job = %id, "dependencies satisfied; marking running");
            self.log(format!("job '{id}' started"));
        }

        candidates
    }

    /// Apply a worker's terminal outcome.
    ///
    /// Only `running` records accept an outcome; anything else (e.g. a
    /// worker racing an execution-level cancellation) is dropped, keeping
    /// the at-most-one-outcome invariant.
    pub fn apply_outcome(&mut self, event: WorkerEvent) {
        let WorkerEvent {
            job_id,
            attempts,
            outcome,
        } = event;

        let Some(record) = self.records.get_mut(&job_id) else {
            warn!(execution = %self.id, job = %job_id, "outcome for unknown job; ignoring");
            return;
        };
        if record.status != JobStatus::Running {
            debug!(
                execution = %self.id,
                job = %job_id,
                status = ?record.status,
                "outcome for non-running job; ignoring"
            );
            return;
        }

        record.attempts = attempts;
        record.finished_at = Some(Utc::now());

        match outcome {
            JobOutcome::Completed { output } => {
                record.status = JobStatus::Completed;
                record.output = Some(output);
                self.log(format!("job '{job_id}' completed ({attempts} attempt(s))"));
            }
            JobOutcome::Skipped { output } => {
                record.status = JobStatus::Skipped;
                record.output = Some(output);
                self.log(format!("job '{job_id}' skipped: condition not met"));
            }
            JobOutcome::Failed { error } => {
                record.status = JobStatus::Failed;
                record.error = Some(error.clone());
                self.log(format!("job '{job_id}' failed: {error}"));
                self.cancel_dependents_of(&job_id, "failed");
            }
            JobOutcome::Cancelled { reason } => {
                record.status = JobStatus::Cancelled;
                record.error = Some(reason.clone());
                self.log(format!("job '{job_id}' cancelled: {reason}"));
                self.cancel_dependents_of(&job_id, "was cancelled");
            }
        }
    }

    /// Cascade: mark every pending transitive dependent of `job_id` as
    /// cancelled. Dependents can only be pending here, since their
    /// dependency never became terminal-successful.
    fn cancel_dependents_of(&mut self, job_id: &str, verb: &str) {
        for dependent in self.graph.transitive_dependents_of(job_id) {
            let Some(record) = self.records.get_mut(&dependent) else {
                continue;
            };
            if record.status == JobStatus::Pending {
                record.status = JobStatus::Cancelled;
                record.error = Some(format!("upstream job '{job_id}' {verb}"));
                record.finished_at = Some(Utc::now());
                self.log(format!(
                    "job '{dependent}' cancelled: upstream job '{job_id}' {verb}"
                ));
            }
        }
    }

    /// Execution-level cancellation: mark every pending job cancelled.
    /// Running jobs keep their workers, which observe the cancellation
    /// token and report their own terminal outcome.
    pub fn cancel_pending(&mut self, reason: &str) {
        self.cancelled = true;
        self.log(format!("execution cancelled: {reason}"));

        let pending: Vec<JobId> = self
            .records
            .values()
            .filter(|r| r.status == JobStatus::Pending)
            .map(|r| r.job_id.clone())
            .collect();

        for id in pending {
            if let Some(record) = self.records.get_mut(&id) {
                record.status = JobStatus::Cancelled;
                record.error = Some(reason.to_string());
                record.finished_at = Some(Utc::now());
            }
            self.log(format!("job '{id}' cancelled: {reason}"));
        }
    }

    fn overall_status(&self) -> ExecutionStatus {
        if self.cancelled {
            return ExecutionStatus::Cancelled;
        }
        if self
            .records
            .values()
            .all(|r| r.status.satisfies_dependents())
        {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }

    /// Finalize into the public [`Execution`] view.
    pub fn finish(mut self) -> Execution {
        let status = self.overall_status();
        self.log(format!("execution finished: {status:?}"));

        Execution {
            id: self.id,
            name: self.name,
            status,
            jobs: self.records,
            events: self.events,
            created_at: self.created_at,
            finished_at: Some(Utc::now()),
        }
    }

    fn log(&mut self, message: String) {
        self.events.push(ExecutionEvent {
            at: Utc::now(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(id: &str, deps: &[&str]) -> Job {
        let mut j = Job::new(id, "noop");
        for d in deps {
            j = j.depends_on(*d);
        }
        j
    }

    fn completed(job_id: &str, output: Value) -> WorkerEvent {
        WorkerEvent {
            job_id: job_id.to_string(),
            attempts: 1,
            outcome: JobOutcome::Completed { output },
        }
    }

    fn failed(job_id: &str, error: &str) -> WorkerEvent {
        WorkerEvent {
            job_id: job_id.to_string(),
            attempts: 1,
            outcome: JobOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    #[test]
    fn ready_set_respects_dependencies() {
        let mut state =
            ExecutionState::new("t", vec![job("a", &[]), job("b", &["a"]), job("c", &[])])
                .unwrap();

        let ready = state.take_ready(usize::MAX);
        assert_eq!(ready, vec!["a".to_string(), "c".to_string()]);
        // b stays pending until a is terminal.
        assert_eq!(state.record("b").unwrap().status, JobStatus::Pending);

        state.apply_outcome(completed("a", json!({})));
        assert_eq!(state.take_ready(usize::MAX), vec!["b".to_string()]);
    }

    #[test]
    fn take_ready_honours_fanout_limit() {
        let mut state = ExecutionState::new(
            "t",
            vec![job("a", &[]), job("b", &[]), job("c", &[])],
        )
        .unwrap();

        assert_eq!(state.take_ready(2).len(), 2);
        assert_eq!(state.running_count(), 2);
        assert_eq!(state.take_ready(2).len(), 1);
    }

    #[test]
    fn skipped_satisfies_dependents() {
        let mut state =
            ExecutionState::new("t", vec![job("a", &[]), job("b", &["a"])]).unwrap();

        state.take_ready(usize::MAX);
        state.apply_outcome(WorkerEvent {
            job_id: "a".to_string(),
            attempts: 0,
            outcome: JobOutcome::Skipped {
                output: json!({"skipped": true, "reason": "condition not met"}),
            },
        });

        assert_eq!(state.take_ready(usize::MAX), vec!["b".to_string()]);
    }

    #[test]
    fn failure_cascades_to_transitive_dependents_only() {
        let mut state = ExecutionState::new(
            "t",
            vec![
                job("a", &[]),
                job("b", &["a"]),
                job("c", &["b"]),
                job("other", &[]),
            ],
        )
        .unwrap();

        state.take_ready(usize::MAX);
        state.apply_outcome(failed("a", "boom"));

        assert_eq!(state.record("b").unwrap().status, JobStatus::Cancelled);
        assert_eq!(state.record("c").unwrap().status, JobStatus::Cancelled);
        assert!(
            state
                .record("b")
                .unwrap()
                .error
                .as_deref()
                .unwrap()
                .contains("upstream job 'a' failed")
        );
        // Sibling branch unaffected.
        assert_eq!(state.record("other").unwrap().status, JobStatus::Running);

        state.apply_outcome(completed("other", json!({})));
        assert!(state.is_settled());
        assert_eq!(state.finish().status, ExecutionStatus::Failed);
    }

    #[test]
    fn second_outcome_for_a_job_is_ignored() {
        let mut state = ExecutionState::new("t", vec![job("a", &[])]).unwrap();
        state.take_ready(usize::MAX);

        state.apply_outcome(completed("a", json!({"first": true})));
        state.apply_outcome(failed("a", "late failure"));

        let record = state.record("a").unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.output, Some(json!({"first": true})));
        assert!(record.error.is_none());
    }

    #[test]
    fn cancel_pending_marks_execution_cancelled() {
        let mut state =
            ExecutionState::new("t", vec![job("a", &[]), job("b", &["a"])]).unwrap();
        state.take_ready(usize::MAX);

        state.cancel_pending("execution cancelled");
        assert_eq!(state.record("b").unwrap().status, JobStatus::Cancelled);
        // a is still running; its worker reports the final outcome.
        assert!(!state.is_settled());

        state.apply_outcome(WorkerEvent {
            job_id: "a".to_string(),
            attempts: 1,
            outcome: JobOutcome::Cancelled {
                reason: "execution cancelled".to_string(),
            },
        });
        assert!(state.is_settled());
        assert_eq!(state.finish().status, ExecutionStatus::Cancelled);
    }

    #[test]
    fn outputs_snapshot_contains_only_produced_outputs() {
        let mut state =
            ExecutionState::new("t", vec![job("a", &[]), job("b", &[])]).unwrap();
        state.take_ready(usize::MAX);
        state.apply_outcome(completed("a", json!({"ok": true})));

        let snapshot = state.outputs_snapshot();
        assert_eq!(snapshot.get("a"), Some(&json!({"ok": true})));
        assert!(!snapshot.contains_key("b"));
    }

    #[test]
    fn empty_graph_settles_immediately_as_completed() {
        let state = ExecutionState::new("t", Vec::new()).unwrap();
        assert!(state.is_settled());
        assert_eq!(state.finish().status, ExecutionStatus::Completed);
    }

    #[test]
    fn event_log_records_transitions() {
        let mut state = ExecutionState::new("t", vec![job("a", &[])]).unwrap();
        state.take_ready(usize::MAX);
        state.apply_outcome(failed("a", "boom"));

        let execution = state.finish();
        let log: Vec<&str> = execution.events.iter().map(|e| e.message.as_str()).collect();
        assert!(log.iter().any(|m| m.contains("job 'a' started")));
        assert!(log.iter().any(|m| m.contains("job 'a' failed: boom")));
        assert!(log.iter().any(|m| m.contains("execution finished")));
    }
}
