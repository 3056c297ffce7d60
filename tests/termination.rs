// tests/termination.rs

//! Property: every execution over a valid DAG settles, with every job
//! terminal.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use gatedag::engine::{Engine, ExecutionStatus};
use gatedag::errors::{GatedagError, Result};
use gatedag::graph::Job;
use gatedag::handlers::{HandlerRegistry, JobContext, JobHandler};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Succeeds or fails depending on a bit baked into the job config.
struct BitHandler;

impl JobHandler for BitHandler {
    fn execute(&self, config: Value, _ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            if config["fail"].as_bool().unwrap_or(false) {
                Err(GatedagError::HandlerExecution("forced failure".into()))
            } else {
                Ok(json!({"ok": true}))
            }
        })
    }
}

/// Acyclic by construction: job `n` may only depend on jobs `0..n`.
fn arb_dag() -> impl Strategy<Value = Vec<Job>> {
    (1usize..12).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..3), n);
        let failures = proptest::collection::vec(any::<bool>(), n);
        (deps, failures).prop_map(|(deps, failures)| {
            deps.into_iter()
                .zip(failures)
                .enumerate()
                .map(|(i, (dep_picks, fail))| {
                    let mut seen = HashSet::new();
                    let mut job = Job::new(format!("job-{i}"), "bit")
                        .with_config(json!({"fail": fail}));
                    for pick in dep_picks {
                        if i == 0 {
                            continue;
                        }
                        let dep = pick.index(i);
                        if seen.insert(dep) {
                            job = job.depends_on(format!("job-{dep}"));
                        }
                    }
                    job
                })
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_dags_always_settle(jobs in arb_dag()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let execution = runtime.block_on(async {
            let mut registry = HandlerRegistry::new();
            registry.register("bit", Arc::new(BitHandler));
            Engine::new(registry).execute("prop", jobs).await
        }).unwrap();

        // Settlement: the run returned, every job is terminal, and the
        // overall status is itself terminal.
        prop_assert_ne!(execution.status, ExecutionStatus::Running);
        for job in execution.jobs.values() {
            prop_assert!(job.status.is_terminal(), "job {} not terminal", job.job_id);
        }
    }

    #[test]
    fn failed_jobs_never_have_completed_dependents(jobs in arb_dag()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let deps: Vec<(String, Vec<String>)> = jobs
            .iter()
            .map(|j| (j.id.clone(), j.depends_on.clone()))
            .collect();

        let execution = runtime.block_on(async {
            let mut registry = HandlerRegistry::new();
            registry.register("bit", Arc::new(BitHandler));
            Engine::new(registry).execute("prop", jobs).await
        }).unwrap();

        for (id, dep_ids) in deps {
            let record = execution.job(&id).unwrap();
            if record.status.satisfies_dependents() {
                for dep in dep_ids {
                    prop_assert!(
                        execution.job(&dep).unwrap().status.satisfies_dependents(),
                        "job {} ran although dependency {} did not satisfy it",
                        id,
                        dep
                    );
                }
            }
        }
    }
}
