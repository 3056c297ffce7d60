// crates/test-utils/src/builders.rs

//! Compact job-graph builders for tests.

use gatedag::condition::Condition;
use gatedag::graph::{Job, RetryPolicy};
use serde_json::Value;

/// A `fake`-typed job with no dependencies.
pub fn job(id: &str) -> Job {
    Job::new(id, "fake")
}

/// A `fake`-typed job depending on each id in `deps`.
pub fn job_after(id: &str, deps: &[&str]) -> Job {
    let mut job = job(id);
    for dep in deps {
        job = job.depends_on(*dep);
    }
    job
}

pub fn job_with_config(id: &str, config: Value) -> Job {
    job(id).with_config(config)
}

pub fn job_with_condition(id: &str, deps: &[&str], condition: Condition) -> Job {
    job_after(id, deps).with_condition(condition)
}

pub fn job_with_retries(id: &str, max_attempts: u32) -> Job {
    job(id).with_retry(RetryPolicy {
        max_attempts,
        backoff_ms: 0,
    })
}

/// A linear chain `a -> b -> c -> ...` over the given ids.
pub fn chain(ids: &[&str]) -> Vec<Job> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            if i == 0 {
                job(id)
            } else {
                job_after(id, &[ids[i - 1]])
            }
        })
        .collect()
}

/// A diamond: `root` fans out to `left`/`right` which join into `sink`.
pub fn diamond() -> Vec<Job> {
    vec![
        job("root"),
        job_after("left", &["root"]),
        job_after("right", &["root"]),
        job_after("sink", &["left", "right"]),
    ]
}
