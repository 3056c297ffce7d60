// tests/graph_file.rs

//! Loading and validating graph files from disk.

use std::path::Path;

use gatedag::condition::Condition;
use gatedag::config::{GraphFile, load_and_validate, load_from_path};

#[test]
fn demo_release_pipeline_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/release.toml");
    let graph = load_and_validate(&path).unwrap();

    assert_eq!(graph.execution.name, "release");
    assert_eq!(graph.execution.max_parallel, 4);

    let jobs = graph.jobs();
    assert_eq!(jobs.len(), 6);

    let gate = jobs.iter().find(|j| j.id == "prod-gate").unwrap();
    assert_eq!(gate.job_type, "approval");
    assert_eq!(gate.depends_on, vec!["smoke-tests"]);
    assert_eq!(gate.config["require_min_approvers"], 2);
    assert_eq!(gate.config["timeout_action"], "escalate");
    assert!(matches!(gate.condition, Some(Condition::Expr(_))));

    let smoke = jobs.iter().find(|j| j.id == "smoke-tests").unwrap();
    assert_eq!(smoke.retry.unwrap().max_attempts, 3);
    assert_eq!(smoke.retry.unwrap().backoff_ms, 5000);

    let tests = jobs.iter().find(|j| j.id == "unit-tests").unwrap();
    assert_eq!(tests.timeout_ms, Some(600_000));
}

#[test]
fn validation_failure_carries_the_offending_job() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/release.toml");
    let mut raw = load_from_path(&path).unwrap();

    // Break one dependency and expect the gate to name it.
    raw.job.get_mut("prod-deploy").unwrap().depends_on = vec!["no-such-job".into()];
    let err = GraphFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("no-such-job"));
}
