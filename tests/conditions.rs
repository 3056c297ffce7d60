// tests/conditions.rs

//! Conditional branching through the engine.

use std::sync::Arc;

use futures::future::BoxFuture;
use gatedag::condition::{Condition, ConditionEvaluator, ExprCondition, Operator, PredicateRegistry};
use gatedag::engine::{Engine, ExecutionStatus, JobStatus};
use gatedag::errors::Result;
use gatedag::handlers::{HandlerRegistry, JobContext, JobHandler};
use gatedag_test_utils::builders::{job_after, job_with_condition};
use gatedag_test_utils::fake_handlers::RecordingHandler;
use gatedag_test_utils::{init_tracing, with_timeout};
use serde_json::{Value, json};

struct FixedOutput(Value);

impl JobHandler for FixedOutput {
    fn execute(&self, _config: Value, _ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        let output = self.0.clone();
        Box::pin(async move { Ok(output) })
    }
}

fn registry_with(output: Value) -> (HandlerRegistry, Arc<RecordingHandler>) {
    let recorder = RecordingHandler::new();
    let mut registry = HandlerRegistry::new();
    registry.register("fixed", Arc::new(FixedOutput(output)));
    registry.register("fake", recorder.clone());
    (registry, recorder)
}

#[tokio::test]
async fn false_condition_skips_but_execution_completes() {
    init_tracing();
    let (registry, recorder) = registry_with(json!({"ok": false}));

    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], Condition::output_eq("a", "ok", json!(true))),
    ];
    let execution = with_timeout(Engine::new(registry).execute("skip", jobs))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.job("b").unwrap().status, JobStatus::Skipped);
    assert_eq!(execution.job("b").unwrap().attempts, 0);
    assert!(recorder.invocations().is_empty());

    let output = execution.job("b").unwrap().output.as_ref().unwrap();
    assert_eq!(output["skipped"], true);
}

#[tokio::test]
async fn skipped_job_still_satisfies_its_dependents() {
    init_tracing();
    let (registry, recorder) = registry_with(json!({"ok": false}));

    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], Condition::output_eq("a", "ok", json!(true))),
        job_after("c", &["b"]),
    ];
    let execution = with_timeout(Engine::new(registry).execute("skip-chain", jobs))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.job("c").unwrap().status, JobStatus::Completed);
    assert_eq!(recorder.invocations(), vec!["c"]);
}

#[tokio::test]
async fn true_condition_runs_the_job() {
    init_tracing();
    let (registry, recorder) = registry_with(json!({"ok": true, "count": 5}));

    let condition = Condition::All {
        conditions: vec![
            Condition::output_eq("a", "ok", json!(true)),
            Condition::Expr(ExprCondition {
                job: "a".into(),
                path: "count".into(),
                op: Operator::Gt,
                value: Some(json!(3)),
            }),
        ],
    };
    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], condition),
    ];
    let execution = with_timeout(Engine::new(registry).execute("run", jobs))
        .await
        .unwrap();

    assert_eq!(execution.job("b").unwrap().status, JobStatus::Completed);
    assert_eq!(recorder.invocations(), vec!["b"]);
}

#[tokio::test]
async fn nested_path_over_missing_output_reads_null() {
    init_tracing();
    let (registry, _) = registry_with(json!({"nested": {"deep": 1}}));

    // "a.nested.other" does not exist, so eq against null holds.
    let condition = Condition::Expr(ExprCondition {
        job: "a".into(),
        path: "nested.other".into(),
        op: Operator::Eq,
        value: Some(Value::Null),
    });
    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], condition),
    ];
    let execution = with_timeout(Engine::new(registry).execute("nulls", jobs))
        .await
        .unwrap();

    assert_eq!(execution.job("b").unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn condition_evaluation_error_fails_the_job() {
    init_tracing();
    let (registry, recorder) = registry_with(json!({"name": "release-1"}));

    // Invalid regex makes the evaluation itself fail.
    let condition = Condition::Expr(ExprCondition {
        job: "a".into(),
        path: "name".into(),
        op: Operator::Matches,
        value: Some(json!("[unclosed")),
    });
    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], condition),
    ];
    let execution = with_timeout(Engine::new(registry).execute("bad-regex", jobs))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.job("b").unwrap().status, JobStatus::Failed);
    assert!(recorder.invocations().is_empty());
    let error = execution.job("b").unwrap().error.as_ref().unwrap();
    assert!(error.contains("Condition evaluation"));
}

#[tokio::test]
async fn named_predicates_gate_jobs() {
    init_tracing();
    let (registry, recorder) = registry_with(json!({"env": "staging"}));

    let mut predicates = PredicateRegistry::new();
    predicates.register_fn("env_is", |params: Value, ctx: JobContext| async move {
        let wanted = params["env"].as_str().unwrap_or_default().to_string();
        let actual = ctx
            .job_output("a")
            .and_then(|v| v.get("env"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(wanted == actual)
    });

    let condition = Condition::Predicate {
        name: "env_is".into(),
        params: json!({"env": "production"}),
    };
    let jobs = vec![
        gatedag::graph::Job::new("a", "fixed"),
        job_with_condition("b", &["a"], condition),
    ];
    let engine = Engine::new(registry).with_evaluator(ConditionEvaluator::with_predicates(predicates));
    let execution = with_timeout(engine.execute("predicate", jobs))
        .await
        .unwrap();

    // staging != production: skipped, not failed.
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.job("b").unwrap().status, JobStatus::Skipped);
    assert_eq!(recorder.invocations(), Vec::<String>::new());
}
