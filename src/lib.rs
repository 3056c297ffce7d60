// src/lib.rs

//! gatedag: a dependency-aware job runner with human approval gates.
//!
//! Jobs form a DAG and run in topological order with bounded
//! parallelism. A job may carry a data-dependent condition that skips it,
//! and the `approval` job type suspends an execution until approvers
//! decide, with configurable timeout behaviour and multi-channel
//! notifications.

pub mod approval;
pub mod cli;
pub mod condition;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod handlers;
pub mod logging;
pub mod notify;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::approval::{ApprovalManager, TimeoutWatcher};
use crate::cli::CliArgs;
use crate::engine::{Engine, EngineOptions, Execution, ExecutionStatus};
use crate::errors::Result;
use crate::graph::Job;
use crate::handlers::{ApprovalHandler, CommandHandler, HandlerRegistry};
use crate::notify::{ChatChannel, InAppChannel, InAppFeed, MultiChannelNotifier, WebhookChannel};

/// Wire up the runtime and execute the configured graph.
///
/// Returns the finished execution; callers decide how to map its status
/// to an exit code.
pub async fn run(args: CliArgs) -> Result<Execution> {
    let graph_file = config::load_and_validate(&args.config)?;
    let jobs = graph_file.jobs();

    if args.dry_run {
        print_plan(&graph_file.execution.name, &jobs);
        return Ok(Execution {
            id: String::new(),
            name: graph_file.execution.name.clone(),
            status: ExecutionStatus::Completed,
            jobs: std::collections::HashMap::new(),
            events: Vec::new(),
            created_at: chrono::Utc::now(),
            finished_at: None,
        });
    }

    let mut notifier = MultiChannelNotifier::new()
        .with_channel(Arc::new(InAppChannel::new(Arc::new(InAppFeed::new()))));
    if let Some(url) = &args.webhook_url {
        notifier = notifier.with_channel(Arc::new(WebhookChannel::new(url.clone())));
    }
    if let Some(url) = &args.chat_webhook_url {
        notifier = notifier.with_channel(Arc::new(ChatChannel::new(url.clone())));
    }

    let manager = ApprovalManager::new().with_notifier(Arc::new(notifier));

    let shutdown = CancellationToken::new();
    let watcher = TimeoutWatcher::new(manager.clone()).spawn(shutdown.clone());

    // Ctrl-C cancels the execution; running jobs and pending approval
    // requests wind down through the same token.
    let cancel = shutdown.child_token();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling execution");
                cancel.cancel();
            }
        });
    }

    let mut registry = HandlerRegistry::new();
    registry.register("command", Arc::new(CommandHandler::new()));
    registry.register("approval", Arc::new(ApprovalHandler::new(manager.clone())));

    let engine = Engine::new(registry).with_options(EngineOptions {
        max_parallel: graph_file.execution.max_parallel,
    });

    let execution = engine
        .execute_with_cancel(&graph_file.execution.name, jobs, cancel)
        .await?;

    // Approval requests orphaned by failed siblings get cleaned up here.
    manager.cancel_for_execution(&execution.id, "runner");
    shutdown.cancel();
    let _ = watcher.await;

    report(&execution);
    Ok(execution)
}

/// Print the validated execution plan as dependency waves.
///
/// Callers pass an already-validated job set, so the wave partition
/// below always terminates.
fn print_plan(name: &str, jobs: &[Job]) {
    println!("execution '{name}': {} job(s)", jobs.len());

    let mut remaining: Vec<&Job> = jobs.iter().collect();
    let mut done: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut wave_no = 0;
    while !remaining.is_empty() {
        let (wave, rest): (Vec<&Job>, Vec<&Job>) = remaining
            .into_iter()
            .partition(|job| job.depends_on.iter().all(|d| done.contains(d.as_str())));
        wave_no += 1;
        let mut ids: Vec<&str> = wave.iter().map(|j| j.id.as_str()).collect();
        ids.sort_unstable();
        println!("  wave {wave_no}: {}", ids.join(", "));
        for job in wave {
            done.insert(job.id.as_str());
        }
        remaining = rest;
    }
}

fn report(execution: &Execution) {
    for job in execution.jobs.values() {
        info!(job = %job.job_id, status = ?job.status, attempts = job.attempts, "job finished");
    }
    match execution.status {
        ExecutionStatus::Completed => info!(execution = %execution.id, "execution completed"),
        status => error!(execution = %execution.id, status = ?status, "execution did not complete"),
    }
}
