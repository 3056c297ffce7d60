// src/handlers/approval.rs

//! Approval gate job handler.
//!
//! Running an approval job creates a pending request and then waits,
//! indefinitely if configured so, until a human decision, a timeout
//! action or a cancellation resolves it. The job's outcome mirrors the
//! request's terminal status.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::approval::types::{ApprovalSpec, ApprovalStatus, TimeoutAction};
use crate::approval::ApprovalManager;
use crate::errors::{GatedagError, Result};
use crate::handlers::registry::JobHandler;
use crate::handlers::JobContext;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One day. Applies when a gate's config names no deadline.
const DEFAULT_TIMEOUT_MS: u64 = 86_400_000;

#[derive(Debug, Deserialize)]
struct ApprovalJobConfig {
    title: String,
    #[serde(default)]
    description: String,
    approvers: Vec<String>,
    #[serde(default = "default_min_approvers")]
    require_min_approvers: u32,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    timeout_action: TimeoutAction,
    #[serde(default)]
    escalate_to: Option<String>,
    #[serde(default)]
    context: Value,
    #[serde(default)]
    requested_by: Option<String>,
}

fn default_min_approvers() -> u32 {
    1
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Suspends its job until the approval request it creates is resolved.
#[derive(Debug, Clone)]
pub struct ApprovalHandler {
    manager: ApprovalManager,
    poll_interval: Duration,
}

impl ApprovalHandler {
    pub fn new(manager: ApprovalManager) -> Self {
        Self {
            manager,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl JobHandler for ApprovalHandler {
    fn execute(&self, config: Value, ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        let manager = self.manager.clone();
        let poll_interval = self.poll_interval;
        Box::pin(async move {
            let config: ApprovalJobConfig = serde_json::from_value(config).map_err(|err| {
                GatedagError::Config(format!("invalid approval config: {err}"))
            })?;

            let request = manager.create_request(ApprovalSpec {
                execution_id: ctx.execution_id.clone(),
                job_id: ctx.job_id.clone(),
                title: config.title,
                description: config.description,
                context: config.context,
                approvers: config.approvers,
                require_min_approvers: config.require_min_approvers,
                timeout_ms: config.timeout_ms,
                timeout_action: config.timeout_action,
                escalate_to: config.escalate_to,
                requested_by: config.requested_by,
            })?;
            let request_id = request.id.clone();

            info!(
                execution = %ctx.execution_id,
                job = %ctx.job_id,
                request = %request_id,
                "approval gate waiting for decision"
            );

            // The worker may drop this future without ever polling it
            // again once the execution's token fires, so a guard task
            // also owns the request cleanup. When the poller observes the
            // cancellation itself it cancels the request before returning;
            // the guard covers the dropped-future case.
            let guard = spawn_cancel_guard(manager.clone(), request_id.clone(), ctx.clone());

            let result = wait_for_resolution(&manager, &request_id, &ctx, poll_interval).await;
            guard.abort();
            result
        })
    }
}

fn spawn_cancel_guard(
    manager: ApprovalManager,
    request_id: String,
    ctx: JobContext,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        ctx.cancel.cancelled().await;
        cancel_request(&manager, &request_id);
    })
}

fn cancel_request(manager: &ApprovalManager, request_id: &str) {
    match manager.cancel(request_id, "runner") {
        Ok(_) => {
            debug!(request = %request_id, "cancelled approval request for aborted execution");
        }
        // Already resolved; nothing to clean up.
        Err(GatedagError::RequestNotPending { .. })
        | Err(GatedagError::RequestNotFound(_)) => {}
        Err(err) => {
            debug!(request = %request_id, error = %err, "approval cleanup failed");
        }
    }
}

async fn wait_for_resolution(
    manager: &ApprovalManager,
    request_id: &str,
    ctx: &JobContext,
    poll_interval: Duration,
) -> Result<Value> {
    loop {
        let request = manager.get(request_id)?;
        match request.status {
            ApprovalStatus::Pending => {}
            ApprovalStatus::Approved => {
                return Ok(json!({
                    "approved": true,
                    "request_id": request.id,
                    "decisions": request.decisions,
                }));
            }
            ApprovalStatus::Rejected => {
                let rejection = request
                    .decisions
                    .iter()
                    .rev()
                    .find(|d| d.verdict == crate::approval::Verdict::Reject);
                let by = rejection
                    .map(|d| d.approver_id.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let mut message = format!("request '{}' rejected by {by}", request.id);
                if let Some(comment) = rejection.and_then(|d| d.comment.as_deref()) {
                    message.push_str(&format!(": {comment}"));
                }
                return Err(GatedagError::ApprovalRejected(message));
            }
            ApprovalStatus::Expired => {
                return Err(GatedagError::ApprovalExpired(request.id));
            }
            ApprovalStatus::Cancelled => {
                return Err(GatedagError::JobCancelled(format!(
                    "approval request '{}' was cancelled",
                    request.id
                )));
            }
        }

        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                cancel_request(manager, request_id);
                return Err(GatedagError::JobCancelled(
                    "execution cancelled".to_string(),
                ));
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}
