// src/approval/types.rs

//! Approval request, decision and audit types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synthetic actor used when the timeout watcher decides on behalf of a
/// request whose deadline passed.
pub const SYSTEM_ACTOR: &str = "system:timeout";

/// Lifecycle status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        self != ApprovalStatus::Pending
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Cancelled => "cancelled",
            ApprovalStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// An individual approver's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

/// What the timeout watcher does when `timeout_at` passes undecided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    Approve,
    #[default]
    Reject,
    /// Neither approve nor reject: mark `expired` and notify the
    /// escalation target.
    Escalate,
}

/// Input for creating an approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSpec {
    pub execution_id: String,
    pub job_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Arbitrary context payload shown to approvers.
    #[serde(default)]
    pub context: Value,
    /// Actor ids eligible to decide.
    pub approvers: Vec<String>,
    #[serde(default = "default_min_approvers")]
    pub require_min_approvers: u32,
    pub timeout_ms: u64,
    #[serde(default)]
    pub timeout_action: TimeoutAction,
    #[serde(default)]
    pub escalate_to: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
}

fn default_min_approvers() -> u32 {
    1
}

/// A recorded decision by one approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver_id: String,
    pub verdict: Verdict,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// A persisted approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub execution_id: String,
    pub job_id: String,
    pub title: String,
    pub description: String,
    pub context: Value,
    pub approvers: Vec<String>,
    pub require_min_approvers: u32,
    pub status: ApprovalStatus,
    pub timeout_at: DateTime<Utc>,
    pub timeout_action: TimeoutAction,
    pub escalate_to: Option<String>,
    pub requested_by: Option<String>,
    pub decisions: Vec<ApprovalDecision>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn from_spec(spec: ApprovalSpec) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: spec.execution_id,
            job_id: spec.job_id,
            title: spec.title,
            description: spec.description,
            context: spec.context,
            approvers: spec.approvers,
            require_min_approvers: spec.require_min_approvers.max(1),
            status: ApprovalStatus::Pending,
            timeout_at: now + Duration::milliseconds(spec.timeout_ms as i64),
            timeout_action: spec.timeout_action,
            escalate_to: spec.escalate_to,
            requested_by: spec.requested_by,
            decisions: Vec::new(),
            created_at: now,
            resolved_at: None,
        }
    }

    /// Count of recorded approvals.
    pub fn approvals(&self) -> u32 {
        self.decisions
            .iter()
            .filter(|d| d.verdict == Verdict::Approve)
            .count() as u32
    }

    /// Eligible approvers plus synthetic system actors.
    pub fn is_authorized(&self, actor: &str) -> bool {
        actor.starts_with("system:") || self.approvers.iter().any(|a| a == actor)
    }

    pub fn has_decision_from(&self, actor: &str) -> bool {
        self.decisions.iter().any(|d| d.approver_id == actor)
    }
}

/// Audit trail action kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Decided {
        verdict: Verdict,
        comment: Option<String>,
    },
    Approved,
    Rejected,
    Cancelled,
    Expired,
    Escalated {
        target: Option<String>,
    },
}

/// Immutable record of one state transition on an approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub request_id: String,
    pub actor: String,
    #[serde(flatten)]
    pub action: AuditAction,
    pub at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(request_id: &str, actor: &str, action: AuditAction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            actor: actor.to_string(),
            action,
            at: Utc::now(),
        }
    }
}

/// Reconstruct a request's final status from its audit trail.
///
/// Returns `None` for an empty trail. Used to verify that the audit log
/// is a complete record of the request lifecycle.
pub fn replay_status(entries: &[AuditLogEntry]) -> Option<ApprovalStatus> {
    let mut status = None;
    for entry in entries {
        status = Some(match entry.action {
            AuditAction::Created => ApprovalStatus::Pending,
            AuditAction::Decided { .. } => status.unwrap_or(ApprovalStatus::Pending),
            AuditAction::Approved => ApprovalStatus::Approved,
            AuditAction::Rejected => ApprovalStatus::Rejected,
            AuditAction::Cancelled => ApprovalStatus::Cancelled,
            AuditAction::Expired | AuditAction::Escalated { .. } => ApprovalStatus::Expired,
        });
    }
    status
}
