// src/approval/manager.rs

//! Approval request lifecycle operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::approval::store::MemoryApprovalStore;
use crate::approval::types::{
    ApprovalDecision, ApprovalRequest, ApprovalSpec, ApprovalStatus, AuditAction, AuditLogEntry,
    SYSTEM_ACTOR, TimeoutAction, Verdict,
};
use crate::errors::{GatedagError, Result};
use crate::notify::MultiChannelNotifier;

/// Aggregate counters over a set of requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApprovalStatistics {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub expired: usize,
    /// Mean seconds from creation to resolution, over resolved requests.
    pub avg_decision_secs: Option<f64>,
}

/// Single mutation path for approval requests.
///
/// Every transition goes through the store's closure-based mutation, so
/// the pending-status guard and the audit append are atomic. Whichever
/// of a human decision, a cancellation or a timeout reaches the store
/// first wins; the others observe a terminal status and fail with
/// [`GatedagError::RequestNotPending`].
#[derive(Debug, Clone)]
pub struct ApprovalManager {
    store: Arc<MemoryApprovalStore>,
    notifier: Option<Arc<MultiChannelNotifier>>,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryApprovalStore::new()),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<MultiChannelNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<MemoryApprovalStore> {
        &self.store
    }

    /// Create a pending request and notify its approvers.
    ///
    /// Notification delivery runs on a background task; a channel outage
    /// never blocks or fails the requesting job.
    pub fn create_request(&self, spec: ApprovalSpec) -> Result<ApprovalRequest> {
        if spec.approvers.is_empty() {
            return Err(GatedagError::Config(
                "approval request requires at least one approver".to_string(),
            ));
        }
        if spec.require_min_approvers < 1 {
            return Err(GatedagError::Config(
                "require_min_approvers must be at least 1".to_string(),
            ));
        }
        if (spec.require_min_approvers as usize) > spec.approvers.len() {
            return Err(GatedagError::Config(format!(
                "require_min_approvers ({}) exceeds approver count ({})",
                spec.require_min_approvers,
                spec.approvers.len()
            )));
        }

        let requested_by = spec.requested_by.clone().unwrap_or_else(|| "system".into());
        let request = ApprovalRequest::from_spec(spec);
        let entry = AuditLogEntry::new(&request.id, &requested_by, AuditAction::Created);
        self.store.insert(request.clone(), entry);

        info!(
            request = %request.id,
            execution = %request.execution_id,
            job = %request.job_id,
            approvers = request.approvers.len(),
            "approval request created"
        );

        if let Some(notifier) = &self.notifier {
            let notifier = Arc::clone(notifier);
            let request = request.clone();
            tokio::spawn(async move {
                notifier.notify_request_created(&request).await;
            });
        }

        Ok(request)
    }

    /// Record one approver's verdict.
    ///
    /// Returns the request after the decision. A single rejection is
    /// terminal; approvals accumulate until `require_min_approvers` is
    /// reached.
    pub fn decide(
        &self,
        request_id: &str,
        actor: &str,
        verdict: Verdict,
        comment: Option<String>,
    ) -> Result<ApprovalRequest> {
        let request = self.store.with_request_mut(request_id, |request| {
            if request.status != ApprovalStatus::Pending {
                return Err(GatedagError::RequestNotPending {
                    request: request.id.clone(),
                    status: request.status.to_string(),
                });
            }
            if !request.is_authorized(actor) {
                return Err(GatedagError::NotAuthorized {
                    approver: actor.to_string(),
                    request: request.id.clone(),
                });
            }
            if request.has_decision_from(actor) {
                return Err(GatedagError::DuplicateDecision {
                    approver: actor.to_string(),
                    request: request.id.clone(),
                });
            }

            let now = Utc::now();
            request.decisions.push(ApprovalDecision {
                approver_id: actor.to_string(),
                verdict,
                comment: comment.clone(),
                decided_at: now,
            });

            let mut entries = vec![AuditLogEntry::new(
                &request.id,
                actor,
                AuditAction::Decided { verdict, comment },
            )];

            match verdict {
                Verdict::Reject => {
                    request.status = ApprovalStatus::Rejected;
                    request.resolved_at = Some(now);
                    entries.push(AuditLogEntry::new(&request.id, actor, AuditAction::Rejected));
                }
                Verdict::Approve if request.approvals() >= request.require_min_approvers => {
                    request.status = ApprovalStatus::Approved;
                    request.resolved_at = Some(now);
                    entries.push(AuditLogEntry::new(&request.id, actor, AuditAction::Approved));
                }
                Verdict::Approve => {}
            }

            Ok((request.clone(), entries))
        })?;

        info!(
            request = %request.id,
            actor,
            verdict = ?verdict,
            status = %request.status,
            "approval decision recorded"
        );

        if request.status.is_terminal() {
            self.notify_resolved(&request);
        }
        Ok(request)
    }

    /// Cancel a pending request, e.g. because its execution was aborted.
    pub fn cancel(&self, request_id: &str, actor: &str) -> Result<ApprovalRequest> {
        let request = self.store.with_request_mut(request_id, |request| {
            if request.status != ApprovalStatus::Pending {
                return Err(GatedagError::RequestNotPending {
                    request: request.id.clone(),
                    status: request.status.to_string(),
                });
            }
            request.status = ApprovalStatus::Cancelled;
            request.resolved_at = Some(Utc::now());
            let entry = AuditLogEntry::new(&request.id, actor, AuditAction::Cancelled);
            Ok((request.clone(), vec![entry]))
        })?;

        info!(request = %request.id, actor, "approval request cancelled");
        self.notify_resolved(&request);
        Ok(request)
    }

    /// Cancel every pending request belonging to one execution.
    pub fn cancel_for_execution(&self, execution_id: &str, actor: &str) -> Vec<ApprovalRequest> {
        let mut cancelled = Vec::new();
        for request in self.store.list_pending_for_execution(execution_id) {
            match self.cancel(&request.id, actor) {
                Ok(request) => cancelled.push(request),
                // Lost the race against a decision; nothing to undo.
                Err(GatedagError::RequestNotPending { .. }) => {}
                Err(err) => {
                    warn!(request = %request.id, error = %err, "cancel failed");
                }
            }
        }
        cancelled
    }

    /// Whether a request's deadline has passed, without mutating it.
    pub fn check_timeout(&self, request_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let request = self.store.get(request_id)?;
        Ok(request.status == ApprovalStatus::Pending && request.timeout_at <= now)
    }

    /// Apply timeout actions to every overdue pending request.
    ///
    /// Returns the requests that were resolved. Requests decided between
    /// the overdue scan and the mutation are skipped.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<ApprovalRequest> {
        let mut resolved = Vec::new();
        for overdue in self.store.list_pending_expired(now) {
            match self.apply_timeout(&overdue.id, now) {
                Ok(request) => {
                    info!(
                        request = %request.id,
                        job = %request.job_id,
                        action = ?request.timeout_action,
                        status = %request.status,
                        "approval request timed out"
                    );
                    resolved.push(request);
                }
                Err(GatedagError::RequestNotPending { .. }) => {}
                Err(err) => {
                    warn!(request = %overdue.id, error = %err, "timeout handling failed");
                }
            }
        }
        resolved
    }

    fn apply_timeout(&self, request_id: &str, now: DateTime<Utc>) -> Result<ApprovalRequest> {
        let request = self.store.with_request_mut(request_id, |request| {
            if request.status != ApprovalStatus::Pending {
                return Err(GatedagError::RequestNotPending {
                    request: request.id.clone(),
                    status: request.status.to_string(),
                });
            }
            // Re-check under the lock; a decision may have landed after
            // the overdue scan.
            if request.timeout_at > now {
                return Err(GatedagError::RequestNotPending {
                    request: request.id.clone(),
                    status: request.status.to_string(),
                });
            }

            let mut entries = Vec::new();
            match request.timeout_action {
                TimeoutAction::Approve | TimeoutAction::Reject => {
                    let verdict = match request.timeout_action {
                        TimeoutAction::Approve => Verdict::Approve,
                        _ => Verdict::Reject,
                    };
                    let comment = Some("timed out".to_string());
                    request.decisions.push(ApprovalDecision {
                        approver_id: SYSTEM_ACTOR.to_string(),
                        verdict,
                        comment: comment.clone(),
                        decided_at: now,
                    });
                    entries.push(AuditLogEntry::new(
                        &request.id,
                        SYSTEM_ACTOR,
                        AuditAction::Decided { verdict, comment },
                    ));
                    // Timeout approval is a forced resolution and does
                    // not count against require_min_approvers.
                    let (status, action) = match verdict {
                        Verdict::Approve => (ApprovalStatus::Approved, AuditAction::Approved),
                        Verdict::Reject => (ApprovalStatus::Rejected, AuditAction::Rejected),
                    };
                    request.status = status;
                    entries.push(AuditLogEntry::new(&request.id, SYSTEM_ACTOR, action));
                }
                TimeoutAction::Escalate => {
                    request.status = ApprovalStatus::Expired;
                    entries.push(AuditLogEntry::new(
                        &request.id,
                        SYSTEM_ACTOR,
                        AuditAction::Escalated {
                            target: request.escalate_to.clone(),
                        },
                    ));
                }
            }
            request.resolved_at = Some(now);
            Ok((request.clone(), entries))
        })?;

        if request.status == ApprovalStatus::Expired {
            if let (Some(notifier), Some(target)) = (&self.notifier, request.escalate_to.clone()) {
                let notifier = Arc::clone(notifier);
                let request = request.clone();
                tokio::spawn(async move {
                    notifier.notify_escalated(&request, &target).await;
                });
            }
        } else {
            self.notify_resolved(&request);
        }
        Ok(request)
    }

    pub fn get(&self, request_id: &str) -> Result<ApprovalRequest> {
        self.store.get(request_id)
    }

    /// Pending requests the given actor may decide, oldest first.
    pub fn pending_for_user(&self, actor: &str) -> Vec<ApprovalRequest> {
        self.store.list_pending_for(actor)
    }

    pub fn audit_for(&self, request_id: &str) -> Vec<AuditLogEntry> {
        self.store.audit_for(request_id)
    }

    /// Counters over requests created inside `range` (inclusive start,
    /// exclusive end); `None` bounds are open.
    pub fn statistics(
        &self,
        range: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    ) -> ApprovalStatistics {
        let (from, to) = range;
        let mut stats = ApprovalStatistics::default();
        let mut decision_secs = Vec::new();

        for request in self.store.list_all() {
            if from.is_some_and(|from| request.created_at < from)
                || to.is_some_and(|to| request.created_at >= to)
            {
                continue;
            }
            stats.total += 1;
            match request.status {
                ApprovalStatus::Pending => stats.pending += 1,
                ApprovalStatus::Approved => stats.approved += 1,
                ApprovalStatus::Rejected => stats.rejected += 1,
                ApprovalStatus::Cancelled => stats.cancelled += 1,
                ApprovalStatus::Expired => stats.expired += 1,
            }
            if let Some(resolved_at) = request.resolved_at {
                let elapsed = (resolved_at - request.created_at).num_milliseconds();
                decision_secs.push(elapsed.max(0) as f64 / 1000.0);
            }
        }

        if !decision_secs.is_empty() {
            stats.avg_decision_secs =
                Some(decision_secs.iter().sum::<f64>() / decision_secs.len() as f64);
        }
        stats
    }

    fn notify_resolved(&self, request: &ApprovalRequest) {
        if let Some(notifier) = &self.notifier {
            let notifier = Arc::clone(notifier);
            let request = request.clone();
            tokio::spawn(async move {
                notifier.notify_request_resolved(&request).await;
            });
        }
    }
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::replay_status;
    use serde_json::json;

    fn spec(approvers: &[&str], min: u32) -> ApprovalSpec {
        ApprovalSpec {
            execution_id: "exec-1".into(),
            job_id: "deploy-gate".into(),
            title: "Deploy to production".into(),
            description: "v2.3.1".into(),
            context: json!({"version": "2.3.1"}),
            approvers: approvers.iter().map(|s| s.to_string()).collect(),
            require_min_approvers: min,
            timeout_ms: 60_000,
            timeout_action: TimeoutAction::default(),
            escalate_to: None,
            requested_by: Some("ci".into()),
        }
    }

    #[tokio::test]
    async fn single_approval_resolves() {
        let manager = ApprovalManager::new();
        let request = manager.create_request(spec(&["alice"], 1)).unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);

        let request = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Approved);
        assert!(request.resolved_at.is_some());
    }

    #[tokio::test]
    async fn requires_min_approvers() {
        let manager = ApprovalManager::new();
        let request = manager
            .create_request(spec(&["alice", "bob", "carol"], 2))
            .unwrap();

        let request = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);

        let request = manager
            .decide(&request.id, "bob", Verdict::Approve, None)
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn one_rejection_is_terminal() {
        let manager = ApprovalManager::new();
        let request = manager
            .create_request(spec(&["alice", "bob", "carol"], 3))
            .unwrap();

        manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap();
        let request = manager
            .decide(&request.id, "bob", Verdict::Reject, Some("not yet".into()))
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Rejected);

        let err = manager
            .decide(&request.id, "carol", Verdict::Approve, None)
            .unwrap_err();
        assert!(matches!(err, GatedagError::RequestNotPending { .. }));
    }

    #[tokio::test]
    async fn rejects_unauthorized_and_duplicate_actors() {
        let manager = ApprovalManager::new();
        let request = manager.create_request(spec(&["alice", "bob"], 2)).unwrap();

        let err = manager
            .decide(&request.id, "mallory", Verdict::Approve, None)
            .unwrap_err();
        assert!(matches!(err, GatedagError::NotAuthorized { .. }));

        manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap();
        let err = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap_err();
        assert!(matches!(err, GatedagError::DuplicateDecision { .. }));
    }

    #[tokio::test]
    async fn validates_spec() {
        let manager = ApprovalManager::new();
        assert!(manager.create_request(spec(&[], 1)).is_err());
        assert!(manager.create_request(spec(&["alice"], 0)).is_err());
        assert!(manager.create_request(spec(&["alice"], 2)).is_err());
    }

    #[tokio::test]
    async fn timeout_reject_resolves_with_system_decision() {
        let manager = ApprovalManager::new();
        let mut s = spec(&["alice"], 1);
        s.timeout_ms = 0;
        let request = manager.create_request(s).unwrap();

        let resolved = manager.expire_overdue(Utc::now());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, ApprovalStatus::Rejected);
        assert_eq!(resolved[0].decisions[0].approver_id, SYSTEM_ACTOR);

        // The racing human decision loses.
        let err = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap_err();
        assert!(matches!(err, GatedagError::RequestNotPending { .. }));
    }

    #[tokio::test]
    async fn check_timeout_is_read_only() {
        let manager = ApprovalManager::new();
        let mut s = spec(&["alice"], 1);
        s.timeout_ms = 0;
        let request = manager.create_request(s).unwrap();

        let now = Utc::now();
        assert!(manager.check_timeout(&request.id, now).unwrap());
        // Checking reports the overdue deadline without resolving it.
        assert_eq!(
            manager.get(&request.id).unwrap().status,
            ApprovalStatus::Pending
        );

        manager.expire_overdue(now);
        let resolved = manager.get(&request.id).unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Rejected);
        let audit_len = manager.audit_for(&request.id).len();

        // Re-checking a resolved request reports false and never mutates it.
        for _ in 0..3 {
            assert!(!manager.check_timeout(&request.id, Utc::now()).unwrap());
        }
        let after = manager.get(&request.id).unwrap();
        assert_eq!(after.status, ApprovalStatus::Rejected);
        assert_eq!(after.decisions.len(), resolved.decisions.len());
        assert_eq!(manager.audit_for(&request.id).len(), audit_len);
    }

    #[tokio::test]
    async fn timeout_escalate_expires() {
        let manager = ApprovalManager::new();
        let mut s = spec(&["alice"], 1);
        s.timeout_ms = 0;
        s.timeout_action = TimeoutAction::Escalate;
        s.escalate_to = Some("oncall".into());
        let request = manager.create_request(s).unwrap();

        let resolved = manager.expire_overdue(Utc::now());
        assert_eq!(resolved[0].status, ApprovalStatus::Expired);
        assert!(resolved[0].decisions.is_empty());

        let audit = manager.audit_for(&request.id);
        assert!(audit.iter().any(|e| matches!(
            &e.action,
            AuditAction::Escalated { target: Some(t) } if t == "oncall"
        )));
    }

    #[tokio::test]
    async fn cancel_for_execution_skips_resolved() {
        let manager = ApprovalManager::new();
        let a = manager.create_request(spec(&["alice"], 1)).unwrap();
        let b = manager.create_request(spec(&["alice"], 1)).unwrap();
        manager.decide(&a.id, "alice", Verdict::Approve, None).unwrap();

        let cancelled = manager.cancel_for_execution("exec-1", "runner");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, b.id);
        assert_eq!(
            manager.get(&a.id).unwrap().status,
            ApprovalStatus::Approved
        );
    }

    #[tokio::test]
    async fn audit_replay_matches_final_status() {
        let manager = ApprovalManager::new();
        let request = manager.create_request(spec(&["alice", "bob"], 2)).unwrap();
        manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .unwrap();
        manager
            .decide(&request.id, "bob", Verdict::Approve, Some("lgtm".into()))
            .unwrap();

        let audit = manager.audit_for(&request.id);
        assert_eq!(replay_status(&audit), Some(ApprovalStatus::Approved));
    }

    #[tokio::test]
    async fn statistics_counts_by_status() {
        let manager = ApprovalManager::new();
        let a = manager.create_request(spec(&["alice"], 1)).unwrap();
        let b = manager.create_request(spec(&["alice"], 1)).unwrap();
        manager.create_request(spec(&["alice"], 1)).unwrap();
        manager.decide(&a.id, "alice", Verdict::Approve, None).unwrap();
        manager.decide(&b.id, "alice", Verdict::Reject, None).unwrap();

        let stats = manager.statistics((None, None));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.pending, 1);
        assert!(stats.avg_decision_secs.is_some());
    }
}
