// src/approval/store.rs

//! In-memory approval request store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::approval::types::{ApprovalRequest, ApprovalStatus, AuditLogEntry};
use crate::errors::{GatedagError, Result};

#[derive(Debug, Default)]
struct StoreInner {
    requests: HashMap<String, ApprovalRequest>,
    audit: Vec<AuditLogEntry>,
}

/// Process-local request store guarded by a single mutex.
///
/// All read-modify-write sequences on a request happen inside one lock
/// acquisition via [`MemoryApprovalStore::with_request_mut`], which is
/// what makes a racing human decision and a timeout resolve
/// first-writer-wins.
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    inner: Mutex<StoreInner>,
}

impl MemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: ApprovalRequest, entry: AuditLogEntry) {
        let mut inner = self.lock();
        inner.requests.insert(request.id.clone(), request);
        inner.audit.push(entry);
    }

    pub fn get(&self, request_id: &str) -> Result<ApprovalRequest> {
        self.lock()
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| GatedagError::RequestNotFound(request_id.to_string()))
    }

    /// Mutate one request and append audit entries atomically.
    ///
    /// The closure observes the current request under the store lock and
    /// returns the audit entries describing what it changed.
    pub fn with_request_mut<T>(
        &self,
        request_id: &str,
        f: impl FnOnce(&mut ApprovalRequest) -> Result<(T, Vec<AuditLogEntry>)>,
    ) -> Result<T> {
        let mut inner = self.lock();
        let request = inner
            .requests
            .get_mut(request_id)
            .ok_or_else(|| GatedagError::RequestNotFound(request_id.to_string()))?;
        let (value, entries) = f(request)?;
        inner.audit.extend(entries);
        Ok(value)
    }

    /// Pending requests the given actor may decide, oldest first.
    pub fn list_pending_for(&self, actor: &str) -> Vec<ApprovalRequest> {
        let inner = self.lock();
        let mut pending: Vec<ApprovalRequest> = inner
            .requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending && r.is_authorized(actor))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    /// Pending requests whose deadline has passed as of `now`.
    pub fn list_pending_expired(&self, now: DateTime<Utc>) -> Vec<ApprovalRequest> {
        self.lock()
            .requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending && r.timeout_at <= now)
            .cloned()
            .collect()
    }

    /// Pending requests belonging to one execution.
    pub fn list_pending_for_execution(&self, execution_id: &str) -> Vec<ApprovalRequest> {
        self.lock()
            .requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending && r.execution_id == execution_id)
            .cloned()
            .collect()
    }

    pub fn list_all(&self) -> Vec<ApprovalRequest> {
        self.lock().requests.values().cloned().collect()
    }

    /// Audit trail of one request in insertion order.
    pub fn audit_for(&self, request_id: &str) -> Vec<AuditLogEntry> {
        self.lock()
            .audit
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Lock poisoning would mean a panic while holding the guard;
        // the store has no invariant a half-applied closure could break
        // that matters more than continuing to serve.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
