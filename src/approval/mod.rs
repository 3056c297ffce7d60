// src/approval/mod.rs

//! Approval gate subsystem.
//!
//! An approval request is created exclusively by the approval job handler
//! when its owning job starts running, and mutated exclusively through
//! the [`ApprovalManager`] (decision, cancellation, expiry). Every state
//! transition is recorded in an append-only audit log; replaying that log
//! reconstructs a request's final status.
//!
//! The [`TimeoutWatcher`] arbitrates requests nobody decided in time,
//! applying the configured timeout action through the same manager, so a
//! racing human decision and a timeout resolve first-writer-wins.

pub mod manager;
pub mod store;
pub mod types;
pub mod watcher;

pub use manager::{ApprovalManager, ApprovalStatistics};
pub use store::MemoryApprovalStore;
pub use types::{
    ApprovalDecision, ApprovalRequest, ApprovalSpec, ApprovalStatus, AuditAction, AuditLogEntry,
    SYSTEM_ACTOR, TimeoutAction, Verdict, replay_status,
};
pub use watcher::TimeoutWatcher;
