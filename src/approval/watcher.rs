// src/approval/watcher.rs

//! Background deadline sweep for pending approval requests.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::approval::manager::ApprovalManager;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Periodically applies timeout actions to overdue requests.
///
/// The watcher is the only writer of timeout outcomes; it goes through
/// [`ApprovalManager::expire_overdue`], so a request decided between two
/// sweeps is left alone.
#[derive(Debug, Clone)]
pub struct TimeoutWatcher {
    manager: ApprovalManager,
    interval: Duration,
}

impl TimeoutWatcher {
    pub fn new(manager: ApprovalManager) -> Self {
        Self {
            manager,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the sweep loop; it runs until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately, catching requests that
            // were already overdue at startup.
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("timeout watcher stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let resolved = self.manager.expire_overdue(Utc::now());
                        if !resolved.is_empty() {
                            debug!(count = resolved.len(), "sweep resolved overdue requests");
                        }
                    }
                }
            }
        })
    }

    /// One synchronous sweep, for callers that manage their own timing.
    pub fn sweep_once(&self) -> usize {
        self.manager.expire_overdue(Utc::now()).len()
    }
}
