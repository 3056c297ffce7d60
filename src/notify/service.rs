// src/notify/service.rs

//! Delivery tracking, retry and multi-channel fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::approval::types::ApprovalRequest;
use crate::errors::{GatedagError, Result};
use crate::notify::template::Templates;
use crate::notify::{DeliveryStatus, Notification, NotificationChannel, RenderedMessage};

/// Retry budget applied to each channel independently.
#[derive(Debug, Clone, Copy)]
pub struct NotifyRetry {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for NotifyRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

/// In-memory delivery records keyed by notification id.
#[derive(Debug, Default)]
pub struct NotificationStore {
    inner: Mutex<HashMap<String, Notification>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, notification: Notification) {
        self.lock().insert(notification.id.clone(), notification);
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut Notification)) {
        if let Some(notification) = self.lock().get_mut(id) {
            f(notification);
            notification.updated_at = Utc::now();
        }
    }

    /// All delivery records for one approval request.
    pub fn for_request(&self, request_id: &str) -> Vec<Notification> {
        let mut records: Vec<Notification> = self
            .lock()
            .values()
            .filter(|n| n.request_id == request_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Mark a sent notification as read. Only `Sent` records transition.
    pub fn mark_read(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        let notification = inner
            .get_mut(id)
            .ok_or_else(|| GatedagError::RequestNotFound(id.to_string()))?;
        if notification.status == DeliveryStatus::Sent {
            notification.status = DeliveryStatus::Read;
            notification.updated_at = Utc::now();
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Notification>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Fans messages out to every registered channel concurrently.
///
/// Each channel gets its own retry loop and delivery record; the fan-out
/// completes when every channel has either succeeded or exhausted its
/// retry budget.
pub struct MultiChannelNotifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    templates: Templates,
    retry: NotifyRetry,
    store: Arc<NotificationStore>,
}

impl std::fmt::Debug for MultiChannelNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiChannelNotifier")
            .field(
                "channels",
                &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("retry", &self.retry)
            .finish()
    }
}

impl MultiChannelNotifier {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            templates: Templates,
            retry: NotifyRetry::default(),
            store: Arc::new(NotificationStore::new()),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_retry(mut self, retry: NotifyRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub async fn notify_request_created(&self, request: &ApprovalRequest) {
        let message = self.templates.request_created(request);
        self.fan_out(message).await;
    }

    pub async fn notify_request_resolved(&self, request: &ApprovalRequest) {
        let message = self.templates.request_resolved(request);
        self.fan_out(message).await;
    }

    pub async fn notify_escalated(&self, request: &ApprovalRequest, target: &str) {
        let message = self.templates.escalation(request, target);
        self.fan_out(message).await;
    }

    /// Deliver one message to every channel, retrying per channel.
    pub async fn fan_out(&self, message: RenderedMessage) {
        let deliveries = self
            .channels
            .iter()
            .map(|channel| self.deliver_with_retry(Arc::clone(channel), message.clone()));
        join_all(deliveries).await;
    }

    async fn deliver_with_retry(
        &self,
        channel: Arc<dyn NotificationChannel>,
        message: RenderedMessage,
    ) {
        let now = Utc::now();
        let notification_id = uuid::Uuid::new_v4().to_string();
        self.store.insert(Notification {
            id: notification_id.clone(),
            request_id: message.request_id.clone(),
            channel: channel.name().to_string(),
            recipient: message.recipients.join(","),
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        });

        for attempt in 1..=self.retry.max_attempts {
            match channel.deliver(&message).await {
                Ok(()) => {
                    debug!(
                        channel = channel.name(),
                        request = %message.request_id,
                        attempt,
                        "notification delivered"
                    );
                    self.store.update(&notification_id, |n| {
                        n.status = DeliveryStatus::Sent;
                        n.attempts = attempt;
                        n.last_error = None;
                    });
                    return;
                }
                Err(err) => {
                    warn!(
                        channel = channel.name(),
                        request = %message.request_id,
                        attempt,
                        error = %err,
                        "notification delivery failed"
                    );
                    self.store.update(&notification_id, |n| {
                        n.status = DeliveryStatus::Failed;
                        n.attempts = attempt;
                        n.last_error = Some(err.to_string());
                    });
                    if attempt < self.retry.max_attempts && self.retry.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.retry.delay_ms)).await;
                    }
                }
            }
        }
    }
}

impl Default for MultiChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}
