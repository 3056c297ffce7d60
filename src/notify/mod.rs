// src/notify/mod.rs

//! Multi-channel approver notifications.
//!
//! The [`MultiChannelNotifier`] fans a rendered message out to every
//! registered channel concurrently and retries failed deliveries with a
//! bounded budget. Delivery state is tracked per channel per request so
//! one channel's outage never hides another's success.

pub mod channels;
pub mod service;
pub mod template;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;

pub use channels::chat::ChatChannel;
pub use channels::inapp::{InAppChannel, InAppEntry, InAppFeed};
pub use channels::webhook::WebhookChannel;
pub use service::{MultiChannelNotifier, NotificationStore, NotifyRetry};
pub use template::Templates;

/// Delivery state of one notification on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

/// One tracked delivery attempt record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub request_id: String,
    pub channel: String,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message rendered once and delivered to every channel.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub request_id: String,
    pub subject: String,
    /// Plain-text body, for channels without markup.
    pub plain: String,
    /// Chat-flavoured markdown body.
    pub chat: String,
    pub recipients: Vec<String>,
    /// Structured payload for machine consumers (webhooks).
    pub payload: Value,
}

/// A delivery backend: webhook endpoint, chat workspace, in-app feed.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn deliver<'a>(&'a self, message: &'a RenderedMessage) -> BoxFuture<'a, Result<()>>;
}
