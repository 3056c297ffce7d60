// src/notify/channels/chat.rs

//! Chat delivery via an incoming-webhook URL (Slack-compatible).
//!
//! Sends the markdown body as `{"text": ...}`, the shape Slack and
//! Mattermost incoming webhooks accept.

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use crate::errors::{GatedagError, Result};
use crate::notify::{NotificationChannel, RenderedMessage};

#[derive(Debug, Clone)]
pub struct ChatChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl ChatChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl NotificationChannel for ChatChannel {
    fn name(&self) -> &str {
        "chat"
    }

    fn deliver<'a>(&'a self, message: &'a RenderedMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = json!({ "text": message.chat });
            let response = self
                .client
                .post(&self.webhook_url)
                .json(&body)
                .send()
                .await
                .map_err(|err| GatedagError::NotificationDelivery {
                    channel: "chat".to_string(),
                    message: err.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(GatedagError::NotificationDelivery {
                    channel: "chat".to_string(),
                    message: format!("chat webhook returned {status}"),
                });
            }

            debug!(request = %message.request_id, "chat message delivered");
            Ok(())
        })
    }
}
