// src/notify/channels/webhook.rs

//! Generic webhook delivery: POSTs the structured payload as JSON.

use futures::future::BoxFuture;
use tracing::debug;

use crate::errors::{GatedagError, Result};
use crate::notify::{NotificationChannel, RenderedMessage};

#[derive(Debug, Clone)]
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn deliver<'a>(&'a self, message: &'a RenderedMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&message.payload)
                .send()
                .await
                .map_err(|err| GatedagError::NotificationDelivery {
                    channel: "webhook".to_string(),
                    message: err.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GatedagError::NotificationDelivery {
                    channel: "webhook".to_string(),
                    message: format!("endpoint returned {status}: {body}"),
                });
            }

            debug!(request = %message.request_id, "webhook delivered");
            Ok(())
        })
    }
}
