// src/notify/channels/inapp.rs

//! In-app notification feed: one entry per recipient, queryable and
//! markable as read.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::errors::{GatedagError, Result};
use crate::notify::{NotificationChannel, RenderedMessage};

#[derive(Debug, Clone, Serialize)]
pub struct InAppEntry {
    pub id: String,
    pub request_id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Shared feed backing the in-app channel.
#[derive(Debug, Default)]
pub struct InAppFeed {
    entries: Mutex<Vec<InAppEntry>>,
}

impl InAppFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: InAppEntry) {
        self.lock().push(entry);
    }

    /// Entries addressed to one recipient, newest first.
    pub fn for_recipient(&self, recipient: &str) -> Vec<InAppEntry> {
        let mut entries: Vec<InAppEntry> = self
            .lock()
            .iter()
            .filter(|e| e.recipient == recipient)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub fn unread_count(&self, recipient: &str) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.recipient == recipient && !e.read)
            .count()
    }

    pub fn mark_read(&self, entry_id: &str) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| GatedagError::RequestNotFound(entry_id.to_string()))?;
        entry.read = true;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<InAppEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Channel that appends one feed entry per recipient. Never fails.
#[derive(Debug, Clone)]
pub struct InAppChannel {
    feed: Arc<InAppFeed>,
}

impl InAppChannel {
    pub fn new(feed: Arc<InAppFeed>) -> Self {
        Self { feed }
    }

    pub fn feed(&self) -> &Arc<InAppFeed> {
        &self.feed
    }
}

impl NotificationChannel for InAppChannel {
    fn name(&self) -> &str {
        "in_app"
    }

    fn deliver<'a>(&'a self, message: &'a RenderedMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let now = Utc::now();
            for recipient in &message.recipients {
                self.feed.push(InAppEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    request_id: message.request_id.clone(),
                    recipient: recipient.clone(),
                    subject: message.subject.clone(),
                    body: message.plain.clone(),
                    read: false,
                    created_at: now,
                });
            }
            Ok(())
        })
    }
}
