//! Message delivery with pin rotation.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::Event;
use crate::services::Notifier;
use crate::services::format::{MAX_MESSAGE_LEN, split_long_message};
use crate::storage::SettingsStore;

/// Sends messages and keeps each chat's pinned set bounded.
#[derive(Clone)]
pub struct Delivery {
    notifier: Arc<dyn Notifier>,
    settings: Arc<Mutex<SettingsStore>>,
    max_pinned: usize,
}

impl Delivery {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        settings: Arc<Mutex<SettingsStore>>,
        max_pinned: usize,
    ) -> Self {
        Self {
            notifier,
            settings,
            max_pinned,
        }
    }

    /// Send text in as many parts as needed and pin the first one.
    ///
    /// Returns whether every part was delivered.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> bool {
        let mut first = None;
        for part in split_long_message(text, MAX_MESSAGE_LEN) {
            match self.notifier.send_text(chat_id, &part).await {
                Ok(id) => {
                    first.get_or_insert(id);
                }
                Err(e) => {
                    log::error!("Delivery to chat {} failed: {}", chat_id, e);
                    return false;
                }
            }
        }
        if let Some(id) = first {
            self.pin(chat_id, id).await;
        }
        true
    }

    /// Send a schedule digest and pin it.
    pub async fn send_digest(&self, chat_id: i64, title: &str, events: &[Event]) -> bool {
        match self.notifier.send_digest(chat_id, title, events).await {
            Ok(id) => {
                self.pin(chat_id, id).await;
                true
            }
            Err(e) => {
                log::error!("Digest delivery to chat {} failed: {}", chat_id, e);
                false
            }
        }
    }

    async fn pin(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.notifier.pin(chat_id, message_id).await {
            log::error!("Pin failed in chat {}: {}", chat_id, e);
            return;
        }

        let oldest = self
            .settings
            .lock()
            .await
            .record_pinned(chat_id, message_id, self.max_pinned)
            .await;

        if let Some(oldest) = oldest {
            if let Err(e) = self.notifier.unpin(chat_id, oldest).await {
                log::warn!("Unpin of #{} in chat {} failed: {}", oldest, chat_id, e);
            }
        }
    }
}
