// src/services/notifier.rs

//! Outbound delivery to chat recipients.
//!
//! The chat platform itself lives outside this crate; jobs talk to it
//! through [`Notifier`].

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use super::format::{MAX_MESSAGE_LEN, format_schedule, split_long_message};
use crate::error::Result;
use crate::models::Event;

/// Delivery channel for change reports and digests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one HTML message, returning its message id.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64>;

    /// Pin a delivered message silently.
    async fn pin(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Unpin a previously pinned message.
    async fn unpin(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Send a schedule digest, returning the id of its first message.
    ///
    /// Renders the events as text by default; platforms that render
    /// images override this.
    async fn send_digest(&self, chat_id: i64, title: &str, events: &[Event]) -> Result<i64> {
        let text = format_schedule(title, events);
        let mut first = None;
        for part in split_long_message(&text, MAX_MESSAGE_LEN) {
            let id = self.send_text(chat_id, &part).await?;
            first.get_or_insert(id);
        }
        Ok(first.unwrap_or_default())
    }
}

/// Notifier that writes every message to the log.
///
/// Used by the CLI when no chat transport is wired in.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicI64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("[chat {}] message #{}:\n{}", chat_id, id, text);
        Ok(id)
    }

    async fn pin(&self, chat_id: i64, message_id: i64) -> Result<()> {
        log::debug!("[chat {}] pin #{}", chat_id, message_id);
        Ok(())
    }

    async fn unpin(&self, chat_id: i64, message_id: i64) -> Result<()> {
        log::debug!("[chat {}] unpin #{}", chat_id, message_id);
        Ok(())
    }
}
