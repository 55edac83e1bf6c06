//! Recipient settings store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{NotificationKind, TrackedEntity, UserSettings};
use crate::storage::SettingsStorage;

/// All recipients' settings, rewritten whole on every mutation.
///
/// Mutations only touch the recipient they name. Save failures are
/// logged; the in-memory state stays authoritative for the process.
pub struct SettingsStore {
    storage: Arc<dyn SettingsStorage>,
    users: BTreeMap<i64, UserSettings>,
}

impl SettingsStore {
    /// Load settings; a load failure starts with no recipients.
    pub async fn open(storage: Arc<dyn SettingsStorage>) -> Self {
        let users = storage.load_settings().await.unwrap_or_else(|e| {
            log::error!("Settings load failed, starting empty: {}", e);
            Vec::new()
        });
        let users = users.into_iter().map(|u| (u.chat_id, u)).collect();
        Self { storage, users }
    }

    pub fn get(&self, chat_id: i64) -> Option<&UserSettings> {
        self.users.get(&chat_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserSettings> {
        self.users.values()
    }

    /// Settings of a recipient, created with defaults on first contact.
    pub async fn get_or_create(&mut self, chat_id: i64) -> UserSettings {
        if let Some(settings) = self.users.get(&chat_id) {
            return settings.clone();
        }
        let settings = UserSettings::new(chat_id);
        self.users.insert(chat_id, settings.clone());
        self.persist().await;
        settings
    }

    /// Point a recipient at a group.
    pub async fn set_group(&mut self, chat_id: i64, group_name: &str, group_id: &str) {
        let settings = self
            .users
            .entry(chat_id)
            .or_insert_with(|| UserSettings::new(chat_id));
        settings.group_name = Some(group_name.to_string());
        settings.group_id = Some(group_id.to_string());
        self.persist().await;
    }

    /// Flip a notification toggle, returning the new state.
    pub async fn toggle(&mut self, chat_id: i64, kind: NotificationKind) -> bool {
        let settings = self
            .users
            .entry(chat_id)
            .or_insert_with(|| UserSettings::new(chat_id));
        let enabled = !settings.is_enabled(kind);
        settings.set_enabled(kind, enabled);
        self.persist().await;
        enabled
    }

    /// Remember a pinned message.
    ///
    /// Once more than `max_pinned` are tracked the oldest is dropped and
    /// returned so the caller can unpin it.
    pub async fn record_pinned(
        &mut self,
        chat_id: i64,
        message_id: i64,
        max_pinned: usize,
    ) -> Option<i64> {
        let settings = self
            .users
            .entry(chat_id)
            .or_insert_with(|| UserSettings::new(chat_id));
        settings.pinned_messages.push(message_id);

        let unpinned = if settings.pinned_messages.len() > max_pinned {
            Some(settings.pinned_messages.remove(0))
        } else {
            None
        };
        self.persist().await;
        unpinned
    }

    /// Distinct groups with at least one recipient subscribed to `kind`.
    ///
    /// The display name comes from the first such recipient.
    pub fn subscribed_entities(&self, kind: NotificationKind) -> Vec<TrackedEntity> {
        let mut entities: Vec<TrackedEntity> = Vec::new();
        for settings in self.users.values().filter(|s| s.is_enabled(kind)) {
            let Some(group_id) = settings.group_id.as_deref() else {
                continue;
            };
            if entities.iter().any(|e| e.id == group_id) {
                continue;
            }
            entities.push(TrackedEntity::group(
                group_id,
                settings.group_name.clone().unwrap_or_default(),
            ));
        }
        entities
    }

    /// Recipients of `group_id` with `kind` enabled.
    pub fn recipients_for(&self, group_id: &str, kind: NotificationKind) -> Vec<i64> {
        self.users
            .values()
            .filter(|s| s.is_enabled(kind) && s.group_id.as_deref() == Some(group_id))
            .map(|s| s.chat_id)
            .collect()
    }

    async fn persist(&self) {
        let users: Vec<UserSettings> = self.users.values().cloned().collect();
        if let Err(e) = self.storage.save_settings(&users).await {
            log::error!("Settings save failed: {}", e);
        }
    }
}
