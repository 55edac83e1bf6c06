//! Baseline cache owned by the change detector.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Change, Event};
use crate::pipeline::detect_changes;
use crate::storage::{CacheSnapshot, CacheStore};

/// Last known event list per tracked entity id.
///
/// Loaded once at startup and written back whole after every cycle that
/// replaces a baseline. A baseline, once stored non-empty, is only ever
/// replaced.
pub struct ScheduleCache {
    store: Arc<dyn CacheStore>,
    entries: CacheSnapshot,
}

impl ScheduleCache {
    /// Load the cache from `store`. A load failure starts empty.
    pub async fn open(store: Arc<dyn CacheStore>) -> Self {
        let entries = store.load().await.unwrap_or_else(|e| {
            log::error!("Cache load failed, starting with an empty cache: {}", e);
            CacheSnapshot::new()
        });
        log::info!("Schedule cache loaded: {} entities", entries.len());
        Self { store, entries }
    }

    /// Stored baseline of an entity.
    pub fn baseline(&self, entity_id: &str) -> Option<&[Event]> {
        self.entries.get(entity_id).map(Vec::as_slice)
    }

    /// Whether a non-empty baseline exists.
    pub fn has_baseline(&self, entity_id: &str) -> bool {
        self.baseline(entity_id).is_some_and(|events| !events.is_empty())
    }

    /// Whether the entity has been baselined at all, even to an empty list.
    pub fn is_tracked(&self, entity_id: &str) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare `new_events` with the baseline and replace it if needed.
    ///
    /// The first non-empty observation of an entity only establishes the
    /// baseline and reports nothing. A baseline later emptied by
    /// cancellations stays tracked, so lessons reappearing in it are
    /// reported as added. Never fails; save errors are logged.
    pub async fn update_and_detect_changes(
        &mut self,
        entity_id: &str,
        new_events: Vec<Event>,
    ) -> Vec<Change> {
        self.update_and_detect_changes_at(entity_id, new_events, Utc::now())
            .await
    }

    /// [`Self::update_and_detect_changes`] with an explicit evaluation time.
    pub async fn update_and_detect_changes_at(
        &mut self,
        entity_id: &str,
        new_events: Vec<Event>,
        now: DateTime<Utc>,
    ) -> Vec<Change> {
        if !self.is_tracked(entity_id) && !new_events.is_empty() {
            log::info!(
                "Baseline established for {}: {} events",
                entity_id,
                new_events.len()
            );
            self.entries.insert(entity_id.to_string(), new_events);
            self.persist().await;
            return Vec::new();
        }

        let old_events = self.baseline(entity_id).unwrap_or_default();
        let diff = detect_changes(old_events, &new_events, now);

        if diff.should_persist() {
            let (added, removed, modified) = diff.counts();
            log::info!(
                "{}: {} added, {} removed, {} modified ({} -> {} events)",
                entity_id,
                added,
                removed,
                modified,
                diff.old_count,
                diff.new_count
            );
            self.entries.insert(entity_id.to_string(), new_events);
            self.persist().await;
        }

        diff.changes
    }

    /// Record `events` as the baseline of an entity nothing tracks yet.
    ///
    /// Returns false, leaving the cache alone, when the entity already has
    /// a baseline or `events` is empty. An existing baseline is only ever
    /// moved forward by [`Self::update_and_detect_changes`], so seeding
    /// never swallows changes the check job has not reported.
    pub async fn seed_baseline(&mut self, entity_id: &str, events: Vec<Event>) -> bool {
        if self.is_tracked(entity_id) || events.is_empty() {
            return false;
        }
        log::info!("Baseline seeded for {}: {} events", entity_id, events.len());
        self.entries.insert(entity_id.to_string(), events);
        self.persist().await;
        true
    }

    /// Write the whole cache to the store.
    pub async fn flush(&self) -> Result<()> {
        self.store.save(&self.entries).await
    }

    async fn persist(&self) {
        if let Err(e) = self.flush().await {
            log::error!("Cache save failed: {}", e);
        }
    }
}
