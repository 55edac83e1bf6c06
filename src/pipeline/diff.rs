//! Change detection between a baseline and a fresh fetch.
//!
//! Events are matched by identity key (start minute, cleaned subject,
//! group) and compared by fingerprint. Removals and additions of lessons
//! that have already ended are not reported: such rows simply rolled out
//! of, or were backfilled into, the fetch window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{Change, ChangeKind, Event};

/// Outcome of comparing two event lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Removals and modifications in baseline order, then additions
    pub changes: Vec<Change>,
    pub old_count: usize,
    pub new_count: usize,
}

impl DiffResult {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }

    /// `(added, removed, modified)` counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.count(ChangeKind::Added),
            self.count(ChangeKind::Removed),
            self.count(ChangeKind::Modified),
        )
    }

    /// The new list replaces the baseline when something changed or the
    /// list length moved, even without field-level differences.
    pub fn should_persist(&self) -> bool {
        self.has_changes() || self.old_count != self.new_count
    }
}

/// Events keyed by identity, in first-seen key order.
///
/// A repeated key keeps its first position but takes the later event.
struct KeyedEvents<'a> {
    order: Vec<String>,
    by_key: HashMap<String, &'a Event>,
}

impl<'a> KeyedEvents<'a> {
    fn new(events: &'a [Event]) -> Self {
        let mut order = Vec::with_capacity(events.len());
        let mut by_key = HashMap::with_capacity(events.len());
        for event in events {
            let key = event.identity_key();
            if by_key.insert(key.clone(), event).is_none() {
                order.push(key);
            }
        }
        Self { order, by_key }
    }

    fn get(&self, key: &str) -> Option<&'a Event> {
        self.by_key.get(key).copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &'a Event)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.by_key.get(key).map(|e| (key.as_str(), *e)))
    }
}

/// Compare a baseline with a fresh list as of `now`.
pub fn detect_changes(old: &[Event], new: &[Event], now: DateTime<Utc>) -> DiffResult {
    let old_map = KeyedEvents::new(old);
    let new_map = KeyedEvents::new(new);
    let ended = |event: &Event| event.end_time().with_timezone(&Utc) < now;

    let mut changes = Vec::new();

    for (key, old_event) in old_map.iter() {
        match new_map.get(key) {
            None if ended(old_event) => {}
            None => changes.push(Change::Removed(old_event.clone())),
            Some(new_event) if new_event.fingerprint() != old_event.fingerprint() => {
                changes.push(Change::Modified {
                    new: new_event.clone(),
                    old: old_event.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for (key, new_event) in new_map.iter() {
        if old_map.get(key).is_none() && !ended(new_event) {
            changes.push(Change::Added(new_event.clone()));
        }
    }

    DiffResult {
        changes,
        old_count: old.len(),
        new_count: new.len(),
    }
}
