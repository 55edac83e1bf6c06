// src/models/mod.rs

//! Domain models for the timetable watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod entity;
mod event;
mod raw;
mod settings;

// Re-export all public types
pub use change::{Change, ChangeKind};
pub use config::{Config, PathsConfig, ScheduleConfig, TimetableConfig};
pub use entity::{DateRange, DirectoryEntry, EntityKind, TrackedEntity};
pub use event::{Event, EventDraft, EventRecord, UNKNOWN_SUBJECT};
pub use raw::{DirectoryObject, ExportEnvelope, ExportRoot, ObjectGroup, RawItem};
pub use settings::{NotificationKind, UserSettings};

#[cfg(test)]
pub(crate) use event::fixtures;
