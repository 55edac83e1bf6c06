//! Service layer for the timetable watcher.
//!
//! This module contains the business logic for:
//! - Text heuristics over lesson descriptions (`extract`, `segment`)
//! - Mapping raw export records to events (`map_items`)
//! - Talking to the timetable service (`TimetableClient`)
//! - Rendering and delivering messages (`format`, `Notifier`)
//! - Schedule views and search (`query`)

pub mod extract;
pub mod format;
mod links;
mod mapper;
mod notifier;
pub mod query;
pub mod segment;
mod timetable;

pub use links::{LinkMap, parse_links_page};
pub use mapper::map_items;
pub use notifier::{LogNotifier, Notifier};
pub use timetable::{FetchOutcome, ScheduleSource, TimetableClient};
