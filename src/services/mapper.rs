// src/services/mapper.rs

//! Mapping of raw export records to canonical events.

use chrono::{DateTime, FixedOffset, NaiveDate};

use super::extract::{
    extract_lesson_type, extract_room, extract_subgroup, extract_teacher, has_remote_marker,
    strip_remote_marker,
};
use super::links::LinkMap;
use super::segment::split_merged_description;
use crate::models::{EntityKind, Event, EventDraft, RawItem};
use crate::utils::time::{localize, parse_hhmm};

/// Convert raw records into events ordered by start time.
///
/// Records without a parseable date or time range are skipped. Merged
/// descriptions yield one event per recovered chunk; every chunk gets its
/// own room, type, teacher, subgroup and remote flag.
pub fn map_items(items: &[RawItem], kind: EntityKind, links: &LinkMap) -> Vec<Event> {
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for item in items {
        let Some((start, end)) = parse_slot(item) else {
            skipped += 1;
            log::debug!(
                "Skipping record with bad date/time: date={:?} time={:?}",
                item.date,
                item.lesson_time
            );
            continue;
        };

        let description = item.description_text();
        for chunk in split_merged_description(&description) {
            events.push(map_chunk(item, &chunk, kind, links, start, end));
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} records with unparseable date or time", skipped);
    }

    // stable: equal start times keep feed order
    events.sort_by_key(|event| event.start_time());
    events
}

fn map_chunk(
    item: &RawItem,
    chunk: &str,
    kind: EntityKind,
    links: &LinkMap,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Event {
    let room = item
        .room()
        .map(str::to_string)
        .or_else(|| extract_room(chunk))
        .unwrap_or_default();

    let lesson_type = item
        .lesson_type()
        .map(str::to_string)
        .or_else(|| extract_lesson_type(chunk))
        .unwrap_or_default();

    let text = chunk.replace('*', "");
    let text = text.trim();

    let teacher = match item.teacher() {
        Some(teacher) => teacher.to_string(),
        None if kind == EntityKind::Group => extract_teacher(text).unwrap_or_default(),
        None => String::new(),
    };

    let group = extract_subgroup(text)
        .or_else(|| item.object().map(str::to_string))
        .unwrap_or_default();

    let is_remote = item.online_flag() || has_remote_marker(text);

    let subject = Some(strip_remote_marker(text))
        .filter(|subject| !subject.is_empty())
        .or_else(|| item.title().map(str::to_string))
        .filter(|subject| !subject.is_empty());

    let mut event_links = Vec::new();
    if let Some(link) = item.structured_link() {
        event_links.push(link.to_string());
    } else if let Some(link) = links.find_for_teacher(&teacher) {
        event_links.push(link.to_string());
    }

    Event::from_draft(EventDraft {
        subject,
        teacher: Some(teacher),
        room: Some(room),
        lesson_type: Some(lesson_type),
        group: Some(group),
        is_remote: Some(is_remote),
        links: event_links,
        start_time: Some(start),
        end_time: Some(end),
    })
}

/// Parse `dd.mm.yyyy` plus `HH:MM-HH:MM` into localized start/end.
fn parse_slot(item: &RawItem) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let date = NaiveDate::parse_from_str(item.date.as_deref()?.trim(), "%d.%m.%Y").ok()?;

    let range = item.lesson_time.as_deref()?;
    let mut parts = range.split('-');
    let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };

    let start = localize(date, parse_hhmm(from)?)?;
    let end = localize(date, parse_hhmm(to)?)?;
    Some((start, end))
}
