//! Scheduled lesson occurrence.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::services::extract::clean_subject;
use crate::utils::time::now_local;

/// Subject used when a record carries none.
pub const UNKNOWN_SUBJECT: &str = "Невідомий предмет";

/// Loosely-typed lesson record, before normalization.
///
/// Every field is optional; [`Event::from_draft`] applies the defaults.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub subject: Option<String>,
    pub teacher: Option<String>,
    pub room: Option<String>,
    pub lesson_type: Option<String>,
    pub group: Option<String>,
    pub is_remote: Option<bool>,
    pub links: Vec<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
}

/// A canonical lesson occurrence.
///
/// Constructed once per fetch and never mutated; the cleaned subject and
/// fingerprint are derived at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EventRecord", into = "EventRecord")]
pub struct Event {
    raw_subject: String,
    subject: String,
    teacher: String,
    room: String,
    lesson_type: String,
    group: String,
    is_remote: bool,
    links: Vec<String>,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
    fingerprint: String,
}

impl Event {
    /// Normalize a draft into a canonical event. Never fails.
    pub fn from_draft(draft: EventDraft) -> Self {
        let now = now_local();
        let raw_subject = draft.subject.unwrap_or_else(|| UNKNOWN_SUBJECT.to_string());
        let teacher = draft.teacher.unwrap_or_default();
        let lesson_type = draft.lesson_type.unwrap_or_default();
        let subject = clean_subject(&raw_subject, &lesson_type, &teacher);

        let mut event = Self {
            raw_subject,
            subject,
            teacher,
            room: draft.room.unwrap_or_default(),
            lesson_type,
            group: draft.group.unwrap_or_default(),
            is_remote: draft.is_remote.unwrap_or(false),
            links: draft.links,
            start_time: draft.start_time.unwrap_or(now),
            end_time: draft.end_time.unwrap_or(now),
            fingerprint: String::new(),
        };
        event.fingerprint = event.compute_fingerprint();
        event
    }

    /// Short content hash over every user-visible attribute.
    fn compute_fingerprint(&self) -> String {
        let key = format!(
            "{}-{}-{}-{}-{}-{}-{}",
            self.start_time.to_rfc3339(),
            self.subject,
            self.teacher,
            self.room,
            self.group,
            self.is_remote,
            self.links.join(",")
        );
        let digest = Sha256::digest(key.as_bytes());
        hex::encode(&digest[..4])
    }

    /// Key matching "the same lesson slot" across fetches.
    ///
    /// `YYYYMMDDHHMM-<cleaned subject>-<group>`
    pub fn identity_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.start_time.format("%Y%m%d%H%M"),
            self.subject,
            self.group
        )
    }

    /// Case-insensitive match against subject, teacher, room, type and group.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        [
            &self.subject,
            &self.teacher,
            &self.room,
            &self.lesson_type,
            &self.group,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&q))
    }

    pub fn raw_subject(&self) -> &str {
        &self.raw_subject
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn teacher(&self) -> &str {
        &self.teacher
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn lesson_type(&self) -> &str {
        &self.lesson_type
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<FixedOffset> {
        self.end_time
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Persisted shape of an event. Derived fields are not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    subject: String,
    #[serde(default)]
    teacher: String,
    #[serde(default)]
    room: String,
    #[serde(rename = "type", default)]
    lesson_type: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    is_remote: bool,
    #[serde(default)]
    links: Vec<String>,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        Event::from_draft(EventDraft {
            subject: Some(record.subject),
            teacher: Some(record.teacher),
            room: Some(record.room),
            lesson_type: Some(record.lesson_type),
            group: Some(record.group),
            is_remote: Some(record.is_remote),
            links: record.links,
            start_time: Some(record.start_time),
            end_time: Some(record.end_time),
        })
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            subject: event.raw_subject,
            teacher: event.teacher,
            room: event.room,
            lesson_type: event.lesson_type,
            group: event.group,
            is_remote: event.is_remote,
            links: event.links,
            start_time: event.start_time,
            end_time: event.end_time,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let start = kyiv(2026, 10, 20, 8, 30);
        let a = lesson("Фізика (Л)", start);
        let b = lesson("Фізика (Л)", start);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
        assert!(a.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_tracks_every_visible_field() {
        let start = kyiv(2026, 10, 20, 8, 30);
        let base = lesson("Фізика", start).fingerprint().to_string();

        let variants: Vec<EventDraft> = vec![
            EventDraft {
                subject: Some("Хімія".into()),
                ..draft("Фізика", start)
            },
            EventDraft {
                teacher: Some("Шевчук М.І.".into()),
                ..draft("Фізика", start)
            },
            EventDraft {
                room: Some("215.ауд.".into()),
                ..draft("Фізика", start)
            },
            EventDraft {
                group: Some("(підгр. 2)".into()),
                ..draft("Фізика", start)
            },
            EventDraft {
                is_remote: Some(true),
                ..draft("Фізика", start)
            },
            EventDraft {
                links: vec!["https://zoom.us/j/1".into()],
                ..draft("Фізика", start)
            },
            EventDraft {
                start_time: Some(kyiv(2026, 10, 20, 10, 0)),
                ..draft("Фізика", start)
            },
        ];

        for variant in variants {
            let event = Event::from_draft(variant.clone());
            assert_ne!(event.fingerprint(), base, "unchanged for {variant:?}");
        }
    }

    #[test]
    fn test_identity_key_format() {
        let event = lesson("Фізика (Л) 214.ауд.", kyiv(2026, 10, 20, 8, 30));
        assert_eq!(event.subject(), "Фізика");
        assert_eq!(event.identity_key(), "202610200830-Фізика-КІ-24-1");
    }

    #[test]
    fn test_identity_key_separates_subgroups() {
        let start = kyiv(2026, 10, 20, 8, 30);
        let one = Event::from_draft(EventDraft {
            group: Some("(підгр. 1)".into()),
            ..draft("Хімія", start)
        });
        let two = Event::from_draft(EventDraft {
            group: Some("(підгр. 2)".into()),
            ..draft("Хімія", start)
        });
        assert_ne!(one.identity_key(), two.identity_key());
    }

    #[test]
    fn test_identity_key_ignores_room_change() {
        let start = kyiv(2026, 10, 20, 8, 30);
        let a = lesson("Фізика", start);
        let b = Event::from_draft(EventDraft {
            room: Some("101.ауд.".into()),
            ..draft("Фізика", start)
        });
        assert_eq!(a.identity_key(), b.identity_key());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let event = Event::from_draft(EventDraft::default());
        assert_eq!(event.raw_subject(), UNKNOWN_SUBJECT);
        assert_eq!(event.teacher(), "");
        assert!(!event.is_remote());
        assert!(event.links().is_empty());
    }

    #[test]
    fn test_matches_query() {
        let event = lesson("Вища математика", kyiv(2026, 10, 20, 8, 30));
        assert!(event.matches_query("МАТЕМ"));
        assert!(event.matches_query("коваль"));
        assert!(event.matches_query("214"));
        assert!(!event.matches_query("хімія"));
    }

    #[test]
    fn test_serde_round_trip_preserves_fields() {
        let event = Event::from_draft(EventDraft {
            is_remote: Some(true),
            links: vec!["https://meet.google.com/abc".into()],
            ..draft("*Фізика* (Л) дистанційно", kyiv(2026, 10, 20, 8, 30))
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["subject"], "*Фізика* (Л) дистанційно");
        assert_eq!(json["type"], "Л");
        assert_eq!(json["start_time"], "2026-10-20T08:30:00+03:00");
        assert!(json.get("fingerprint").is_none());

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.start_time().offset(), event.start_time().offset());
    }
}
