//! Tracked entities, directory entries and date windows.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Kind of timetable object a schedule can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Group,
    Teacher,
    Room,
}

impl EntityKind {
    /// Value of the upstream `req_mode` parameter.
    pub fn req_mode(self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::Teacher => "teacher",
            EntityKind::Room => "room",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Group => "Група",
            EntityKind::Teacher => "Викладач",
            EntityKind::Room => "Аудиторія",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.req_mode())
    }
}

/// A group, teacher or room whose schedule is fetched and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: String,
    pub kind: EntityKind,
    /// Display name; for groups it also keys the meeting-link page.
    pub name: Option<String>,
}

impl TrackedEntity {
    pub fn group(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Group,
            name: Some(name.into()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A teacher or room found in the upstream directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub kind: EntityKind,
    pub name: String,
    pub id: String,
}

impl DirectoryEntry {
    pub fn as_entity(&self) -> TrackedEntity {
        TrackedEntity {
            id: self.id.clone(),
            kind: self.kind,
            name: Some(self.name.clone()),
        }
    }
}

/// Inclusive date range of a schedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Window of `lookback` days before and `lookahead` days after `today`.
    pub fn around(today: NaiveDate, lookback: u32, lookahead: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(lookback.into()))
            .unwrap_or(today);
        let end = today
            .checked_add_days(Days::new(lookahead.into()))
            .unwrap_or(today);
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
