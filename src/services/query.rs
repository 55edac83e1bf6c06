// src/services/query.rs

//! Schedule views and free-text search over fetched events.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::AppError;
use crate::models::Event;

/// Maximum number of events returned by [`search_upcoming`].
pub const SEARCH_LIMIT: usize = 10;

/// Which slice of a schedule to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Today,
    Tomorrow,
    /// Monday to Sunday of the target's week
    Week,
    /// A single explicit day
    Date,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Today => "today",
            ViewMode::Tomorrow => "tomorrow",
            ViewMode::Week => "week",
            ViewMode::Date => "date",
        })
    }
}

impl FromStr for ViewMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(ViewMode::Today),
            "tomorrow" => Ok(ViewMode::Tomorrow),
            "week" => Ok(ViewMode::Week),
            "date" => Ok(ViewMode::Date),
            other => Err(AppError::validation(format!("unknown view '{other}'"))),
        }
    }
}

/// First day of the view.
///
/// An explicit date wins for every mode; week views snap to Monday.
pub fn resolve_target(mode: ViewMode, today: NaiveDate, explicit: Option<NaiveDate>) -> NaiveDate {
    let target = explicit.unwrap_or(match mode {
        ViewMode::Tomorrow => today.succ_opt().unwrap_or(today),
        ViewMode::Today | ViewMode::Week | ViewMode::Date => today,
    });

    match mode {
        ViewMode::Week => week_start(target),
        _ => target,
    }
}

/// Events falling into the view that starts at `target`.
pub fn filter_view(events: &[Event], mode: ViewMode, target: NaiveDate) -> Vec<Event> {
    let last = match mode {
        ViewMode::Week => target.checked_add_days(Days::new(6)).unwrap_or(target),
        _ => target,
    };

    events
        .iter()
        .filter(|event| {
            let day = event.start_time().date_naive();
            target <= day && day <= last
        })
        .cloned()
        .collect()
}

/// Events from today on matching `query`, at most [`SEARCH_LIMIT`].
pub fn search_upcoming(events: &[Event], query: &str, today: NaiveDate) -> Vec<Event> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    events
        .iter()
        .filter(|event| event.start_time().date_naive() >= today && event.matches_query(query))
        .take(SEARCH_LIMIT)
        .cloned()
        .collect()
}

/// Parse a `dd.mm` day in the given year.
pub fn parse_day_month(value: &str, year: i32) -> Option<NaiveDate> {
    let (day, month) = value.trim().split_once('.')?;
    NaiveDate::from_ymd_opt(year, month.trim().parse().ok()?, day.trim().parse().ok()?)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday();
    date.checked_sub_days(Days::new(offset.into())).unwrap_or(date)
}
