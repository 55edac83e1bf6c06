// src/services/format.rs

//! Chat-ready text for change reports and schedule digests.
//!
//! Output uses the HTML subset understood by chat platforms
//! (`<b>`, `<s>`, `<a href>`).

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{Change, Event};

/// Default maximum length of one chat message, in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Human label for a meeting link.
pub fn link_label(url: &str) -> &'static str {
    if url.contains("zoom") {
        "Zoom 🎥"
    } else if url.contains("meet.google") {
        "Google Meet 🎥"
    } else if url.contains("teams") {
        "Teams 🎥"
    } else {
        "Посилання на пару 🔗"
    }
}

/// Multi-line description of one event.
///
/// A struck-through event shows only its subject line.
pub fn event_details(event: &Event, strikethrough: bool) -> String {
    let mut subject_line = format!("📚 {}", escape_html(event.subject()));
    if !event.group().is_empty() {
        subject_line.push(' ');
        subject_line.push_str(&escape_html(event.group()));
    }
    if !event.lesson_type().is_empty() {
        subject_line.push_str(&format!(" ({})", escape_html(event.lesson_type())));
    }

    if strikethrough {
        return format!("<s>{subject_line}</s>");
    }

    let mut lines = Vec::new();
    if event.is_remote() {
        lines.push("💻🏡 <b>ДИСТАНЦІЙНО</b>".to_string());
    }
    lines.push(subject_line);
    if !event.teacher().is_empty() {
        lines.push(format!("👤🎓 {}", escape_html(event.teacher())));
    }
    if !event.room().is_empty() {
        lines.push(format!("📍 {}", escape_html(event.room())));
    }
    for link in event.links() {
        lines.push(format!(
            r#"<a href="{}">{}</a>"#,
            escape_html(link),
            link_label(link)
        ));
    }

    lines.join("\n")
}

/// Render a change list; empty input yields an empty string.
pub fn format_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return String::new();
    }

    let mut out = String::from("🔄 <b>Зміни у розкладі:</b>\n\n");
    for change in changes {
        let event = change.event();
        let when = format!(
            "{} | {}",
            event.start_time().format("%d.%m"),
            event.start_time().format("%H:%M")
        );

        let header = match change {
            Change::Added(_) => format!("✅ <b>Додано ({when}):</b>"),
            Change::Removed(_) => format!("❌ <b>Скасовано ({when}):</b>"),
            Change::Modified { .. } => format!("✏️ <b>Змінено ({when}):</b>"),
        };
        let details = event_details(event, matches!(change, Change::Removed(_)));

        out.push_str(&header);
        out.push('\n');
        out.push_str(&details);
        out.push_str("\n\n");
    }
    out
}

/// Render events as a day-by-day schedule under a title line.
///
/// Events are expected in start order; empty input yields an empty string.
pub fn format_schedule(title: &str, events: &[Event]) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut out = format!("📅 <b>{}</b>\n", escape_html(title));
    let mut current: Option<NaiveDate> = None;

    for event in events {
        let date = event.start_time().date_naive();
        if current != Some(date) {
            out.push_str(&format!(
                "\n<b>{} {}</b>\n",
                weekday_name(date.weekday()),
                date.format("%d.%m")
            ));
            current = Some(date);
        }
        out.push_str(&format!(
            "🕐 {}-{}\n{}\n\n",
            event.start_time().format("%H:%M"),
            event.end_time().format("%H:%M"),
            event_details(event, false)
        ));
    }
    out
}

/// Search hits, each followed by its date and start time.
pub fn format_search_results(query: &str, events: &[Event]) -> String {
    if events.is_empty() {
        return format!("🔍 Нічого не знайдено для '{}'", escape_html(query));
    }

    let mut out = format!("🔍 Результати для '{}':\n\n", escape_html(query));
    for event in events {
        out.push_str(&event_details(event, false));
        out.push_str(&format!(
            "\n📆 {}\n\n",
            event.start_time().format("%d.%m %H:%M")
        ));
    }
    out
}

/// Split text into chunks of at most `max_len` characters.
///
/// Splits prefer the last newline inside the limit; the remainder has its
/// leading whitespace trimmed.
pub fn split_long_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.chars().count() <= max_len {
            parts.push(rest.to_string());
            break;
        }

        let limit = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let split_at = match rest[..limit].rfind('\n') {
            Some(pos) if pos > 0 => pos,
            _ => limit,
        };

        parts.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start();
    }
    parts
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Понеділок",
        Weekday::Tue => "Вівторок",
        Weekday::Wed => "Середа",
        Weekday::Thu => "Четвер",
        Weekday::Fri => "П'ятниця",
        Weekday::Sat => "Субота",
        Weekday::Sun => "Неділя",
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
