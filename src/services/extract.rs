// src/services/extract.rs

//! Regex heuristics over scraped lesson text.
//!
//! The timetable feed serializes most lesson attributes into one free-text
//! description. These functions recover individual fields from such text.
//! They are best-effort pattern matches, not a parser: a description that
//! does not follow the usual conventions yields empty or wrong fields, and
//! nothing here can detect that.

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::normalize_whitespace;

/// "Remote" marker as written in descriptions.
pub const REMOTE_MARKER: &str = "дистанційно";

static REMOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)дистанційно").expect("remote regex"));

pub(crate) static SUBGROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(підгр\.\s*(\d+)\)").expect("subgroup regex"));

pub(crate) static ROOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\S*\.ауд\.").expect("room regex"));

pub(crate) static INITIALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-ZА-ЯІЇЄ]\.[A-ZА-ЯІЇЄ]\.").expect("initials regex"));

pub(crate) static CAPITALIZED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-ZА-ЯІЇЄ][a-zа-яіїє]+").expect("capitalized regex"));

static LESSON_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((Л|Пр|Лаб|Л\+Пр|Sem|Екз|Конс)\)").expect("lesson type regex")
});

/// Role title followed by two or three capitalized name words.
static TEACHER_FULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(доцент|професор|викладач|асистент|зав\.каф\.)\s+[A-ZА-ЯІЇЄ][a-zа-яіїє']+\s+[A-ZА-ЯІЇЄ][a-zа-яіїє']+(\s+[A-ZА-ЯІЇЄ][a-zа-яіїє']+)?",
    )
    .expect("teacher regex")
});

/// Role title followed by a surname and initials.
static TEACHER_INITIALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(доцент|професор|викладач|асистент|зав\.каф\.)\s+[A-ZА-ЯІЇЄ][a-zа-яіїє']+\s+[A-ZА-ЯІЇЄ]\.([A-ZА-ЯІЇЄ]\.)?",
    )
    .expect("teacher initials regex")
});

/// Surname followed by the first letter of a name or initial.
static SURNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-ZА-ЯІЇЄ][a-zа-яіїє']+)\s+[A-ZА-ЯІЇЄ]").expect("surname regex")
});

/// Derive the display subject from a raw description.
///
/// Steps run in a fixed order: remote marker, parenthesized lesson type,
/// first occurrence of the teacher name, subgroup marker, inline
/// role-qualified teacher names, room token, emphasis markers and
/// whitespace.
pub fn clean_subject(raw: &str, lesson_type: &str, teacher: &str) -> String {
    let mut text = REMOTE_RE.replace_all(raw, "").into_owned();

    if !lesson_type.is_empty() {
        let pattern = format!(r"(?i)\({}\)", regex::escape(lesson_type));
        if let Ok(re) = Regex::new(&pattern) {
            text = re.replace_all(&text, "").into_owned();
        }
    }

    if !teacher.is_empty() {
        text = text.replacen(teacher, "", 1);
    }

    text = SUBGROUP_RE.replace_all(&text, "").into_owned();
    text = TEACHER_FULL_RE.replace_all(&text, "").into_owned();
    text = TEACHER_INITIALS_RE.replace_all(&text, "").into_owned();
    text = ROOM_RE.replace_all(&text, "").into_owned();

    normalize_whitespace(&text.replace('*', ""))
}

/// First room token such as `214.ауд.` or `3-12а.ауд.`.
pub fn extract_room(text: &str) -> Option<String> {
    ROOM_RE.find(text).map(|m| m.as_str().to_string())
}

/// Parenthesized lesson type code such as `(Лаб)`.
pub fn extract_lesson_type(text: &str) -> Option<String> {
    LESSON_TYPE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Subgroup label in canonical `(підгр. N)` form.
pub fn extract_subgroup(text: &str) -> Option<String> {
    SUBGROUP_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("(підгр. {})", m.as_str()))
}

/// Inline role-qualified teacher name, e.g. `доцент Коваль Олег Петрович`.
pub fn extract_teacher(text: &str) -> Option<String> {
    TEACHER_FULL_RE.find(text).map(|m| m.as_str().to_string())
}

/// Whether the text carries the remote marker.
pub fn has_remote_marker(text: &str) -> bool {
    REMOTE_RE.is_match(text)
}

/// Remove every remote marker and trim.
pub fn strip_remote_marker(text: &str) -> String {
    REMOTE_RE.replace_all(text, "").trim().to_string()
}

/// First `Surname I...` occurrence, used to key meeting links by surname.
pub fn extract_surname(text: &str) -> Option<String> {
    SURNAME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalize an object name for directory matching.
///
/// Lowercases, unifies dashes, drops spaces and apostrophes, and maps
/// Latin look-alike letters to Cyrillic so `KI-24-1` matches `КІ-24-1`.
pub fn normalize_name(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '`' | '\'' | '’'))
        .map(|c| match c {
            '–' | '—' => '-',
            'i' => 'і',
            'k' => 'к',
            'c' => 'с',
            'o' => 'о',
            'p' => 'р',
            'x' => 'х',
            'a' => 'а',
            'e' => 'е',
            'h' => 'н',
            't' => 'т',
            'm' => 'м',
            'b' => 'в',
            other => other,
        })
        .collect()
}
