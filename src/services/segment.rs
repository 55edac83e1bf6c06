// src/services/segment.rs

//! Splitting of merged lesson descriptions.
//!
//! The feed sometimes serializes back-to-back subgroup lessons into a
//! single run-on description:
//!
//! ```text
//! Хімія (підгр. 1) 101.ауд. Коваль (підгр. 2) 102.ауд. Шевчук
//! ```
//!
//! With two or more subgroup markers present, the text between each pair
//! of markers is searched for a split boundary, in priority order:
//!
//! 1. the end of a room token (`101.ауд.`),
//! 2. the end of teacher initials (`О.П.`),
//! 3. the start of the last capitalized word, assumed to begin the next
//!    lesson's teacher name, or the next marker itself if there is none.
//!
//! This is a heuristic. Rule 3 misfires on multi-word capitalized names
//! and on subjects containing capitalized words.

use super::extract::{CAPITALIZED_RE, INITIALS_RE, ROOM_RE, SUBGROUP_RE};

/// Split a description into one chunk per embedded lesson.
///
/// With fewer than two subgroup markers the trimmed input is returned as
/// the only chunk, even when blank, so every record yields at least one
/// lesson. Split chunks are trimmed and empty ones dropped.
pub fn split_merged_description(description: &str) -> Vec<String> {
    let markers: Vec<_> = SUBGROUP_RE.find_iter(description).collect();
    if markers.len() < 2 {
        return vec![description.trim().to_string()];
    }

    let mut chunks = Vec::with_capacity(markers.len());
    let mut prev_split = 0;

    for pair in markers.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let span_start = current.end();
        let span = &description[span_start..next.start()];
        let split_at = span_start + split_offset(span);

        push_chunk(&mut chunks, &description[prev_split..split_at]);
        prev_split = split_at;
    }

    push_chunk(&mut chunks, &description[prev_split..]);
    chunks
}

/// Byte offset inside `span` where the next lesson begins.
fn split_offset(span: &str) -> usize {
    if let Some(room) = ROOM_RE.find(span) {
        return room.end();
    }
    if let Some(initials) = INITIALS_RE.find(span) {
        return initials.end();
    }
    CAPITALIZED_RE
        .find_iter(span)
        .last()
        .map(|word| word.start())
        .unwrap_or(span.len())
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}
