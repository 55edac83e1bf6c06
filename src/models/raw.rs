//! Upstream timetable export payloads.
//!
//! The export wraps everything in a root object that is named either
//! `psrozklad_export` or `ps_rozklad_export` depending on the server
//! version. Field values are loosely typed (IDs arrive as strings or
//! numbers, flags as strings or booleans), so every scalar is read
//! leniently into `Option<String>`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Top-level export document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportEnvelope {
    #[serde(rename = "psrozklad_export", alias = "ps_rozklad_export", default)]
    pub root: Option<ExportRoot>,
}

/// Body of the export: schedule items or directory listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRoot {
    #[serde(default)]
    pub roz_items: Vec<RawItem>,

    /// Group and teacher listings
    #[serde(default)]
    pub departments: Vec<ObjectGroup>,

    /// Room listings
    #[serde(default)]
    pub blocks: Vec<ObjectGroup>,
}

/// A department or building with its listed objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectGroup {
    #[serde(default)]
    pub objects: Vec<DirectoryObject>,
}

/// One group, teacher or room in a directory listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryObject {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
}

/// One raw schedule record as served by the export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub lesson_description: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub teacher: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub room: Option<String>,

    /// `dd.mm.yyyy`
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,

    /// `HH:MM-HH:MM`
    #[serde(default, deserialize_with = "lenient_string")]
    pub lesson_time: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub link: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,

    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub lesson_type: Option<String>,

    /// Group label the record belongs to
    #[serde(default, deserialize_with = "lenient_string")]
    pub object: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub online: Option<String>,
}

impl RawItem {
    /// Description text, composed from title/teacher/room when blank.
    pub fn description_text(&self) -> String {
        match non_blank(&self.lesson_description) {
            Some(text) => text.trim().to_string(),
            None => format!(
                "{} {} {}",
                self.title.as_deref().unwrap_or(""),
                self.teacher.as_deref().unwrap_or(""),
                self.room.as_deref().unwrap_or("")
            ),
        }
    }

    /// Structured meeting link, preferring `link` over `url`.
    pub fn structured_link(&self) -> Option<&str> {
        non_blank(&self.link).or_else(|| non_blank(&self.url))
    }

    /// Whether the upstream flag marks the lesson as online.
    pub fn online_flag(&self) -> bool {
        non_blank(&self.online).is_some_and(|v| {
            matches!(
                v.trim().to_lowercase().as_str(),
                "tak" | "так" | "yes" | "1" | "true"
            )
        })
    }

    pub fn teacher(&self) -> Option<&str> {
        non_blank(&self.teacher)
    }

    pub fn room(&self) -> Option<&str> {
        non_blank(&self.room)
    }

    pub fn lesson_type(&self) -> Option<&str> {
        non_blank(&self.lesson_type)
    }

    pub fn object(&self) -> Option<&str> {
        non_blank(&self.object)
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Accept strings, numbers and booleans; map null to `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
