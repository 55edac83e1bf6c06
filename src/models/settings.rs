//! Per-recipient subscription settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Notification categories a recipient can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Changes,
    Daily,
    Weekly,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Changes => "changes",
            NotificationKind::Daily => "daily",
            NotificationKind::Weekly => "weekly",
        })
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "changes" | "change" => Ok(NotificationKind::Changes),
            "daily" => Ok(NotificationKind::Daily),
            "weekly" => Ok(NotificationKind::Weekly),
            other => Err(AppError::validation(format!(
                "unknown notification kind '{other}' (expected changes, daily or weekly)"
            ))),
        }
    }
}

/// Settings of one chat recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub chat_id: i64,

    #[serde(default)]
    pub group_name: Option<String>,

    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default)]
    pub change_notifications: bool,

    #[serde(default)]
    pub daily_notifications: bool,

    #[serde(default)]
    pub weekly_notifications: bool,

    /// Pinned message ids, oldest first
    #[serde(default)]
    pub pinned_messages: Vec<i64>,
}

impl UserSettings {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            group_name: None,
            group_id: None,
            change_notifications: false,
            daily_notifications: false,
            weekly_notifications: false,
            pinned_messages: Vec::new(),
        }
    }

    pub fn is_enabled(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Changes => self.change_notifications,
            NotificationKind::Daily => self.daily_notifications,
            NotificationKind::Weekly => self.weekly_notifications,
        }
    }

    pub fn set_enabled(&mut self, kind: NotificationKind, enabled: bool) {
        match kind {
            NotificationKind::Changes => self.change_notifications = enabled,
            NotificationKind::Daily => self.daily_notifications = enabled,
            NotificationKind::Weekly => self.weekly_notifications = enabled,
        }
    }
}
