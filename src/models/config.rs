//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::time::parse_hhmm;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream timetable service settings
    #[serde(default)]
    pub timetable: TimetableConfig,

    /// Periodic job settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Persisted state file names
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.timetable.api_url.trim().is_empty() {
            return Err(AppError::validation("timetable.api_url is empty"));
        }
        if self.timetable.html_url.trim().is_empty() {
            return Err(AppError::validation("timetable.html_url is empty"));
        }
        if self.timetable.user_agent.trim().is_empty() {
            return Err(AppError::validation("timetable.user_agent is empty"));
        }
        if !(1..=60).contains(&self.timetable.timeout_secs) {
            return Err(AppError::validation(
                "timetable.timeout_secs must be between 1 and 60",
            ));
        }
        if !(1..=60).contains(&self.timetable.links_timeout_secs) {
            return Err(AppError::validation(
                "timetable.links_timeout_secs must be between 1 and 60",
            ));
        }
        if self.timetable.lookahead_days == 0 {
            return Err(AppError::validation("timetable.lookahead_days must be > 0"));
        }
        if self.timetable.max_concurrent == 0 {
            return Err(AppError::validation("timetable.max_concurrent must be > 0"));
        }
        if self.schedule.check_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.check_interval_secs must be > 0",
            ));
        }
        self.schedule.daily_at()?;
        self.schedule.weekly_at()?;
        if self.schedule.weekly_weekday > 6 {
            return Err(AppError::validation(
                "schedule.weekly_weekday must be 0 (Monday) ..= 6 (Sunday)",
            ));
        }
        Ok(())
    }
}

/// Upstream timetable service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableConfig {
    /// JSON export endpoint
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// HTML timetable page (source of meeting links)
    #[serde(default = "defaults::html_url")]
    pub html_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Shorter timeout for the supplementary link page
    #[serde(default = "defaults::links_timeout")]
    pub links_timeout_secs: u64,

    /// Days before today included in a default fetch window
    #[serde(default = "defaults::lookback_days")]
    pub lookback_days: u32,

    /// Days after today included in a default fetch window
    #[serde(default = "defaults::lookahead_days")]
    pub lookahead_days: u32,

    /// Maximum concurrent schedule fetches in digest jobs
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// How long the teacher/room directory stays cached
    #[serde(default = "defaults::directory_ttl")]
    pub directory_ttl_secs: u64,

    /// Maximum directory search results
    #[serde(default = "defaults::search_limit")]
    pub search_limit: usize,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            html_url: defaults::html_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            links_timeout_secs: defaults::links_timeout(),
            lookback_days: defaults::lookback_days(),
            lookahead_days: defaults::lookahead_days(),
            max_concurrent: defaults::max_concurrent(),
            directory_ttl_secs: defaults::directory_ttl(),
            search_limit: defaults::search_limit(),
        }
    }
}

/// Periodic job settings. Times are wall-clock in the timetable timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between change checks
    #[serde(default = "defaults::check_interval")]
    pub check_interval_secs: u64,

    /// Delay before the first change check after startup
    #[serde(default = "defaults::first_check_delay")]
    pub first_check_delay_secs: u64,

    /// Daily digest time (HH:MM)
    #[serde(default = "defaults::daily_time")]
    pub daily_time: String,

    /// Weekly digest time (HH:MM)
    #[serde(default = "defaults::weekly_time")]
    pub weekly_time: String,

    /// Weekly digest weekday, 0 = Monday
    #[serde(default)]
    pub weekly_weekday: u32,

    /// Pinned messages kept per chat before the oldest is unpinned
    #[serde(default = "defaults::max_pinned")]
    pub max_pinned_messages: usize,
}

impl ScheduleConfig {
    pub fn daily_at(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.daily_time).ok_or_else(|| {
            AppError::validation(format!(
                "schedule.daily_time '{}' is not HH:MM",
                self.daily_time
            ))
        })
    }

    pub fn weekly_at(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.weekly_time).ok_or_else(|| {
            AppError::validation(format!(
                "schedule.weekly_time '{}' is not HH:MM",
                self.weekly_time
            ))
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: defaults::check_interval(),
            first_check_delay_secs: defaults::first_check_delay(),
            daily_time: defaults::daily_time(),
            weekly_time: defaults::weekly_time(),
            weekly_weekday: 0,
            max_pinned_messages: defaults::max_pinned(),
        }
    }
}

/// File names of persisted state, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::cache_file")]
    pub cache_file: String,

    #[serde(default = "defaults::settings_file")]
    pub settings_file: String,
}

impl PathsConfig {
    pub fn cache_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.cache_file)
    }

    pub fn settings_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.settings_file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_file: defaults::cache_file(),
            settings_file: defaults::settings_file(),
        }
    }
}

mod defaults {
    // Timetable defaults
    pub fn api_url() -> String {
        "https://dekanat.nung.edu.ua/cgi-bin/timetable_export.cgi".into()
    }
    pub fn html_url() -> String {
        "https://dekanat.nung.edu.ua/cgi-bin/timetable.cgi?n=700".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; rozklad/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn links_timeout() -> u64 {
        8
    }
    pub fn lookback_days() -> u32 {
        1
    }
    pub fn lookahead_days() -> u32 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn directory_ttl() -> u64 {
        3600
    }
    pub fn search_limit() -> usize {
        20
    }

    // Schedule defaults
    pub fn check_interval() -> u64 {
        30 * 60
    }
    pub fn first_check_delay() -> u64 {
        30
    }
    pub fn daily_time() -> String {
        "05:00".into()
    }
    pub fn weekly_time() -> String {
        "15:00".into()
    }
    pub fn max_pinned() -> usize {
        5
    }

    // Path defaults
    pub fn cache_file() -> String {
        "schedule_cache.json".into()
    }
    pub fn settings_file() -> String {
        "user_settings.json".into()
    }
}
