//! Storage abstractions for persisted watcher state.
//!
//! Two documents live in the storage directory, both rewritten whole on
//! every mutation:
//!
//! ```text
//! storage/
//! ├── config.toml            # Watcher configuration
//! ├── schedule_cache.json    # Baseline events per tracked entity id
//! └── user_settings.json     # {"users": [...]} recipient settings
//! ```

mod cache;
pub mod local;
mod settings;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Event, UserSettings};

// Re-export for convenience
pub use cache::ScheduleCache;
pub use local::LocalStorage;
pub use settings::SettingsStore;

/// Baseline events keyed by tracked entity id.
pub type CacheSnapshot = BTreeMap<String, Vec<Event>>;

/// Backend for the schedule cache document.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the whole cache; a missing document is an empty cache.
    async fn load(&self) -> Result<CacheSnapshot>;

    /// Replace the whole cache.
    async fn save(&self, snapshot: &CacheSnapshot) -> Result<()>;
}

/// Backend for the recipient settings document.
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// Load all recipients; a missing document means none.
    async fn load_settings(&self) -> Result<Vec<UserSettings>>;

    /// Replace all recipients.
    async fn save_settings(&self, users: &[UserSettings]) -> Result<()>;
}
