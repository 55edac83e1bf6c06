//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── schedule_cache.json   # {"<entity id>": [event, ...], ...}
//! └── user_settings.json    # {"users": [settings, ...]}
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! crash mid-write leaves the previous document intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{PathsConfig, UserSettings};
use crate::storage::{CacheSnapshot, CacheStore, SettingsStorage};

/// On-disk shape of the settings document.
#[derive(Debug, Default, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    users: Vec<UserSettings>,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    paths: PathsConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(root_dir, PathsConfig::default())
    }

    /// Create a LocalStorage with custom document names.
    pub fn with_paths(root_dir: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths,
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CacheStore for LocalStorage {
    async fn load(&self) -> Result<CacheSnapshot> {
        match self.read_json(&self.paths.cache_file).await? {
            Some(snapshot) => Ok(snapshot),
            None => {
                log::info!("No {} found, starting empty", self.paths.cache_file);
                Ok(CacheSnapshot::new())
            }
        }
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        self.write_json(&self.paths.cache_file, snapshot).await
    }
}

#[async_trait]
impl SettingsStorage for LocalStorage {
    async fn load_settings(&self) -> Result<Vec<UserSettings>> {
        let doc: Option<SettingsDocument> = self.read_json(&self.paths.settings_file).await?;
        Ok(doc.unwrap_or_default().users)
    }

    async fn save_settings(&self, users: &[UserSettings]) -> Result<()> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            users: &'a [UserSettings],
        }
        self.write_json(&self.paths.settings_file, &Borrowed { users })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{kyiv, lesson};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
        assert!(storage.load().await.unwrap().is_empty());
        assert!(storage.load_settings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_round_trip_preserves_events() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let events = vec![
            lesson("*Фізика* (Л) дистанційно", kyiv(2026, 10, 20, 8, 30)),
            lesson("Хімія (підгр. 2)", kyiv(2026, 10, 20, 10, 0)),
        ];
        let mut snapshot = CacheSnapshot::new();
        snapshot.insert("-4242".to_string(), events.clone());

        storage.save(&snapshot).await.unwrap();
        let loaded = storage.load().await.unwrap();

        let back = &loaded["-4242"];
        assert_eq!(back, &events);
        for (a, b) in back.iter().zip(&events) {
            assert_eq!(a.fingerprint(), b.fingerprint());
            assert_eq!(a.identity_key(), b.identity_key());
            assert_eq!(a.start_time().offset(), b.start_time().offset());
        }
    }

    #[tokio::test]
    async fn test_settings_document_shape() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut user = UserSettings::new(-100123);
        user.group_name = Some("КІ-24-1".into());
        storage.save_settings(&[user.clone()]).await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("user_settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["users"][0]["chat_id"], -100123);

        assert_eq!(storage.load_settings().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig {
            cache_file: "state/cache.json".into(),
            settings_file: "state/users.json".into(),
        };
        let storage = LocalStorage::with_paths(tmp.path(), paths);

        storage.save(&CacheSnapshot::new()).await.unwrap();
        assert!(tmp.path().join("state/cache.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("schedule_cache.json"), "{not json").unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(matches!(storage.load().await, Err(AppError::Json(_))));
    }
}
