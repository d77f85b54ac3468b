//! JSON file state storage.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::cursor::CursorState;
use crate::errors::CursorStoreError;
use crate::interfaces::StateStorage;

/// Stores the cursor state as a JSON document on disk.
///
/// Saves write a sibling `<path>.tmp` file, flush it to disk and rename it
/// over the target, so the state file is always either the old or the new
/// version.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temporary_path(&self) -> PathBuf {
        let mut tmp: OsString = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl StateStorage for JsonFileStorage {
    async fn load(&self) -> Result<Option<CursorState>, CursorStoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &CursorState) -> Result<(), CursorStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let body = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.temporary_path();

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), "Saved cursor state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use movies_etl_shared::EntityKind;

    #[tokio::test]
    async fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("state.json"));

        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("state.json"));

        let mut state = CursorState::default();
        state.set(
            EntityKind::FilmWorks,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        );
        storage.save(&state).await.unwrap();

        assert_eq!(storage.load().await.unwrap(), Some(state));
        assert!(!storage.temporary_path().exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join("state.json"));

        storage.save(&CursorState::default()).await.unwrap();

        assert!(storage.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let storage = JsonFileStorage::new(path);
        assert!(matches!(
            storage.load().await,
            Err(CursorStoreError::Serialization(_))
        ));
    }
}
