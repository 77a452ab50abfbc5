use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, instrument};

use crate::fs::operations::replace_file;

use super::PersistentStore;

/// The main realization of [PersistentStore]. Each key maps to `<dir>/<key>.json`.
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    pub fn new(store_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self { store_dir })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key == "."
            || key.contains("..")
            || key.contains(['/', '\\'])
            || Path::new(key).is_absolute()
        {
            bail!("Invalid store key {key:?}");
        }
        Ok(self.store_dir.join(format!("{key}.json")))
    }

    async fn read_locked(path: &Path) -> std::result::Result<String, std::io::Error> {
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut value = String::new();
        let read = file.read_to_string(&mut value).await;
        file.unlock_async().await?;
        read?;
        Ok(value)
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match Self::read_locked(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing stored for {key}");
                Ok(None)
            }
            Err(e) => Err(e)?,
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.key_path(key)?;
        replace_file(&path, value.as_bytes()).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::storage::{file_store::FileStore, PersistentStore};

    #[tokio::test]
    async fn test_file_store_basic() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("store"))?;

        assert_eq!(store.get("screen_time_data").await?, None);

        store.set("screen_time_data", "{\"a\":1}".into()).await?;
        assert_eq!(
            store.get("screen_time_data").await?.as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.path().join("store/screen_time_data.json").exists());

        store.set("screen_time_data", "{}".into()).await?;
        assert_eq!(store.get("screen_time_data").await?.as_deref(), Some("{}"));

        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_remove() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        store.remove("missing").await?;

        store.set("value", "1".into()).await?;
        store.remove("value").await?;
        assert_eq!(store.get("value").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_keys_are_independent() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        store.set("first", "1".into()).await?;
        store.set("second", "2".into()).await?;
        store.remove("first").await?;

        assert_eq!(store.get("first").await?, None);
        assert_eq!(store.get("second").await?.as_deref(), Some("2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_keys() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        for key in ["", "..", "../escape", "nested/key", "nested\\key", "/abs"] {
            assert!(store.get(key).await.is_err(), "{key:?} should be rejected");
            assert!(store.set(key, "1".into()).await.is_err());
            assert!(store.remove(key).await.is_err());
        }
        Ok(())
    }
}
