use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};

use super::{Storage, StorageError};

/// JSON file-backed key-value storage.
///
/// The whole map lives in memory and is rewritten to disk on every mutation
/// (write to a sibling temp file, then rename). An unreadable or corrupt
/// file is treated as empty so a damaged session never blocks startup.
#[derive(Clone)]
pub struct FileStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
    file_path: PathBuf,
}

impl FileStorage {
    /// Open storage at `path`, creating parent directories as needed.
    /// The file itself is only created on first write.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, StorageError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }

        let map: HashMap<String, String> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "session file is corrupt; starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };
        debug!(path = %file_path.display(), entries = map.len(), "file storage opened");

        Ok(Arc::new(Self { inner: Arc::new(RwLock::new(map)), file_path }))
    }

    pub fn path(&self) -> &std::path::Path { &self.file_path }

    async fn save(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(map).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.file_path).await.map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // hold the write lock across save so concurrent writers persist in order
        let mut map = self.inner.write().await;
        let previous = map.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&map).await {
            match previous {
                Some(v) => { map.insert(key.to_string(), v); }
                None => { map.remove(key); }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().await;
        let Some(previous) = map.remove(key) else { return Ok(()) };
        if let Err(e) = self.save(&map).await {
            map.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("session_store_{}/session.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn file_storage_persists_across_reopen() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let storage = FileStorage::open(&path).await?;
        assert_eq!(storage.get("access_token").await?, None);

        storage.set("access_token", "abc123").await?;
        storage.set("teacher", r#"{"id":"1"}"#).await?;
        storage.remove("teacher").await?;

        let reopened = FileStorage::open(&path).await?;
        assert_eq!(reopened.get("access_token").await?.as_deref(), Some("abc123"));
        assert_eq!(reopened.get("teacher").await?, None);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_opens_empty() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        tokio::fs::write(&path, b"{not json").await?;

        let storage = FileStorage::open(&path).await?;
        assert_eq!(storage.get("access_token").await?, None);
        storage.set("access_token", "fresh").await?;
        assert_eq!(FileStorage::open(&path).await?.get("access_token").await?.as_deref(), Some("fresh"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn removing_missing_key_does_not_create_file() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let storage = FileStorage::open(&path).await?;
        storage.remove("teacher").await?;
        assert!(tokio::fs::metadata(&path).await.is_err());
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }
}
