use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{validate_key, KvStore, StorageError};

/// Directory-backed blob store: each key is one `<key>.json` file.
///
/// Writes land in a hidden temp file first and are renamed over the target,
/// so a reader never observes a half-written blob.
#[derive(Clone, Debug)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open the store rooted at `dir`, creating the directory if missing.
    pub async fn new<P: Into<PathBuf>>(dir: P) -> Result<Arc<Self>, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Arc::new(Self { dir }))
    }

    /// File holding the blob for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.tmp"))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = self.temp_path_for(key);
        fs::write(&tmp, bytes).await.map_err(|e| StorageError::io(key, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::io(key, e));
        }
        debug!(key, bytes = bytes.len(), "blob written");
        Ok(())
    }
}
