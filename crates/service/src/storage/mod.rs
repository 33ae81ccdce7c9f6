//! Storage abstractions for the service layer
//!
//! The pet store persists its whole collection as one blob under one key.
//! `KvStore` is the byte-level contract it depends on; `FileKvStore` keeps
//! blobs on disk and `MemoryKvStore` keeps them in process (tests, ephemeral runs).

pub mod file_kv;
pub mod memory_kv;

use async_trait::async_trait;
use thiserror::Error;

pub use file_kv::FileKvStore;
pub use memory_kv::MemoryKvStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("i/o error on {key}: {message}")]
    Io { key: String, message: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("cannot encode blob: {0}")]
    Encode(String),
    #[error("persistence writer stopped")]
    WriterClosed,
}

impl StorageError {
    pub(crate) fn io(key: &str, err: std::io::Error) -> Self {
        Self::Io { key: key.to_string(), message: err.to_string() }
    }
}

/// Durable storage of named blobs.
///
/// `write` replaces the whole blob; a concurrent `read` sees either the old
/// or the new bytes, never a mix.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Stored bytes for `key`, or `None` if it was never written.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Reject keys that cannot safely become file names.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if models::is_valid_storage_key(key) { Ok(()) } else { Err(StorageError::InvalidKey(key.to_string())) }
}
