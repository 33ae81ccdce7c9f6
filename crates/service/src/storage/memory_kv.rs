use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{validate_key, KvStore, StorageError};

/// In-process blob store.
///
/// Besides backing the `memory` storage backend it lets tests inject read
/// and write failures and slow writes.
#[derive(Default)]
pub struct MemoryKvStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Seed a blob directly, bypassing failure injection.
    pub fn insert_raw(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs.lock().insert(key.to_string(), bytes.into());
    }

    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> { self.blobs.lock().get(key).cloned() }

    /// While set, every `read` fails with `StorageError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) { self.fail_reads.store(fail, Ordering::SeqCst); }

    /// While set, every `write` fails with `StorageError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

    /// Delay applied before each write lands.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize { self.writes.load(Ordering::SeqCst) }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        Ok(self.get_raw(key))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
