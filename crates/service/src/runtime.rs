//! Runtime wiring
//!
//! Builds a ready-to-use `PetStore` from application configuration so binary
//! crates do not need to know about individual storage backends.

use std::sync::Arc;

use configs::{AppConfig, StorageBackend};
use tracing::info;

use crate::{
    errors::ServiceError,
    pets::{PetStore, PetStoreOptions},
    storage::{FileKvStore, KvStore, MemoryKvStore},
};

/// Open the configured storage backend and load the pet store from it.
pub async fn open_store(cfg: &AppConfig) -> Result<Arc<PetStore>, ServiceError> {
    let kv: Arc<dyn KvStore> = match cfg.storage.backend {
        StorageBackend::File => FileKvStore::new(&cfg.storage.data_dir).await?,
        StorageBackend::Memory => MemoryKvStore::new(),
    };
    info!(backend = ?cfg.storage.backend, data_dir = %cfg.storage.data_dir, "storage opened");
    let options = PetStoreOptions { key: cfg.storage.key.clone(), event_capacity: cfg.store.event_capacity };
    PetStore::load_with(kv, options).await
}
