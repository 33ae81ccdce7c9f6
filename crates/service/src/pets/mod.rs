//! The shelter's pet collection: the store that owns it, the queue that
//! persists it, change notifications and read-only views.

pub mod catalog;
pub mod events;
pub mod query;
pub mod store;
pub mod writer;

pub use catalog::PetCatalog;
pub use events::{ChangeKind, StoreEvent, Subscription};
pub use query::ShelterStats;
pub use store::{PersistenceStatus, PetStore, PetStoreOptions, DEFAULT_EVENT_CAPACITY, DEFAULT_STORAGE_KEY};
