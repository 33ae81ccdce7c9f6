//! Service layer owning the shelter's pet collection.
//! - `pets`: the store, its persistence queue, notifications and queries.
//! - `storage`: the key-value blob stores the collection is persisted to.
//! - `runtime`: wiring a store from application configuration.

pub mod errors;
pub mod pets;
pub mod runtime;
pub mod storage;

pub use errors::ServiceError;
pub use pets::{PetCatalog, PetStore};
