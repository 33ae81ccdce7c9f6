//! Domain types for the shelter: pet records, drafts, adoption status and
//! adopter details, plus the pure rules for moving between statuses.

pub mod errors;
pub mod pet;
pub mod storage_key;

pub use pet::{validate_transition, AdopterInfo, AdoptionStatus, PetDraft, PetRecord, Repair};
pub use storage_key::{is_valid_storage_key, DEFAULT_STORAGE_KEY};
