use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("model error: {0}")]
    Model(#[from] models::errors::ModelError),
}

impl ServiceError {
    /// True for errors the caller caused and can fix by changing its input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Model(models::errors::ModelError::Validation(_)))
    }
}
