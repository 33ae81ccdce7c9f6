use async_trait::async_trait;
use models::{AdopterInfo, AdoptionStatus, PetDraft, PetRecord};

use super::store::PetStore;
use crate::errors::ServiceError;

/// The operations screens use to read and change the shelter's pets.
///
/// Every mutation goes through here; records handed out are copies, so
/// changing one does nothing until it is passed back to `update`.
#[async_trait]
pub trait PetCatalog: Send + Sync {
    fn list_all(&self) -> Vec<PetRecord>;
    fn list_available_for_adoption(&self) -> Vec<PetRecord>;
    fn list_adopted(&self) -> Vec<PetRecord>;
    fn search(&self, text: &str) -> Vec<PetRecord>;
    async fn add(&self, draft: PetDraft) -> Result<PetRecord, ServiceError>;
    async fn update(&self, record: PetRecord) -> Result<(), ServiceError>;
    async fn set_adoption_status(
        &self,
        id: &str,
        status: AdoptionStatus,
        adopter: Option<AdopterInfo>,
    ) -> Result<(), ServiceError>;
    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

#[async_trait]
impl PetCatalog for PetStore {
    fn list_all(&self) -> Vec<PetRecord> { PetStore::list_all(self) }
    fn list_available_for_adoption(&self) -> Vec<PetRecord> { PetStore::list_available_for_adoption(self) }
    fn list_adopted(&self) -> Vec<PetRecord> { PetStore::list_adopted(self) }
    fn search(&self, text: &str) -> Vec<PetRecord> { PetStore::search(self, text) }
    async fn add(&self, draft: PetDraft) -> Result<PetRecord, ServiceError> { PetStore::add(self, draft).await }
    async fn update(&self, record: PetRecord) -> Result<(), ServiceError> {
        PetStore::update(self, record).await.map(drop)
    }
    async fn set_adoption_status(
        &self,
        id: &str,
        status: AdoptionStatus,
        adopter: Option<AdopterInfo>,
    ) -> Result<(), ServiceError> {
        PetStore::set_adoption_status(self, id, status, adopter).await.map(drop)
    }
    async fn delete(&self, id: &str) -> Result<(), ServiceError> { PetStore::delete(self, id).await.map(drop) }
}
