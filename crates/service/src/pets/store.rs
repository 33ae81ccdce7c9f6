use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
pub use models::DEFAULT_STORAGE_KEY;
use models::{validate_transition, AdopterInfo, AdoptionStatus, PetDraft, PetRecord};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    events::{ChangeKind, StoreEvent, Subscription},
    query::{self, ShelterStats},
    writer::{PendingWrite, PersistWriter, WriterSnapshot},
};
use crate::{
    errors::ServiceError,
    storage::{validate_key, KvStore, StorageError},
};

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct PetStoreOptions {
    pub key: String,
    pub event_capacity: usize,
}

impl Default for PetStoreOptions {
    fn default() -> Self {
        Self { key: DEFAULT_STORAGE_KEY.to_string(), event_capacity: DEFAULT_EVENT_CAPACITY }
    }
}

/// Diagnostics about how in-memory and durable state relate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistenceStatus {
    /// Why startup fell back to an empty collection, if it did.
    pub load_error: Option<String>,
    pub writer: WriterSnapshot,
}

impl PersistenceStatus {
    /// Durable storage holds exactly what memory holds.
    pub fn in_sync(&self) -> bool { self.writer.pending == 0 && self.writer.last_error.is_none() }
}

/// Sole owner of the shelter's pet collection.
///
/// Mutations apply to memory immediately, notify subscribers, then wait for
/// the full collection to be persisted. A failed write is logged and kept in
/// [`PersistenceStatus`]; the in-memory change stands and the next successful
/// write brings storage back in line.
pub struct PetStore {
    pets: RwLock<Vec<PetRecord>>,
    writer: PersistWriter,
    events: broadcast::Sender<StoreEvent>,
    key: String,
    load_error: Option<String>,
}

impl PetStore {
    /// Load with default options.
    pub async fn load(kv: Arc<dyn KvStore>) -> Result<Arc<Self>, ServiceError> {
        Self::load_with(kv, PetStoreOptions::default()).await
    }

    /// Read the stored collection once and start the persistence writer.
    ///
    /// Unreadable or corrupt data never fails the load: the store starts empty
    /// and the reason is kept in [`PersistenceStatus::load_error`]. Only an
    /// invalid storage key is an error.
    pub async fn load_with(kv: Arc<dyn KvStore>, options: PetStoreOptions) -> Result<Arc<Self>, ServiceError> {
        validate_key(&options.key)?;
        let key = options.key;

        let (pets, load_error) = match kv.read(&key).await {
            Ok(None) => {
                info!(%key, "no stored pet collection; starting empty");
                (Vec::new(), None)
            }
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<PetRecord>>(&bytes) {
                Ok(pets) => (sanitize(pets), None),
                Err(e) => {
                    warn!(%key, error = %e, "stored pet collection is corrupt; starting empty");
                    preserve_corrupt_blob(kv.as_ref(), &key, &bytes).await;
                    (Vec::new(), Some(format!("corrupt pet collection: {e}")))
                }
            },
            Err(e) => {
                warn!(%key, error = %e, "cannot read stored pet collection; starting empty");
                (Vec::new(), Some(e.to_string()))
            }
        };
        info!(%key, pets = pets.len(), "pet store loaded");

        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Ok(Arc::new(Self {
            pets: RwLock::new(pets),
            writer: PersistWriter::spawn(kv, key.clone()),
            events,
            key,
            load_error,
        }))
    }

    pub fn key(&self) -> &str { &self.key }

    // ----- mutations -------------------------------------------------------

    /// Create a pet from `draft`: fresh id, status `Available`, appended last.
    #[instrument(skip_all, fields(name = %draft.name))]
    pub async fn add(&self, draft: PetDraft) -> Result<PetRecord, ServiceError> {
        let (record, snapshot, pending) = self.mutate(|pets| {
            let id = fresh_id(pets);
            let record = draft.into_record(id);
            pets.push(record.clone());
            Ok(record)
        })?;
        info!(pet_id = %record.id, "pet added");
        self.notify(ChangeKind::Added { id: record.id.clone() }, snapshot);
        self.settle(pending).await;
        Ok(record)
    }

    /// Replace the stored record that has `record.id`, keeping its position.
    ///
    /// Adopter fields are normalized first (cleared unless adopted; an adopted
    /// record must carry valid adopter info). Returns whether a record was
    /// replaced; an unknown id changes nothing.
    #[instrument(skip_all, fields(pet_id = %record.id))]
    pub async fn update(&self, mut record: PetRecord) -> Result<bool, ServiceError> {
        record.normalize_adoption_fields(Utc::now())?;
        let id = record.id.clone();
        let (replaced, snapshot, pending) = self.mutate(|pets| {
            Ok(match pets.iter_mut().find(|p| p.id == record.id) {
                Some(slot) => {
                    *slot = record;
                    true
                }
                None => false,
            })
        })?;
        if replaced {
            info!("pet updated");
            self.notify(ChangeKind::Updated { id }, snapshot);
        } else {
            debug!("update for unknown pet ignored");
        }
        self.settle(pending).await;
        Ok(replaced)
    }

    /// Move a pet to `status`.
    ///
    /// Entering `Adopted` needs adopter name and contact and stamps the
    /// adoption date; any other status clears both. Re-applying the current
    /// status re-runs the same rules. Invalid input is rejected before anything
    /// changes. Returns whether the pet exists.
    #[instrument(skip_all, fields(pet_id = %id, status = %status))]
    pub async fn set_adoption_status(
        &self,
        id: &str,
        status: AdoptionStatus,
        adopter: Option<AdopterInfo>,
    ) -> Result<bool, ServiceError> {
        validate_transition(status, adopter.as_ref())?;
        let now = Utc::now();
        let (found, snapshot, pending) = self.mutate(|pets| match pets.iter_mut().find(|p| p.id == id) {
            Some(pet) => {
                pet.apply_status(status, adopter, now)?;
                Ok(true)
            }
            None => Ok(false),
        })?;
        if found {
            info!("adoption status changed");
            self.notify(ChangeKind::StatusChanged { id: id.to_string(), status }, snapshot);
        } else {
            debug!("status change for unknown pet ignored");
        }
        self.settle(pending).await;
        Ok(found)
    }

    /// Remove the pet with `id`. Returns whether it existed; deleting twice is harmless.
    #[instrument(skip_all, fields(pet_id = %id))]
    pub async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let (existed, snapshot, pending) = self.mutate(|pets| {
            let before = pets.len();
            pets.retain(|p| p.id != id);
            Ok(pets.len() != before)
        })?;
        if existed {
            info!("pet deleted");
            self.notify(ChangeKind::Deleted { id: id.to_string() }, snapshot);
        } else {
            debug!("delete for unknown pet ignored");
        }
        self.settle(pending).await;
        Ok(existed)
    }

    /// Wait until every write queued so far has been handled.
    pub async fn flush(&self) { self.writer.flush().await }

    // ----- reads -----------------------------------------------------------

    pub fn list_all(&self) -> Vec<PetRecord> { self.pets.read().clone() }

    pub fn get(&self, id: &str) -> Option<PetRecord> {
        self.pets.read().iter().find(|p| p.id == id).cloned()
    }

    /// Pets matching `predicate`, in collection order. Never touches storage.
    pub fn query<F>(&self, predicate: F) -> Vec<PetRecord>
    where
        F: Fn(&PetRecord) -> bool,
    {
        self.pets.read().iter().filter(|&p| predicate(p)).cloned().collect()
    }

    pub fn search(&self, text: &str) -> Vec<PetRecord> { query::search(&self.pets.read(), text) }

    pub fn list_available_for_adoption(&self) -> Vec<PetRecord> {
        query::available_for_adoption(&self.pets.read())
    }

    pub fn list_adopted(&self) -> Vec<PetRecord> { query::adopted(&self.pets.read()) }

    pub fn list_by_species(&self, species: &str) -> Vec<PetRecord> {
        query::by_species(&self.pets.read(), species)
    }

    pub fn recently_added(&self, limit: usize) -> Vec<PetRecord> {
        query::recently_added(&self.pets.read(), limit)
    }

    pub fn adoption_history(&self) -> Vec<PetRecord> { query::adoption_history(&self.pets.read()) }

    pub fn stats(&self) -> ShelterStats { query::stats(&self.pets.read()) }

    pub fn len(&self) -> usize { self.pets.read().len() }

    pub fn is_empty(&self) -> bool { self.pets.read().is_empty() }

    // ----- notifications & diagnostics ------------------------------------

    pub fn subscribe(&self) -> Subscription { Subscription::new(self.events.subscribe()) }

    pub fn persistence_status(&self) -> PersistenceStatus {
        PersistenceStatus { load_error: self.load_error.clone(), writer: self.writer.snapshot() }
    }

    // ----- internals -------------------------------------------------------

    /// Run `f` under the write lock and enqueue the resulting collection for
    /// persistence before the lock is released, so queue order is mutation order.
    /// If `f` fails nothing is enqueued and the collection is left as `f` left it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<PetRecord>) -> Result<T, ServiceError>,
    ) -> Result<(T, Arc<Vec<PetRecord>>, PendingWrite), ServiceError> {
        let mut pets = self.pets.write();
        let out = f(&mut pets)?;
        let snapshot = Arc::new(pets.clone());
        let pending = match serde_json::to_vec(snapshot.as_ref()) {
            Ok(bytes) => self.writer.submit(bytes),
            Err(e) => PendingWrite::resolved(Err(StorageError::Encode(e.to_string()))),
        };
        drop(pets);
        Ok((out, snapshot, pending))
    }

    fn notify(&self, change: ChangeKind, snapshot: Arc<Vec<PetRecord>>) {
        // no subscribers is fine
        let _ = self.events.send(StoreEvent { change, snapshot });
    }

    async fn settle(&self, pending: PendingWrite) {
        if let Err(e) = pending.wait().await {
            warn!(key = %self.key, error = %e, "pet collection not persisted; in-memory change kept");
        }
    }
}

/// Unique among `pets`; v4 collisions are astronomically unlikely but cheap to rule out.
fn fresh_id(pets: &[PetRecord]) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !pets.iter().any(|p| p.id == id) {
            return id;
        }
    }
}

/// Drop duplicate ids (first wins) and repair records that break the adopter invariant.
fn sanitize(pets: Vec<PetRecord>) -> Vec<PetRecord> {
    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(pets.len());
    for mut pet in pets {
        if pet.id.is_empty() || !seen.insert(pet.id.clone()) {
            warn!(pet_id = %pet.id, "dropping stored pet with empty or duplicate id");
            continue;
        }
        if let Some(repair) = pet.repair_adoption_fields(now) {
            warn!(pet_id = %pet.id, ?repair, "repaired inconsistent adoption fields");
        }
        out.push(pet);
    }
    out
}

/// Keep unreadable data aside so the next write does not destroy it.
async fn preserve_corrupt_blob(kv: &dyn KvStore, key: &str, bytes: &[u8]) {
    let backup = format!("{key}.corrupt");
    match kv.write(&backup, bytes).await {
        Ok(()) => info!(%backup, "corrupt pet collection preserved"),
        Err(e) => warn!(%backup, error = %e, "could not preserve corrupt pet collection"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    async fn fresh() -> (Arc<MemoryKvStore>, Arc<PetStore>) {
        let kv = MemoryKvStore::new();
        let store = PetStore::load(kv.clone()).await.expect("load");
        (kv, store)
    }

    fn stored(kv: &MemoryKvStore) -> Vec<PetRecord> {
        let bytes = kv.get_raw(DEFAULT_STORAGE_KEY).expect("blob written");
        serde_json::from_slice(&bytes).expect("valid blob")
    }

    #[tokio::test]
    async fn add_persists_full_collection() {
        let (kv, store) = fresh().await;
        let rex = store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        assert!(!rex.id.is_empty());
        assert_eq!(rex.adoption_status, AdoptionStatus::Available);
        assert_eq!(stored(&kv), store.list_all());
    }

    #[tokio::test]
    async fn invalid_transition_leaves_collection_unchanged() {
        let (kv, store) = fresh().await;
        let rex = store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        let writes = kv.write_count();

        let err = store.set_adoption_status(&rex.id, AdoptionStatus::Adopted, None).await.unwrap_err();
        assert!(err.is_validation());
        let err = store
            .set_adoption_status(&rex.id, AdoptionStatus::Adopted, Some(AdopterInfo::new("", "555")))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        assert_eq!(store.get(&rex.id), Some(rex));
        assert_eq!(kv.write_count(), writes);
    }

    #[tokio::test]
    async fn write_failure_keeps_in_memory_change() {
        let (kv, store) = fresh().await;
        kv.set_fail_writes(true);
        let rex = store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        assert_eq!(store.len(), 1);
        let status = store.persistence_status();
        assert!(!status.in_sync());
        assert!(matches!(status.writer.last_error, Some(StorageError::Unavailable(_))));
        assert!(kv.get_raw(DEFAULT_STORAGE_KEY).is_none());

        // next successful write converges storage with memory
        kv.set_fail_writes(false);
        store.delete("missing").await.unwrap();
        assert!(store.persistence_status().in_sync());
        assert_eq!(stored(&kv), vec![rex]);
    }

    #[tokio::test]
    async fn corrupt_blob_falls_back_to_empty_and_is_preserved() {
        let kv = MemoryKvStore::new();
        kv.insert_raw(DEFAULT_STORAGE_KEY, "{not json");
        let store = PetStore::load(kv.clone()).await.unwrap();
        assert!(store.is_empty());
        assert!(store.persistence_status().load_error.is_some());
        assert_eq!(kv.get_raw("pet_shelter.pets.corrupt"), Some(b"{not json".to_vec()));
    }

    #[tokio::test]
    async fn unreadable_storage_falls_back_to_empty() {
        let kv = MemoryKvStore::new();
        kv.insert_raw(DEFAULT_STORAGE_KEY, "[]");
        kv.set_fail_reads(true);
        let store = PetStore::load(kv.clone()).await.unwrap();
        assert!(store.is_empty());
        let load_error = store.persistence_status().load_error.expect("load error recorded");
        assert!(load_error.contains("injected read failure"));
        // nothing was treated as corrupt
        assert!(kv.get_raw("pet_shelter.pets.corrupt").is_none());

        // the store stays usable
        store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        assert_eq!(stored(&kv).len(), 1);
    }

    #[tokio::test]
    async fn load_keeps_records_with_both_legacy_and_canonical_keys() {
        let kv = MemoryKvStore::new();
        let raw = r#"[
            {"id":"1","name":"Tom","type":"Cat","status":"available"},
            {"id":"2","name":"Rex","type":"Dog","species":"Dog","status":"available","adoptionStatus":"Reserved"}
        ]"#;
        kv.insert_raw(DEFAULT_STORAGE_KEY, raw);
        let store = PetStore::load(kv.clone()).await.unwrap();
        assert!(store.persistence_status().load_error.is_none());
        let pets = store.list_all();
        assert_eq!(pets.len(), 2);
        assert_eq!(pets[0].species, "Cat");
        assert_eq!(pets[1].adoption_status, AdoptionStatus::Reserved);

        // rewritten with canonical names only
        store.delete("missing").await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&kv.get_raw(DEFAULT_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(value[1]["adoptionStatus"], "Reserved");
        assert!(value[1].get("status").is_none());
        assert!(value[1].get("type").is_none());
    }

    #[tokio::test]
    async fn load_repairs_and_dedupes() {
        let kv = MemoryKvStore::new();
        let raw = r#"[
            {"id":"a","name":"Rex","adoptionStatus":"Adopted"},
            {"id":"a","name":"Shadow"},
            {"id":"b","name":"Tom","status":"available","adopterInfo":{"name":"X","contact":"Y"}}
        ]"#;
        kv.insert_raw(DEFAULT_STORAGE_KEY, raw);
        let store = PetStore::load(kv.clone()).await.unwrap();
        let pets = store.list_all();
        assert_eq!(pets.len(), 2);
        assert_eq!(pets[0].name, "Rex");
        assert_eq!(pets[0].adoption_status, AdoptionStatus::Available);
        assert!(pets.iter().all(PetRecord::is_consistent));
        assert!(store.persistence_status().load_error.is_none());
    }

    #[tokio::test]
    async fn invalid_key_is_rejected() {
        let kv = MemoryKvStore::new();
        let options = PetStoreOptions { key: "../pets".into(), ..PetStoreOptions::default() };
        let res = PetStore::load_with(kv, options).await;
        assert!(matches!(res, Err(ServiceError::Storage(StorageError::InvalidKey(_)))));
    }

    #[tokio::test]
    async fn subscribers_see_each_change_with_snapshot() {
        let (_kv, store) = fresh().await;
        let mut sub = store.subscribe();

        let rex = store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        store
            .set_adoption_status(&rex.id, AdoptionStatus::Adopted, Some(AdopterInfo::new("Alice", "555-1234")))
            .await
            .unwrap();
        store.delete("missing").await.unwrap();
        store.delete(&rex.id).await.unwrap();

        let e = sub.next().await.unwrap();
        assert_eq!(e.change, ChangeKind::Added { id: rex.id.clone() });
        assert_eq!(e.snapshot.len(), 1);
        let e = sub.next().await.unwrap();
        assert_eq!(e.change, ChangeKind::StatusChanged { id: rex.id.clone(), status: AdoptionStatus::Adopted });
        // the no-op delete produced no event
        let e = sub.next().await.unwrap();
        assert_eq!(e.change, ChangeKind::Deleted { id: rex.id.clone() });
        assert!(e.snapshot.is_empty());
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_with_small_buffer_catches_up() {
        let options = PetStoreOptions { event_capacity: 1, ..PetStoreOptions::default() };
        let store = PetStore::load_with(MemoryKvStore::new(), options).await.unwrap();
        let mut sub = store.subscribe();

        store.add(PetDraft::new("Rex", "Dog")).await.unwrap();
        store.add(PetDraft::new("Luna", "Cat")).await.unwrap();
        let max = store.add(PetDraft::new("Max", "Dog")).await.unwrap();

        let e = sub.next().await.unwrap();
        assert_eq!(e.change, ChangeKind::Added { id: max.id });
        assert_eq!(e.snapshot.len(), 3);
        assert!(sub.try_next().is_none());
    }
}
