//! Read-only views over a pet collection.
//!
//! Pure functions over slices; the store calls them on its in-memory
//! collection and hands back owned copies.

use models::{AdoptionStatus, PetRecord};
use serde::Serialize;

/// Species selector that matches every pet.
pub const ALL_SPECIES: &str = "all";

/// Case-insensitive substring match on name, breed or status.
/// Blank text matches everything.
pub fn matches_search(pet: &PetRecord, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [pet.name.as_str(), pet.breed.as_str(), pet.adoption_status.as_str()]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

pub fn search(pets: &[PetRecord], text: &str) -> Vec<PetRecord> {
    pets.iter().filter(|p| matches_search(p, text)).cloned().collect()
}

/// Pets that can still be adopted: anything not yet `Adopted`.
pub fn available_for_adoption(pets: &[PetRecord]) -> Vec<PetRecord> {
    pets.iter().filter(|p| !p.adoption_status.is_adopted()).cloned().collect()
}

pub fn adopted(pets: &[PetRecord]) -> Vec<PetRecord> {
    pets.iter().filter(|p| p.adoption_status.is_adopted()).cloned().collect()
}

/// Exact species match ignoring case; [`ALL_SPECIES`] selects everything.
pub fn by_species(pets: &[PetRecord], species: &str) -> Vec<PetRecord> {
    let wanted = species.trim();
    if wanted.eq_ignore_ascii_case(ALL_SPECIES) {
        return pets.to_vec();
    }
    let wanted = wanted.to_lowercase();
    pets.iter()
        .filter(|p| p.species.trim().to_lowercase() == wanted)
        .cloned()
        .collect()
}

/// Newest first. Adds append, so reverse insertion order is creation recency.
pub fn recently_added(pets: &[PetRecord], limit: usize) -> Vec<PetRecord> {
    pets.iter().rev().take(limit).cloned().collect()
}

/// Adopted pets, most recent adoption first.
pub fn adoption_history(pets: &[PetRecord]) -> Vec<PetRecord> {
    let mut out = adopted(pets);
    // stable: same-date adoptions keep collection order
    out.sort_by(|a, b| b.adoption_date.cmp(&a.adoption_date));
    out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShelterStats {
    pub total: usize,
    pub available: usize,
    pub reserved: usize,
    pub adopted: usize,
}

pub fn stats(pets: &[PetRecord]) -> ShelterStats {
    pets.iter().fold(ShelterStats { total: pets.len(), ..ShelterStats::default() }, |mut acc, p| {
        match p.adoption_status {
            AdoptionStatus::Available => acc.available += 1,
            AdoptionStatus::Reserved => acc.reserved += 1,
            AdoptionStatus::Adopted => acc.adopted += 1,
        }
        acc
    })
}
