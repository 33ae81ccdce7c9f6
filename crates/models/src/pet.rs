use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Adoption lifecycle of a single animal.
///
/// Any state may move to any other state; `Adopted` is not terminal
/// (returning a pet moves it back to `Available`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdoptionStatus {
    #[default]
    #[serde(alias = "available")]
    Available,
    #[serde(alias = "reserved")]
    Reserved,
    #[serde(alias = "adopted")]
    Adopted,
}

impl AdoptionStatus {
    pub const ALL: [AdoptionStatus; 3] = [Self::Available, Self::Reserved, Self::Adopted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Reserved => "Reserved",
            Self::Adopted => "Adopted",
        }
    }

    pub fn is_adopted(&self) -> bool { matches!(self, Self::Adopted) }
}

impl fmt::Display for AdoptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AdoptionStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

/// Contact details of the person who adopted a pet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdopterInfo {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl AdopterInfo {
    pub fn new(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self { name: name.into(), contact: contact.into(), image_uri: None }
    }

    pub fn with_image(mut self, uri: impl Into<String>) -> Self {
        self.image_uri = Some(uri.into());
        self
    }

    /// Name and contact are both required and may not be blank.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Validation("adopter name is required".into()));
        }
        if self.contact.trim().is_empty() {
            return Err(ModelError::Validation("adopter contact is required".into()));
        }
        Ok(())
    }
}

/// Input for creating a pet: every display attribute, but no id and no status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PetDraftWire")]
pub struct PetDraft {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub gender: String,
    pub age: String,
    pub weight: String,
    pub health_status: String,
    pub vaccinated: bool,
    pub neutered: bool,
    pub description: String,
    pub image_uri: Option<String>,
}

impl PetDraft {
    pub fn new(name: impl Into<String>, species: impl Into<String>) -> Self {
        Self { name: name.into(), species: species.into(), ..Self::default() }
    }

    /// Finalize into a record with the given id; status starts at `Available`.
    pub fn into_record(self, id: String) -> PetRecord {
        PetRecord {
            id,
            name: self.name,
            species: self.species,
            breed: self.breed,
            gender: self.gender,
            age: self.age,
            weight: self.weight,
            health_status: self.health_status,
            vaccinated: self.vaccinated,
            neutered: self.neutered,
            description: self.description,
            image_uri: self.image_uri,
            adoption_status: AdoptionStatus::Available,
            adopter_info: None,
            adoption_date: None,
        }
    }
}

/// One animal in the shelter collection. Field names are the persisted wire names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PetRecordWire")]
pub struct PetRecord {
    pub id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub gender: String,
    pub age: String,
    pub weight: String,
    pub health_status: String,
    pub vaccinated: bool,
    pub neutered: bool,
    pub description: String,
    pub image_uri: Option<String>,
    pub adoption_status: AdoptionStatus,
    pub adopter_info: Option<AdopterInfo>,
    pub adoption_date: Option<DateTime<Utc>>,
}

// Stored records may carry a legacy key next to its canonical one
// (`status` with `adoptionStatus`, `type` with `species`). Both are read
// separately and the canonical key wins.

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PetDraftWire {
    name: String,
    species: Option<String>,
    #[serde(rename = "type")]
    legacy_type: Option<String>,
    breed: String,
    gender: String,
    age: String,
    weight: String,
    health_status: String,
    vaccinated: bool,
    neutered: bool,
    description: String,
    image_uri: Option<String>,
}

impl From<PetDraftWire> for PetDraft {
    fn from(w: PetDraftWire) -> Self {
        Self {
            name: w.name,
            species: w.species.or(w.legacy_type).unwrap_or_default(),
            breed: w.breed,
            gender: w.gender,
            age: w.age,
            weight: w.weight,
            health_status: w.health_status,
            vaccinated: w.vaccinated,
            neutered: w.neutered,
            description: w.description,
            image_uri: w.image_uri,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PetRecordWire {
    id: String,
    #[serde(flatten)]
    draft: PetDraftWire,
    #[serde(default)]
    adoption_status: Option<AdoptionStatus>,
    #[serde(default, rename = "status")]
    legacy_status: Option<AdoptionStatus>,
    #[serde(default)]
    adopter_info: Option<AdopterInfo>,
    #[serde(default)]
    adoption_date: Option<DateTime<Utc>>,
}

impl From<PetRecordWire> for PetRecord {
    fn from(w: PetRecordWire) -> Self {
        let mut record = PetDraft::from(w.draft).into_record(w.id);
        record.adoption_status = w.adoption_status.or(w.legacy_status).unwrap_or_default();
        record.adopter_info = w.adopter_info;
        record.adoption_date = w.adoption_date;
        record
    }
}

/// What load-time repair did to a record that broke the adopter invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repair {
    /// Not adopted, but carried adopter info or an adoption date.
    ClearedAdopterFields,
    /// Marked adopted without usable adopter info.
    DemotedToAvailable,
    /// Adopted with adopter info but no date.
    StampedAdoptionDate,
}

/// Reject a transition that cannot be applied; leaves nothing mutated.
pub fn validate_transition(status: AdoptionStatus, adopter: Option<&AdopterInfo>) -> Result<(), ModelError> {
    if status.is_adopted() {
        match adopter {
            Some(info) => info.validate()?,
            None => return Err(ModelError::Validation("adopter info is required to mark a pet adopted".into())),
        }
    }
    Ok(())
}

impl PetRecord {
    /// Adopter info and adoption date are present exactly when the pet is adopted.
    pub fn is_consistent(&self) -> bool {
        let adopted = self.adoption_status.is_adopted();
        self.adopter_info.is_some() == adopted && self.adoption_date.is_some() == adopted
    }

    /// Move to `status`. Entering `Adopted` stores the adopter and stamps `now`;
    /// any other status clears both, whatever adopter was passed.
    pub fn apply_status(
        &mut self,
        status: AdoptionStatus,
        adopter: Option<AdopterInfo>,
        now: DateTime<Utc>,
    ) -> Result<(), ModelError> {
        validate_transition(status, adopter.as_ref())?;
        self.adoption_status = status;
        if status.is_adopted() {
            self.adopter_info = adopter;
            self.adoption_date = Some(now);
        } else {
            self.adopter_info = None;
            self.adoption_date = None;
        }
        Ok(())
    }

    /// Bring a caller-supplied full record in line with the adopter invariant.
    /// An adopted record without valid adopter info is rejected.
    pub fn normalize_adoption_fields(&mut self, now: DateTime<Utc>) -> Result<(), ModelError> {
        if !self.adoption_status.is_adopted() {
            self.adopter_info = None;
            self.adoption_date = None;
            return Ok(());
        }
        validate_transition(self.adoption_status, self.adopter_info.as_ref())?;
        if self.adoption_date.is_none() {
            self.adoption_date = Some(now);
        }
        Ok(())
    }

    /// Lenient variant of [`Self::normalize_adoption_fields`] for stored data: never fails.
    pub fn repair_adoption_fields(&mut self, now: DateTime<Utc>) -> Option<Repair> {
        if self.is_consistent() {
            return None;
        }
        if !self.adoption_status.is_adopted() {
            self.adopter_info = None;
            self.adoption_date = None;
            return Some(Repair::ClearedAdopterFields);
        }
        let usable = self.adopter_info.as_ref().is_some_and(|info| info.validate().is_ok());
        if !usable {
            self.adoption_status = AdoptionStatus::Available;
            self.adopter_info = None;
            self.adoption_date = None;
            return Some(Repair::DemotedToAvailable);
        }
        self.adoption_date = Some(now);
        Some(Repair::StampedAdoptionDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rex() -> PetRecord {
        PetDraft::new("Rex", "Dog").into_record("pet-1".into())
    }

    #[test]
    fn draft_becomes_available_record() {
        let rec = rex();
        assert_eq!(rec.adoption_status, AdoptionStatus::Available);
        assert!(rec.adopter_info.is_none());
        assert!(rec.is_consistent());
    }

    #[test]
    fn adopting_requires_name_and_contact() {
        let mut rec = rex();
        let now = Utc::now();
        let err = rec.apply_status(AdoptionStatus::Adopted, None, now).unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
        let err = rec
            .apply_status(AdoptionStatus::Adopted, Some(AdopterInfo::new("Alice", "  ")), now)
            .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
        // failed transitions leave the record untouched
        assert_eq!(rec, rex());
    }

    #[test]
    fn adopt_then_return_clears_adopter() {
        let mut rec = rex();
        let now = Utc::now();
        rec.apply_status(AdoptionStatus::Adopted, Some(AdopterInfo::new("Alice", "555-1234")), now).unwrap();
        assert_eq!(rec.adoption_date, Some(now));
        assert_eq!(rec.adopter_info.as_ref().map(|a| a.name.as_str()), Some("Alice"));

        // adopter passed alongside a non-adopted status is ignored
        rec.apply_status(AdoptionStatus::Available, Some(AdopterInfo::new("Bob", "1")), now).unwrap();
        assert!(rec.adopter_info.is_none());
        assert!(rec.adoption_date.is_none());
        assert!(rec.is_consistent());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("adopted".parse::<AdoptionStatus>().unwrap(), AdoptionStatus::Adopted);
        assert_eq!(" Reserved ".parse::<AdoptionStatus>().unwrap(), AdoptionStatus::Reserved);
        assert!(matches!("lost".parse::<AdoptionStatus>(), Err(ModelError::UnknownStatus(_))));
    }

    #[test]
    fn wire_shape_uses_camel_case_names() {
        let mut rec = rex();
        rec.health_status = "Healthy".into();
        rec.apply_status(AdoptionStatus::Adopted, Some(AdopterInfo::new("Alice", "555-1234")), Utc::now())
            .unwrap();
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["healthStatus"], "Healthy");
        assert_eq!(value["adoptionStatus"], "Adopted");
        assert_eq!(value["adopterInfo"]["contact"], "555-1234");
        assert!(value["adoptionDate"].is_string());
        assert!(value["imageUri"].is_null());
    }

    #[test]
    fn legacy_field_spellings_are_accepted() {
        let raw = r#"{"id":"1700000000000","name":"Tom","type":"Cat","status":"available"}"#;
        let rec: PetRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.species, "Cat");
        assert_eq!(rec.adoption_status, AdoptionStatus::Available);
        assert!(!rec.vaccinated);
    }

    #[test]
    fn canonical_key_wins_over_legacy_key() {
        let raw = r#"{"id":"2","name":"Tom","type":"Cat","species":"Dog","status":"available","adoptionStatus":"Reserved"}"#;
        let rec: PetRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.species, "Dog");
        assert_eq!(rec.adoption_status, AdoptionStatus::Reserved);

        let draft: PetDraft = serde_json::from_str(r#"{"name":"Tom","type":"Cat","species":"Dog"}"#).unwrap();
        assert_eq!(draft.species, "Dog");
        let draft: PetDraft = serde_json::from_str(r#"{"name":"Tom","type":"Cat"}"#).unwrap();
        assert_eq!(draft.species, "Cat");
    }

    #[test]
    fn normalize_rejects_adopted_without_adopter() {
        let mut rec = rex();
        rec.adoption_status = AdoptionStatus::Adopted;
        assert!(rec.normalize_adoption_fields(Utc::now()).is_err());

        let mut rec = rex();
        rec.adoption_status = AdoptionStatus::Adopted;
        rec.adopter_info = Some(AdopterInfo::new("Alice", "555-1234"));
        rec.normalize_adoption_fields(Utc::now()).unwrap();
        assert!(rec.adoption_date.is_some());

        let mut rec = rex();
        rec.adopter_info = Some(AdopterInfo::new("Alice", "555-1234"));
        rec.normalize_adoption_fields(Utc::now()).unwrap();
        assert!(rec.adopter_info.is_none());
    }

    #[test]
    fn repair_covers_each_broken_shape() {
        let now = Utc::now();

        let mut stray = rex();
        stray.adoption_date = Some(now);
        assert_eq!(stray.repair_adoption_fields(now), Some(Repair::ClearedAdopterFields));

        let mut orphan = rex();
        orphan.adoption_status = AdoptionStatus::Adopted;
        assert_eq!(orphan.repair_adoption_fields(now), Some(Repair::DemotedToAvailable));
        assert_eq!(orphan.adoption_status, AdoptionStatus::Available);

        let mut undated = rex();
        undated.adoption_status = AdoptionStatus::Adopted;
        undated.adopter_info = Some(AdopterInfo::new("Alice", "555-1234"));
        assert_eq!(undated.repair_adoption_fields(now), Some(Repair::StampedAdoptionDate));
        assert!(undated.is_consistent());

        assert_eq!(rex().repair_adoption_fields(now), None);
    }
}
