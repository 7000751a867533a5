//! Medication use-case service.
//!
//! # Responsibility
//! - Manage `medicamento(id,name)` together with its contraindications.
//! - Keep contraindications and treatment links keyed to the current id.
//!
//! # Invariants
//! - A medication id maps to at most one name.
//! - Changing an id re-keys dependent facts; deleting cascades them.

use super::{atomize, delete_links, rekey_links, require, CatalogError, CatalogResult};
use crate::catalog::{CONTRAINDICATION, MEDICATION, TREATS};
use crate::model::atom::{normalize, Atom};
use crate::model::fact::Fact;
use crate::store::fact_store::FactStore;
use log::info;
use serde::{Deserialize, Serialize};

/// Medication with the chronic conditions it is contraindicated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationRecord {
    pub id: Atom,
    pub name: Atom,
    pub contraindications: Vec<Atom>,
}

/// Caller-side medication input for create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationDraft {
    pub id: String,
    pub name: String,
    /// `None` on update keeps the current contraindications.
    #[serde(default)]
    pub contraindications: Option<Vec<String>>,
}

impl MedicationDraft {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            contraindications: None,
        }
    }

    pub fn with_contraindication(mut self, chronic: impl Into<String>) -> Self {
        self.contraindications
            .get_or_insert_with(Vec::new)
            .push(chronic.into());
        self
    }
}

pub struct MedicationService<'a> {
    store: &'a FactStore,
}

impl<'a> MedicationService<'a> {
    pub fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<MedicationRecord> {
        let snapshot = self.store.snapshot(&[MEDICATION, CONTRAINDICATION]);
        let links = snapshot.facts(CONTRAINDICATION);
        snapshot
            .facts(MEDICATION)
            .iter()
            .filter_map(|fact| match fact {
                Fact::Binary(id, name) => Some(build_record(id, name, links)),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, raw_id: &str) -> CatalogResult<Option<MedicationRecord>> {
        let id = normalize(raw_id);
        let Some(name) = self.name_of(&id)? else {
            return Ok(None);
        };
        let links = self
            .store
            .query(CONTRAINDICATION, &[Some(id.as_str()), None])?;
        Ok(Some(build_record(&id, &name, &links)))
    }

    /// Creates a medication and its contraindications.
    ///
    /// # Errors
    /// - `InvalidInput` for blank id, name or condition.
    /// - `AlreadyExists` when the id is taken.
    pub fn create(&self, draft: &MedicationDraft) -> CatalogResult<MedicationRecord> {
        require("medication id", &draft.id)?;
        require("medication name", &draft.name)?;
        let conditions = validate_conditions(draft.contraindications.as_deref().unwrap_or_default())?;
        let id = atomize(MEDICATION, &draft.id);
        let name = atomize(MEDICATION, &draft.name);

        if self.name_of(&id)?.is_some() {
            return Err(CatalogError::AlreadyExists(id.into_string()));
        }
        self.store.create(MEDICATION, &[id.as_str(), name.as_str()])?;
        self.insert_conditions(&id, &conditions)?;

        info!(
            "event=medication_create module=catalog status=ok medication={} contraindications={}",
            id,
            conditions.len()
        );
        self.read_back(&id, "created medication not found in read-back")
    }

    /// Replaces id and name of `old_id`; replaces contraindications when the
    /// draft carries them.
    pub fn update(&self, old_id: &str, draft: &MedicationDraft) -> CatalogResult<MedicationRecord> {
        require("medication id", &draft.id)?;
        require("medication name", &draft.name)?;
        let conditions = match draft.contraindications.as_deref() {
            Some(raw) => Some(validate_conditions(raw)?),
            None => None,
        };
        let old_id = normalize(old_id);
        let new_id = atomize(MEDICATION, &draft.id);
        let new_name = atomize(MEDICATION, &draft.name);

        let Some(old_name) = self.name_of(&old_id)? else {
            return Err(CatalogError::NotFound(old_id.into_string()));
        };
        if new_id != old_id && self.name_of(&new_id)?.is_some() {
            return Err(CatalogError::AlreadyExists(new_id.into_string()));
        }

        self.store.update(
            MEDICATION,
            &[old_id.as_str(), old_name.as_str()],
            &[new_id.as_str(), new_name.as_str()],
        )?;

        let mut rekeyed = 0usize;
        if new_id != old_id {
            rekeyed += rekey_links(self.store, CONTRAINDICATION, 0, &old_id, &new_id)?;
            rekeyed += rekey_links(self.store, TREATS, 1, &old_id, &new_id)?;
        }
        if let Some(conditions) = conditions {
            delete_links(self.store, CONTRAINDICATION, 0, &new_id)?;
            self.insert_conditions(&new_id, &conditions)?;
        }

        info!(
            "event=medication_update module=catalog status=ok old={} new={} rekeyed={}",
            old_id, new_id, rekeyed
        );
        self.read_back(&new_id, "updated medication not found in read-back")
    }

    /// Deletes a medication with its contraindications and treatment links.
    pub fn delete(&self, raw_id: &str) -> CatalogResult<()> {
        let id = normalize(raw_id);
        let Some(name) = self.name_of(&id)? else {
            return Err(CatalogError::NotFound(id.into_string()));
        };
        self.store.delete(MEDICATION, &[id.as_str(), name.as_str()])?;
        let conditions = delete_links(self.store, CONTRAINDICATION, 0, &id)?;
        let links = delete_links(self.store, TREATS, 1, &id)?;

        info!(
            "event=medication_delete module=catalog status=ok medication={} contraindications={} treatments={}",
            id, conditions, links
        );
        Ok(())
    }

    fn name_of(&self, id: &Atom) -> CatalogResult<Option<Atom>> {
        Ok(self
            .store
            .query(MEDICATION, &[Some(id.as_str()), None])?
            .into_iter()
            .find_map(|fact| fact.second().cloned()))
    }

    fn insert_conditions(&self, id: &Atom, conditions: &[Atom]) -> CatalogResult<()> {
        for condition in conditions {
            self.store
                .create(CONTRAINDICATION, &[id.as_str(), condition.as_str()])?;
        }
        Ok(())
    }

    fn read_back(&self, id: &Atom, details: &'static str) -> CatalogResult<MedicationRecord> {
        self.get(id.as_str())?
            .ok_or(CatalogError::InconsistentState(details))
    }
}

fn validate_conditions(raw: &[String]) -> CatalogResult<Vec<Atom>> {
    raw.iter()
        .map(|condition| {
            require("contraindication", condition)?;
            Ok(atomize(CONTRAINDICATION, condition))
        })
        .collect()
}

fn build_record(id: &Atom, name: &Atom, links: &[Fact]) -> MedicationRecord {
    let contraindications = links
        .iter()
        .filter_map(|fact| match fact {
            Fact::Binary(medication, condition) if medication == id => Some(condition.clone()),
            _ => None,
        })
        .collect();
    MedicationRecord {
        id: id.clone(),
        name: name.clone(),
        contraindications,
    }
}
