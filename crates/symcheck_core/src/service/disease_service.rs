//! Disease use-case service.
//!
//! # Responsibility
//! - Manage `enfermedad(id,name)` together with its weighted symptoms.
//! - Keep weight triples and treatment links keyed to the current disease id.
//!
//! # Invariants
//! - A disease id maps to at most one name.
//! - Changing an id re-keys dependent facts; deleting cascades them.
//!
//! # See also
//! - `service::medication_service` for the mirror-image medication flows.

use super::{atomize, delete_links, rekey_links, require, CatalogError, CatalogResult};
use crate::catalog::{DISEASE, DISEASE_SYMPTOM, TREATS};
use crate::model::atom::{normalize, Atom};
use crate::model::fact::{Fact, Weight};
use crate::store::fact_store::FactStore;
use log::info;
use serde::{Deserialize, Serialize};

/// One `enfermedad_sintoma` weight as seen from its disease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedSymptom {
    pub symptom: Atom,
    pub weight: f64,
}

/// Disease with its weighted symptoms, in stored order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseRecord {
    pub id: Atom,
    pub name: Atom,
    pub symptoms: Vec<WeightedSymptom>,
}

/// Caller-side weight entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomWeightDraft {
    pub symptom: String,
    pub weight: f64,
}

/// Caller-side disease input for create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDraft {
    pub id: String,
    pub name: String,
    /// `None` on update keeps the current weights.
    #[serde(default)]
    pub symptoms: Option<Vec<SymptomWeightDraft>>,
}

impl DiseaseDraft {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symptoms: None,
        }
    }

    pub fn with_symptom(mut self, symptom: impl Into<String>, weight: f64) -> Self {
        self.symptoms
            .get_or_insert_with(Vec::new)
            .push(SymptomWeightDraft {
                symptom: symptom.into(),
                weight,
            });
        self
    }
}

/// Disease service facade over the shared fact store.
pub struct DiseaseService<'a> {
    store: &'a FactStore,
}

impl<'a> DiseaseService<'a> {
    pub fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    /// Every disease in insertion order.
    pub fn list(&self) -> Vec<DiseaseRecord> {
        let snapshot = self.store.snapshot(&[DISEASE, DISEASE_SYMPTOM]);
        let weights = snapshot.facts(DISEASE_SYMPTOM);
        snapshot
            .facts(DISEASE)
            .iter()
            .filter_map(|fact| match fact {
                Fact::Binary(id, name) => Some(build_record(id, name, weights)),
                _ => None,
            })
            .collect()
    }

    /// Disease by id (raw input is normalized first).
    pub fn get(&self, raw_id: &str) -> CatalogResult<Option<DiseaseRecord>> {
        let id = normalize(raw_id);
        let Some(name) = self.name_of(&id)? else {
            return Ok(None);
        };
        let weights = self
            .store
            .query(DISEASE_SYMPTOM, &[Some(id.as_str()), None, None])?;
        Ok(Some(build_record(&id, &name, &weights)))
    }

    /// Creates a disease and its weights.
    ///
    /// # Errors
    /// - `InvalidInput` for blank id/name/symptom or a non-finite weight.
    /// - `AlreadyExists` when the id is taken.
    pub fn create(&self, draft: &DiseaseDraft) -> CatalogResult<DiseaseRecord> {
        require("disease id", &draft.id)?;
        require("disease name", &draft.name)?;
        let weights = validate_weights(draft.symptoms.as_deref().unwrap_or_default())?;
        let id = atomize(DISEASE, &draft.id);
        let name = atomize(DISEASE, &draft.name);

        if self.name_of(&id)?.is_some() {
            return Err(CatalogError::AlreadyExists(id.into_string()));
        }
        self.store.create(DISEASE, &[id.as_str(), name.as_str()])?;
        self.insert_weights(&id, &weights)?;

        info!(
            "event=disease_create module=catalog status=ok disease={} symptoms={}",
            id,
            weights.len()
        );
        self.read_back(&id, "created disease not found in read-back")
    }

    /// Replaces id and name of `old_id`; replaces weights when the draft
    /// carries symptoms.
    ///
    /// # Errors
    /// - `NotFound` when `old_id` is absent.
    /// - `AlreadyExists` when the new id belongs to another disease.
    pub fn update(&self, old_id: &str, draft: &DiseaseDraft) -> CatalogResult<DiseaseRecord> {
        require("disease id", &draft.id)?;
        require("disease name", &draft.name)?;
        let weights = match draft.symptoms.as_deref() {
            Some(symptoms) => Some(validate_weights(symptoms)?),
            None => None,
        };
        let old_id = normalize(old_id);
        let new_id = atomize(DISEASE, &draft.id);
        let new_name = atomize(DISEASE, &draft.name);

        let Some(old_name) = self.name_of(&old_id)? else {
            return Err(CatalogError::NotFound(old_id.into_string()));
        };
        if new_id != old_id && self.name_of(&new_id)?.is_some() {
            return Err(CatalogError::AlreadyExists(new_id.into_string()));
        }

        self.store.update(
            DISEASE,
            &[old_id.as_str(), old_name.as_str()],
            &[new_id.as_str(), new_name.as_str()],
        )?;

        let mut rekeyed = 0usize;
        if new_id != old_id {
            rekeyed += rekey_links(self.store, DISEASE_SYMPTOM, 0, &old_id, &new_id)?;
            rekeyed += rekey_links(self.store, TREATS, 0, &old_id, &new_id)?;
        }
        if let Some(weights) = weights {
            delete_links(self.store, DISEASE_SYMPTOM, 0, &new_id)?;
            self.insert_weights(&new_id, &weights)?;
        }

        info!(
            "event=disease_update module=catalog status=ok old={} new={} rekeyed={}",
            old_id, new_id, rekeyed
        );
        self.read_back(&new_id, "updated disease not found in read-back")
    }

    /// Deletes a disease with its weights and treatment links.
    pub fn delete(&self, raw_id: &str) -> CatalogResult<()> {
        let id = normalize(raw_id);
        let Some(name) = self.name_of(&id)? else {
            return Err(CatalogError::NotFound(id.into_string()));
        };
        self.store.delete(DISEASE, &[id.as_str(), name.as_str()])?;
        let weights = delete_links(self.store, DISEASE_SYMPTOM, 0, &id)?;
        let links = delete_links(self.store, TREATS, 0, &id)?;

        info!(
            "event=disease_delete module=catalog status=ok disease={} weights={} treatments={}",
            id, weights, links
        );
        Ok(())
    }

    fn name_of(&self, id: &Atom) -> CatalogResult<Option<Atom>> {
        Ok(self
            .store
            .query(DISEASE, &[Some(id.as_str()), None])?
            .into_iter()
            .find_map(|fact| fact.second().cloned()))
    }

    fn insert_weights(&self, id: &Atom, weights: &[(Atom, Weight)]) -> CatalogResult<()> {
        for (symptom, weight) in weights {
            self.store.create(
                DISEASE_SYMPTOM,
                &[id.as_str(), symptom.as_str(), weight.as_str()],
            )?;
        }
        Ok(())
    }

    fn read_back(&self, id: &Atom, details: &'static str) -> CatalogResult<DiseaseRecord> {
        self.get(id.as_str())?
            .ok_or(CatalogError::InconsistentState(details))
    }
}

fn validate_weights(drafts: &[SymptomWeightDraft]) -> CatalogResult<Vec<(Atom, Weight)>> {
    drafts
        .iter()
        .map(|draft| {
            require("symptom", &draft.symptom)?;
            let weight = Weight::from_value(draft.weight).ok_or_else(|| {
                CatalogError::InvalidInput(format!("weight `{}` is not finite", draft.weight))
            })?;
            Ok((atomize(DISEASE_SYMPTOM, &draft.symptom), weight))
        })
        .collect()
}

fn build_record(id: &Atom, name: &Atom, weights: &[Fact]) -> DiseaseRecord {
    let symptoms = weights
        .iter()
        .filter_map(|fact| match fact {
            Fact::Ternary(disease, symptom, weight) if disease == id => Some(WeightedSymptom {
                symptom: symptom.clone(),
                weight: weight.value(),
            }),
            _ => None,
        })
        .collect();
    DiseaseRecord {
        id: id.clone(),
        name: name.clone(),
        symptoms,
    }
}

#[cfg(test)]
mod tests {
    use super::{DiseaseDraft, DiseaseService};
    use crate::catalog::{DISEASE, DISEASE_SYMPTOM, TREATS};
    use crate::model::fact::Arity;
    use crate::store::fact_store::FactStore;

    fn memory_store() -> FactStore {
        let store = FactStore::new();
        store.declare(DISEASE, Arity::Binary).expect("declare");
        store.declare(DISEASE_SYMPTOM, Arity::Ternary).expect("declare");
        store.declare(TREATS, Arity::Binary).expect("declare");
        store
    }

    #[test]
    fn create_rejects_non_finite_weights() {
        let store = memory_store();
        let service = DiseaseService::new(&store);
        let draft = DiseaseDraft::new("gripe", "Gripe").with_symptom("fiebre", f64::NAN);

        let err = service.create(&draft).expect_err("nan weight");
        assert_eq!(err.code(), "invalid_input");
        assert!(store.list(DISEASE).is_empty());
    }

    #[test]
    fn update_without_symptoms_keeps_weights_under_new_id() {
        let store = memory_store();
        let service = DiseaseService::new(&store);
        service
            .create(&DiseaseDraft::new("gripe", "Gripe").with_symptom("fiebre", 0.5))
            .expect("create");
        store.create(TREATS, &["gripe", "paracetamol"]).expect("link");

        let updated = service
            .update("gripe", &DiseaseDraft::new("Gripe A", "Gripe A"))
            .expect("update");
        assert_eq!(updated.id, "gripe_a");
        assert_eq!(updated.symptoms.len(), 1);
        assert_eq!(updated.symptoms[0].weight, 0.5);
        assert!(store
            .exists(TREATS, &[Some("gripe_a"), Some("paracetamol")])
            .expect("exists"));
        assert!(service.get("gripe").expect("get").is_none());
    }

    #[test]
    fn delete_cascades_weights_and_links() {
        let store = memory_store();
        let service = DiseaseService::new(&store);
        service
            .create(
                &DiseaseDraft::new("gripe", "Gripe")
                    .with_symptom("fiebre", 0.5)
                    .with_symptom("tos", 0.3),
            )
            .expect("create");
        store.create(TREATS, &["gripe", "paracetamol"]).expect("link");

        service.delete("GRIPE").expect("delete");
        assert!(store.list(DISEASE_SYMPTOM).is_empty());
        assert!(store.list(TREATS).is_empty());
        assert_eq!(service.delete("gripe").expect_err("gone").code(), "not_found");
    }
}
