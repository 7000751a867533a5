//! Treatment links between diseases and medications.
//!
//! Link order is the order the diagnosis engine walks candidates in, so
//! `link` appends and never reorders.

use super::{require, CatalogError, CatalogResult};
use crate::catalog::{DISEASE, MEDICATION, TREATS};
use crate::model::atom::{normalize, Atom};
use crate::store::fact_store::FactStore;

pub struct TreatmentService<'a> {
    store: &'a FactStore,
}

impl<'a> TreatmentService<'a> {
    pub fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    /// Appends `trata(disease, medication)`.
    ///
    /// # Errors
    /// - `NotFound` when either side is not in the catalog.
    /// - `AlreadyExists` when the link is already stored.
    pub fn link(&self, disease: &str, medication: &str) -> CatalogResult<()> {
        require("disease", disease)?;
        require("medication", medication)?;
        self.ensure_known(DISEASE, disease)?;
        self.ensure_known(MEDICATION, medication)?;

        let created = self.store.create(TREATS, &[disease, medication])?;
        if !created.created {
            return Err(CatalogError::AlreadyExists(created.fact.to_string()));
        }
        Ok(())
    }

    pub fn unlink(&self, disease: &str, medication: &str) -> CatalogResult<()> {
        if !self.store.delete(TREATS, &[disease, medication])? {
            return Err(CatalogError::NotFound(format!(
                "({},{})",
                normalize(disease),
                normalize(medication)
            )));
        }
        Ok(())
    }

    /// Medications linked to `disease`, in link order.
    pub fn for_disease(&self, disease: &str) -> CatalogResult<Vec<Atom>> {
        Ok(self
            .store
            .query(TREATS, &[Some(disease), None])?
            .into_iter()
            .filter_map(|fact| fact.second().cloned())
            .collect())
    }

    fn ensure_known(&self, predicate: &str, raw_id: &str) -> CatalogResult<()> {
        if !self.store.exists(predicate, &[Some(raw_id), None])? {
            return Err(CatalogError::NotFound(normalize(raw_id).into_string()));
        }
        Ok(())
    }
}
