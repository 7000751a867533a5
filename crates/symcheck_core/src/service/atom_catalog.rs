//! Single-column catalogs: symptoms, chronic conditions and allergies.
//!
//! # Responsibility
//! - Create, rename, delete and list bare identifiers of one unary
//!   predicate.
//!
//! # Invariants
//! - Ids are atoms; two inputs that normalize alike are the same entry.
//! - Renaming does not touch facts in other predicates that mention the id.

use super::{atomize, require, CatalogError, CatalogResult};
use crate::catalog::{ALLERGY, CHRONIC, SYMPTOM};
use crate::model::atom::Atom;
use crate::store::fact_store::FactStore;

/// Service facade over one unary catalog predicate.
pub struct AtomCatalog<'a> {
    store: &'a FactStore,
    predicate: &'static str,
}

impl<'a> AtomCatalog<'a> {
    pub fn new(store: &'a FactStore, predicate: &'static str) -> Self {
        Self { store, predicate }
    }

    /// `sintoma/1`
    pub fn symptoms(store: &'a FactStore) -> Self {
        Self::new(store, SYMPTOM)
    }

    /// `cronica/1`
    pub fn chronics(store: &'a FactStore) -> Self {
        Self::new(store, CHRONIC)
    }

    /// `alergia/1`
    pub fn allergies(store: &'a FactStore) -> Self {
        Self::new(store, ALLERGY)
    }

    /// Every id in insertion order.
    pub fn list(&self) -> Vec<Atom> {
        self.store
            .list(self.predicate)
            .into_iter()
            .map(|fact| fact.first().clone())
            .collect()
    }

    pub fn contains(&self, raw: &str) -> CatalogResult<bool> {
        Ok(self.store.exists(self.predicate, &[Some(raw)])?)
    }

    /// Adds an id.
    ///
    /// # Errors
    /// - `InvalidInput` for blank input.
    /// - `AlreadyExists` when the normalized id is already present.
    pub fn create(&self, raw: &str) -> CatalogResult<Atom> {
        require("id", raw)?;
        let atom = atomize(self.predicate, raw);
        let created = self.store.create(self.predicate, &[atom.as_str()])?;
        if !created.created {
            return Err(CatalogError::AlreadyExists(atom.into_string()));
        }
        Ok(atom)
    }

    /// Renames `old` to `new`. Renaming onto itself is a no-op.
    pub fn rename(&self, old: &str, new: &str) -> CatalogResult<Atom> {
        require("new id", new)?;
        let atom = atomize(self.predicate, new);
        self.store
            .update(self.predicate, &[old], &[atom.as_str()])?;
        Ok(atom)
    }

    /// Removes an id.
    pub fn delete(&self, raw: &str) -> CatalogResult<()> {
        if !self.store.delete(self.predicate, &[raw])? {
            return Err(CatalogError::NotFound(raw.trim().to_string()));
        }
        Ok(())
    }
}
