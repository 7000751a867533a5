//! Catalog predicate layout.
//!
//! # Responsibility
//! - Name every predicate the symptom checker stores and fix its arity.
//! - Register all of them against the configured backing files.
//!
//! # Invariants
//! - Predicate names double as the line prefix in the flat file, so they
//!   must never change once data exists on disk.

use crate::config::CatalogConfig;
use crate::model::fact::Arity;
use crate::store::fact_store::FactStore;
use crate::store::StoreResult;
use log::info;

/// Symptom catalog: `sintoma(id).`
pub const SYMPTOM: &str = "sintoma";
/// Chronic condition catalog: `cronica(id).`
pub const CHRONIC: &str = "cronica";
/// Allergy catalog: `alergia(id).`
pub const ALLERGY: &str = "alergia";
/// Disease id and display name: `enfermedad(id,name).`
pub const DISEASE: &str = "enfermedad";
/// Medication id and display name: `medicamento(id,name).`
pub const MEDICATION: &str = "medicamento";
/// Treatment link: `trata(disease,medication).`
pub const TREATS: &str = "trata";
/// Contraindication link: `contraindicacion(medication,chronic).`
pub const CONTRAINDICATION: &str = "contraindicacion";
/// Weighted association: `enfermedad_sintoma(disease,symptom,weight).`
pub const DISEASE_SYMPTOM: &str = "enfermedad_sintoma";

/// Every catalog predicate with its arity, in registration order.
pub const CATALOG_PREDICATES: &[(&str, Arity)] = &[
    (SYMPTOM, Arity::Unary),
    (CHRONIC, Arity::Unary),
    (ALLERGY, Arity::Unary),
    (DISEASE, Arity::Binary),
    (DISEASE_SYMPTOM, Arity::Ternary),
    (MEDICATION, Arity::Binary),
    (CONTRAINDICATION, Arity::Binary),
    (TREATS, Arity::Binary),
];

/// Returns whether `predicate` is one of the catalog predicates.
pub fn is_catalog_predicate(predicate: &str) -> bool {
    CATALOG_PREDICATES.iter().any(|(name, _)| *name == predicate)
}

/// Registers every catalog predicate on `store`.
///
/// Returns the number of facts loaded from disk.
pub fn register_catalog(store: &FactStore, config: &CatalogConfig) -> StoreResult<usize> {
    let mut loaded = 0usize;
    for (predicate, arity) in CATALOG_PREDICATES {
        loaded += store.register(predicate, *arity, config.file_for(predicate))?;
    }
    info!(
        "event=catalog_open module=catalog status=ok predicates={} facts={}",
        CATALOG_PREDICATES.len(),
        loaded
    );
    Ok(loaded)
}

/// Builds a fresh store with every catalog predicate registered.
pub fn open_catalog(config: &CatalogConfig) -> StoreResult<FactStore> {
    let store = FactStore::new();
    register_catalog(&store, config)?;
    Ok(store)
}
