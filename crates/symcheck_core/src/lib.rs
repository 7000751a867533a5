//! Core logic for the symptom checker.
//! This crate owns the relational fact store, its flat-file persistence and
//! the diagnosis engine that reads from it.

pub mod catalog;
pub mod config;
pub mod diagnosis;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use catalog::{open_catalog, register_catalog, CATALOG_PREDICATES};
pub use config::{CatalogConfig, ConfigError};
pub use diagnosis::engine::{assess, diagnose, Assessment};
pub use diagnosis::types::{
    CatalogSnapshot, Conflict, DiagnosisInput, DiagnosisResult, SymptomReport, Urgency,
};
pub use diagnosis::DiagnosisError;
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status};
pub use model::atom::{normalize, Atom};
pub use model::fact::{Arity, Fact, Weight};
pub use service::atom_catalog::AtomCatalog;
pub use service::diagnosis_service::{DiagnosisReport, DiagnosisService};
pub use service::disease_service::{DiseaseDraft, DiseaseRecord, DiseaseService};
pub use service::medication_service::{MedicationDraft, MedicationRecord, MedicationService};
pub use service::treatment_service::TreatmentService;
pub use service::{CatalogError, CatalogResult};
pub use store::fact_store::{Created, FactStore, Snapshot};
pub use store::line_store::{FlatFile, LineStore};
pub use store::query_index::{Pattern, QueryIndex};
pub use store::{StoreError, StoreResult};

/// Minimal health-check API for the CLI smoke check.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
