//! Diagnosis use-case service.
//!
//! # Responsibility
//! - Snapshot the catalog once per run and hand it to the pure engine.
//! - Stamp results into a serializable report and log run metadata.
//!
//! # Invariants
//! - The store lock is held only while copying relations, never while
//!   scoring.
//! - Logs carry counts, tiers and durations only; patient input is never
//!   written to logs.

use crate::diagnosis::engine::{assess, Assessment};
use crate::diagnosis::types::{CatalogSnapshot, DiagnosisInput, DiagnosisResult, Urgency};
use crate::diagnosis::DiagnosisError;
use crate::store::fact_store::FactStore;
use log::{info, warn};
use serde::Serialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// One diagnosis run, ready to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisReport {
    /// Unix epoch milliseconds when the run finished.
    pub generated_at_ms: i64,
    pub inputs: DiagnosisInput,
    pub urgency: Urgency,
    /// Sorted by descending affinity.
    pub results: Vec<DiagnosisResult>,
}

impl DiagnosisReport {
    /// Highest-affinity result, if the catalog has any disease.
    pub fn top(&self) -> Option<&DiagnosisResult> {
        self.results.first()
    }
}

pub struct DiagnosisService<'a> {
    store: &'a FactStore,
}

impl<'a> DiagnosisService<'a> {
    pub fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    /// Scores every catalog disease against `input`.
    ///
    /// # Errors
    /// - `EmptySymptoms` when the report has no symptoms.
    pub fn run(&self, input: DiagnosisInput) -> Result<DiagnosisReport, DiagnosisError> {
        let started = Instant::now();
        if input.symptoms.is_empty() {
            warn!("event=diagnosis_run module=diagnosis status=error error_code=empty_symptoms");
            return Err(DiagnosisError::EmptySymptoms);
        }

        let catalog = CatalogSnapshot::capture(self.store);
        let Assessment { urgency, results } = assess(&input, &catalog)?;

        info!(
            "event=diagnosis_run module=diagnosis status=ok symptoms={} diseases={} matched={} urgency={} duration_ms={}",
            input.symptoms.len(),
            results.len(),
            results.iter().filter(|result| result.affinity > 0.0).count(),
            urgency,
            started.elapsed().as_millis()
        );

        Ok(DiagnosisReport {
            generated_at_ms: now_epoch_ms(),
            inputs: input,
            urgency,
            results,
        })
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}
