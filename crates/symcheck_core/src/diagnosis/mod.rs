//! Diagnosis engine over catalog snapshots.
//!
//! # Responsibility
//! - Join a patient's symptom report against disease–symptom weights.
//! - Pick a safe treatment and classify urgency, with an explanation trail.
//!
//! # Invariants
//! - Pure: no locking, no persistence, no logging side effects.
//! - Results are recomputed on every call and never cached.

pub mod engine;
pub mod types;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Diagnosis input rejected before any computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisError {
    /// The report carries no symptoms.
    EmptySymptoms,
}

impl Display for DiagnosisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySymptoms => write!(f, "at least one symptom is required"),
        }
    }
}

impl Error for DiagnosisError {}
