//! Relation store, its persistence backends and derived query index.
//!
//! # Responsibility
//! - Own every predicate's facts as the single source of truth.
//! - Keep the in-memory relations, the backing file and the query index
//!   consistent under one lock.
//!
//! # Invariants
//! - Callers never observe a partially applied mutation.
//! - A persistence failure never rolls back the in-memory mutation.
//!
//! # See also
//! - `model::fact` for the tuple shapes stored here.

use crate::model::fact::Fact;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub mod fact_store;
pub mod line_store;
pub mod query_index;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation failure with a stable reason code.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected before touching the store (arity mismatch, bad name).
    Validation(String),
    /// Update target does not exist.
    NotFound(Fact),
    /// Update target collides with an existing, different fact.
    Conflict(Fact),
    /// Ternary numeric field is not a finite number.
    NumericFormat(String),
    /// Backing storage could not be read or rewritten.
    Persistence { target: String, source: io::Error },
}

impl StoreError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NumericFormat(_) => "bad_number",
            Self::Persistence { .. } => "persistence",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid store input: {message}"),
            Self::NotFound(fact) => write!(f, "fact not found: {fact}"),
            Self::Conflict(fact) => write!(f, "fact already exists: {fact}"),
            Self::NumericFormat(raw) => write!(f, "not a finite number: `{raw}`"),
            Self::Persistence { target, source } => {
                write!(f, "failed to persist `{target}`: {source}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}
