//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into catalog-level operations (entities with
//!   their links, treatments, diagnosis runs).
//! - Keep callers decoupled from predicate names and fact shapes.
//!
//! # Invariants
//! - Services never bypass `FactStore` normalization or locking.
//! - Multi-step operations are sequences of single-predicate store calls;
//!   there is no cross-predicate transaction.

pub mod atom_catalog;
pub mod diagnosis_service;
pub mod disease_service;
pub mod medication_service;
pub mod treatment_service;

use crate::model::atom::{is_lossy, normalize, Atom};
use crate::store::fact_store::FactStore;
use crate::store::StoreError;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogError {
    /// Required input is blank or not representable.
    InvalidInput(String),
    /// Target entity does not exist.
    NotFound(String),
    /// Another entity already owns the normalized id.
    AlreadyExists(String),
    /// Store-level failure (validation, numbers, persistence).
    Store(StoreError),
    /// Write succeeded but read-back did not find it.
    InconsistentState(&'static str),
}

impl CatalogError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "conflict",
            Self::Store(err) => err.code(),
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::AlreadyExists(what) => write!(f, "already exists: {what}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent catalog state: {details}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(fact) => Self::NotFound(fact.to_string()),
            StoreError::Conflict(fact) => Self::AlreadyExists(fact.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Rejects blank input, naming the offending field.
pub(crate) fn require(field: &'static str, raw: &str) -> CatalogResult<()> {
    if raw.trim().is_empty() {
        return Err(CatalogError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Normalizes caller input, noting when the text was rewritten.
pub(crate) fn atomize(predicate: &str, raw: &str) -> Atom {
    let atom = normalize(raw);
    if is_lossy(raw) {
        debug!(
            "event=atom_collapsed module=catalog status=ok predicate={} atom={}",
            predicate, atom
        );
    }
    atom
}

/// Rewrites every fact of `predicate` holding `old` at `position` so that it
/// holds `new` instead. A rewrite that would collide with an existing fact
/// drops the old one.
pub(crate) fn rekey_links(
    store: &FactStore,
    predicate: &str,
    position: usize,
    old: &Atom,
    new: &Atom,
) -> CatalogResult<usize> {
    let matching = links_at(store, predicate, position, old)?;
    for fact in &matching {
        let old_fields = fact.fields();
        let mut new_fields = old_fields.clone();
        new_fields[position] = new.as_str();
        match store.update(predicate, &old_fields, &new_fields) {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => {
                store.delete(predicate, &old_fields)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(matching.len())
}

/// Deletes every fact of `predicate` holding `atom` at `position`.
pub(crate) fn delete_links(
    store: &FactStore,
    predicate: &str,
    position: usize,
    atom: &Atom,
) -> CatalogResult<usize> {
    let matching = links_at(store, predicate, position, atom)?;
    for fact in &matching {
        store.delete(predicate, &fact.fields())?;
    }
    Ok(matching.len())
}

fn links_at(
    store: &FactStore,
    predicate: &str,
    position: usize,
    atom: &Atom,
) -> CatalogResult<Vec<crate::model::fact::Fact>> {
    let Some(arity) = store.arity_of(predicate) else {
        return Ok(Vec::new());
    };
    let mut pattern: Vec<Option<&str>> = vec![None; arity.field_count()];
    if position >= pattern.len() {
        return Err(CatalogError::InvalidInput(format!(
            "position {position} out of range for `{predicate}`"
        )));
    }
    pattern[position] = Some(atom.as_str());
    Ok(store.query(predicate, &pattern)?)
}
