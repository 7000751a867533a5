//! Relation store: per-predicate fact sets with CRUD semantics.
//!
//! # Responsibility
//! - Hold every predicate's facts in memory as the source of truth.
//! - Normalize raw caller fields into facts before any comparison.
//! - After every mutation, rebuild the query index and rewrite the
//!   predicate's backing lines.
//!
//! # Invariants
//! - One mutex guards relations, index and persistence side effects; every
//!   operation, reads included, runs entirely under it.
//! - A predicate never holds two equal facts.
//! - Updates replace a fact in place, so fact order survives renames.
//! - Predicates without a backend live in memory only.

use super::line_store::{FlatFile, LineStore};
use super::query_index::{Pattern, QueryIndex};
use super::{StoreError, StoreResult};
use crate::model::atom::normalize;
use crate::model::fact::{Arity, Fact, FactFieldsError};
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of [`FactStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Normalized fact, whether or not it was inserted.
    pub fact: Fact,
    /// `false` when an equal fact already existed.
    pub created: bool,
}

/// Consistent copy of several predicates taken under one lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    relations: HashMap<String, Vec<Fact>>,
}

impl Snapshot {
    /// Facts of `predicate`; empty when it was not requested or is unknown.
    pub fn facts(&self, predicate: &str) -> &[Fact] {
        self.relations
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

struct Relation {
    arity: Arity,
    facts: Vec<Fact>,
    members: HashSet<Fact>,
    backend: Option<Arc<dyn LineStore>>,
}

impl Relation {
    fn new(arity: Arity) -> Self {
        Self {
            arity,
            facts: Vec::new(),
            members: HashSet::new(),
            backend: None,
        }
    }

    fn contains(&self, fact: &Fact) -> bool {
        self.members.contains(fact)
    }

    fn insert(&mut self, fact: Fact) -> bool {
        if !self.members.insert(fact.clone()) {
            return false;
        }
        self.facts.push(fact);
        true
    }

    fn remove(&mut self, fact: &Fact) -> bool {
        if !self.members.remove(fact) {
            return false;
        }
        self.facts.retain(|existing| existing != fact);
        true
    }

    fn replace(&mut self, old: &Fact, new: Fact) {
        if let Some(slot) = self.facts.iter_mut().find(|existing| *existing == old) {
            *slot = new.clone();
        }
        self.members.remove(old);
        self.members.insert(new);
    }
}

#[derive(Default)]
struct StoreState {
    order: Vec<String>,
    relations: HashMap<String, Relation>,
    index: QueryIndex,
}

impl StoreState {
    fn resolve_arity(&self, predicate: &str, field_count: usize) -> StoreResult<Arity> {
        if let Some(relation) = self.relations.get(predicate) {
            if relation.arity.field_count() != field_count {
                return Err(StoreError::Validation(format!(
                    "predicate `{predicate}` has arity {}, got {field_count} fields",
                    relation.arity
                )));
            }
            return Ok(relation.arity);
        }
        Arity::from_len(field_count).ok_or_else(|| {
            StoreError::Validation(format!(
                "predicate `{predicate}` needs 1 to 3 fields, got {field_count}"
            ))
        })
    }

    fn relation_mut(&mut self, predicate: &str, arity: Arity) -> &mut Relation {
        if !self.relations.contains_key(predicate) {
            self.order.push(predicate.to_string());
        }
        self.relations
            .entry(predicate.to_string())
            .or_insert_with(|| Relation::new(arity))
    }

    fn rebuild_index(&mut self) {
        let relations = &self.relations;
        let index = QueryIndex::rebuild(self.order.iter().filter_map(|name| {
            relations
                .get(name)
                .map(|relation| (name.as_str(), relation.facts.as_slice()))
        }));
        self.index = index;
    }

    /// Rebuilds the index, then persists `predicate`.
    ///
    /// The in-memory mutation stays applied even when persistence fails.
    fn commit(&mut self, predicate: &str) -> StoreResult<()> {
        self.rebuild_index();

        let Some(relation) = self.relations.get(predicate) else {
            return Ok(());
        };
        let Some(backend) = relation.backend.as_ref() else {
            return Ok(());
        };
        if let Err(err) = backend.save(predicate, &relation.facts) {
            error!(
                "event=fact_commit module=store status=error predicate={} error_code={} error={}",
                predicate,
                err.code(),
                err
            );
            return Err(err);
        }
        Ok(())
    }
}

/// Process-wide relation store.
///
/// Construct once and share by reference (or `Arc`) with every caller.
#[derive(Default)]
pub struct FactStore {
    state: Mutex<StoreState>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `predicate` backed by a flat file.
    ///
    /// Returns how many facts were loaded (0 when already registered).
    pub fn register(
        &self,
        predicate: &str,
        arity: Arity,
        file: impl Into<PathBuf>,
    ) -> StoreResult<usize> {
        self.register_with(predicate, arity, Arc::new(FlatFile::new(file)))
    }

    /// Registers `predicate` with an arbitrary line store.
    ///
    /// # Invariants
    /// - Idempotent for the same backend location.
    /// - Existing lines are loaded only by the first backend registration;
    ///   malformed lines are skipped.
    /// - A different arity, or a different backend location, is rejected.
    pub fn register_with(
        &self,
        predicate: &str,
        arity: Arity,
        backend: Arc<dyn LineStore>,
    ) -> StoreResult<usize> {
        validate_predicate_name(predicate)?;
        let mut state = self.lock();

        if let Some(relation) = state.relations.get(predicate) {
            check_same_arity(predicate, relation.arity, arity)?;
            if let Some(current) = relation.backend.as_ref() {
                if current.describe() == backend.describe() {
                    return Ok(0);
                }
                return Err(StoreError::Validation(format!(
                    "predicate `{predicate}` already registered at `{}`",
                    current.describe()
                )));
            }
        }

        let loaded = backend.load(predicate, arity)?;
        let relation = state.relation_mut(predicate, arity);
        relation.backend = Some(Arc::clone(&backend));
        let mut inserted = 0usize;
        for fact in loaded {
            if relation.insert(fact) {
                inserted += 1;
            }
        }
        state.rebuild_index();

        info!(
            "event=predicate_register module=store status=ok predicate={} arity={} loaded={} backend={}",
            predicate,
            arity,
            inserted,
            backend.describe()
        );
        Ok(inserted)
    }

    /// Declares a memory-only predicate. Idempotent.
    pub fn declare(&self, predicate: &str, arity: Arity) -> StoreResult<()> {
        validate_predicate_name(predicate)?;
        let mut state = self.lock();
        if let Some(relation) = state.relations.get(predicate) {
            return check_same_arity(predicate, relation.arity, arity);
        }
        state.relation_mut(predicate, arity);
        state.rebuild_index();
        Ok(())
    }

    /// Arity of a known predicate.
    pub fn arity_of(&self, predicate: &str) -> Option<Arity> {
        self.lock()
            .relations
            .get(predicate)
            .map(|relation| relation.arity)
    }

    /// Known predicates in registration order.
    pub fn predicates(&self) -> Vec<(String, Arity)> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|name| {
                state
                    .relations
                    .get(name)
                    .map(|relation| (name.clone(), relation.arity))
            })
            .collect()
    }

    /// Snapshot of every fact of `predicate`. Unknown predicates are empty.
    pub fn list(&self, predicate: &str) -> Vec<Fact> {
        self.lock().index.enumerate(predicate)
    }

    /// Copies several predicates under a single lock acquisition.
    pub fn snapshot(&self, predicates: &[&str]) -> Snapshot {
        let state = self.lock();
        let relations = predicates
            .iter()
            .map(|predicate| (predicate.to_string(), state.index.enumerate(predicate)))
            .collect();
        Snapshot { relations }
    }

    /// Facts of `predicate` matching raw optional values (`None` = any).
    pub fn query(&self, predicate: &str, values: &[Option<&str>]) -> StoreResult<Vec<Fact>> {
        let state = self.lock();
        let arity = state.resolve_arity(predicate, values.len())?;
        let pattern = Pattern::from_raw(arity, values).map_err(fields_error)?;
        Ok(state.index.solve(predicate, &pattern))
    }

    /// Whether any fact of `predicate` matches raw optional values.
    pub fn exists(&self, predicate: &str, values: &[Option<&str>]) -> StoreResult<bool> {
        let state = self.lock();
        let arity = state.resolve_arity(predicate, values.len())?;
        let pattern = Pattern::from_raw(arity, values).map_err(fields_error)?;
        Ok(state.index.exists(predicate, &pattern))
    }

    /// Linearized text of the whole fact base.
    pub fn program(&self) -> String {
        self.lock().index.program()
    }

    /// Inserts a fact built from raw fields.
    ///
    /// # Errors
    /// - `Validation` when the field count does not fit the predicate.
    /// - `NumericFormat` when a ternary weight is not a number.
    /// - `Persistence` when the backing store could not be rewritten; the
    ///   fact stays inserted in memory.
    pub fn create<S: AsRef<str>>(&self, predicate: &str, fields: &[S]) -> StoreResult<Created> {
        validate_predicate_name(predicate)?;
        let mut state = self.lock();
        let arity = state.resolve_arity(predicate, fields.len())?;
        let fact = Fact::from_fields(arity, fields).map_err(fields_error)?;

        if !state.relation_mut(predicate, arity).insert(fact.clone()) {
            debug!(
                "event=fact_create module=store status=skipped reason=duplicate predicate={} fact={}",
                predicate, fact
            );
            return Ok(Created {
                fact,
                created: false,
            });
        }

        info!(
            "event=fact_create module=store status=ok predicate={} fact={}",
            predicate, fact
        );
        state.commit(predicate)?;
        Ok(Created {
            fact,
            created: true,
        })
    }

    /// Removes the fact built from raw fields. Returns `false` when absent.
    ///
    /// A ternary weight matches by canonical value, so `0.50` deletes `0.5`.
    pub fn delete<S: AsRef<str>>(&self, predicate: &str, fields: &[S]) -> StoreResult<bool> {
        let mut state = self.lock();
        let Some(arity) = state.relations.get(predicate).map(|relation| relation.arity) else {
            return Ok(false);
        };
        let fact = match Fact::from_fields(arity, fields) {
            Ok(fact) => fact,
            Err(FactFieldsError::InvalidWeight(_)) => return Ok(false),
            Err(err) => return Err(fields_error(err)),
        };

        let removed = state
            .relations
            .get_mut(predicate)
            .is_some_and(|relation| relation.remove(&fact));
        if !removed {
            return Ok(false);
        }

        info!(
            "event=fact_delete module=store status=ok predicate={} fact={}",
            predicate, fact
        );
        state.commit(predicate)?;
        Ok(true)
    }

    /// Replaces the fact built from `old_fields` with one built from
    /// `new_fields`.
    ///
    /// # Errors
    /// - `NumericFormat` when either ternary weight is not a number.
    /// - `NotFound` when the old fact is absent.
    /// - `Conflict` when the new fact already exists and differs from old.
    /// - `Persistence` as for [`FactStore::create`].
    ///
    /// Old and new normalizing to the same fact is a successful no-op.
    pub fn update<S: AsRef<str>>(
        &self,
        predicate: &str,
        old_fields: &[S],
        new_fields: &[S],
    ) -> StoreResult<Fact> {
        let mut state = self.lock();
        let arity = state.resolve_arity(predicate, old_fields.len())?;
        let old = Fact::from_fields(arity, old_fields).map_err(fields_error)?;
        let new = Fact::from_fields(arity, new_fields).map_err(fields_error)?;

        let Some(relation) = state.relations.get_mut(predicate) else {
            return Err(StoreError::NotFound(old));
        };
        if !relation.contains(&old) {
            return Err(StoreError::NotFound(old));
        }
        if old == new {
            return Ok(new);
        }
        if relation.contains(&new) {
            debug!(
                "event=fact_update module=store status=error error_code=conflict predicate={} fact={}",
                predicate, new
            );
            return Err(StoreError::Conflict(new));
        }
        relation.replace(&old, new.clone());

        info!(
            "event=fact_update module=store status=ok predicate={} old={} new={}",
            predicate, old, new
        );
        state.commit(predicate)?;
        Ok(new)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Every mutation leaves the state consistent before any call that can
        // panic, so a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_predicate_name(predicate: &str) -> StoreResult<()> {
    if predicate.is_empty() || normalize(predicate).as_str() != predicate {
        return Err(StoreError::Validation(format!(
            "predicate name `{predicate}` must be a lowercase atom"
        )));
    }
    Ok(())
}

fn check_same_arity(predicate: &str, current: Arity, requested: Arity) -> StoreResult<()> {
    if current != requested {
        return Err(StoreError::Validation(format!(
            "predicate `{predicate}` already has arity {current}, not {requested}"
        )));
    }
    Ok(())
}

fn fields_error(err: FactFieldsError) -> StoreError {
    match err {
        FactFieldsError::InvalidWeight(invalid) => StoreError::NumericFormat(invalid.0),
        FactFieldsError::WrongFieldCount { .. } => StoreError::Validation(err.to_string()),
    }
}
