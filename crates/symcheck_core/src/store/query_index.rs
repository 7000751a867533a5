//! Derived read model over every committed fact.
//!
//! # Responsibility
//! - Linearize the whole fact base into `predicate(args).` clauses.
//! - Answer enumeration and existence queries against those clauses.
//!
//! # Invariants
//! - The index is rebuilt wholesale after every mutation; it is never
//!   patched incrementally, so it can never hold stale clauses.
//! - Clause order follows predicate registration order, then fact order.

use crate::model::atom::normalize;
use crate::model::fact::{Arity, Fact, FactFieldsError, Weight};
use std::collections::HashMap;

/// One position of a query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Matches any value.
    Any,
    /// Matches exactly this canonical text.
    Value(String),
}

/// Query pattern with one term per predicate field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    terms: Vec<Term>,
}

impl Pattern {
    /// Builds a pattern from raw optional values (`None` is a wildcard).
    ///
    /// Bound values are canonicalized the same way fact fields are.
    pub fn from_raw(arity: Arity, values: &[Option<&str>]) -> Result<Self, FactFieldsError> {
        if values.len() != arity.field_count() {
            return Err(FactFieldsError::WrongFieldCount {
                expected: arity.field_count(),
                actual: values.len(),
            });
        }

        let mut terms = Vec::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            let term = match value {
                None => Term::Any,
                Some(raw) if arity == Arity::Ternary && position == 2 => Term::Value(
                    Weight::parse(raw)
                        .map_err(FactFieldsError::InvalidWeight)?
                        .as_str()
                        .to_string(),
                ),
                Some(raw) => Term::Value(normalize(raw).into_string()),
            };
            terms.push(term);
        }
        Ok(Self { terms })
    }

    /// Pattern matching every fact of the given arity.
    pub fn any(arity: Arity) -> Self {
        Self {
            terms: vec![Term::Any; arity.field_count()],
        }
    }

    pub fn matches(&self, fact: &Fact) -> bool {
        let fields = fact.fields();
        fields.len() == self.terms.len()
            && self
                .terms
                .iter()
                .zip(fields)
                .all(|(term, field)| match term {
                    Term::Any => true,
                    Term::Value(value) => value == field,
                })
    }
}

#[derive(Debug, Clone)]
struct Clause {
    predicate: String,
    fact: Fact,
}

/// Rebuildable clause index over the full fact base.
#[derive(Debug, Clone, Default)]
pub struct QueryIndex {
    clauses: Vec<Clause>,
    by_predicate: HashMap<String, Vec<usize>>,
}

impl QueryIndex {
    /// Re-linearizes every relation into a fresh index.
    pub fn rebuild<'a, I>(relations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [Fact])>,
    {
        let mut index = Self::default();
        for (predicate, facts) in relations {
            let slots = index.by_predicate.entry(predicate.to_string()).or_default();
            for fact in facts {
                slots.push(index.clauses.len());
                index.clauses.push(Clause {
                    predicate: predicate.to_string(),
                    fact: fact.clone(),
                });
            }
        }
        index
    }

    /// Every fact of `predicate`, in clause order.
    pub fn enumerate(&self, predicate: &str) -> Vec<Fact> {
        self.clauses_of(predicate).map(|clause| clause.fact.clone()).collect()
    }

    /// Facts of `predicate` matching `pattern`.
    pub fn solve(&self, predicate: &str, pattern: &Pattern) -> Vec<Fact> {
        self.clauses_of(predicate)
            .filter(|clause| pattern.matches(&clause.fact))
            .map(|clause| clause.fact.clone())
            .collect()
    }

    /// Whether any fact of `predicate` matches `pattern`.
    pub fn exists(&self, predicate: &str, pattern: &Pattern) -> bool {
        self.clauses_of(predicate)
            .any(|clause| pattern.matches(&clause.fact))
    }

    /// Textual linearization, one clause per line.
    pub fn program(&self) -> String {
        let mut program = String::new();
        for clause in &self.clauses {
            program.push_str(&clause.fact.to_line(&clause.predicate));
            program.push('\n');
        }
        program
    }

    fn clauses_of<'a>(&'a self, predicate: &str) -> impl Iterator<Item = &'a Clause> + 'a {
        self.by_predicate
            .get(predicate)
            .into_iter()
            .flatten()
            .map(move |slot| &self.clauses[*slot])
    }
}
