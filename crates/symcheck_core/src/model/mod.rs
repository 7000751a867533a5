//! Canonical data model for catalog facts.
//!
//! # Responsibility
//! - Define the atom key type and the tagged fact tuples built from it.
//!
//! # Invariants
//! - Atoms are the only key type used anywhere in the store.
//! - A fact never holds un-normalized text.

pub mod atom;
pub mod fact;
