//! Atom domain model.
//!
//! # Responsibility
//! - Normalize arbitrary free text into the canonical key used by every fact.
//!
//! # Invariants
//! - `normalize` is total and never fails.
//! - `normalize(normalize(x)) == normalize(x)`.
//! - Distinct raw inputs may collapse into one atom (`"A/B"` and `"A B"` are
//!   both `a_b`). The store treats them as the same entity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Atom used when normalization leaves nothing behind.
pub const FALLBACK_ATOM: &str = "x";

static NON_ATOM_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_]+").expect("valid atom regex"));

/// Canonical identifier for a fact component.
///
/// Only constructible through [`normalize`], so every
/// value held by the store is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Atom(String);

impl Atom {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Atom {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Normalizes free text into a canonical atom.
///
/// Lowercases, trims, then collapses every run of characters outside
/// letters, digits and `_` into a single `_`.
pub fn normalize(raw: &str) -> Atom {
    let lowered = raw.trim().to_lowercase();
    let collapsed = NON_ATOM_RUN_RE.replace_all(lowered.as_str(), "_");
    if collapsed.is_empty() {
        return Atom(FALLBACK_ATOM.to_string());
    }
    Atom(collapsed.into_owned())
}

/// Returns whether normalization changed the caller's text.
///
/// Used to surface atom collapses in diagnostics.
pub fn is_lossy(raw: &str) -> bool {
    normalize(raw).as_str() != raw
}
