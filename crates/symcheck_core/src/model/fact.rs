//! Fact tuples and predicate arity.
//!
//! # Responsibility
//! - Define the tagged fact shape shared by store, persistence and queries.
//! - Canonicalize the numeric field of ternary facts.
//!
//! # Invariants
//! - Every atom inside a `Fact` is already normalized.
//! - `Weight` equality is equality of its canonical text, so `0.50` and
//!   `0.5` are the same weight.
//! - A fact renders to exactly one `predicate(f1,f2,...).` line.

use crate::model::atom::{normalize, Atom};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Number of fields carried by every fact of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Set of atoms.
    Unary,
    /// Set of ordered atom pairs.
    Binary,
    /// Set of `(atom, atom, weight)` triples.
    Ternary,
}

impl Arity {
    /// Maps a field count to an arity.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Self::Unary),
            2 => Some(Self::Binary),
            3 => Some(Self::Ternary),
            _ => None,
        }
    }

    pub fn field_count(self) -> usize {
        match self {
            Self::Unary => 1,
            Self::Binary => 2,
            Self::Ternary => 3,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_count())
    }
}

/// Raw numeric text that could not be parsed as a finite number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWeight(pub String);

impl Display for InvalidWeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "not a finite number: `{}`", self.0)
    }
}

impl Error for InvalidWeight {}

/// Numeric third component of a ternary fact.
///
/// Keeps the parsed value next to its shortest round-trip text. Equality and
/// hashing use the text only.
#[derive(Debug, Clone)]
pub struct Weight {
    value: f64,
    text: String,
}

impl Weight {
    /// Parses and canonicalizes a numeric field.
    pub fn parse(raw: &str) -> Result<Self, InvalidWeight> {
        let trimmed = raw.trim();
        let value = trimmed
            .parse::<f64>()
            .map_err(|_| InvalidWeight(trimmed.to_string()))?;
        Self::from_value(value).ok_or_else(|| InvalidWeight(trimmed.to_string()))
    }

    /// Builds a weight from a value. Returns `None` for NaN and infinities.
    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // -0.0 and 0.0 are the same weight.
        let value = if value == 0.0 { 0.0 } else { value };
        Some(Self {
            value,
            text: shortest_text(value),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }
}

/// Shortest round-trip digits, switching to `d.ddde±XX` when the decimal
/// exponent is below -4 or at least 6.
fn shortest_text(value: f64) -> String {
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{value}");
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return format!("{value}");
    };
    if (-4..6).contains(&exponent) {
        return format!("{value}");
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Weight {}

impl Hash for Weight {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value)
    }
}

/// One concrete tuple of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Fact {
    Unary(Atom),
    Binary(Atom, Atom),
    Ternary(Atom, Atom, Weight),
}

/// Why raw fields could not become a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactFieldsError {
    /// Field count does not match the arity.
    WrongFieldCount { expected: usize, actual: usize },
    /// Ternary numeric field is not a number.
    InvalidWeight(InvalidWeight),
}

impl Display for FactFieldsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongFieldCount { expected, actual } => {
                write!(f, "expected {expected} fields, got {actual}")
            }
            Self::InvalidWeight(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FactFieldsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidWeight(err) => Some(err),
            Self::WrongFieldCount { .. } => None,
        }
    }
}

impl Fact {
    /// Normalizes raw fields into a fact of the given arity.
    ///
    /// Every field is atomized; the last field of a ternary fact is parsed
    /// as a number instead.
    pub fn from_fields<S: AsRef<str>>(arity: Arity, fields: &[S]) -> Result<Self, FactFieldsError> {
        if fields.len() != arity.field_count() {
            return Err(FactFieldsError::WrongFieldCount {
                expected: arity.field_count(),
                actual: fields.len(),
            });
        }
        let fact = match arity {
            Arity::Unary => Self::Unary(normalize(fields[0].as_ref())),
            Arity::Binary => Self::Binary(
                normalize(fields[0].as_ref()),
                normalize(fields[1].as_ref()),
            ),
            Arity::Ternary => Self::Ternary(
                normalize(fields[0].as_ref()),
                normalize(fields[1].as_ref()),
                Weight::parse(fields[2].as_ref()).map_err(FactFieldsError::InvalidWeight)?,
            ),
        };
        Ok(fact)
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Unary(_) => Arity::Unary,
            Self::Binary(..) => Arity::Binary,
            Self::Ternary(..) => Arity::Ternary,
        }
    }

    /// Canonical text of every field, in order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Unary(a) => vec![a.as_str()],
            Self::Binary(a, b) => vec![a.as_str(), b.as_str()],
            Self::Ternary(a, b, w) => vec![a.as_str(), b.as_str(), w.as_str()],
        }
    }

    /// First field. Every arity has one.
    pub fn first(&self) -> &Atom {
        match self {
            Self::Unary(a) | Self::Binary(a, _) | Self::Ternary(a, _, _) => a,
        }
    }

    /// Second field for binary and ternary facts.
    pub fn second(&self) -> Option<&Atom> {
        match self {
            Self::Unary(_) => None,
            Self::Binary(_, b) | Self::Ternary(_, b, _) => Some(b),
        }
    }

    /// Numeric field for ternary facts.
    pub fn weight(&self) -> Option<&Weight> {
        match self {
            Self::Ternary(_, _, w) => Some(w),
            _ => None,
        }
    }

    /// Renders this fact as one line of the flat-file format.
    pub fn to_line(&self, predicate: &str) -> String {
        format!("{predicate}({}).", self.fields().join(","))
    }
}

impl Display for Fact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.fields().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::{Arity, Fact, FactFieldsError, Weight};

    #[test]
    fn weight_uses_shortest_round_trip_text() {
        assert_eq!(Weight::parse("0.50").unwrap().as_str(), "0.5");
        assert_eq!(Weight::parse(" 1.0 ").unwrap().as_str(), "1");
        assert_eq!(Weight::parse("0.1").unwrap().as_str(), "0.1");
        assert_eq!(Weight::parse("-0").unwrap().as_str(), "0");
        assert_eq!(Weight::parse(".25").unwrap(), Weight::parse("2.5e-1").unwrap());
    }

    #[test]
    fn extreme_magnitudes_switch_to_exponent_form() {
        assert_eq!(Weight::parse("1e21").unwrap().as_str(), "1e+21");
        assert_eq!(Weight::parse("0.0000001").unwrap().as_str(), "1e-07");
        assert_eq!(Weight::parse("-1.5e-7").unwrap().as_str(), "-1.5e-07");
        assert_eq!(Weight::parse("1234567").unwrap().as_str(), "1.234567e+06");
        assert_eq!(Weight::parse("123456").unwrap().as_str(), "123456");
        assert_eq!(Weight::parse("0.0001").unwrap().as_str(), "0.0001");
        assert_eq!(Weight::parse("0.00001").unwrap().as_str(), "1e-05");
        assert_eq!(Weight::parse("1e+21").unwrap(), Weight::parse("1e21").unwrap());
    }

    #[test]
    fn weight_rejects_garbage_and_non_finite() {
        assert!(Weight::parse("abc").is_err());
        assert!(Weight::parse("").is_err());
        assert!(Weight::parse("NaN").is_err());
        assert!(Weight::parse("inf").is_err());
    }

    #[test]
    fn from_fields_normalizes_every_field() {
        let fact = Fact::from_fields(Arity::Ternary, &["Gripe", "Tos Seca", "0.70"]).unwrap();
        assert_eq!(fact.fields(), vec!["gripe", "tos_seca", "0.7"]);
        assert_eq!(fact.to_line("enfermedad_sintoma"), "enfermedad_sintoma(gripe,tos_seca,0.7).");
    }

    #[test]
    fn from_fields_checks_field_count() {
        let err = Fact::from_fields(Arity::Binary, &["only_one"]).unwrap_err();
        assert_eq!(
            err,
            FactFieldsError::WrongFieldCount {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn ternary_equality_ignores_numeric_spelling() {
        let a = Fact::from_fields(Arity::Ternary, &["d", "s", "0.5"]).unwrap();
        let b = Fact::from_fields(Arity::Ternary, &["D", "S", "0.500"]).unwrap();
        assert_eq!(a, b);
    }
}
