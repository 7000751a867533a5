//! Diagnosis input and result shapes.

use crate::catalog::{CONTRAINDICATION, DISEASE, DISEASE_SYMPTOM, MEDICATION, TREATS};
use crate::model::atom::Atom;
use crate::model::fact::Fact;
use crate::store::fact_store::{FactStore, Snapshot};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// One reported symptom with its free-text severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomReport {
    /// Raw symptom identifier; atomized by the engine.
    pub symptom: String,
    /// `leve|moderado|severo`; anything else counts as neutral.
    pub severity: String,
}

impl SymptomReport {
    pub fn new(symptom: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            symptom: symptom.into(),
            severity: severity.into(),
        }
    }
}

/// Everything a single diagnosis run needs from the patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisInput {
    pub symptoms: Vec<SymptomReport>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronics: Vec<String>,
}

/// Recognized severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Leve,
    Moderado,
    Severo,
}

impl Severity {
    /// Parses trimmed, case-insensitive severity text.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "leve" => Some(Self::Leve),
            "moderado" => Some(Self::Moderado),
            "severo" => Some(Self::Severo),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Leve => 0.8,
            Self::Moderado => 1.0,
            Self::Severo => 1.2,
        }
    }
}

/// Multiplier for raw severity text; unrecognized text is neutral (1.0).
pub fn severity_multiplier(raw: &str) -> f64 {
    Severity::parse(raw).map_or(1.0, Severity::multiplier)
}

/// Global recommendation tier derived from the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    PosibleAutomanejo,
    ObservacionRecomendada,
    ConsultaMedicaInmediataSugerida,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PosibleAutomanejo => "posible_automanejo",
            Self::ObservacionRecomendada => "observacion_recomendada",
            Self::ConsultaMedicaInmediataSugerida => "consulta_medica_inmediata_sugerida",
        }
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted share of one reported symptom in a disease's affinity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub symptom: Atom,
    pub severity: String,
    pub weight: f64,
    pub contribution: f64,
}

/// Recommended medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationChoice {
    pub id: Atom,
    pub name: Atom,
}

/// Why a candidate medication was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Patient is allergic to the medication.
    Allergy { medication: Atom },
    /// Medication is contraindicated with a reported chronic condition.
    Contraindication { medication: Atom, condition: Atom },
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allergy { medication } => write!(f, "allergy:{medication}"),
            Self::Contraindication {
                medication,
                condition,
            } => write!(f, "contraindication:{medication}-{condition}"),
        }
    }
}

impl Serialize for Conflict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entry of the explanation trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredRule {
    pub rule: String,
    pub details: String,
}

impl FiredRule {
    pub fn new(rule: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            details: details.into(),
        }
    }
}

/// Scored outcome for one catalog disease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisResult {
    pub disease_id: Atom,
    pub disease_name: Atom,
    /// Clamped to `[0, 1]`, rounded to 2 decimals.
    pub affinity: f64,
    pub affinity_percent: f64,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medication: Option<MedicationChoice>,
    pub conflicts: Vec<Conflict>,
    pub contributions: Vec<Contribution>,
    pub rules: Vec<FiredRule>,
}

/// Copies of the catalog relations the engine joins over.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// `enfermedad(id,name)`
    pub diseases: Vec<Fact>,
    /// `enfermedad_sintoma(disease,symptom,weight)`
    pub weights: Vec<Fact>,
    /// `trata(disease,medication)`
    pub treatments: Vec<Fact>,
    /// `medicamento(id,name)`
    pub medications: Vec<Fact>,
    /// `contraindicacion(medication,chronic)`
    pub contraindications: Vec<Fact>,
}

impl CatalogSnapshot {
    /// Predicates read by [`CatalogSnapshot::capture`].
    pub const PREDICATES: [&'static str; 5] =
        [DISEASE, DISEASE_SYMPTOM, TREATS, MEDICATION, CONTRAINDICATION];

    /// Takes every needed relation from `store` under one lock.
    pub fn capture(store: &FactStore) -> Self {
        Self::from_snapshot(&store.snapshot(&Self::PREDICATES))
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            diseases: snapshot.facts(DISEASE).to_vec(),
            weights: snapshot.facts(DISEASE_SYMPTOM).to_vec(),
            treatments: snapshot.facts(TREATS).to_vec(),
            medications: snapshot.facts(MEDICATION).to_vec(),
            contraindications: snapshot.facts(CONTRAINDICATION).to_vec(),
        }
    }
}
