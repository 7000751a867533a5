//! Affinity scoring, treatment resolution and urgency classification.
//!
//! # Invariants
//! - `0 <= affinity <= 1` for every result.
//! - Treatment choice is first-match over the stored link order, never a
//!   best-match search.
//! - Urgency is computed once per report and stamped on every result.
//! - Output is sorted by descending affinity; ties keep catalog order.

use super::types::{
    severity_multiplier, CatalogSnapshot, Conflict, Contribution, DiagnosisInput, DiagnosisResult,
    FiredRule, MedicationChoice, Severity, SymptomReport, Urgency,
};
use super::DiagnosisError;
use crate::catalog::{DISEASE_SYMPTOM, TREATS};
use crate::model::atom::{normalize, Atom};
use crate::model::fact::{Fact, Weight};
use std::collections::{HashMap, HashSet};

/// Explanation rule fired when every treatment candidate was excluded.
pub const RULE_EXCLUSION: &str = "exclusion";
/// Explanation rule recording the urgency derivation.
pub const RULE_URGENCY: &str = "urgencia";

/// Report-wide urgency together with the scored diseases.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub urgency: Urgency,
    /// Sorted by descending affinity; each carries `urgency`.
    pub results: Vec<DiagnosisResult>,
}

/// Scores every catalog disease against `input`.
///
/// # Errors
/// - `EmptySymptoms` when the report has no symptoms.
pub fn diagnose(
    input: &DiagnosisInput,
    catalog: &CatalogSnapshot,
) -> Result<Vec<DiagnosisResult>, DiagnosisError> {
    assess(input, catalog).map(|assessment| assessment.results)
}

/// Like [`diagnose`], also returning the tier it stamped on every result.
///
/// # Errors
/// - `EmptySymptoms` when the report has no symptoms.
pub fn assess(
    input: &DiagnosisInput,
    catalog: &CatalogSnapshot,
) -> Result<Assessment, DiagnosisError> {
    if input.symptoms.is_empty() {
        return Err(DiagnosisError::EmptySymptoms);
    }

    let joins = CatalogJoins::build(catalog);
    let reports: Vec<ScoredReport> = input.symptoms.iter().map(ScoredReport::new).collect();
    let allergies: HashSet<Atom> = input.allergies.iter().map(|raw| normalize(raw)).collect();
    let chronics = dedup_atoms(&input.chronics);
    let (urgency, urgency_details) = classify_urgency(&input.symptoms);

    let mut results = Vec::with_capacity(catalog.diseases.len());
    for fact in &catalog.diseases {
        let Fact::Binary(disease_id, disease_name) = fact else {
            continue;
        };
        let mut rules = Vec::new();

        let (total, contributions) = score_disease(disease_id, &reports, &joins, &mut rules);
        let resolution = resolve_treatment(disease_id, &allergies, &chronics, &joins);
        rules.extend(resolution.rules);
        rules.push(FiredRule::new(RULE_URGENCY, urgency_details.as_str()));

        results.push(DiagnosisResult {
            disease_id: disease_id.clone(),
            disease_name: disease_name.clone(),
            affinity: round2(total),
            affinity_percent: round2(total * 100.0),
            urgency,
            medication: resolution.medication,
            conflicts: resolution.conflicts,
            contributions,
            rules,
        });
    }

    // sort_by is stable, so equal affinities keep catalog order.
    results.sort_by(|a, b| b.affinity.total_cmp(&a.affinity));
    Ok(Assessment { urgency, results })
}

/// Classifies the report: any `severo` beats any `moderado` beats the rest.
///
/// Returns the tier and the `sev1,sev2,...->tier` explanation detail.
pub fn classify_urgency(reports: &[SymptomReport]) -> (Urgency, String) {
    let severities: Vec<Option<Severity>> = reports
        .iter()
        .map(|report| Severity::parse(&report.severity))
        .collect();

    let urgency = if severities.contains(&Some(Severity::Severo)) {
        Urgency::ConsultaMedicaInmediataSugerida
    } else if severities.contains(&Some(Severity::Moderado)) {
        Urgency::ObservacionRecomendada
    } else {
        Urgency::PosibleAutomanejo
    };

    let trail = reports
        .iter()
        .map(|report| normalize(&report.severity).into_string())
        .collect::<Vec<_>>()
        .join(",");
    (urgency, format!("{trail}->{urgency}"))
}

/// Outcome of walking one disease's treatment links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreatmentResolution {
    pub medication: Option<MedicationChoice>,
    pub conflicts: Vec<Conflict>,
    pub rules: Vec<FiredRule>,
}

struct ScoredReport {
    symptom: Atom,
    severity: String,
    multiplier: f64,
}

impl ScoredReport {
    fn new(report: &SymptomReport) -> Self {
        Self {
            symptom: normalize(&report.symptom),
            severity: report.severity.trim().to_lowercase(),
            multiplier: severity_multiplier(&report.severity),
        }
    }
}

/// Lookup tables built once per run from the snapshot.
struct CatalogJoins<'a> {
    weights: HashMap<(&'a str, &'a str), &'a Weight>,
    treatments: HashMap<&'a str, Vec<&'a Atom>>,
    medication_names: HashMap<&'a str, &'a Atom>,
    contraindicated: HashSet<(&'a str, &'a str)>,
}

impl<'a> CatalogJoins<'a> {
    fn build(catalog: &'a CatalogSnapshot) -> Self {
        let mut weights = HashMap::new();
        for fact in &catalog.weights {
            if let Fact::Ternary(disease, symptom, weight) = fact {
                // Later facts for the same pair win.
                weights.insert((disease.as_str(), symptom.as_str()), weight);
            }
        }

        let mut treatments: HashMap<&str, Vec<&Atom>> = HashMap::new();
        for fact in &catalog.treatments {
            if let Fact::Binary(disease, medication) = fact {
                treatments.entry(disease.as_str()).or_default().push(medication);
            }
        }

        let mut medication_names = HashMap::new();
        for fact in &catalog.medications {
            if let Fact::Binary(id, name) = fact {
                medication_names.insert(id.as_str(), name);
            }
        }

        let contraindicated = catalog
            .contraindications
            .iter()
            .filter_map(|fact| match fact {
                Fact::Binary(medication, condition) => {
                    Some((medication.as_str(), condition.as_str()))
                }
                _ => None,
            })
            .collect();

        Self {
            weights,
            treatments,
            medication_names,
            contraindicated,
        }
    }

    fn weight(&self, disease: &Atom, symptom: &Atom) -> Option<&'a Weight> {
        self.weights
            .get(&(disease.as_str(), symptom.as_str()))
            .copied()
    }
}

fn score_disease(
    disease: &Atom,
    reports: &[ScoredReport],
    joins: &CatalogJoins<'_>,
    rules: &mut Vec<FiredRule>,
) -> (f64, Vec<Contribution>) {
    let mut total = 0.0;
    let mut contributions = Vec::new();

    for report in reports {
        let Some(weight) = joins.weight(disease, &report.symptom) else {
            continue;
        };
        let contribution = weight.value() * report.multiplier;
        if contribution > 0.0 {
            contributions.push(Contribution {
                symptom: report.symptom.clone(),
                severity: report.severity.clone(),
                weight: round2(weight.value()),
                contribution: round2(contribution),
            });
            rules.push(FiredRule::new(
                format!("{DISEASE_SYMPTOM}/3"),
                format!("{disease},{},{}", report.symptom, weight.as_str()),
            ));
        }
        total += contribution;
    }

    (total.clamp(0.0, 1.0), contributions)
}

fn resolve_treatment(
    disease: &Atom,
    allergies: &HashSet<Atom>,
    chronics: &[Atom],
    joins: &CatalogJoins<'_>,
) -> TreatmentResolution {
    let mut resolution = TreatmentResolution::default();
    let Some(candidates) = joins.treatments.get(disease.as_str()) else {
        return resolution;
    };

    for medication in candidates {
        if allergies.contains(*medication) {
            resolution.conflicts.push(Conflict::Allergy {
                medication: (*medication).clone(),
            });
            continue;
        }

        let blocking = chronics.iter().find(|condition| {
            joins
                .contraindicated
                .contains(&(medication.as_str(), condition.as_str()))
        });
        if let Some(condition) = blocking {
            resolution.conflicts.push(Conflict::Contraindication {
                medication: (*medication).clone(),
                condition: condition.clone(),
            });
            continue;
        }

        let name = joins
            .medication_names
            .get(medication.as_str())
            .copied()
            .unwrap_or(*medication);
        resolution.medication = Some(MedicationChoice {
            id: (*medication).clone(),
            name: name.clone(),
        });
        resolution.rules.push(FiredRule::new(
            format!("{TREATS}/2"),
            format!("{disease},{medication}"),
        ));
        return resolution;
    }

    if !resolution.conflicts.is_empty() {
        let summary = resolution
            .conflicts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        resolution.rules.push(FiredRule::new(RULE_EXCLUSION, summary));
    }
    resolution
}

fn dedup_atoms(raw: &[String]) -> Vec<Atom> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|value| normalize(value))
        .filter(|atom| seen.insert(atom.clone()))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
