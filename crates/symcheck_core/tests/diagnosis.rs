use std::fs;
use symcheck_core::diagnosis::engine::{RULE_EXCLUSION, RULE_URGENCY};
use symcheck_core::{
    assess, diagnose, normalize, open_catalog, CatalogConfig, CatalogSnapshot, Conflict, DiagnosisError,
    DiagnosisInput, DiagnosisService, FactStore, SymptomReport, Urgency,
};

const CATALOG: &str = "\
enfermedad(d1,gripe).
enfermedad(d2,migrana).
enfermedad(d3,resfriado).
enfermedad_sintoma(d1,s1,0.6).
enfermedad_sintoma(d1,s2,0.5).
enfermedad_sintoma(d2,s3,0.9).
enfermedad_sintoma(d3,s1,0.2).
medicamento(m1,paracetamol).
medicamento(m2,ibuprofeno).
trata(d1,m1).
trata(d1,m2).
trata(d2,m2).
contraindicacion(m2,asma).
";

fn catalog_store() -> (tempfile::TempDir, FactStore) {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    fs::write(&file, CATALOG).unwrap();
    let store = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    (dir, store)
}

fn input(symptoms: &[(&str, &str)]) -> DiagnosisInput {
    DiagnosisInput {
        symptoms: symptoms
            .iter()
            .map(|(symptom, severity)| SymptomReport::new(*symptom, *severity))
            .collect(),
        ..DiagnosisInput::default()
    }
}

#[test]
fn clamps_affinity_and_stamps_urgency_everywhere() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);

    let results = diagnose(&input(&[("s1", "moderado"), ("S2", "Severo")]), &catalog).unwrap();
    assert_eq!(results.len(), 3);

    let top = &results[0];
    assert_eq!(top.disease_id, "d1");
    assert_eq!(top.disease_name, "gripe");
    assert_eq!(top.affinity, 1.0);
    assert_eq!(top.affinity_percent, 100.0);
    assert_eq!(top.contributions.len(), 2);
    assert_eq!(top.contributions[1].contribution, 0.6);

    assert!(results
        .iter()
        .all(|result| result.urgency == Urgency::ConsultaMedicaInmediataSugerida));
    assert!(results
        .iter()
        .all(|result| (0.0..=1.0).contains(&result.affinity)));

    let urgency_rule = top.rules.last().unwrap();
    assert_eq!(urgency_rule.rule, RULE_URGENCY);
    assert_eq!(
        urgency_rule.details,
        "moderado,severo->consulta_medica_inmediata_sugerida"
    );
}

#[test]
fn results_sort_by_affinity_and_ties_keep_catalog_order() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);

    let results = diagnose(&input(&[("s1", "leve")]), &catalog).unwrap();
    let order: Vec<&str> = results
        .iter()
        .map(|result| result.disease_id.as_str())
        .collect();
    assert_eq!(order, vec!["d1", "d3", "d2"]);
    assert_eq!(results[0].affinity, 0.48);
    assert_eq!(results[1].affinity, 0.16);

    let nothing = diagnose(&input(&[("desconocido", "leve")]), &catalog).unwrap();
    let order: Vec<&str> = nothing
        .iter()
        .map(|result| result.disease_id.as_str())
        .collect();
    assert_eq!(order, vec!["d1", "d2", "d3"]);
    assert!(nothing.iter().all(|result| result.affinity == 0.0));
    assert!(nothing.iter().all(|result| result.contributions.is_empty()));
}

#[test]
fn first_safe_treatment_wins() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);

    let results = diagnose(&input(&[("s1", "leve")]), &catalog).unwrap();
    let d1 = results.iter().find(|r| r.disease_id == "d1").unwrap();
    let medication = d1.medication.as_ref().unwrap();
    assert_eq!(medication.id, "m1");
    assert_eq!(medication.name, "paracetamol");
    assert!(d1.conflicts.is_empty());
    assert!(d1
        .rules
        .iter()
        .any(|rule| rule.rule == "trata/2" && rule.details == "d1,m1"));

    let d3 = results.iter().find(|r| r.disease_id == "d3").unwrap();
    assert!(d3.medication.is_none());
    assert!(d3.rules.iter().all(|rule| rule.rule != RULE_EXCLUSION));
}

#[test]
fn allergy_skips_to_the_next_candidate() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);
    let mut report = input(&[("s1", "moderado")]);
    report.allergies = vec!["M1".to_string()];

    let results = diagnose(&report, &catalog).unwrap();
    let d1 = &results[0];
    assert_eq!(d1.medication.as_ref().unwrap().id, "m2");
    assert_eq!(
        d1.conflicts,
        vec![Conflict::Allergy {
            medication: normalize("m1")
        }]
    );
}

#[test]
fn all_candidates_excluded_fires_the_exclusion_rule() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);
    let mut report = input(&[("s1", "moderado"), ("s3", "leve")]);
    report.allergies = vec!["m1".to_string()];
    report.chronics = vec!["Asma".to_string(), "asma".to_string()];

    let results = diagnose(&report, &catalog).unwrap();
    let d1 = results.iter().find(|r| r.disease_id == "d1").unwrap();
    assert!(d1.medication.is_none());
    let conflicts: Vec<String> = d1.conflicts.iter().map(ToString::to_string).collect();
    assert_eq!(conflicts, vec!["allergy:m1", "contraindication:m2-asma"]);
    assert!(d1.rules.iter().any(|rule| rule.rule == RULE_EXCLUSION
        && rule.details == "allergy:m1;contraindication:m2-asma"));

    let d2 = results.iter().find(|r| r.disease_id == "d2").unwrap();
    assert_eq!(d2.conflicts.len(), 1);
    assert!(d2.medication.is_none());
}

#[test]
fn adding_a_severe_symptom_never_lowers_urgency() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);
    let base = [("s1", "leve"), ("s3", "moderado")];

    let before = diagnose(&input(&base), &catalog).unwrap();
    let mut extended = base.to_vec();
    extended.push(("s2", "severo"));
    let after = diagnose(&input(&extended), &catalog).unwrap();

    assert_eq!(before[0].urgency, Urgency::ObservacionRecomendada);
    assert!(after[0].urgency >= before[0].urgency);
    assert_eq!(after[0].urgency, Urgency::ConsultaMedicaInmediataSugerida);
}

#[test]
fn repeated_runs_are_identical() {
    let (_dir, store) = catalog_store();
    let catalog = CatalogSnapshot::capture(&store);
    let mut report = input(&[("s1", "severo"), ("s3", "regular")]);
    report.chronics = vec!["asma".to_string()];

    let first = diagnose(&report, &catalog).unwrap();
    let second = diagnose(&report, &catalog).unwrap();
    assert_eq!(first, second);
}

#[test]
fn medication_without_a_name_falls_back_to_its_id() {
    let store = FactStore::new();
    store.create("enfermedad", &["d1", "gripe"]).unwrap();
    store.create("enfermedad_sintoma", &["d1", "s1", "0.4"]).unwrap();
    store.create("trata", &["d1", "m9"]).unwrap();

    let results = diagnose(
        &input(&[("s1", "moderado")]),
        &CatalogSnapshot::capture(&store),
    )
    .unwrap();
    let medication = results[0].medication.as_ref().unwrap();
    assert_eq!(medication.id, "m9");
    assert_eq!(medication.name, "m9");
    assert_eq!(results[0].affinity_percent, 40.0);
}

#[test]
fn empty_reports_are_rejected() {
    let (_dir, store) = catalog_store();
    let err = diagnose(&DiagnosisInput::default(), &CatalogSnapshot::capture(&store)).unwrap_err();
    assert_eq!(err, DiagnosisError::EmptySymptoms);

    let service_err = DiagnosisService::new(&store)
        .run(DiagnosisInput::default())
        .unwrap_err();
    assert_eq!(service_err, DiagnosisError::EmptySymptoms);
}

#[test]
fn report_serializes_to_stable_json() {
    let (_dir, store) = catalog_store();
    let mut report_input = input(&[("s1", "moderado"), ("s2", "severo")]);
    report_input.allergies = vec!["m1".to_string()];

    let report = DiagnosisService::new(&store).run(report_input).unwrap();
    assert!(report.generated_at_ms > 0);
    assert_eq!(report.top().unwrap().disease_id, "d1");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["urgency"], "consulta_medica_inmediata_sugerida");
    assert_eq!(json["inputs"]["allergies"][0], "m1");

    let top = &json["results"][0];
    assert_eq!(top["disease_id"], "d1");
    assert_eq!(top["affinity"], 1.0);
    assert_eq!(top["medication"]["id"], "m2");
    assert_eq!(top["conflicts"][0], "allergy:m1");
    assert_eq!(top["contributions"][0]["symptom"], "s1");
    assert_eq!(top["rules"][0]["rule"], "enfermedad_sintoma/3");
    assert_eq!(top["rules"][0]["details"], "d1,s1,0.6");

    let untreated = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|result| result["disease_id"] == "d3")
        .unwrap();
    assert!(untreated.get("medication").is_none());
}

#[test]
fn input_deserializes_with_optional_lists() {
    let parsed: DiagnosisInput =
        serde_json::from_str(r#"{"symptoms":[{"symptom":"Fiebre","severity":"leve"}]}"#).unwrap();
    assert_eq!(parsed.symptoms.len(), 1);
    assert!(parsed.allergies.is_empty());
    assert!(parsed.chronics.is_empty());
}

#[test]
fn negative_weights_clamp_affinity_to_zero() {
    let store = FactStore::new();
    store.create("enfermedad", &["d", "alergia_estacional"]).unwrap();
    store.create("enfermedad_sintoma", &["d", "s", "-0.5"]).unwrap();

    let results = diagnose(&input(&[("s", "severo")]), &CatalogSnapshot::capture(&store)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].affinity, 0.0);
    assert_eq!(results[0].affinity_percent, 0.0);
    assert!(results[0].contributions.is_empty());
}

#[test]
fn assessment_tier_matches_every_result_and_the_service_report() {
    let (_dir, store) = catalog_store();
    let report_input = input(&[("s1", "leve"), ("s3", "moderado")]);

    let assessment = assess(&report_input, &CatalogSnapshot::capture(&store)).unwrap();
    assert_eq!(assessment.urgency, Urgency::ObservacionRecomendada);
    assert!(assessment
        .results
        .iter()
        .all(|result| result.urgency == assessment.urgency));

    let report = DiagnosisService::new(&store).run(report_input).unwrap();
    assert_eq!(report.urgency, assessment.urgency);
    assert_eq!(report.results, assessment.results);
}

#[test]
fn empty_catalog_still_reports_the_symptom_tier() {
    let store = FactStore::new();
    let report = DiagnosisService::new(&store)
        .run(input(&[("tos", "severo")]))
        .unwrap();
    assert!(report.results.is_empty());
    assert!(report.top().is_none());
    assert_eq!(report.urgency, Urgency::ConsultaMedicaInmediataSugerida);
}

#[test]
fn rule_details_use_the_stored_weight_text() {
    let store = FactStore::new();
    store.create("enfermedad", &["d", "rara"]).unwrap();
    store.create("enfermedad_sintoma", &["d", "s", "0.0000001"]).unwrap();

    let results = diagnose(&input(&[("s", "leve")]), &CatalogSnapshot::capture(&store)).unwrap();
    let rule = &results[0].rules[0];
    assert_eq!(rule.rule, "enfermedad_sintoma/3");
    assert_eq!(rule.details, "d,s,1e-07");
}
