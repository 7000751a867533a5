use std::fs;
use std::path::Path;
use symcheck_core::{open_catalog, Arity, CatalogConfig, DiseaseDraft, DiseaseService, FactStore};

const SEED: &str = "% catalogo de prueba\n\
sintoma(fiebre).\n\
\n\
enfermedad(gripe,gripe).\n\
otra_cosa(a, b).\n\
enfermedad_sintoma(gripe,fiebre,0.7).\n\
enfermedad_sintoma(gripe,tos,no_es_numero).\n";

fn write_seed(path: &Path) {
    fs::write(path, SEED).unwrap();
}

#[test]
fn facts_survive_a_second_store_on_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    write_seed(&file);

    let first = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    first.create("sintoma", &["Tos Seca"]).unwrap();
    first.create("enfermedad", &["covid", "COVID-19"]).unwrap();
    first
        .update("enfermedad", &["gripe", "gripe"], &["gripe", "Gripe Comun"])
        .unwrap();

    let second = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    for predicate in ["sintoma", "enfermedad", "enfermedad_sintoma"] {
        assert_eq!(first.list(predicate), second.list(predicate), "{predicate}");
    }
    assert_eq!(second.list("sintoma").len(), 2);
    assert!(second
        .exists("enfermedad", &[Some("gripe"), Some("gripe_comun")])
        .unwrap());
}

#[test]
fn foreign_lines_are_preserved_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    write_seed(&file);

    let store = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    store.create("enfermedad", &["dengue", "Dengue"]).unwrap();

    let text = fs::read_to_string(&file).unwrap();
    assert!(text.starts_with("% catalogo de prueba\nsintoma(fiebre).\n\n"));
    assert!(text.contains("otra_cosa(a, b).\n"));
    assert!(text.contains("enfermedad(gripe,gripe).\nenfermedad(dengue,dengue).\n"));
    // The unparsable weight line belongs to a predicate that was not rewritten.
    assert!(text.contains("enfermedad_sintoma(gripe,tos,no_es_numero).\n"));
}

#[test]
fn malformed_lines_are_skipped_and_dropped_on_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    write_seed(&file);

    let store = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    assert_eq!(store.list("enfermedad_sintoma").len(), 1);

    store
        .create("enfermedad_sintoma", &["gripe", "tos", "0.3"])
        .unwrap();
    let text = fs::read_to_string(&file).unwrap();
    assert!(!text.contains("no_es_numero"));
    assert!(text.contains("enfermedad_sintoma(gripe,fiebre,0.7).\nenfermedad_sintoma(gripe,tos,0.3).\n"));
}

#[test]
fn failed_disease_update_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    let store = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    let diseases = DiseaseService::new(&store);
    diseases
        .create(&DiseaseDraft::new("gripe", "Gripe").with_symptom("fiebre", 0.5))
        .unwrap();
    diseases.create(&DiseaseDraft::new("covid", "Covid")).unwrap();

    let before = fs::read(&file).unwrap();
    let err = diseases
        .update("gripe", &DiseaseDraft::new("covid", "Covid"))
        .unwrap_err();
    assert_eq!(err.code(), "conflict");

    let direct = store
        .update("enfermedad", &["gripe", "gripe"], &["covid", "covid"])
        .unwrap_err();
    assert_eq!(direct.code(), "conflict");
    assert_eq!(fs::read(&file).unwrap(), before);
}

#[test]
fn per_predicate_files_only_rewrite_their_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("prolog.pl");
    let symptoms = dir.path().join("sintomas.pl");
    let mut config = CatalogConfig::with_catalog_file(&shared);
    config
        .predicate_files
        .insert("sintoma".to_string(), symptoms.clone());
    config.validate().unwrap();

    let store = open_catalog(&config).unwrap();
    store.create("sintoma", &["fiebre"]).unwrap();
    store.create("alergia", &["polen"]).unwrap();

    assert_eq!(fs::read_to_string(&symptoms).unwrap(), "sintoma(fiebre).\n");
    assert_eq!(fs::read_to_string(&shared).unwrap(), "alergia(polen).\n");
}

#[test]
fn registration_is_idempotent_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    write_seed(&file);

    let store = FactStore::new();
    assert_eq!(store.register("sintoma", Arity::Unary, &file).unwrap(), 1);
    assert_eq!(store.register("sintoma", Arity::Unary, &file).unwrap(), 0);
    assert_eq!(store.list("sintoma").len(), 1);

    let other = dir.path().join("otro.pl");
    let err = store.register("sintoma", Arity::Unary, &other).unwrap_err();
    assert_eq!(err.code(), "validation");
    let err = store.register("sintoma", Arity::Binary, &file).unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn unwritable_backend_reports_persistence_but_keeps_memory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("falta").join("prolog.pl");

    let store = FactStore::new();
    store.register("sintoma", Arity::Unary, &file).unwrap();
    let err = store.create("sintoma", &["fiebre"]).unwrap_err();
    assert_eq!(err.code(), "persistence");
    assert!(store.exists("sintoma", &[Some("fiebre")]).unwrap());
}

#[test]
fn foreign_bytes_outside_utf8_survive_a_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prolog.pl");
    fs::write(
        &file,
        b"% cat\xe1logo latin-1\nsintoma(fiebre).\nsintoma(caf\xe9).\nenfermedad(gripe,gripe).\n",
    )
    .unwrap();

    let store = open_catalog(&CatalogConfig::with_catalog_file(&file)).unwrap();
    assert_eq!(store.list("sintoma").len(), 1);
    store.create("enfermedad", &["dengue", "Dengue"]).unwrap();

    let bytes = fs::read(&file).unwrap();
    assert!(bytes.starts_with(b"% cat\xe1logo latin-1\nsintoma(fiebre).\nsintoma(caf\xe9).\n"));
    assert!(bytes.ends_with(b"enfermedad(gripe,gripe).\nenfermedad(dengue,dengue).\n"));

    // The undecodable symptom line is dropped once its own predicate is rewritten.
    store.create("sintoma", &["tos"]).unwrap();
    let bytes = fs::read(&file).unwrap();
    assert!(bytes.starts_with(b"% cat\xe1logo latin-1\n"));
    assert!(!bytes.windows(4).any(|window| window == b"caf\xe9"));
    assert!(bytes.ends_with(b"sintoma(fiebre).\nsintoma(tos).\n"));
}

#[cfg(unix)]
#[test]
fn saving_through_a_symlink_keeps_the_link_and_the_mode() {
    use std::os::unix::fs::{symlink, PermissionsExt};

    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("datos").join("prolog.pl");
    fs::create_dir(real.parent().unwrap()).unwrap();
    write_seed(&real);
    fs::set_permissions(&real, fs::Permissions::from_mode(0o640)).unwrap();
    let link = dir.path().join("prolog.pl");
    symlink(&real, &link).unwrap();

    let store = open_catalog(&CatalogConfig::with_catalog_file(&link)).unwrap();
    store.create("sintoma", &["tos"]).unwrap();

    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert!(fs::read_to_string(&real).unwrap().contains("sintoma(tos).\n"));
    assert_eq!(fs::metadata(&real).unwrap().permissions().mode() & 0o777, 0o640);
    assert!(!dir.path().join(".prolog.pl.tmp").exists());
}
