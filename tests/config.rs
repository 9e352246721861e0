use std::fs;

use assert_matches::assert_matches;

use vdjdb_search::config::{ConfigLoader, DEFAULT_OUTPUT_DIR, QueryBatch, Settings};
use vdjdb_search::domain::QuerySpec;
use vdjdb_search::error::SearchError;

#[test]
fn loads_demo_query_file() {
    let batch = ConfigLoader::load_queries("demos/query_examples.toml".as_ref()).unwrap();
    assert_eq!(batch.len(), 3);

    let cmv = &batch.queries()[1];
    assert_eq!(cmv.id, "cmv_pp65_trbv07");
    assert_eq!(
        cmv.query,
        QuerySpec::new()
            .with("antigen.gene", "pp65")
            .with("v.segm", "TCRBV07")
    );
    assert_eq!(cmv.query.to_string(), "antigen.gene=pp65 & v.segm=TCRBV07");
}

#[test]
fn missing_query_file_is_reported() {
    let err = ConfigLoader::load_queries("does/not/exist.toml".as_ref()).unwrap_err();
    assert_matches!(err, SearchError::QueryConfigRead(path) if path.ends_with("exist.toml"));
}

#[test]
fn malformed_query_file_is_reported() {
    let err = QueryBatch::from_toml_str("[broken\ncdr3 = ").unwrap_err();
    assert_matches!(err, SearchError::QueryConfigParse(_));

    let err = QueryBatch::from_toml_str("[q]\ncdr3 = [\"CASS\"]").unwrap_err();
    assert_matches!(err, SearchError::QueryConfigParse(message) if message.contains("cdr3"));
}

#[test]
fn empty_query_file_is_an_empty_batch() {
    let batch = QueryBatch::from_toml_str("# nothing yet\n").unwrap();
    assert!(batch.is_empty());
}

#[test]
fn settings_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("vdjdb-search.toml");
    fs::write(
        &path,
        r#"
        species = "MusMusculus"
        members = ["vdjdb.slim.txt", "vdjdb.txt"]
        use_cache = false
        upload_endpoint = "https://upload.example.org/vdjdb"
        "#,
    )
    .unwrap();

    let settings = ConfigLoader::load_settings(path.to_str()).unwrap();
    assert_eq!(settings.species.as_deref(), Some("MusMusculus"));
    assert_eq!(settings.members.len(), 2);
    assert!(!settings.use_cache);
    assert_eq!(settings.output_dir, DEFAULT_OUTPUT_DIR);
    assert_eq!(
        settings.upload_endpoint.as_deref(),
        Some("https://upload.example.org/vdjdb")
    );
    assert_ne!(settings, Settings::default());
}

#[test]
fn explicit_missing_settings_file_is_an_error() {
    let err = ConfigLoader::load_settings(Some("no-such-settings.toml")).unwrap_err();
    assert_matches!(err, SearchError::SettingsRead(_));
}
