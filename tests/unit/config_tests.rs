//! Unit tests for configuration and catalog loading from disk

use std::fs;

use tempfile::TempDir;

use rust_sqlproc::config::COLUMN_ENCRYPTION_SETTING;
use rust_sqlproc::{
    load_catalog, ConnectionConfig, JsonMetadataSource, LoadOptions, MetadataSource,
    ProcedureError,
};

use crate::common::fixture_path;

const MINIMAL_CATALOG: &str = r#"{
    "procedures": [
        { "specificSchema": "dbo", "specificName": "CLEAR_DATA", "isNonQuery": true }
    ]
}"#;

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

// ============================================================================
// Connection Config Tests
// ============================================================================

#[test]
fn test_read_app_config_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "app.config",
        r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <appSettings>
    <add key="ignored" value="true" />
  </appSettings>
  <connectionStrings>
    <clear />
    <add name="open" connectionString="Server=db;User Id=open" />
  </connectionStrings>
</configuration>"#,
    );

    let config = ConnectionConfig::from_file(&path).unwrap();
    assert_eq!(config.len(), 1);
    assert_eq!(config.get("open"), Some("Server=db;User Id=open"));
    assert_eq!(config.get("ignored"), None);
}

#[test]
fn test_missing_app_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.config");

    let err = ConnectionConfig::from_file(&path).unwrap_err();
    match err {
        ProcedureError::ConfigReadError { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_malformed_app_config() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.config", "<configuration><connectionStrings>");

    let err = ConnectionConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ProcedureError::ConfigParseError { .. }));
}

#[test]
fn test_fixture_connections() {
    let config = ConnectionConfig::from_file(&fixture_path("app.config")).unwrap();
    assert_eq!(config.len(), 4);

    let target = config.target_for("trusted", true).unwrap();
    assert_eq!(target.name, "trusted");
    assert!(target.connection_string.ends_with(COLUMN_ENCRYPTION_SETTING));

    let target = config.target_for("open", false).unwrap();
    assert_eq!(
        target.connection_string,
        "Server=localhost;Database=sample;User Id=open_user"
    );

    assert!(matches!(
        config.target_for("reporting", false),
        Err(ProcedureError::MissingConnection { .. })
    ));
}

// ============================================================================
// Metadata Source Tests
// ============================================================================

#[test]
fn test_json_metadata_source_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "catalog.json", MINIMAL_CATALOG);

    let metadata = JsonMetadataSource::from_file(&path).load().unwrap();
    assert_eq!(metadata.procedures.len(), 1);
    assert_eq!(metadata.procedures[0].qualified_name(), "[dbo].[CLEAR_DATA]");
    assert_eq!(metadata.procedures[0].routine_type, "PROCEDURE");
    assert!(metadata.table_types.is_empty());
}

#[test]
fn test_json_metadata_source_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nowhere.json");

    let err = JsonMetadataSource::from_file(&path).load().unwrap_err();
    assert!(err.to_string().contains("Failed to read catalog file"));
}

#[test]
fn test_json_metadata_source_invalid_document() {
    let err = JsonMetadataSource::from_text("{ \"procedures\": 3 }")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("Failed to parse catalog document"));
}

// ============================================================================
// Load Catalog Tests
// ============================================================================

#[test]
fn test_load_catalog_from_files() {
    let dir = TempDir::new().unwrap();
    let catalog_path = write_file(&dir, "catalog.json", MINIMAL_CATALOG);
    let config_path = write_file(
        &dir,
        "app.config",
        r#"<configuration><connectionStrings><add name="dbo" connectionString="Server=." /></connectionStrings></configuration>"#,
    );

    let catalog = load_catalog(&LoadOptions {
        catalog_path,
        config_path,
    })
    .unwrap();

    assert_eq!(catalog.procedure_names(), vec!["[dbo].[CLEAR_DATA]".to_string()]);
    let instance = catalog.procedure("CLEAR_DATA").unwrap();
    assert_eq!(instance.template().connection().connection_string, "Server=.");
}

#[test]
fn test_load_catalog_without_connection_for_schema() {
    let dir = TempDir::new().unwrap();
    let catalog_path = write_file(&dir, "catalog.json", MINIMAL_CATALOG);
    let config_path = write_file(
        &dir,
        "app.config",
        r#"<configuration><connectionStrings><add name="open" connectionString="Server=." /></connectionStrings></configuration>"#,
    );

    let err = load_catalog(&LoadOptions {
        catalog_path,
        config_path,
    })
    .unwrap_err();

    let missing = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ProcedureError>())
        .any(|cause| matches!(cause, ProcedureError::MissingConnection { name } if name == "dbo"));
    assert!(missing, "unexpected error chain: {:?}", err);
}
