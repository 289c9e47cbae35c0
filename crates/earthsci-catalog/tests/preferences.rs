//! Integration tests for preference persistence.

use std::fs;
use std::sync::Arc;

use earthsci_catalog::{
    CatalogEntry, CatalogError, CatalogPreferences, CatalogTree, PolicyGate, SharedPreferences,
    SyncController, UserActionPreference,
};
use earthsci_core::{LayerTree, PromptAnswer};
use tempfile::TempDir;
use url::Url;

fn sample_preferences() -> CatalogPreferences {
    CatalogPreferences {
        add_node_structure_mode: UserActionPreference::Always,
        delete_empty_folders_mode: UserActionPreference::Never,
    }
}

#[test]
fn toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.toml");

    sample_preferences().save(&path).unwrap();
    assert_eq!(CatalogPreferences::load(&path).unwrap(), sample_preferences());

    // No temporary file is left behind.
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["catalog.toml"]);
}

#[test]
fn json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");

    sample_preferences().save(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"add_node_structure_mode\": \"always\""));
    assert_eq!(CatalogPreferences::load(&path).unwrap(), sample_preferences());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert_eq!(CatalogPreferences::load_or_default(&path).unwrap(), CatalogPreferences::default());
    assert!(matches!(CatalogPreferences::load(&path), Err(CatalogError::Io { .. })));
}

#[test]
fn malformed_and_unsupported_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "add_node_structure_mode = \"sometimes\"").unwrap();
    assert!(matches!(CatalogPreferences::load(&bad), Err(CatalogError::TomlDe { .. })));

    let ini = dir.path().join("catalog.ini");
    assert!(matches!(
        sample_preferences().save(&ini),
        Err(CatalogError::UnsupportedFormat(_))
    ));
    assert!(!ini.exists());
}

#[test]
fn remembered_answer_is_auto_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.toml");
    let prefs = Arc::new(SharedPreferences::default());
    prefs.set_auto_save(&path);

    let mut catalog = CatalogTree::new(CatalogEntry::folder("Catalogs"));
    let layer = catalog
        .add(
            catalog.root(),
            CatalogEntry::layer("L", Url::parse("https://example.com/l.xml").unwrap(), None),
        )
        .unwrap();

    let controller = SyncController::builder(LayerTree::new())
        .preferences(prefs.clone())
        .policy_resolver(Arc::new(|_gate: PolicyGate| PromptAnswer::remembered(false)))
        .build();
    controller.add_to_layer_model(&catalog, &[layer]).unwrap();

    let saved = CatalogPreferences::load(&path).unwrap();
    assert_eq!(saved.add_node_structure_mode, UserActionPreference::Never);
    assert_eq!(saved.delete_empty_folders_mode, UserActionPreference::Ask);

    // A fresh session starts from the saved answer without asking.
    let reloaded = SharedPreferences::new(CatalogPreferences::load(&path).unwrap());
    assert_eq!(reloaded.get(PolicyGate::FullPathRequired), UserActionPreference::Never);
}
