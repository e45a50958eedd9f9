//! Policy store load, hot-reload, and write-through behavior

use std::sync::Arc;

use procwarden::models::{PolicyConfiguration, PolicyRule};
use procwarden::policy::PolicyStore;

fn configuration_with_interval(seconds: u32) -> PolicyConfiguration {
    PolicyConfiguration {
        check_interval_seconds: seconds,
        rules: vec![PolicyRule {
            name: "Block Game".to_string(),
            process_name_regex: Some("^game$".to_string()),
            window_title_regex: None,
            enabled: true,
        }],
        ..PolicyConfiguration::default()
    }
}

fn write_policy(path: &std::path::Path, config: &PolicyConfiguration) {
    std::fs::write(path, serde_json::to_string_pretty(config).unwrap()).unwrap();
}

#[test]
fn test_missing_file_synthesizes_and_persists_starter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");

    let store = PolicyStore::new(path.clone());
    store.load();

    let snapshot = store.snapshot();
    assert!(snapshot.enable_monitoring);
    assert_eq!(snapshot.check_interval_seconds, 5);
    assert_eq!(snapshot.rules.len(), 1);

    // The starter configuration is written back, indented
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains('\n'));
    let parsed: PolicyConfiguration = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, *snapshot);
}

#[test]
fn test_unparseable_file_falls_back_to_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = PolicyStore::new(path);
    store.load();

    let snapshot = store.snapshot();
    assert!(!snapshot.enable_monitoring);
    assert!(snapshot.rules.is_empty());
}

#[test]
fn test_reload_skipped_when_mtime_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    write_policy(&path, &configuration_with_interval(5));

    let store = PolicyStore::new(path);
    store.load();
    let before = store.snapshot();

    assert!(!store.reload_if_changed());
    // No reload means the very same snapshot object is still live
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}

#[test]
fn test_reload_replaces_configuration_when_mtime_advances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    write_policy(&path, &configuration_with_interval(5));

    let store = PolicyStore::new(path.clone());
    store.load();
    assert_eq!(store.snapshot().check_interval_seconds, 5);

    // Coarse filesystems round mtime to whole seconds
    std::thread::sleep(std::time::Duration::from_millis(1100));
    write_policy(&path, &configuration_with_interval(30));

    assert!(store.reload_if_changed());
    assert_eq!(store.snapshot().check_interval_seconds, 30);
}

#[test]
fn test_reload_keeps_previous_configuration_on_parse_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    write_policy(&path, &configuration_with_interval(5));

    let store = PolicyStore::new(path.clone());
    store.load();

    std::thread::sleep(std::time::Duration::from_millis(1100));
    std::fs::write(&path, "{ broken").unwrap();

    assert!(!store.reload_if_changed());
    let snapshot = store.snapshot();
    assert_eq!(snapshot.check_interval_seconds, 5);
    assert_eq!(snapshot.rules.len(), 1);
}

#[test]
fn test_save_writes_indented_document_without_swapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");

    let store = PolicyStore::new(path.clone());
    let config = configuration_with_interval(15);
    store.save(&config).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains('\n'));
    let parsed: PolicyConfiguration = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, config);

    // save alone persists; only update/load replace the live snapshot
    assert_ne!(*store.snapshot(), config);
}

#[test]
fn test_save_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("policy.json");

    let store = PolicyStore::new(path.clone());
    store.save(&configuration_with_interval(5)).unwrap();

    assert!(path.exists());
}

#[test]
fn test_update_writes_through_and_swaps_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    write_policy(&path, &configuration_with_interval(5));

    let store = PolicyStore::new(path.clone());
    store.load();

    let updated = configuration_with_interval(60);
    store.update(updated.clone());

    assert_eq!(*store.snapshot(), updated);
    let on_disk: PolicyConfiguration =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, updated);

    // The store's own write must not look like an external change
    assert!(!store.reload_if_changed());
}
