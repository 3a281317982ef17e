use std::path::Path;
use std::sync::mpsc::{self, Receiver};

use tempfile::TempDir;

use lingo_core::document::{self, ConfigDocument};
use lingo_core::prefs::{MemoryPreferences, Preferences};
use lingo_core::service;
use lingo_core::storage::FileChangeEvent;
use lingo_core::store::{templates, ConfigStore, DEFAULT_CONFIG_NAME};

fn start_store(dir: &Path) -> (ConfigStore, Receiver<FileChangeEvent>) {
    start_store_with(dir, |_| {})
}

fn start_store_with(
    dir: &Path,
    setup: impl FnOnce(&mut MemoryPreferences),
) -> (ConfigStore, Receiver<FileChangeEvent>) {
    let mut prefs = MemoryPreferences::new();
    prefs.set_custom_storage_dir(Some(dir)).unwrap();
    setup(&mut prefs);
    let (sender, receiver) = mpsc::channel();
    let store = ConfigStore::start(Box::new(prefs), sender).unwrap();
    (store, receiver)
}

#[test]
fn first_launch_seeds_the_bundled_default() {
    let temp = TempDir::new().unwrap();
    let (store, _events) = start_store(temp.path());

    assert_eq!(store.current_name(), DEFAULT_CONFIG_NAME);
    assert!(temp.path().join("Default.json").is_file());
    assert_eq!(store.actions().len(), 5);
    assert!(store.actions().iter().any(|a| a.name == "Translate"));
    assert!(store.providers().iter().any(|p| p.name == "Lingo Cloud"));
    assert!(store.validation().is_clean());
}

#[test]
fn renamed_action_keeps_its_identifier_across_reload() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());

    let mut actions = store.actions().to_vec();
    let original_id = actions[0].id;
    actions[0].name = format!("{} 2", actions[0].name);
    let result = store.update_actions(actions);
    assert!(!result.has_errors());

    // A second engine instance over the same directory sees the rename
    // with the identifier intact.
    let (reloaded, _events) = start_store(temp.path());
    let renamed = reloaded
        .actions()
        .iter()
        .find(|a| a.name == "Translate 2")
        .expect("renamed action present after reload");
    assert_eq!(renamed.id, original_id);
}

#[test]
fn incompatible_version_promotes_the_bundled_default() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("Old.json"),
        br#"{ "version": "0.9.0", "actions": [], "providers": {} }"#,
    )
    .unwrap();

    let (store, _events) = start_store_with(temp.path(), |prefs| {
        prefs.set_active_configuration("Old").unwrap();
    });

    // The default name slot now holds the bundled default and became
    // the active configuration; the incompatible file is left in place.
    assert_eq!(store.current_name(), DEFAULT_CONFIG_NAME);
    assert!(!store.actions().is_empty());
    let promoted = std::fs::read_to_string(temp.path().join("Default.json")).unwrap();
    assert!(promoted.contains(document::CURRENT_VERSION));
    assert!(temp.path().join("Old.json").is_file());
}

#[test]
fn store_never_persists_a_self_invalid_state() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());

    let mut actions = store.actions().to_vec();
    actions.push(lingo_core::model::Action::new("Shorten", "Shorten {text}"));
    store.update_actions(actions);

    let bytes = store.export_current().unwrap();
    let import = service::import(&bytes).expect("own export must import cleanly");
    assert!(import.warnings.is_empty());
}

#[test]
fn importing_a_ghost_reference_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());
    let before: Vec<_> = store.actions().to_vec();

    let ghost = br#"{
        "version": "2.0.0",
        "actions": [ { "name": "Haunt", "prompt": "p", "providers": ["Ghost"] } ],
        "providers": {}
    }"#;
    let error = store.import_document(ghost, "Haunted").unwrap_err();
    assert!(error.to_string().contains("blocking"));

    assert_eq!(store.actions(), &before[..]);
    assert_eq!(store.current_name(), DEFAULT_CONFIG_NAME);
    assert!(!store.files().exists("Haunted"));
}

#[test]
fn import_persists_and_switches() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());

    let bytes = br#"{
        "version": "3.0.0",
        "actions": [ { "name": "Shorten", "prompt": "Shorten {text}" } ],
        "providers": {}
    }"#;
    let result = store.import_document(bytes, "Work").unwrap();
    assert!(!result.has_errors());
    assert_eq!(store.current_name(), "Work");
    assert!(store.files().exists("Work"));
    assert_eq!(store.actions().len(), 1);
}

#[test]
fn switching_between_configurations_records_the_name() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());
    store
        .files()
        .save(&ConfigDocument::empty(), "Secondary")
        .unwrap();

    store.switch_configuration("Secondary").unwrap();
    assert_eq!(store.current_name(), "Secondary");
    assert!(store.actions().is_empty());

    store.switch_configuration(DEFAULT_CONFIG_NAME).unwrap();
    assert_eq!(store.actions().len(), 5);
}

#[test]
fn language_change_retemplates_only_unedited_prompts() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());

    // Customize one managed prompt; leave the others untouched.
    let mut actions = store.actions().to_vec();
    let summarize = actions
        .iter_mut()
        .find(|a| a.name == "Summarize")
        .expect("bundled default has Summarize");
    summarize.prompt = "Give me the gist of {text} in one tweet".to_string();
    store.update_actions(actions);

    store.set_target_language("Japanese").unwrap();

    let translate_template = templates::managed_template("Translate").unwrap();
    let translate = store.actions().iter().find(|a| a.name == "Translate").unwrap();
    assert_eq!(translate.prompt, translate_template.prompt_for("Japanese"));

    let summarize = store.actions().iter().find(|a| a.name == "Summarize").unwrap();
    assert!(summarize.prompt.contains("one tweet"));

    // The regenerated prompts were persisted.
    let on_disk = store.files().load(DEFAULT_CONFIG_NAME).unwrap();
    let persisted = service::apply(&on_disk);
    let translate_on_disk = persisted
        .actions
        .iter()
        .find(|a| a.name == "Translate")
        .unwrap();
    assert_eq!(translate_on_disk.prompt, translate_template.prompt_for("Japanese"));
}

#[test]
fn storage_location_change_migrates_documents() {
    let temp = TempDir::new().unwrap();
    let (mut store, _events) = start_store(temp.path());
    store
        .files()
        .save(&ConfigDocument::empty(), "Spare")
        .unwrap();

    let new_home = TempDir::new().unwrap();
    store
        .change_storage_location(Some(new_home.path()), true)
        .unwrap();

    assert!(new_home.path().join("Default.json").is_file());
    assert!(new_home.path().join("Spare.json").is_file());
    assert_eq!(store.files().dir(), new_home.path());
    // Old copies stay behind untouched.
    assert!(temp.path().join("Default.json").is_file());
}
