use crate::storage::ScriptStore;

use marionette_core::{
    Command, CommandKind, HotkeyDefinition, KeyCode, Modifiers, Script, TriggerMode,
};

use std::{fs, path::PathBuf, time::Duration};

use uuid::Uuid;

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("marionette-test-{}", Uuid::new_v4()))
}

fn sample_script(name: &str) -> Script {
    let mut script = Script::new(name).unwrap();
    script.push(Command::new(
        CommandKind::MoveAbsolute { x: 10, y: 20 },
        Duration::from_millis(5),
    ));
    script.push(Command::new(
        CommandKind::TypeText {
            input: marionette_core::TextInput::Text("hello".to_string()),
        },
        Duration::from_millis(15),
    ));
    script
}

/// WHAT: A saved script loads back with the same identity and content
/// WHY: The store is the durable home of every recording
#[test]
fn given_saved_script_when_loaded_then_content_preserved() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    // Given: A saved script
    let script = sample_script("morning routine");
    store.save(&script).unwrap();

    // When: Loading it by id
    let loaded = store.load(script.id).unwrap();

    // Then: Identity, name, and commands match
    assert_eq!(loaded.id, script.id);
    assert_eq!(loaded.name(), "morning routine");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.commands()[0].kind, script.commands()[0].kind);
    assert_eq!(loaded.commands()[1].delay, Duration::from_millis(15));

    let _ = fs::remove_dir_all(dir);
}

/// WHAT: Loading an id that was never saved fails
/// WHY: A missing script must surface as an error, not a default
#[test]
fn given_empty_store_when_loading_unknown_id_then_error() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    assert!(store.load(Uuid::new_v4()).is_err());

    let _ = fs::remove_dir_all(dir);
}

/// WHAT: Listing returns every saved script sorted by name
/// WHY: The hotkey registration pass walks this list at startup
#[test]
fn given_multiple_scripts_when_listing_then_sorted_by_name() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    store.save(&sample_script("zeta")).unwrap();
    store.save(&sample_script("alpha")).unwrap();
    store.save(&sample_script("midway")).unwrap();

    let scripts = store.list().unwrap();

    let names: Vec<&str> = scripts.iter().map(Script::name).collect();
    assert_eq!(names, vec!["alpha", "midway", "zeta"]);

    let _ = fs::remove_dir_all(dir);
}

/// WHAT: A corrupt file in the scripts directory is skipped by list
/// WHY: One bad file must not hide the rest of the library
#[test]
fn given_corrupt_file_when_listing_then_it_is_skipped() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    store.save(&sample_script("survivor")).unwrap();
    fs::write(dir.join("garbage.json"), "{ not json").unwrap();

    let scripts = store.list().unwrap();

    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].name(), "survivor");

    let _ = fs::remove_dir_all(dir);
}

/// WHAT: Export writes a standalone file that parses as a script
/// WHY: Exports are how scripts move between machines
#[test]
fn given_saved_script_when_exported_then_file_parses() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    let script = sample_script("exported");
    store.save(&script).unwrap();

    let target = dir.join("out").join("exported.json");
    fs::create_dir_all(dir.join("out")).unwrap();
    store.export(script.id, &target).unwrap();

    let contents = fs::read_to_string(&target).unwrap();
    let parsed: Script = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed.id, script.id);
    assert_eq!(parsed.len(), 2);

    let _ = fs::remove_dir_all(dir);
}

/// WHAT: Import mints a fresh identity while preserving the content
/// WHY: Importing the same file twice must never collide with itself
#[test]
fn given_exported_script_when_imported_then_fresh_identity_same_content() {
    let dir = temp_dir();
    let store = ScriptStore::new(dir.clone()).unwrap();

    // Given: An exported script with a trigger hotkey
    let mut script = sample_script("shared macro");
    script.set_hotkey(Some(HotkeyDefinition {
        modifiers: Modifiers::CONTROL | Modifiers::ALT,
        key: KeyCode(0x4D),
        mode: TriggerMode::FireOncePerPress,
        swallow: true,
    }));
    store.save(&script).unwrap();

    let exported = dir.join("shared.json");
    store.export(script.id, &exported).unwrap();

    // When: Importing it back
    let imported = store.import(&exported).unwrap();

    // Then: New script and command ids, identical content
    assert_ne!(imported.id, script.id);
    assert_eq!(imported.name(), "shared macro");
    assert_eq!(imported.len(), script.len());
    assert_eq!(imported.hotkey, script.hotkey);
    for (new, old) in imported.commands().iter().zip(script.commands()) {
        assert_ne!(new.id, old.id);
        assert_eq!(new.kind, old.kind);
        assert_eq!(new.delay, old.delay);
    }

    // And: The import landed in the store under its new id
    assert!(store.load(imported.id).is_ok());

    let _ = fs::remove_dir_all(dir);
}
