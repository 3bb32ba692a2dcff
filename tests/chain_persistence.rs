// Chain state survives a restart through the file-backed store

use serde_json::json;
use std::rc::Rc;
use synthchain::assets::MemoryAssetLoader;
use synthchain::midi::MidiListener;
use synthchain::project::serialization::{CHAIN_KEY, SCHEMA_VERSION, VERSION_KEY};
use synthchain::project::{FileStore, KeyValueStore, MemoryStore, WrapperSettings};
use synthchain::Session;
use tempfile::TempDir;

fn open(store: Rc<dyn KeyValueStore>) -> Session {
    Session::new(
        store,
        Rc::new(MemoryAssetLoader::new()),
        MidiListener::disabled(),
    )
    .unwrap()
}

fn approx(value: &serde_json::Value, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-6)
}

#[test]
fn test_edits_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    {
        let mut session = open(Rc::new(FileStore::open(&path).unwrap()));
        session.chain_mut().edit(0, &json!({ "volume": 0.7 })).unwrap();
        session.chain_mut().edit(1, &json!({ "gain": 6.0 })).unwrap();
        session
            .chain()
            .update_wrapper(
                3,
                WrapperSettings {
                    open: Some(true),
                    ..WrapperSettings::at(120, 40)
                },
            )
            .unwrap();
        assert_eq!(session.chain().save_count(), 3);
    }

    let session = open(Rc::new(FileStore::open(&path).unwrap()));
    let document = session.chain().document();

    assert!(approx(&document.get(0).unwrap().settings["volume"], 0.7));
    assert!(approx(&document.get(1).unwrap().settings["gain"], 6.0));
    assert_eq!(
        serde_json::to_value(&document.get(3).unwrap().wrapper_settings).unwrap(),
        json!({ "open": true, "pos": [120, 40] })
    );
    // Loading alone does not write
    assert_eq!(session.chain().save_count(), 0);

    let engine = session.chain().instrument().unwrap();
    assert!((engine.borrow().settings().volume - 0.7).abs() < 1e-6);
}

#[test]
fn test_version_mismatch_resets_to_default() {
    let store = MemoryStore::new();
    store.set(VERSION_KEY, "0").unwrap();
    store
        .set(
            CHAIN_KEY,
            &json!({"nodes": [{"id": 7, "pos": 0, "name": "EQ", "settings": {}}]}).to_string(),
        )
        .unwrap();
    store.set("unrelated", "value").unwrap();

    let session = open(Rc::new(store.clone()));

    assert_eq!(session.chain().node_ids(), vec![0, 1, 2, 3]);
    assert_eq!(store.get(VERSION_KEY).unwrap().as_deref(), Some(SCHEMA_VERSION));
    assert_eq!(store.get(CHAIN_KEY).unwrap(), None);
    assert_eq!(store.get("unrelated").unwrap(), None);
}

#[test]
fn test_malformed_document_falls_back_until_first_edit() {
    let store = MemoryStore::new();
    store.set(VERSION_KEY, SCHEMA_VERSION).unwrap();
    store.set(CHAIN_KEY, "{\"nodes\": [").unwrap();

    let mut session = open(Rc::new(store.clone()));
    assert_eq!(session.chain().node_ids(), vec![0, 1, 2, 3]);
    assert_eq!(store.get(CHAIN_KEY).unwrap().as_deref(), Some("{\"nodes\": ["));

    session.chain_mut().edit(2, &json!({ "ratio": 4.0 })).unwrap();
    let stored: serde_json::Value =
        serde_json::from_str(&store.get(CHAIN_KEY).unwrap().unwrap()).unwrap();
    let nodes = stored["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 4);
    let compressor = nodes.iter().find(|n| n["id"] == 2).unwrap();
    assert!(approx(&compressor["settings"]["ratio"], 4.0));
}

#[test]
fn test_unknown_node_kept_in_document_but_not_built() {
    let store = MemoryStore::new();
    store.set(VERSION_KEY, SCHEMA_VERSION).unwrap();
    store
        .set(
            CHAIN_KEY,
            &json!({"nodes": [
                {"id": 4, "pos": 1, "name": "Flanger", "settings": {"rate": 2}},
                {"id": 1, "pos": 0, "name": "ES1", "settings": {"mode": "mono"}}
            ]})
            .to_string(),
        )
        .unwrap();

    let mut session = open(Rc::new(store.clone()));
    assert_eq!(session.chain().node_ids(), vec![1]);

    session.chain_mut().edit(1, &json!({ "attack": 0.5 })).unwrap();
    let stored: serde_json::Value =
        serde_json::from_str(&store.get(CHAIN_KEY).unwrap().unwrap()).unwrap();
    let flanger = stored["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "Flanger")
        .unwrap();
    assert_eq!(flanger["settings"]["rate"], 2);
}
