use super::*;
use crate::persistence::MemoryStore;
use serde_json::json;

#[test]
fn test_upsert_twice_keeps_one_and_last_wins() {
    let mut store = AssociationStore::new();

    let first_id = store
        .upsert("sensor-a", &SpaceRef::new("space-x", "Office"))
        .unwrap()
        .id
        .clone();
    store.set_active(&first_id, false).unwrap();

    let second = store
        .upsert("sensor-a", &SpaceRef::new("space-x", "Office (renamed)"))
        .unwrap()
        .clone();

    assert_eq!(store.len(), 1);
    assert_eq!(second.id, first_id);
    assert_eq!(second.space_name, "Office (renamed)");
    assert!(second.is_active);
}

#[test]
fn test_upsert_distinct_pairs() {
    let mut store = AssociationStore::new();
    store.upsert("sensor-a", &SpaceRef::new("space-x", "X")).unwrap();
    store.upsert("sensor-b", &SpaceRef::new("space-x", "X")).unwrap();
    store.upsert("sensor-a", &SpaceRef::new("space-y", "Y")).unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.by_space("space-x").len(), 2);
    assert_eq!(store.by_sensor("sensor-a").len(), 2);
    assert!(store.by_sensor("sensor-c").is_empty());
}

#[test]
fn test_upsert_without_guid_is_rejected() {
    let mut store = AssociationStore::new();
    let space = SpaceRef {
        guid: None,
        name: "Lobby".to_string(),
    };

    let err = store.upsert("sensor-a", &space).unwrap_err();
    assert_eq!(
        err,
        HeatmapError::InvalidAssociation("space 'Lobby' has no guid".to_string())
    );

    let blank = SpaceRef::new("  ", "Lobby");
    assert!(store.upsert("sensor-a", &blank).is_err());
    assert!(store.upsert("", &SpaceRef::new("g", "Lobby")).is_err());
    assert!(store.is_empty());
}

#[test]
fn test_remove_and_unknown_id() {
    let mut store = AssociationStore::new();
    let id = store
        .upsert("sensor-a", &SpaceRef::new("space-x", "X"))
        .unwrap()
        .id
        .clone();

    let removed = store.remove(&id).unwrap();
    assert_eq!(removed.sensor_id, "sensor-a");
    assert!(store.is_empty());

    assert_eq!(
        store.remove(&id).unwrap_err(),
        HeatmapError::UnknownAssociation(id)
    );
}

#[test]
fn test_is_linked_respects_activity() {
    let mut store = AssociationStore::new();
    let id = store
        .upsert("sensor-a", &SpaceRef::new("space-x", "X"))
        .unwrap()
        .id
        .clone();
    assert!(store.is_linked("sensor-a", "space-x"));

    store.set_active(&id, false).unwrap();
    assert!(!store.is_linked("sensor-a", "space-x"));
    assert!(!store.is_linked("sensor-b", "space-x"));
}

#[tokio::test]
async fn test_load_skips_corrupt_entries() {
    let document = json!([
        { "id": "a1", "sensor_id": "s1", "space_guid": "g1", "space_name": "One", "is_active": true },
        { "id": "a2", "sensor_id": "s2" },
        "garbage",
        { "id": "a3", "sensor_id": "", "space_guid": "g3" },
        { "id": "a4", "sensor_id": "s4", "space_guid": "g4" }
    ])
    .to_string();
    let persistence = MemoryStore::with_document(&document);

    let mut store = AssociationStore::new();
    let loaded = store.load(&persistence).await;

    assert_eq!(loaded, 2);
    assert!(store.get("a1").is_some());
    // is_active defaults to true when omitted
    assert!(store.get("a4").unwrap().is_active);
}

#[tokio::test]
async fn test_load_collapses_duplicate_pairs() {
    let document = json!([
        { "id": "old", "sensor_id": "s1", "space_guid": "g1", "space_name": "Old" },
        { "id": "new", "sensor_id": "s1", "space_guid": "g1", "space_name": "New" }
    ])
    .to_string();
    let persistence = MemoryStore::with_document(&document);

    let mut store = AssociationStore::new();
    assert_eq!(store.load(&persistence).await, 1);
    assert_eq!(store.all()[0].space_name, "New");
}

#[tokio::test]
async fn test_load_corrupt_document_is_empty() {
    let persistence = MemoryStore::with_document("{not json");
    let mut store = AssociationStore::new();
    store.upsert("s", &SpaceRef::new("g", "G")).unwrap();

    assert_eq!(store.load(&persistence).await, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_save_then_load() {
    let persistence = MemoryStore::new();
    let mut store = AssociationStore::new();
    store.upsert("s1", &SpaceRef::new("g1", "One")).unwrap();
    store.upsert("s2", &SpaceRef::new("g2", "Two")).unwrap();
    store.save(&persistence).await.unwrap();

    let mut reloaded = AssociationStore::new();
    assert_eq!(reloaded.load(&persistence).await, 2);
    assert_eq!(reloaded.all(), store.all());
}
