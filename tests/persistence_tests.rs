//! Persistence and corruption tests for the file-backed lot store

use chrono::NaiveDate;
use seedtrace::{
    GenealogyEngine, GenerationLevel, LotStatus, LotStore, MemoryLotStore, NewLot,
    RelationOptions, SeedError, StoreConfig,
};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn lot(level: GenerationLevel, qty: f64) -> NewLot {
    NewLot::new(level, "Sahel 108", qty).produced_on(NaiveDate::from_ymd_opt(2023, 11, 20).unwrap())
}

#[test]
fn test_save_and_reopen_preserves_genealogy() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");

    let (root_id, child_id) = {
        let store = Arc::new(MemoryLotStore::open(&path).unwrap());
        let root = store
            .create_lot(lot(GenerationLevel::GO, 100.0).multiplier("ISRA Bambey"))
            .unwrap();
        let child = store
            .create_lot(lot(GenerationLevel::G1, 30.0).status(LotStatus::Certified))
            .unwrap();

        let engine = GenealogyEngine::new(Arc::clone(&store));
        engine
            .create_relation(&root.id, &child.id, RelationOptions::new().quantity(30.0).notes("bag 4"))
            .unwrap();
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());
        (root.id, child.id)
    };

    let store = Arc::new(MemoryLotStore::open(&path).unwrap());
    assert_eq!(store.len(), 2);
    assert!(!store.is_dirty());

    let root = store.find_lot(&root_id).unwrap().unwrap();
    assert_eq!(root.quantity, 70.0);
    assert_eq!(root.multiplier.as_deref(), Some("ISRA Bambey"));

    let child = store.find_lot(&child_id).unwrap().unwrap();
    assert_eq!(child.parent_lot_id.as_deref(), Some(root_id.as_str()));
    assert_eq!(child.status, LotStatus::Certified);
    assert_eq!(child.notes.as_deref(), Some("bag 4"));

    // the children index is rebuilt on load
    let engine = GenealogyEngine::new(store);
    let tree = engine.get_tree(&root_id).unwrap().unwrap();
    assert_eq!(tree.children[0].id, child_id);
}

#[test]
fn test_save_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");

    let store = MemoryLotStore::open(&path).unwrap();
    store.create_lot(lot(GenerationLevel::GO, 1.0)).unwrap();
    store.save().unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_sequence_continues_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");

    {
        let store = MemoryLotStore::open(&path).unwrap();
        store.create_lot(lot(GenerationLevel::G2, 1.0)).unwrap();
        store.create_lot(lot(GenerationLevel::G2, 1.0)).unwrap();
        store.save().unwrap();
    }

    let store = MemoryLotStore::open(&path).unwrap();
    let next = store.create_lot(lot(GenerationLevel::G2, 1.0)).unwrap();
    assert_eq!(next.id, "SL-G2-2023-003");
}

#[test]
fn test_missing_store_with_must_exist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let result = MemoryLotStore::open_with_config(StoreConfig::new(&path).must_exist());
    match result {
        Err(SeedError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("store should not be created"),
    }
    assert!(!path.exists());
}

#[test]
fn test_read_only_store_rejects_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");
    {
        let store = MemoryLotStore::open(&path).unwrap();
        store.create_lot(lot(GenerationLevel::GO, 10.0)).unwrap();
        store.save().unwrap();
    }

    let store =
        MemoryLotStore::open_with_config(StoreConfig::new(&path).read_only()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(matches!(
        store.create_lot(lot(GenerationLevel::GO, 1.0)),
        Err(SeedError::ReadOnly(_))
    ));
    assert!(matches!(store.save(), Err(SeedError::ReadOnly(_))));
}

#[test]
fn test_garbage_file_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");
    fs::write(&path, b"CORRUPTED{{").unwrap();

    assert!(matches!(
        MemoryLotStore::open(&path),
        Err(SeedError::Corruption(_))
    ));
}

#[test]
fn test_truncated_file_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");
    {
        let store = MemoryLotStore::open(&path).unwrap();
        store.create_lot(lot(GenerationLevel::GO, 10.0)).unwrap();
        store.save().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        MemoryLotStore::open(&path),
        Err(SeedError::Corruption(_))
    ));
}

#[test]
fn test_newer_format_version_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");
    fs::write(&path, r#"{"version": 99, "lots": []}"#).unwrap();

    let err = MemoryLotStore::open(&path).err().unwrap();
    assert!(err.to_string().contains("99"));
}

#[test]
fn test_duplicate_ids_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lots.json");
    let record = r#"{"id": "SL-GO-2024-001", "level": "GO", "variety": "Sahel 108",
                    "quantity": 1.0, "production_date": "2024-01-01"}"#;
    fs::write(&path, format!(r#"{{"version": 1, "lots": [{record}, {record}]}}"#)).unwrap();

    assert!(matches!(
        MemoryLotStore::open(&path),
        Err(SeedError::Corruption(_))
    ));
}
