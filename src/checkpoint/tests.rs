//! Checkpoint store tests

use std::sync::Arc;

use super::*;
use crate::model::AttentionModel;
use crate::Error;
use tempfile::TempDir;

fn model(epochs: usize) -> AttentionModel {
    let mut model = AttentionModel::transformer("ckpt", 1, 16, 2);
    model.trained_epochs = epochs;
    model
}

fn memory_store() -> CheckpointStore {
    CheckpointStore::new(Arc::new(MemoryBackend::new()))
}

#[test]
fn test_save_then_load_best() {
    let store = memory_store();
    let handle = store.save(3, &model(5), Some(0.42), 5).unwrap();
    assert_eq!(handle.stage_index, 3);
    assert_eq!(handle.metric, Some(0.42));
    assert_eq!(handle.epoch, 5);
    assert!(handle.key.starts_with("stage-3/ckpt-"));

    let loaded: AttentionModel = store.load_best(3).unwrap();
    assert_eq!(loaded, model(5));
    assert_eq!(store.best_handle(3).unwrap(), Some(handle));
}

#[test]
fn test_later_save_replaces_best() {
    let store = memory_store();
    store.save(1, &model(1), Some(0.9), 1).unwrap();
    let second = store.save(1, &model(2), Some(0.5), 2).unwrap();

    let (handle, loaded) = store.load_best_with_handle::<AttentionModel>(1).unwrap();
    assert_eq!(handle, second);
    assert_eq!(loaded.trained_epochs, 2);
    assert_eq!(store.payloads(1).unwrap().len(), 2);
}

#[test]
fn test_prune_superseded_payloads() {
    let store = memory_store().with_retain_all(false);
    assert!(!store.retain_all());
    store.save(1, &model(1), Some(0.9), 1).unwrap();
    let second = store.save(1, &model(2), Some(0.5), 2).unwrap();
    assert_eq!(store.payloads(1).unwrap(), vec![second.key]);
}

#[test]
fn test_missing_stage_is_checkpoint_error() {
    let store = memory_store();
    let err = store.load_best::<AttentionModel>(7).unwrap_err();
    assert!(matches!(err, Error::Checkpoint(_)));
    assert_eq!(store.best_handle(7).unwrap(), None);
}

#[test]
fn test_latest_best_follows_most_recent_stage() {
    let store = memory_store();
    store.save(1, &model(1), Some(0.9), 1).unwrap();
    store.save(2, &model(4), None, 4).unwrap();

    let (handle, loaded) = store.load_latest_best::<AttentionModel>().unwrap();
    assert_eq!(handle.stage_index, 2);
    assert_eq!(handle.metric, None);
    assert_eq!(loaded.trained_epochs, 4);
    assert_eq!(store.stages().unwrap(), vec![1, 2]);
}

#[test]
fn test_latest_best_on_empty_store() {
    let err = memory_store()
        .load_latest_best::<AttentionModel>()
        .unwrap_err();
    assert!(matches!(err, Error::Checkpoint(_)));
}

#[test]
fn test_corrupted_payload_is_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let store = CheckpointStore::new(backend.clone());
    let handle = store.save(0, &model(1), Some(1.0), 1).unwrap();

    let mut bytes = backend.read(&handle.key).unwrap().unwrap();
    bytes[0] ^= 0xff;
    backend.write(&handle.key, &bytes).unwrap();

    let err = store.load_best::<AttentionModel>(0).unwrap_err();
    assert!(matches!(err, Error::Checkpoint(ref msg) if msg.contains("digest mismatch")));
}

#[test]
fn test_load_by_handle() {
    let store = memory_store();
    let first = store.save(0, &model(1), Some(1.0), 1).unwrap();
    store.save(0, &model(2), Some(0.5), 2).unwrap();
    let loaded: AttentionModel = store.load(&first).unwrap();
    assert_eq!(loaded.trained_epochs, 1);
}

#[test]
fn test_fs_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let handle = {
        let store = CheckpointStore::new(Arc::new(FsBackend::new(tmp.path()).unwrap()));
        store.save(5, &model(9), Some(0.1), 9).unwrap()
    };

    let reopened = CheckpointStore::new(Arc::new(FsBackend::new(tmp.path()).unwrap()));
    assert_eq!(reopened.best_handle(5).unwrap(), Some(handle));
    let loaded: AttentionModel = reopened.load_best(5).unwrap();
    assert_eq!(loaded.trained_epochs, 9);
    assert!(tmp.path().join("stage-5").join("best.json").exists());
    assert!(tmp.path().join("latest.json").exists());
}

#[test]
fn test_concurrent_readers_see_complete_checkpoints() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(
        CheckpointStore::new(Arc::new(FsBackend::new(tmp.path()).unwrap())).with_retain_all(false),
    );
    store.save(0, &model(0), Some(100.0), 0).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for epoch in 1..=30 {
                store
                    .save(0, &model(epoch), Some(100.0 - epoch as f64), epoch)
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let (handle, loaded) = store.load_best_with_handle::<AttentionModel>(0).unwrap();
                    assert_eq!(loaded.trained_epochs, handle.epoch);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let final_model: AttentionModel = store.load_best(0).unwrap();
    assert_eq!(final_model.trained_epochs, 30);
    assert_eq!(store.payloads(0).unwrap().len(), 1);
}

#[test]
fn test_corrupted_pointer() {
    let backend = Arc::new(MemoryBackend::new());
    backend.write("stage-0/best.json", b"not json").unwrap();
    let store = CheckpointStore::new(backend);
    assert!(matches!(store.best_handle(0), Err(Error::Checkpoint(_))));
}
