//! Contract tests for LocalStore.
//!
//! Every backend must pass the same behavioral contract, so each check is
//! written once against `&dyn LocalStore` and run for both the in-memory
//! store and the filesystem store.

use onboardkit_store::{FsStore, LocalStore, LocalStoreExt, MemoryStore, StorageError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Progress {
    screen: String,
    index: usize,
}

fn backends() -> Vec<(tempfile::TempDir, Box<dyn LocalStore>)> {
    let mem_dir = tempfile::tempdir().unwrap();
    let fs_dir = tempfile::tempdir().unwrap();
    let fs_store = FsStore::new(fs_dir.path()).unwrap();
    vec![
        (mem_dir, Box::new(MemoryStore::new())),
        (fs_dir, Box::new(fs_store)),
    ]
}

// ===========================================================================
// Raw byte contract
// ===========================================================================

#[test]
fn get_missing_returns_none() {
    for (_dir, store) in backends() {
        assert!(store.get("absent").unwrap().is_none());
        assert!(!store.contains("absent").unwrap());
    }
}

#[test]
fn set_then_get_returns_exact_bytes() {
    for (_dir, store) in backends() {
        store.set("blob", &[0u8, 1, 2, 255]).unwrap();
        assert_eq!(store.get("blob").unwrap().unwrap(), vec![0u8, 1, 2, 255]);
        assert!(store.contains("blob").unwrap());
    }
}

#[test]
fn delete_removes_value() {
    for (_dir, store) in backends() {
        store.set("gone", b"soon").unwrap();
        store.delete("gone").unwrap();
        assert!(store.get("gone").unwrap().is_none());
    }
}

#[test]
fn empty_key_rejected() {
    for (_dir, store) in backends() {
        let err = store.set("", b"x").unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}

#[test]
fn keys_with_separators_are_distinct() {
    for (_dir, store) in backends() {
        store.set("flow_state:welcome:u1", b"a").unwrap();
        store.set("flow_state:welcome:u2", b"b").unwrap();
        assert_eq!(store.get("flow_state:welcome:u1").unwrap().unwrap(), b"a");
        assert_eq!(store.get("flow_state:welcome:u2").unwrap().unwrap(), b"b");
    }
}

// ===========================================================================
// JSON helpers
// ===========================================================================

#[test]
fn json_record_survives_store() {
    for (_dir, store) in backends() {
        let progress = Progress {
            screen: "intro".to_string(),
            index: 2,
        };
        store.set_json("progress", &progress).unwrap();
        let loaded: Option<Progress> = store.get_json("progress").unwrap();
        assert_eq!(loaded, Some(progress));
    }
}

#[test]
fn json_decode_failure_names_key() {
    for (_dir, store) in backends() {
        store.set("progress", b"not json").unwrap();
        let err = store.get_json::<Progress>("progress").unwrap_err();
        match err {
            StorageError::Deserialization { key, .. } => assert_eq!(key, "progress"),
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }
}

// ===========================================================================
// Namespace isolation
// ===========================================================================

#[test]
fn fs_namespaces_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let a = FsStore::with_namespace(dir.path(), "app-a").unwrap();
    let b = FsStore::with_namespace(dir.path(), "app-b").unwrap();

    a.set("session_id", b"a-session").unwrap();
    assert!(b.get("session_id").unwrap().is_none());
}
