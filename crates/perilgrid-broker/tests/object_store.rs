// perilgrid-broker/tests/object_store.rs
// ============================================================================
// Module: Object Store Tests
// Description: Key validation, URI translation, and backend behavior.
// ============================================================================
//! ## Overview
//! Conformance tests for the blob gateway: unsafe keys fail closed, URIs
//! round-trip, puts emit content checksums, and both backends honor the
//! same contract.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use perilgrid_broker::FsObjectStore;
use perilgrid_broker::MemoryObjectStore;
use perilgrid_broker::key_from_uri;
use perilgrid_broker::uri_for_key;
use perilgrid_broker::validate_key;
use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::ObjectStore;
use perilgrid_core::ObjectStoreError;
use perilgrid_core::hashing::hash_bytes;
use tempfile::TempDir;

// ============================================================================
// SECTION: Keys & URIs
// ============================================================================

/// Tests traversal and unsafe characters are rejected.
#[test]
fn test_key_validation_fails_closed() {
    assert!(validate_key("uploads/t1/up-1/file.csv").is_ok());
    assert!(validate_key("").is_err());
    assert!(validate_key("/leading").is_err());
    assert!(validate_key("trailing/").is_err());
    assert!(validate_key("a//b").is_err());
    assert!(validate_key("a/../b").is_err());
    assert!(validate_key("a/b c").is_err());
}

/// Tests URI translation round-trips and rejects foreign URIs.
#[test]
fn test_uri_roundtrip() {
    let uri = uri_for_key("perilgrid", "drift/t1/7/details.json");
    assert_eq!(uri, "blob://perilgrid/drift/t1/7/details.json");
    assert_eq!(key_from_uri("perilgrid", &uri).unwrap(), "drift/t1/7/details.json");
    assert!(matches!(
        key_from_uri("other-bucket", &uri),
        Err(ObjectStoreError::InvalidKey(_))
    ));
    assert!(key_from_uri("perilgrid", "s3://perilgrid/x").is_err());
}

// ============================================================================
// SECTION: Backends
// ============================================================================

/// Tests the memory backend round-trips bytes with a content checksum.
#[test]
fn test_memory_store_roundtrip() {
    let store = MemoryObjectStore::new("perilgrid");
    let stored = store.put("validations/t1/up-1/row_errors.json", b"[]", "application/json").unwrap();
    assert_eq!(stored.checksum, hash_bytes(DEFAULT_HASH_ALGORITHM, b"[]"));
    assert_eq!(store.get("validations/t1/up-1/row_errors.json").unwrap(), b"[]");
    assert_eq!(
        store.key_for_uri(&stored.uri).unwrap(),
        "validations/t1/up-1/row_errors.json"
    );
    assert!(matches!(
        store.get("missing/key"),
        Err(ObjectStoreError::NotFound(_))
    ));
}

/// Tests the filesystem backend persists bytes under the root.
#[test]
fn test_fs_store_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = FsObjectStore::new(temp.path().join("objects"), "perilgrid").unwrap();
    let payload = b"external_location_id,tiv\nL1,100\n";
    let stored = store.put("uploads/t1/up-1/exposure.csv", payload, "text/csv").unwrap();
    assert_eq!(store.get("uploads/t1/up-1/exposure.csv").unwrap(), payload);
    assert_eq!(stored.checksum, hash_bytes(DEFAULT_HASH_ALGORITHM, payload));
    // Overwrites replace content atomically.
    store.put("uploads/t1/up-1/exposure.csv", b"replaced", "text/csv").unwrap();
    assert_eq!(store.get("uploads/t1/up-1/exposure.csv").unwrap(), b"replaced");
}
