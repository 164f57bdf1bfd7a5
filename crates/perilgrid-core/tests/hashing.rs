// perilgrid-core/tests/hashing.rs
// ============================================================================
// Module: Hashing Tests
// Description: Tests for canonical JSON hashing.
// ============================================================================
//! ## Overview
//! Validates deterministic hashing over canonical JSON.

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

use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::hashing::canonical_json_string;
use perilgrid_core::hashing::hash_bytes;
use perilgrid_core::hashing::hash_canonical_json;
use serde_json::json;

// ============================================================================
// SECTION: Canonical Hashing
// ============================================================================

/// Tests canonical json hash ignores object key order.
#[test]
fn test_canonical_json_hash_is_stable() {
    let value_a = json!({"b": 1, "a": 2});
    let value_b = json!({"a": 2, "b": 1});

    let hash_a = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &value_a).unwrap();
    let hash_b = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &value_b).unwrap();

    assert_eq!(hash_a, hash_b);
}

/// Tests canonical serialization sorts keys and drops whitespace.
#[test]
fn test_canonical_json_string_sorts_keys() {
    let value = json!({"zebra": 1, "alpha": {"nested_b": 2, "nested_a": 3}});
    let canonical = canonical_json_string(&value).unwrap();
    assert_eq!(canonical, r#"{"alpha":{"nested_a":3,"nested_b":2},"zebra":1}"#);
}

/// Tests array order is preserved by canonicalization.
#[test]
fn test_canonical_json_preserves_array_order() {
    let value_a = json!([3, 1, 2]);
    let value_b = json!([1, 2, 3]);
    let hash_a = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &value_a).unwrap();
    let hash_b = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &value_b).unwrap();
    assert_ne!(hash_a, hash_b);
}

/// Tests digest output is 64 lowercase hex characters.
#[test]
fn test_digest_is_lowercase_hex() {
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, b"perilgrid");
    assert_eq!(digest.value.len(), 64);
    assert!(digest.value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
