// perilgrid-core/tests/drift.rs
// ============================================================================
// Module: Drift Engine Tests
// Description: Exposure version diff classification and ordering.
// ============================================================================
//! ## Overview
//! Validates NEW/REMOVED/MODIFIED classification, numeric deltas on the
//! monetary compare fields, the detail ordering contract, and artifact
//! determinism.

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

use perilgrid_core::DriftClassification;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::Location;
use perilgrid_core::LocationId;
use perilgrid_core::StructuralAttributes;
use perilgrid_core::TenantId;
use perilgrid_core::Timestamp;
use perilgrid_core::stages::drift::compare_exposures;
use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn location(version: i64, external_id: &str, tiv: f64) -> Location {
    Location {
        id: LocationId::new(0),
        tenant_id: TenantId::new("t1"),
        exposure_version_id: ExposureVersionId::new(version),
        external_location_id: external_id.to_string(),
        address_line1: Some("1 Main St".to_string()),
        city: Some("Springfield".to_string()),
        state_region: Some("PA".to_string()),
        postal_code: Some("19064".to_string()),
        country: Some("US".to_string()),
        latitude: Some(40.0),
        longitude: Some(-75.0),
        geocode_method: None,
        geocode_confidence: None,
        quality_tier: None,
        quality_reasons: Vec::new(),
        currency: Some("USD".to_string()),
        lob: Some("property".to_string()),
        product_code: None,
        tiv: Some(tiv),
        limit: None,
        premium: None,
        structural: StructuralAttributes::default(),
        updated_at: None,
        created_at: Timestamp::from_unix_millis(0),
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Tests NEW, REMOVED, and MODIFIED classification with numeric deltas.
#[test]
fn test_classification_and_delta() {
    let version_a = vec![location(1, "L1", 100.0), location(1, "L2", 200.0)];
    let version_b = vec![location(2, "L2", 250.0), location(2, "L3", 50.0)];
    let outcome = compare_exposures(&version_a, &version_b).unwrap();

    assert_eq!(outcome.summary.new, 1);
    assert_eq!(outcome.summary.removed, 1);
    assert_eq!(outcome.summary.modified, 1);
    assert_eq!(outcome.summary.total, 3);

    let modified = outcome
        .details
        .iter()
        .find(|detail| detail.classification == DriftClassification::Modified)
        .unwrap();
    assert_eq!(modified.external_location_id, "L2");
    let delta = modified
        .delta_json
        .get("changes")
        .and_then(|changes| changes.get("tiv"))
        .and_then(|change| change.get("delta"))
        .and_then(Value::as_f64)
        .unwrap();
    assert!((delta - 50.0).abs() < f64::EPSILON);
}

/// Tests unchanged locations produce no detail rows.
#[test]
fn test_identical_versions_have_no_drift() {
    let version_a = vec![location(1, "L1", 100.0)];
    let version_b = vec![location(2, "L1", 100.0)];
    let outcome = compare_exposures(&version_a, &version_b).unwrap();
    assert_eq!(outcome.summary.total, 0);
    assert!(outcome.details.is_empty());
}

/// Tests details sort NEW before REMOVED before MODIFIED, then by key.
#[test]
fn test_detail_ordering_contract() {
    let version_a = vec![
        location(1, "L1", 100.0),
        location(1, "L5", 10.0),
        location(1, "L3", 30.0),
    ];
    let version_b = vec![
        location(2, "L3", 99.0),
        location(2, "L2", 20.0),
        location(2, "L0", 1.0),
    ];
    let outcome = compare_exposures(&version_a, &version_b).unwrap();
    let order: Vec<(u8, &str)> = outcome
        .details
        .iter()
        .map(|detail| (detail.classification.order(), detail.external_location_id.as_str()))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    assert_eq!(order[0].0, DriftClassification::New.order());
}

/// Tests identical inputs produce byte-identical artifacts.
#[test]
fn test_artifact_determinism() {
    let version_a = vec![location(1, "L1", 100.0), location(1, "L2", 200.0)];
    let version_b = vec![location(2, "L2", 250.0)];
    let first = compare_exposures(&version_a, &version_b).unwrap();
    let second = compare_exposures(&version_a, &version_b).unwrap();
    assert_eq!(first.artifact, second.artifact);
    assert_eq!(first.checksum, second.checksum);
}
