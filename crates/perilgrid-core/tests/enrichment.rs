// perilgrid-core/tests/enrichment.rs
// ============================================================================
// Module: Enrichment Mapping Tests
// Description: Address normalization, structural mapping, and decisions.
// ============================================================================
//! ## Overview
//! Validates address normalization and fingerprinting, the structural
//! mapping preference order, the sync-vs-async mode decision, and the
//! wait/best-effort decision table.

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

use std::collections::BTreeMap;

use perilgrid_core::AddressInput;
use perilgrid_core::CharacteristicsResult;
use perilgrid_core::GeocodeResult;
use perilgrid_core::NormalizedAddress;
use perilgrid_core::ParcelResult;
use perilgrid_core::RunStatus;
use perilgrid_core::Timestamp;
use perilgrid_core::stages::enrichment::EnrichMode;
use perilgrid_core::stages::enrichment::EnrichmentAction;
use perilgrid_core::stages::enrichment::EnrichmentStatus;
use perilgrid_core::stages::enrichment::address_fingerprint;
use perilgrid_core::stages::enrichment::decide_enrichment_action;
use perilgrid_core::stages::enrichment::determine_enrich_mode;
use perilgrid_core::stages::enrichment::map_to_structural;
use perilgrid_core::stages::enrichment::normalize_address;
use serde_json::json;

// ============================================================================
// SECTION: Address Normalization
// ============================================================================

/// Tests trimming, uppercasing, and postal whitespace stripping.
#[test]
fn test_normalize_address_rules() {
    let normalized = normalize_address(&AddressInput {
        address_line1: Some("  1 Main St ".to_string()),
        city: Some(" Springfield".to_string()),
        state_region: Some("pa".to_string()),
        postal_code: Some(" 19 064 ".to_string()),
        country: Some("us".to_string()),
    });
    assert_eq!(normalized.address_line1.as_deref(), Some("1 Main St"));
    assert_eq!(normalized.city.as_deref(), Some("Springfield"));
    assert_eq!(normalized.state_region.as_deref(), Some("PA"));
    assert_eq!(normalized.postal_code.as_deref(), Some("19064"));
    assert_eq!(normalized.country.as_deref(), Some("US"));
}

/// Tests equivalent raw addresses fingerprint identically.
#[test]
fn test_address_fingerprint_is_normalization_invariant() {
    let first = normalize_address(&AddressInput {
        address_line1: Some("1 Main St".to_string()),
        city: Some("Springfield".to_string()),
        state_region: Some("pa".to_string()),
        postal_code: Some("19 064".to_string()),
        country: Some("us".to_string()),
    });
    let second = normalize_address(&AddressInput {
        address_line1: Some(" 1 Main St ".to_string()),
        city: Some("Springfield".to_string()),
        state_region: Some("PA".to_string()),
        postal_code: Some("19064".to_string()),
        country: Some("US".to_string()),
    });
    assert_eq!(
        address_fingerprint(&first).unwrap(),
        address_fingerprint(&second).unwrap()
    );
}

/// Tests blank fields are absent rather than empty.
#[test]
fn test_blank_fields_absent_from_normalized_address() {
    let normalized = normalize_address(&AddressInput {
        address_line1: Some("  ".to_string()),
        ..AddressInput::default()
    });
    assert_eq!(normalized, NormalizedAddress::default());
}

// ============================================================================
// SECTION: Structural Mapping
// ============================================================================

fn geocode(elevation: Option<f64>) -> GeocodeResult {
    GeocodeResult {
        provider: "stub".to_string(),
        latitude: 40.0,
        longitude: -75.0,
        confidence: 0.6,
        method: "STUB_HASH".to_string(),
        elevation_m: elevation,
        standardized_address: NormalizedAddress::default(),
        raw: json!({}),
    }
}

fn parcel(elevation: Option<f64>, vegetation: Option<f64>) -> ParcelResult {
    ParcelResult {
        provider: "stub".to_string(),
        parcel_id: "PARCEL-1".to_string(),
        confidence: 0.7,
        elevation_m: elevation,
        vegetation_proximity_m: vegetation,
        boundary: json!({}),
        raw: json!({}),
    }
}

fn characteristics(roof: Option<&str>, vegetation: Option<f64>) -> CharacteristicsResult {
    CharacteristicsResult {
        provider: "stub".to_string(),
        roof_material: roof.map(ToString::to_string),
        year_built: Some(1_990),
        stories: Some(2),
        sqft: Some(1_500.0),
        vegetation_proximity_m: vegetation,
        field_confidence: BTreeMap::from([("roof_material".to_string(), 0.7)]),
        raw: json!({}),
    }
}

/// Tests the canonical source preference order per structural key.
#[test]
fn test_structural_mapping_preference_order() {
    let now = Timestamp::from_unix_millis(0);
    let (structural, provenance) = map_to_structural(
        Some(&characteristics(Some("metal"), Some(12.0))),
        Some(&parcel(Some(30.0), Some(99.0))),
        Some(&geocode(Some(120.0))),
        now,
    );
    assert_eq!(structural.roof_material.as_deref(), Some("metal"));
    // Geocode elevation wins over parcel elevation.
    assert!((structural.elevation_m.unwrap() - 120.0).abs() < f64::EPSILON);
    // Characteristics vegetation wins over parcel vegetation.
    assert!((structural.vegetation_proximity_m.unwrap() - 12.0).abs() < f64::EPSILON);
    assert_eq!(
        provenance.get("elevation_m").unwrap().source.as_deref(),
        Some("geocode")
    );
}

/// Tests missing fields map to missing provenance, not absent entries.
#[test]
fn test_structural_mapping_records_missing_fields() {
    let now = Timestamp::from_unix_millis(0);
    let (structural, provenance) = map_to_structural(None, None, None, now);
    assert!(structural.is_empty());
    for key in perilgrid_core::STRUCTURAL_KEYS {
        assert_eq!(provenance.get(key).unwrap().method, "missing");
    }
}

/// Tests parcel values backfill when preferred sources are absent.
#[test]
fn test_structural_mapping_parcel_fallback() {
    let now = Timestamp::from_unix_millis(0);
    let (structural, provenance) = map_to_structural(
        Some(&characteristics(None, None)),
        Some(&parcel(Some(45.0), Some(22.0))),
        Some(&geocode(None)),
        now,
    );
    assert!((structural.elevation_m.unwrap() - 45.0).abs() < f64::EPSILON);
    assert!((structural.vegetation_proximity_m.unwrap() - 22.0).abs() < f64::EPSILON);
    assert_eq!(
        provenance.get("elevation_m").unwrap().source.as_deref(),
        Some("parcel")
    );
}

// ============================================================================
// SECTION: Mode & Wait Decisions
// ============================================================================

/// Tests explicit modes win over the provider heuristic.
#[test]
fn test_enrich_mode_decision() {
    assert_eq!(determine_enrich_mode(None, true), EnrichMode::Sync);
    assert_eq!(determine_enrich_mode(None, false), EnrichMode::Async);
    assert_eq!(determine_enrich_mode(Some(EnrichMode::Sync), false), EnrichMode::Sync);
    assert_eq!(determine_enrich_mode(Some(EnrichMode::Async), true), EnrichMode::Async);
}

/// Tests the deterministic wait/best-effort decision table.
#[test]
fn test_enrichment_action_table() {
    // Succeeded run scores immediately.
    assert_eq!(
        decide_enrichment_action(true, 0, false, Some(RunStatus::Succeeded)),
        EnrichmentAction::Score { status: EnrichmentStatus::Ready }
    );
    // Failed run: best-effort scores flagged, otherwise upstream failure.
    assert_eq!(
        decide_enrichment_action(true, 1, true, Some(RunStatus::Failed)),
        EnrichmentAction::Score { status: EnrichmentStatus::Failed }
    );
    assert_eq!(
        decide_enrichment_action(true, 1, false, Some(RunStatus::Failed)),
        EnrichmentAction::UpstreamFailed
    );
    // Pending run without wait: best-effort scores as queued, else 202.
    assert_eq!(
        decide_enrichment_action(true, 0, true, Some(RunStatus::Queued)),
        EnrichmentAction::Score { status: EnrichmentStatus::Queued }
    );
    assert_eq!(
        decide_enrichment_action(true, 0, false, Some(RunStatus::Queued)),
        EnrichmentAction::Accepted
    );
    // Pending run with wait exhausted behaves the same.
    assert_eq!(
        decide_enrichment_action(true, 2, true, Some(RunStatus::Running)),
        EnrichmentAction::Score { status: EnrichmentStatus::Queued }
    );
    assert_eq!(
        decide_enrichment_action(true, 2, false, Some(RunStatus::Running)),
        EnrichmentAction::Accepted
    );
    // Sync requests always score.
    assert_eq!(
        decide_enrichment_action(false, 0, false, None),
        EnrichmentAction::Score { status: EnrichmentStatus::Ready }
    );
}
