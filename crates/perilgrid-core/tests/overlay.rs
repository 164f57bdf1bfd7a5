// perilgrid-core/tests/overlay.rs
// ============================================================================
// Module: Overlay Combination Tests
// Description: Worst-in-peril merging and representative selection.
// ============================================================================
//! ## Overview
//! Validates the worst-in-peril invariant: highest score wins per peril,
//! numeric beats null, and ties break to the smallest feature id; the
//! representative entry follows the same ordering across perils.

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

use perilgrid_core::HazardFeatureId;
use perilgrid_core::OVERLAY_METHOD;
use perilgrid_core::stages::overlay::attributes_from_entry;
use perilgrid_core::stages::overlay::extract_hazard_entry;
use perilgrid_core::stages::overlay::merge_worst_in_peril;
use perilgrid_core::stages::overlay::normalized_hazards;
use perilgrid_core::stages::overlay::representative_entry;
use serde_json::json;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Tests property extraction with dataset-peril fallback.
#[test]
fn test_extract_hazard_entry_fallbacks() {
    let entry = extract_hazard_entry(
        &json!({"Score": "0.6", "Band": "HIGH"}),
        Some("flood"),
        "fema-sfha",
        "2025",
        HazardFeatureId::new(9),
    );
    assert_eq!(entry.peril.as_deref(), Some("flood"));
    assert!((entry.score.unwrap() - 0.6).abs() < f64::EPSILON);
    assert_eq!(entry.band.as_deref(), Some("HIGH"));
    assert_eq!(entry.source, "fema-sfha:2025");
    assert_eq!(entry.feature_id, Some(HazardFeatureId::new(9)));
}

/// Tests the property category overrides the dataset peril.
#[test]
fn test_extract_prefers_property_category() {
    let entry = extract_hazard_entry(
        &json!({"hazard_category": "  Wildfire "}),
        Some("flood"),
        "whp",
        "v3",
        HazardFeatureId::new(1),
    );
    assert_eq!(entry.peril.as_deref(), Some("wildfire"));
}

// ============================================================================
// SECTION: Worst-In-Peril
// ============================================================================

/// Tests the canonical three-feature scenario: the higher flood score wins
/// its peril and supplies the persisted representative.
#[test]
fn test_worst_in_peril_and_representative() {
    let mut hazards = BTreeMap::new();
    let features = [
        (HazardFeatureId::new(1), json!({"hazard_category": "flood", "score": 0.3})),
        (HazardFeatureId::new(5), json!({"hazard_category": "flood", "score": 0.6})),
        (HazardFeatureId::new(2), json!({"hazard_category": "wildfire", "score": 0.4})),
    ];
    for (id, props) in &features {
        let entry = extract_hazard_entry(props, None, "demo", "v1", *id);
        merge_worst_in_peril(&mut hazards, entry);
    }

    let flood = hazards.get("flood").unwrap();
    assert!((flood.score.unwrap() - 0.6).abs() < f64::EPSILON);
    assert_eq!(flood.feature_id, Some(HazardFeatureId::new(5)));

    let best = representative_entry(&hazards).unwrap();
    assert_eq!(best.peril.as_deref(), Some("flood"));
    assert!((best.score.unwrap() - 0.6).abs() < f64::EPSILON);
}

/// Tests a numeric score displaces a null score.
#[test]
fn test_numeric_beats_null() {
    let mut hazards = BTreeMap::new();
    merge_worst_in_peril(
        &mut hazards,
        extract_hazard_entry(
            &json!({"hazard_category": "flood"}),
            None,
            "demo",
            "v1",
            HazardFeatureId::new(1),
        ),
    );
    merge_worst_in_peril(
        &mut hazards,
        extract_hazard_entry(
            &json!({"hazard_category": "flood", "score": 0.1}),
            None,
            "demo",
            "v1",
            HazardFeatureId::new(2),
        ),
    );
    assert_eq!(hazards.get("flood").unwrap().feature_id, Some(HazardFeatureId::new(2)));
}

/// Tests numeric ties break to the smallest feature id.
#[test]
fn test_tie_breaks_to_smallest_feature_id() {
    let mut hazards = BTreeMap::new();
    for id in [7, 3, 5] {
        merge_worst_in_peril(
            &mut hazards,
            extract_hazard_entry(
                &json!({"hazard_category": "flood", "score": 0.5}),
                None,
                "demo",
                "v1",
                HazardFeatureId::new(id),
            ),
        );
    }
    assert_eq!(hazards.get("flood").unwrap().feature_id, Some(HazardFeatureId::new(3)));
}

/// Tests entries without a peril are dropped.
#[test]
fn test_entry_without_peril_is_ignored() {
    let mut hazards = BTreeMap::new();
    merge_worst_in_peril(
        &mut hazards,
        extract_hazard_entry(
            &json!({"score": 0.9}),
            None,
            "demo",
            "v1",
            HazardFeatureId::new(1),
        ),
    );
    assert!(hazards.is_empty());
}

// ============================================================================
// SECTION: Persistence Shapes
// ============================================================================

/// Tests the persisted attribute payload carries the method tag.
#[test]
fn test_attributes_from_entry() {
    let entry = extract_hazard_entry(
        &json!({"hazard_category": "flood", "score": 0.6, "band": "HIGH"}),
        None,
        "demo",
        "v1",
        HazardFeatureId::new(5),
    );
    let attributes = attributes_from_entry(&entry);
    assert_eq!(attributes.method, OVERLAY_METHOD);
    assert_eq!(attributes.hazard_category.as_deref(), Some("flood"));
    assert_eq!(attributes.band.as_deref(), Some("HIGH"));
    assert_eq!(attributes.source.as_deref(), Some("demo:v1"));
}

/// Tests normalization strips the tie-breaker before hashing.
#[test]
fn test_normalized_hazards_strip_feature_ids() {
    let mut hazards = BTreeMap::new();
    merge_worst_in_peril(
        &mut hazards,
        extract_hazard_entry(
            &json!({"hazard_category": "flood", "score": 0.6}),
            None,
            "demo",
            "v1",
            HazardFeatureId::new(5),
        ),
    );
    let cleaned = normalized_hazards(&hazards);
    assert!(cleaned.values().all(|entry| entry.feature_id.is_none()));
}
