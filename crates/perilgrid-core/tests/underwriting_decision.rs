// perilgrid-core/tests/underwriting_decision.rs
// ============================================================================
// Module: Underwriting Decision Tests
// Description: Threshold ladder, confidence tiers, and mitigation guidance.
// ============================================================================
//! ## Overview
//! Validates the decline → refer → needs-data → accept ladder, the reason
//! codes for every branch, confidence penalties for data gaps, the
//! per-peril mitigation recommendations, and policy overrides.

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

use perilgrid_core::DataQuality;
use perilgrid_core::HazardEntry;
use perilgrid_core::StructuralAttributes;
use perilgrid_core::UnderwritingDisposition;
use perilgrid_core::UnderwritingPolicy;
use perilgrid_core::underwriting_policy_with_overrides;
use perilgrid_core::stages::underwriting_decision::evaluate_underwriting_decision;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn entry(score: f64) -> HazardEntry {
    HazardEntry {
        peril: None,
        score: Some(score),
        band: Some("LOW".to_string()),
        source: "demo:v1".to_string(),
        raw: json!({}),
        feature_id: None,
    }
}

fn base_hazards() -> BTreeMap<String, HazardEntry> {
    ["flood", "wildfire", "wind", "heat"]
        .iter()
        .map(|peril| ((*peril).to_string(), entry(0.2)))
        .collect()
}

fn base_structural() -> StructuralAttributes {
    StructuralAttributes {
        roof_material: Some("metal".to_string()),
        elevation_m: Some(10.0),
        vegetation_proximity_m: Some(50.0),
    }
}

fn base_quality() -> DataQuality {
    DataQuality {
        peril_missing: Vec::new(),
        used_unknown_hazard_fallback: false,
        enrichment_status: Some("ready".to_string()),
        enrichment_failed: false,
        best_effort: true,
    }
}

// ============================================================================
// SECTION: Disposition Ladder
// ============================================================================

/// Tests a clean high-score portfolio accepts with full confidence.
#[test]
fn test_accept_with_full_confidence() {
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Accept);
    assert!(decision.reason_codes.is_empty());
    assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
}

/// Tests scores at or below the decline ceiling decline outright.
#[test]
fn test_decline_when_score_low() {
    let decision = evaluate_underwriting_decision(
        30,
        &base_hazards(),
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Decline);
    assert!(decision.reason_codes.iter().any(|code| code == "SCORE_LOW_DECLINE"));
}

/// Tests a peril at its decline threshold declines with a peril code.
#[test]
fn test_decline_when_peril_high() {
    let mut hazards = base_hazards();
    hazards.insert("flood".to_string(), entry(0.95));
    let decision = evaluate_underwriting_decision(
        80,
        &hazards,
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Decline);
    assert!(decision.reason_codes.iter().any(|code| code == "PERIL_HIGH_DECLINE_FLOOD"));
}

/// Tests mid-range scores refer for review.
#[test]
fn test_refer_when_score_mid() {
    let decision = evaluate_underwriting_decision(
        55,
        &base_hazards(),
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Refer);
    assert!(decision.reason_codes.iter().any(|code| code == "SCORE_MEDIUM_REFER"));
}

/// Tests an elevated peril refers even at an accepting score.
#[test]
fn test_refer_when_peril_elevated() {
    let mut hazards = base_hazards();
    hazards.insert("wind".to_string(), entry(0.8));
    let decision = evaluate_underwriting_decision(
        80,
        &hazards,
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Refer);
    assert!(decision.reason_codes.iter().any(|code| code == "PERIL_ELEVATED_REFER_WIND"));
}

/// Tests missing peril data blocks ACCEPT into NEEDS_DATA.
#[test]
fn test_needs_data_when_missing_perils() {
    let mut quality = base_quality();
    quality.peril_missing = vec!["flood".to_string()];
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &base_structural(),
        &quality,
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::NeedsData);
    assert!(decision.reason_codes.iter().any(|code| code == "MISSING_PERIL_DATA"));
}

/// Tests a missing required structural field blocks ACCEPT.
#[test]
fn test_needs_data_when_required_structural_missing() {
    let mut structural = base_structural();
    structural.roof_material = None;
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &structural,
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::NeedsData);
    assert!(decision
        .reason_codes
        .iter()
        .any(|code| code == "STRUCTURAL_MISSING_ROOF_MATERIAL"));
}

/// Tests a best-effort enrichment failure needs data before any score check.
#[test]
fn test_needs_data_when_enrichment_failed_best_effort() {
    let mut quality = base_quality();
    quality.enrichment_failed = true;
    quality.enrichment_status = Some("failed".to_string());
    let decision = evaluate_underwriting_decision(
        95,
        &base_hazards(),
        &base_structural(),
        &quality,
        &UnderwritingPolicy::default(),
    );
    assert_eq!(decision.decision, UnderwritingDisposition::NeedsData);
    assert!(decision.reason_codes.iter().any(|code| code == "ENRICHMENT_FAILED"));
}

// ============================================================================
// SECTION: Confidence Tiers
// ============================================================================

/// Tests the unknown-hazard fallback and failed enrichment reduce confidence.
#[test]
fn test_confidence_reduces_on_fallback_and_failed_enrichment() {
    let mut quality = base_quality();
    quality.used_unknown_hazard_fallback = true;
    quality.enrichment_status = Some("failed".to_string());
    quality.enrichment_failed = true;
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &base_structural(),
        &quality,
        &UnderwritingPolicy::default(),
    );
    assert!(decision.confidence < 1.0);
    assert!((decision.confidence - 0.75).abs() < f64::EPSILON);
}

/// Tests stacking every penalty drops below the low-confidence floor.
#[test]
fn test_low_confidence_code_when_all_penalties_stack() {
    let mut structural = base_structural();
    structural.roof_material = None;
    let mut quality = base_quality();
    quality.used_unknown_hazard_fallback = true;
    quality.enrichment_status = Some("queued".to_string());
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &structural,
        &quality,
        &UnderwritingPolicy::default(),
    );
    assert!((decision.confidence - 0.65).abs() < f64::EPSILON);
    assert!(decision.reason_codes.iter().any(|code| code == "LOW_CONFIDENCE_DATA"));
}

// ============================================================================
// SECTION: Mitigation Recommendations
// ============================================================================

/// Tests elevated perils and weak structure raise all three recommendations.
#[test]
fn test_mitigation_recommendations() {
    let mut hazards = base_hazards();
    hazards.insert("wildfire".to_string(), entry(0.75));
    hazards.insert("flood".to_string(), entry(0.75));
    hazards.insert("wind".to_string(), entry(0.8));
    let structural = StructuralAttributes {
        roof_material: Some("wood_shake".to_string()),
        elevation_m: None,
        vegetation_proximity_m: Some(20.0),
    };
    let decision = evaluate_underwriting_decision(
        80,
        &hazards,
        &structural,
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    let codes: Vec<&str> = decision
        .mitigation_recommendations
        .iter()
        .map(|rec| rec.code.as_str())
        .collect();
    assert!(codes.contains(&"MIT_WILDFIRE_DEFENSIBLE_SPACE"));
    assert!(codes.contains(&"MIT_FLOOD_ELEVATION_DRAINAGE"));
    assert!(codes.contains(&"MIT_WIND_ROOF_HARDENING"));
}

/// Tests a benign portfolio raises no wildfire recommendation.
#[test]
fn test_no_wildfire_mitigation_when_benign() {
    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &base_structural(),
        &base_quality(),
        &UnderwritingPolicy::default(),
    );
    assert!(!decision
        .mitigation_recommendations
        .iter()
        .any(|rec| rec.code == "MIT_WILDFIRE_DEFENSIBLE_SPACE"));
}

// ============================================================================
// SECTION: Policy Overrides
// ============================================================================

/// Tests policy-pack overrides merge onto the built-in defaults.
#[test]
fn test_policy_overrides_change_thresholds() {
    let policy = underwriting_policy_with_overrides(Some(&json!({
        "score_accept_min": 90,
    })));
    assert_eq!(policy.score_accept_min, 90);
    assert_eq!(policy.decline_score_max, 39);

    let decision = evaluate_underwriting_decision(
        80,
        &base_hazards(),
        &base_structural(),
        &base_quality(),
        &policy,
    );
    assert_eq!(decision.decision, UnderwritingDisposition::Refer);
    assert_eq!(decision.policy_used.score_accept_min, 90);
}
