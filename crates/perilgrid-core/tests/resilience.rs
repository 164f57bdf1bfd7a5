// perilgrid-core/tests/resilience.rs
// ============================================================================
// Module: Resilience Scorer Tests
// Description: Peril-weighted scoring determinism and adjustments.
// ============================================================================
//! ## Overview
//! Validates the weighted risk computation, structural adjustments, the
//! unknown-hazard fallback and warnings, and the score bounds property.

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

use perilgrid_core::HazardEntry;
use perilgrid_core::ScoringConfig;
use perilgrid_core::StructuralAttributes;
use perilgrid_core::stages::resilience::compute_resilience_score;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn entry(score: Option<f64>, band: &str) -> HazardEntry {
    HazardEntry {
        peril: None,
        score,
        band: Some(band.to_string()),
        source: "demo:v1".to_string(),
        raw: json!({}),
        feature_id: None,
    }
}

fn hazards(scores: &[(&str, f64)]) -> BTreeMap<String, HazardEntry> {
    scores
        .iter()
        .map(|(peril, score)| ((*peril).to_string(), entry(Some(*score), "LOW")))
        .collect()
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Tests identical inputs produce identical breakdowns.
#[test]
fn test_scoring_is_deterministic() {
    let hazards = hazards(&[("flood", 0.4), ("wildfire", 0.3), ("wind", 0.2), ("heat", 0.1)]);
    let structural = StructuralAttributes {
        roof_material: Some("metal".to_string()),
        elevation_m: Some(200.0),
        vegetation_proximity_m: Some(50.0),
    };
    let config = ScoringConfig::default();
    let first = compute_resilience_score(&hazards, &structural, &config);
    let second = compute_resilience_score(&hazards, &structural, &config);
    assert_eq!(first, second);
}

/// Tests the weighted risk and bonus arithmetic on a known portfolio.
#[test]
fn test_known_portfolio_breakdown() {
    let hazards = hazards(&[("flood", 0.4), ("wildfire", 0.3), ("wind", 0.2), ("heat", 0.1)]);
    let structural = StructuralAttributes {
        roof_material: Some("metal".to_string()),
        elevation_m: Some(200.0),
        vegetation_proximity_m: Some(50.0),
    };
    let breakdown =
        compute_resilience_score(&hazards, &structural, &ScoringConfig::default());

    // flood: 0.4 − min(0.15, 200/1000·0.10) = 0.38; wildfire unchanged at
    // 50 m; risk = .35·.38 + .35·.30 + .15·.20 + .15·.10 = 0.283.
    assert!((breakdown.risk_score - 0.283).abs() < 1e-9);
    assert_eq!(breakdown.resilience_score, 77);
    assert_eq!(breakdown.structural_adjustments.roof_material_bonus, 5);
    assert!(breakdown.warnings.is_empty());
}

/// Tests missing hazards fall back to the unknown score with warnings.
#[test]
fn test_missing_hazard_uses_unknown_score_and_warning() {
    let hazards = hazards(&[("flood", 0.8)]);
    let breakdown = compute_resilience_score(
        &hazards,
        &StructuralAttributes::default(),
        &ScoringConfig::default(),
    );
    let wind = breakdown.peril_scores.get("wind").unwrap();
    assert!((wind.raw - 0.5).abs() < f64::EPSILON);
    assert!(breakdown.warnings.iter().any(|w| w == "missing hazard data for wind"));
}

/// Tests a present entry without a score warns differently.
#[test]
fn test_missing_score_warning() {
    let mut hazards = BTreeMap::new();
    hazards.insert("flood".to_string(), entry(None, "HIGH"));
    let breakdown = compute_resilience_score(
        &hazards,
        &StructuralAttributes::default(),
        &ScoringConfig::default(),
    );
    assert!(breakdown.warnings.iter().any(|w| w == "missing hazard score for flood"));
}

/// Tests roof materials move the score by their bonus spread.
#[test]
fn test_roof_material_bonus_changes_score() {
    let hazards = hazards(&[("flood", 0.2), ("wildfire", 0.2), ("wind", 0.2), ("heat", 0.2)]);
    let metal = compute_resilience_score(
        &hazards,
        &StructuralAttributes {
            roof_material: Some("metal".to_string()),
            ..StructuralAttributes::default()
        },
        &ScoringConfig::default(),
    );
    let wood = compute_resilience_score(
        &hazards,
        &StructuralAttributes {
            roof_material: Some("wood_shake".to_string()),
            ..StructuralAttributes::default()
        },
        &ScoringConfig::default(),
    );
    assert_eq!(metal.resilience_score - wood.resilience_score, 10);
}

/// Tests elevation reduces the flood score with the capped delta.
#[test]
fn test_elevation_reduces_flood_score() {
    let hazards = hazards(&[("flood", 0.8), ("wildfire", 0.0), ("wind", 0.0), ("heat", 0.0)]);
    let breakdown = compute_resilience_score(
        &hazards,
        &StructuralAttributes {
            elevation_m: Some(1_000.0),
            ..StructuralAttributes::default()
        },
        &ScoringConfig::default(),
    );
    let flood = breakdown.peril_scores.get("flood").unwrap();
    assert!((flood.adjusted - 0.7).abs() < 1e-9);
}

/// Tests close vegetation raises the wildfire score.
#[test]
fn test_vegetation_proximity_increases_wildfire_score() {
    let hazards = hazards(&[("flood", 0.0), ("wildfire", 0.4), ("wind", 0.0), ("heat", 0.0)]);
    let breakdown = compute_resilience_score(
        &hazards,
        &StructuralAttributes {
            vegetation_proximity_m: Some(0.0),
            ..StructuralAttributes::default()
        },
        &ScoringConfig::default(),
    );
    let wildfire = breakdown.peril_scores.get("wildfire").unwrap();
    assert!((wildfire.adjusted - 0.5).abs() < 1e-9);
}

// ============================================================================
// SECTION: Bounds Property
// ============================================================================

proptest! {
    /// Resilience stays in [0, 100] and risk in [0, 1] for any inputs.
    #[test]
    fn prop_score_bounds(
        flood in -2.0_f64..3.0,
        wildfire in -2.0_f64..3.0,
        wind in -2.0_f64..3.0,
        heat in -2.0_f64..3.0,
        elevation in proptest::option::of(-100.0_f64..5_000.0),
        vegetation in proptest::option::of(-10.0_f64..200.0),
    ) {
        let hazards = hazards(&[
            ("flood", flood),
            ("wildfire", wildfire),
            ("wind", wind),
            ("heat", heat),
        ]);
        let structural = StructuralAttributes {
            roof_material: Some("wood_shake".to_string()),
            elevation_m: elevation,
            vegetation_proximity_m: vegetation,
        };
        let breakdown =
            compute_resilience_score(&hazards, &structural, &ScoringConfig::default());
        prop_assert!(breakdown.risk_score >= 0.0 && breakdown.risk_score <= 1.0);
        prop_assert!(
            breakdown.resilience_score >= 0 && breakdown.resilience_score <= 100
        );
    }
}
