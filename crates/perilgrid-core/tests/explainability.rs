// perilgrid-core/tests/explainability.rs
// ============================================================================
// Module: Explainability Tests
// Description: Peril contributions, structural impacts, and narrative.
// ============================================================================
//! ## Overview
//! Validates the contribution percentage invariant, the deterministic
//! contribution ordering with ties, structural impact detection, and the
//! narrative's disposition, top drivers, and data-gap sentences.

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
use perilgrid_core::PerilScore;
use perilgrid_core::ScoreBreakdown;
use perilgrid_core::StructuralAdjustments;
use perilgrid_core::StructuralAttributes;
use perilgrid_core::StructuralImpact;
use perilgrid_core::UnderwritingPolicy;
use perilgrid_core::stages::explainability::build_explainability;
use perilgrid_core::stages::explainability::narrative_summary;
use perilgrid_core::stages::explainability::peril_contributions;
use perilgrid_core::stages::explainability::structural_impacts;
use perilgrid_core::stages::underwriting_decision::evaluate_underwriting_decision;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn peril_score(weight: f64, adjusted: f64) -> PerilScore {
    PerilScore {
        raw: adjusted,
        adjusted,
        weight,
    }
}

fn breakdown(
    resilience_score: i64,
    peril_scores: BTreeMap<String, PerilScore>,
    structural_adjustments: StructuralAdjustments,
) -> ScoreBreakdown {
    ScoreBreakdown {
        resilience_score,
        risk_score: 0.5,
        peril_scores,
        structural_adjustments,
        warnings: Vec::new(),
    }
}

fn no_adjustments() -> StructuralAdjustments {
    StructuralAdjustments {
        roof_material: None,
        roof_material_bonus: 0,
        flood_score_adjustment: None,
        wildfire_score_adjustment: None,
    }
}

// ============================================================================
// SECTION: Contributions
// ============================================================================

/// Tests contribution percentages sum to one when any contribution exists.
#[test]
fn test_contribution_pct_sums_to_one() {
    let peril_scores = BTreeMap::from([
        ("flood".to_string(), peril_score(0.5, 0.5)),
        ("wind".to_string(), peril_score(0.5, 0.5)),
    ]);
    let contributions = peril_contributions(&peril_scores);
    let total_pct: f64 = contributions.iter().map(|item| item.contribution_pct).sum();
    assert!((total_pct - 1.0).abs() < 1e-6);
}

/// Tests equal contributions break ties on the peril name.
#[test]
fn test_contribution_sorting_ties() {
    let peril_scores = BTreeMap::from([
        ("wind".to_string(), peril_score(0.5, 0.2)),
        ("flood".to_string(), peril_score(0.5, 0.2)),
    ]);
    let contributions = peril_contributions(&peril_scores);
    assert_eq!(contributions[0].peril, "flood");
    assert_eq!(contributions[1].peril, "wind");
}

/// Tests the largest contribution sorts first.
#[test]
fn test_contribution_sorting_by_magnitude() {
    let peril_scores = BTreeMap::from([
        ("flood".to_string(), peril_score(0.35, 0.2)),
        ("wildfire".to_string(), peril_score(0.35, 0.9)),
        ("wind".to_string(), peril_score(0.15, 0.4)),
    ]);
    let contributions = peril_contributions(&peril_scores);
    assert_eq!(contributions[0].peril, "wildfire");
}

/// Tests a zero risk total reports zero percentages.
#[test]
fn test_zero_total_reports_zero_pct() {
    let peril_scores =
        BTreeMap::from([("flood".to_string(), peril_score(0.5, 0.0))]);
    let contributions = peril_contributions(&peril_scores);
    assert!(contributions
        .iter()
        .all(|item| item.contribution_pct.abs() < f64::EPSILON));
}

// ============================================================================
// SECTION: Structural Impacts
// ============================================================================

/// Tests the roof bonus and both peril adjustments are detected.
#[test]
fn test_structural_impacts_detects_adjustments() {
    let breakdown = breakdown(
        80,
        BTreeMap::new(),
        StructuralAdjustments {
            roof_material: Some("metal".to_string()),
            roof_material_bonus: 5,
            flood_score_adjustment: Some(-0.05),
            wildfire_score_adjustment: Some(0.02),
        },
    );
    let structural = StructuralAttributes {
        roof_material: Some("metal".to_string()),
        elevation_m: Some(12.0),
        vegetation_proximity_m: Some(20.0),
    };
    let impacts = structural_impacts(&structural, &breakdown);
    assert_eq!(impacts.len(), 3);
    assert!(matches!(
        impacts[0],
        StructuralImpact::RoofMaterialBonus { points: 5, .. }
    ));
    let flood = impacts
        .iter()
        .find_map(|impact| match impact {
            StructuralImpact::PerilScoreAdjustment {
                peril,
                delta,
                source,
                input,
            } if peril == "flood" => Some((*delta, source.clone(), *input)),
            _ => None,
        })
        .unwrap();
    assert!((flood.0 - (-0.05)).abs() < f64::EPSILON);
    assert_eq!(flood.1, "elevation_m");
    assert!((flood.2.unwrap() - 12.0).abs() < f64::EPSILON);
}

/// Tests a zero roof bonus emits no roof impact.
#[test]
fn test_zero_roof_bonus_omitted() {
    let breakdown = breakdown(80, BTreeMap::new(), no_adjustments());
    let impacts = structural_impacts(&StructuralAttributes::default(), &breakdown);
    assert!(impacts.is_empty());
}

// ============================================================================
// SECTION: Narrative
// ============================================================================

/// Tests the narrative names the score, disposition, drivers, and gaps.
#[test]
fn test_narrative_includes_score_and_missing_peril() {
    let peril_scores = BTreeMap::from([
        ("flood".to_string(), peril_score(0.5, 0.8)),
        ("wildfire".to_string(), peril_score(0.5, 0.6)),
    ]);
    let contributions = peril_contributions(&peril_scores);
    let hazards = BTreeMap::new();
    let structural = StructuralAttributes {
        roof_material: Some("metal".to_string()),
        ..StructuralAttributes::default()
    };
    let decision = evaluate_underwriting_decision(
        74,
        &hazards,
        &structural,
        &DataQuality::default(),
        &UnderwritingPolicy::default(),
    );
    let narrative = narrative_summary(
        &contributions,
        74,
        Some(&decision),
        &DataQuality {
            peril_missing: vec!["wind".to_string()],
            ..DataQuality::default()
        },
    );
    assert!(narrative.starts_with("Resilience 74 (ACCEPT)."));
    assert!(narrative.contains("Flood"));
    assert!(narrative.contains("Wildfire"));
    assert!(narrative.to_lowercase().contains("missing wind score"));
}

/// Tests the narrative without a decision omits the disposition.
#[test]
fn test_narrative_without_decision() {
    let narrative = narrative_summary(&[], 42, None, &DataQuality::default());
    assert_eq!(narrative, "Resilience 42.");
}

/// Tests plural data gaps and the length cap.
#[test]
fn test_narrative_plural_gaps_and_truncation() {
    let narrative = narrative_summary(
        &[],
        10,
        None,
        &DataQuality {
            peril_missing: vec!["wind".to_string(), "heat".to_string()],
            ..DataQuality::default()
        },
    );
    assert!(narrative.contains("missing wind, heat scores"));

    let many_missing: Vec<String> =
        (0..60).map(|index| format!("synthetic_peril_{index}")).collect();
    let long = narrative_summary(
        &[],
        10,
        None,
        &DataQuality {
            peril_missing: many_missing,
            ..DataQuality::default()
        },
    );
    assert!(long.chars().count() <= 300);
    assert!(long.ends_with("..."));
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Tests the assembled payload carries drivers, impacts, and narrative.
#[test]
fn test_build_explainability_output() {
    let breakdown = breakdown(
        80,
        BTreeMap::from([("flood".to_string(), peril_score(0.5, 0.4))]),
        StructuralAdjustments {
            roof_material: Some("tile".to_string()),
            roof_material_bonus: 0,
            flood_score_adjustment: None,
            wildfire_score_adjustment: None,
        },
    );
    let structural = StructuralAttributes {
        roof_material: Some("tile".to_string()),
        ..StructuralAttributes::default()
    };
    let explainability =
        build_explainability(&breakdown, &structural, None, &DataQuality::default());
    assert_eq!(explainability.drivers.len(), 1);
    assert_eq!(explainability.drivers[0].peril, "flood");
    assert!(explainability.structural_impacts.is_empty());
    assert!(explainability.narrative.starts_with("Resilience 80."));
}
