// perilgrid-core/tests/export.rs
// ============================================================================
// Module: Resilience Export Tests
// Description: Fixed-column CSV serialization checks.
// ============================================================================
//! ## Overview
//! Validates the fixed export column order, canonical JSON cells, and the
//! semicolon-joined warnings column.

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
use perilgrid_core::ExposureVersionId;
use perilgrid_core::Location;
use perilgrid_core::LocationId;
use perilgrid_core::PerilScore;
use perilgrid_core::ResilienceScoreItem;
use perilgrid_core::ResilienceScoreResult;
use perilgrid_core::ScoreBreakdown;
use perilgrid_core::ScoreItemId;
use perilgrid_core::ScoreResultId;
use perilgrid_core::ScoringConfig;
use perilgrid_core::StructuralAdjustments;
use perilgrid_core::StructuralAttributes;
use perilgrid_core::TenantId;
use perilgrid_core::Timestamp;
use perilgrid_core::UnderwritingPolicy;
use perilgrid_core::stages::explainability::build_explainability;
use perilgrid_core::stages::export::EXPORT_COLUMNS;
use perilgrid_core::stages::export::export_row;
use perilgrid_core::stages::export::rows_to_csv;
use perilgrid_core::stages::underwriting_decision::evaluate_underwriting_decision;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn fixture() -> (ResilienceScoreItem, Location, ResilienceScoreResult) {
    let tenant = TenantId::new("t1");
    let location = Location {
        id: LocationId::new(11),
        tenant_id: tenant.clone(),
        exposure_version_id: ExposureVersionId::new(3),
        external_location_id: "L1".to_string(),
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
        tiv: Some(100.0),
        limit: None,
        premium: None,
        structural: StructuralAttributes {
            roof_material: Some("metal".to_string()),
            ..StructuralAttributes::default()
        },
        updated_at: None,
        created_at: Timestamp::from_unix_millis(0),
    };
    let breakdown = ScoreBreakdown {
        resilience_score: 77,
        risk_score: 0.283,
        peril_scores: BTreeMap::from([(
            "flood".to_string(),
            PerilScore {
                raw: 0.4,
                adjusted: 0.38,
                weight: 0.35,
            },
        )]),
        structural_adjustments: StructuralAdjustments {
            roof_material: Some("metal".to_string()),
            roof_material_bonus: 5,
            flood_score_adjustment: Some(-0.02),
            wildfire_score_adjustment: None,
        },
        warnings: vec!["missing hazard data for wind".to_string(), "b".to_string()],
    };
    let data_quality = DataQuality::default();
    let decision = evaluate_underwriting_decision(
        breakdown.resilience_score,
        &BTreeMap::new(),
        &location.structural,
        &data_quality,
        &UnderwritingPolicy::default(),
    );
    let explainability = build_explainability(
        &breakdown,
        &location.structural,
        Some(&decision),
        &data_quality,
    );
    let item = ResilienceScoreItem {
        id: ScoreItemId::new(5),
        tenant_id: tenant.clone(),
        score_result_id: ScoreResultId::new(9),
        location_id: location.id,
        resilience_score: breakdown.resilience_score,
        risk_score: breakdown.risk_score,
        hazards: BTreeMap::new(),
        breakdown,
        decision,
        explainability,
        input_structural: StructuralAttributes::default(),
    };
    let result = ResilienceScoreResult {
        id: ScoreResultId::new(9),
        tenant_id: tenant,
        exposure_version_id: ExposureVersionId::new(3),
        run_id: None,
        request_fingerprint: "ff".repeat(32),
        scoring_version: "2".to_string(),
        hazard_dataset_version_ids: Vec::new(),
        config: ScoringConfig::default(),
        policy_pack_version_id: None,
        policy_used: json!({"version_label": "default"}),
        created_at: Timestamp::from_unix_millis(0),
    };
    (item, location, result)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests the header emits the fixed column order.
#[test]
fn test_header_column_order() {
    let csv = rows_to_csv(&[], true).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(header, EXPORT_COLUMNS.join(","));
    assert!(header.starts_with("location_id,external_location_id,latitude,longitude"));
}

/// Tests warnings join with `;` and JSON cells are canonical.
#[test]
fn test_row_serialization() {
    let (item, location, result) = fixture();
    let row = export_row(&item, &location, &result).unwrap();
    assert_eq!(row.warnings, "missing hazard data for wind;b");
    assert_eq!(row.policy_version_label, "default");
    assert_eq!(row.structural_json, r#"{"roof_material":"metal"}"#);
    assert_eq!(row.policy_used_json, r#"{"version_label":"default"}"#);

    let csv = rows_to_csv(&[row], true).unwrap();
    assert_eq!(csv.lines().count(), 2);
}

/// Tests identical inputs export byte-identically.
#[test]
fn test_export_determinism() {
    let (item, location, result) = fixture();
    let first = rows_to_csv(&[export_row(&item, &location, &result).unwrap()], true).unwrap();
    let second =
        rows_to_csv(&[export_row(&item, &location, &result).unwrap()], true).unwrap();
    assert_eq!(first, second);
}
