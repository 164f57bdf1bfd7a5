// perilgrid-core/src/core/resilience.rs
// ============================================================================
// Module: Perilgrid Resilience Entities
// Description: Scoring configuration and resilience score results.
// Purpose: Provide typed entities for peril-weighted resilience scoring.
// Dependencies: crate::core::{hazard, identifiers, profile, time}, serde
// ============================================================================

//! ## Overview
//! Resilience scoring turns per-peril hazard scores and structural
//! attributes into a 0–100 resilience value. A batch execution materialises
//! a [`ResilienceScoreResult`] uniquely keyed by the request fingerprint,
//! with one [`ResilienceScoreItem`] per scored location.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::explainability::Explainability;
use crate::core::hazard::HazardEntry;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::HazardDatasetVersionId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::PolicyPackVersionId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ScoreItemId;
use crate::core::identifiers::ScoreResultId;
use crate::core::identifiers::TenantId;
use crate::core::profile::StructuralAttributes;
use crate::core::time::Timestamp;
use crate::core::underwriting::UnderwritingDecision;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scoring algorithm version recorded on results and fingerprints.
pub const SCORING_VERSION: &str = "2";

// ============================================================================
// SECTION: Scoring Configuration
// ============================================================================

/// Peril weights and fallbacks for resilience scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Peril weights; weighted adjusted scores sum into the risk value.
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, f64>,
    /// Raw score substituted for missing hazard data.
    #[serde(default = "default_unknown_hazard_score")]
    pub unknown_hazard_score: f64,
    /// Resilience bonus per roof material.
    #[serde(default = "default_roof_material_bonus")]
    pub roof_material_bonus: BTreeMap<String, i64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            unknown_hazard_score: default_unknown_hazard_score(),
            roof_material_bonus: default_roof_material_bonus(),
        }
    }
}

/// Returns the default peril weights.
fn default_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("flood".to_string(), 0.35),
        ("wildfire".to_string(), 0.35),
        ("wind".to_string(), 0.15),
        ("heat".to_string(), 0.15),
    ])
}

/// Returns the default unknown-hazard fallback score.
const fn default_unknown_hazard_score() -> f64 {
    0.5
}

/// Returns the default roof material bonuses.
fn default_roof_material_bonus() -> BTreeMap<String, i64> {
    BTreeMap::from([
        ("metal".to_string(), 5),
        ("tile".to_string(), 3),
        ("asphalt_shingle".to_string(), 0),
        ("wood_shake".to_string(), -5),
    ])
}

// ============================================================================
// SECTION: Score Breakdown
// ============================================================================

/// Raw/adjusted/weight triple for one peril.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerilScore {
    /// Clamped raw score (or the unknown-hazard fallback).
    pub raw: f64,
    /// Score after structural adjustments.
    pub adjusted: f64,
    /// Peril weight applied.
    pub weight: f64,
}

/// Structural contributions applied during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralAdjustments {
    /// Normalized roof material key, when recognised.
    pub roof_material: Option<String>,
    /// Resilience bonus from the roof material.
    pub roof_material_bonus: i64,
    /// Flood score delta from elevation (negative reduces risk).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood_score_adjustment: Option<f64>,
    /// Wildfire score delta from vegetation proximity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildfire_score_adjustment: Option<f64>,
}

/// Full scoring outcome for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Resilience score in `[0, 100]`.
    pub resilience_score: i64,
    /// Weighted risk in `[0, 1]`, rounded to four places.
    pub risk_score: f64,
    /// Per-peril raw/adjusted/weight values.
    pub peril_scores: BTreeMap<String, PerilScore>,
    /// Structural adjustments applied.
    pub structural_adjustments: StructuralAdjustments,
    /// Warnings for missing hazard data or scores.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Batch scoring result, uniquely keyed by request fingerprint.
///
/// # Invariants
/// - `(tenant_id, request_fingerprint)` is unique; equal fingerprints reuse
///   this row instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceScoreResult {
    /// Result identifier.
    pub id: ScoreResultId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Scored exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Producing run; nulled when the run is garbage-collected.
    pub run_id: Option<RunId>,
    /// Request fingerprint (lowercase hex SHA-256).
    pub request_fingerprint: String,
    /// Scoring algorithm version.
    pub scoring_version: String,
    /// Hazard dataset versions consulted, sorted ascending.
    pub hazard_dataset_version_ids: Vec<HazardDatasetVersionId>,
    /// Effective scoring configuration.
    pub config: ScoringConfig,
    /// Policy pack version resolved for the request, when any.
    pub policy_pack_version_id: Option<PolicyPackVersionId>,
    /// Resolved policy metadata snapshot.
    pub policy_used: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Per-location resilience score row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceScoreItem {
    /// Item identifier.
    pub id: ScoreItemId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning score result.
    pub score_result_id: ScoreResultId,
    /// Scored location.
    pub location_id: LocationId,
    /// Resilience score in `[0, 100]`.
    pub resilience_score: i64,
    /// Risk score in `[0, 1]`.
    pub risk_score: f64,
    /// Worst-in-peril hazard entries the score was computed from.
    pub hazards: BTreeMap<String, HazardEntry>,
    /// Full scoring breakdown.
    pub breakdown: ScoreBreakdown,
    /// Underwriting disposition for the scored location.
    pub decision: UnderwritingDecision,
    /// Explainability payload for the scored location.
    pub explainability: Explainability,
    /// Structural attributes used as scoring input.
    pub input_structural: StructuralAttributes,
}
