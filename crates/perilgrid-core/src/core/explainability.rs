// perilgrid-core/src/core/explainability.rs
// ============================================================================
// Module: Perilgrid Explainability Artifacts
// Description: Peril contribution drivers, structural impacts, narrative.
// Purpose: Provide typed explainability payloads attached to score output.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Explainability decomposes a resilience score into its weighted peril
//! contributions (with percentage shares), lists the structural adjustments
//! that moved the score, and renders a short narrative naming the top
//! drivers and data gaps. The payload is attached to score responses and
//! batch score items.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Drivers
// ============================================================================

/// One peril's weighted contribution to the risk total.
///
/// # Invariants
/// - `contribution = weight · adjusted_score`, rounded to six places.
/// - Percentages sum to one when any contribution is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerilContribution {
    /// Peril name.
    pub peril: String,
    /// Peril weight applied.
    pub weight: f64,
    /// Adjusted peril score.
    pub adjusted_score: f64,
    /// Weighted contribution to the risk total.
    pub contribution: f64,
    /// Share of the risk total in `[0, 1]`.
    pub contribution_pct: f64,
}

// ============================================================================
// SECTION: Structural Impacts
// ============================================================================

/// One structural input's effect on the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralImpact {
    /// Resilience points added or removed by the roof material.
    RoofMaterialBonus {
        /// Normalized roof material key, when recognised.
        roof_material: Option<String>,
        /// Points applied to the resilience score.
        points: i64,
    },
    /// Peril score delta applied from a structural input.
    PerilScoreAdjustment {
        /// Adjusted peril.
        peril: String,
        /// Score delta applied (negative reduces risk).
        delta: f64,
        /// Structural field that drove the adjustment.
        source: String,
        /// Input value of that field, when present.
        input: Option<f64>,
    },
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Full explainability payload for one scored property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explainability {
    /// Peril contributions sorted by descending contribution, then peril.
    pub drivers: Vec<PerilContribution>,
    /// Structural adjustments that moved the score.
    pub structural_impacts: Vec<StructuralImpact>,
    /// Short narrative naming the disposition, top drivers, and data gaps.
    pub narrative: String,
}
