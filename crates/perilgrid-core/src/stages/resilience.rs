// perilgrid-core/src/stages/resilience.rs
// ============================================================================
// Module: Perilgrid Resilience Scorer
// Description: Peril-weighted risk to 0–100 resilience scoring.
// Purpose: Compute deterministic resilience scores with structural adjustments.
// Dependencies: crate::core, crate::stages
// ============================================================================

//! ## Overview
//! Scoring walks the configured peril weights: each peril's raw score (or
//! the unknown-hazard fallback) is clamped to `[0, 1]`, adjusted for
//! elevation (flood) and vegetation proximity (wildfire), and accumulated
//! into a weighted risk. `risk_score` is the clamped risk rounded to four
//! places; `resilience_score = clamp(round(100·(1−risk)) + roof bonus,
//! 0, 100)`. Missing perils and missing scores are reported as warnings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::HazardEntry;
use crate::core::PerilScore;
use crate::core::ScoreBreakdown;
use crate::core::ScoringConfig;
use crate::core::StructuralAdjustments;
use crate::core::StructuralAttributes;
use crate::stages::round_score;

// ============================================================================
// SECTION: Clamping
// ============================================================================

/// Clamps a value to `[minimum, maximum]`.
#[must_use]
fn clamp(value: f64, minimum: f64, maximum: f64) -> f64 {
    value.max(minimum).min(maximum)
}

/// Rounds to four decimal places.
#[must_use]
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Computes the resilience score for one property.
///
/// `hazards` maps peril → worst-in-peril entry; perils absent from the map
/// fall back to the configured unknown-hazard score and produce warnings.
#[must_use]
pub fn compute_resilience_score(
    hazards: &BTreeMap<String, HazardEntry>,
    structural: &StructuralAttributes,
    config: &ScoringConfig,
) -> ScoreBreakdown {
    let roof_key = structural
        .roof_material
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let roof_bonus = roof_key
        .as_deref()
        .and_then(|key| config.roof_material_bonus.get(key).copied())
        .unwrap_or(0);

    let mut peril_scores = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut flood_adjustment = None;
    let mut wildfire_adjustment = None;
    let mut risk = 0.0;

    for (peril, weight) in &config.weights {
        let entry = hazards.get(peril);
        let raw_score = entry.and_then(|value| value.score);
        match entry {
            None => warnings.push(format!("missing hazard data for {peril}")),
            Some(_) if raw_score.is_none() => {
                warnings.push(format!("missing hazard score for {peril}"));
            }
            Some(_) => {}
        }

        let peril_score = clamp(raw_score.unwrap_or(config.unknown_hazard_score), 0.0, 1.0);
        let mut adjusted = peril_score;

        if peril == "flood" {
            if let Some(elevation) = structural.elevation_m {
                let delta = (elevation.max(0.0) / 1_000.0 * 0.10).min(0.15);
                adjusted = clamp(peril_score - delta, 0.0, 1.0);
                flood_adjustment = Some(-delta);
            }
        } else if peril == "wildfire" {
            if let Some(vegetation) = structural.vegetation_proximity_m {
                let distance = vegetation.max(0.0);
                let delta = if distance <= 30.0 {
                    (30.0 - distance) / 30.0 * 0.10
                } else {
                    0.0
                };
                adjusted = clamp(peril_score + delta, 0.0, 1.0);
                wildfire_adjustment = Some(delta);
            }
        }

        peril_scores.insert(
            peril.clone(),
            PerilScore {
                raw: peril_score,
                adjusted,
                weight: *weight,
            },
        );
        risk += weight * adjusted;
    }

    let risk_score = round4(clamp(risk, 0.0, 1.0));
    let base_score = round_score(100.0 * (1.0 - risk_score));
    let resilience_score = (base_score + roof_bonus).clamp(0, 100);

    ScoreBreakdown {
        resilience_score,
        risk_score,
        peril_scores,
        structural_adjustments: StructuralAdjustments {
            roof_material: roof_key,
            roof_material_bonus: roof_bonus,
            flood_score_adjustment: flood_adjustment,
            wildfire_score_adjustment: wildfire_adjustment,
        },
        warnings,
    }
}
