// perilgrid-core/src/stages/explainability.rs
// ============================================================================
// Module: Perilgrid Explainability Engine
// Description: Peril contribution breakdown and narrative rendering.
// Purpose: Decompose a resilience score into auditable drivers.
// Dependencies: crate::core, crate::stages
// ============================================================================

//! ## Overview
//! Explainability turns a score breakdown into per-peril contributions
//! (`weight · adjusted`, with percentage shares of the risk total), the
//! structural impacts that moved the score, and a short narrative naming
//! the disposition, the top two drivers, and any missing peril data.
//! Contributions sort by descending contribution with the peril name as
//! the tie-break, so output order is deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::core::DataQuality;
use crate::core::Explainability;
use crate::core::PerilContribution;
use crate::core::PerilScore;
use crate::core::ScoreBreakdown;
use crate::core::StructuralAttributes;
use crate::core::StructuralImpact;
use crate::core::UnderwritingDecision;
use crate::stages::round_score;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum narrative length in characters before truncation.
const MAX_NARRATIVE_CHARS: usize = 300;

// ============================================================================
// SECTION: Rounding
// ============================================================================

/// Rounds to six decimal places.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

// ============================================================================
// SECTION: Drivers
// ============================================================================

/// Computes the weighted peril contributions with percentage shares.
#[must_use]
pub fn peril_contributions(
    peril_scores: &BTreeMap<String, PerilScore>,
) -> Vec<PerilContribution> {
    let mut contributions = Vec::with_capacity(peril_scores.len());
    let mut total = 0.0;
    for (peril, scores) in peril_scores {
        let contribution = scores.weight * scores.adjusted;
        contributions.push(PerilContribution {
            peril: peril.clone(),
            weight: scores.weight,
            adjusted_score: scores.adjusted,
            contribution: round6(contribution),
            contribution_pct: 0.0,
        });
        total += contribution;
    }

    if total > 0.0 {
        for item in &mut contributions {
            item.contribution_pct = round6(item.contribution / total);
        }
    }

    contributions.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.peril.cmp(&b.peril))
    });
    contributions
}

// ============================================================================
// SECTION: Structural Impacts
// ============================================================================

/// Lists the structural adjustments that moved the score.
#[must_use]
pub fn structural_impacts(
    structural: &StructuralAttributes,
    breakdown: &ScoreBreakdown,
) -> Vec<StructuralImpact> {
    let adjustments = &breakdown.structural_adjustments;
    let mut impacts = Vec::new();

    if adjustments.roof_material_bonus != 0 {
        impacts.push(StructuralImpact::RoofMaterialBonus {
            roof_material: adjustments.roof_material.clone(),
            points: adjustments.roof_material_bonus,
        });
    }

    if let Some(delta) = adjustments.flood_score_adjustment {
        impacts.push(StructuralImpact::PerilScoreAdjustment {
            peril: "flood".to_string(),
            delta,
            source: "elevation_m".to_string(),
            input: structural.elevation_m,
        });
    }

    if let Some(delta) = adjustments.wildfire_score_adjustment {
        impacts.push(StructuralImpact::PerilScoreAdjustment {
            peril: "wildfire".to_string(),
            delta,
            source: "vegetation_proximity_m".to_string(),
            input: structural.vegetation_proximity_m,
        });
    }

    impacts
}

// ============================================================================
// SECTION: Narrative
// ============================================================================

/// Title-cases a peril name for display (`wood_shake` → `Wood Shake`).
fn format_peril(peril: &str) -> String {
    if peril.is_empty() {
        return "Unknown".to_string();
    }
    peril
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the short narrative for one scored property.
#[must_use]
pub fn narrative_summary(
    contributions: &[PerilContribution],
    resilience_score: i64,
    decision: Option<&UnderwritingDecision>,
    data_quality: &DataQuality,
) -> String {
    let mut parts = Vec::new();
    match decision {
        Some(decision) => parts.push(format!(
            "Resilience {resilience_score} ({}).",
            decision.decision.as_str()
        )),
        None => parts.push(format!("Resilience {resilience_score}.")),
    }

    let top: Vec<String> = contributions
        .iter()
        .take(2)
        .map(|item| {
            let pct = round_score(item.contribution_pct * 100.0);
            format!("{} ({pct}%)", format_peril(&item.peril))
        })
        .collect();
    if !top.is_empty() {
        parts.push(format!("Top drivers: {}.", top.join(", ")));
    }

    if !data_quality.peril_missing.is_empty() {
        let missing: Vec<String> = data_quality
            .peril_missing
            .iter()
            .map(|peril| format_peril(peril).to_lowercase())
            .collect();
        let suffix = if missing.len() > 1 { "scores" } else { "score" };
        parts.push(format!("Data gaps: missing {} {suffix}.", missing.join(", ")));
    }

    let narrative = parts.join(" ");
    if narrative.chars().count() > MAX_NARRATIVE_CHARS {
        let truncated: String =
            narrative.chars().take(MAX_NARRATIVE_CHARS - 3).collect();
        format!("{}...", truncated.trim_end())
    } else {
        narrative
    }
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Builds the full explainability payload for one scored property.
#[must_use]
pub fn build_explainability(
    breakdown: &ScoreBreakdown,
    structural: &StructuralAttributes,
    decision: Option<&UnderwritingDecision>,
    data_quality: &DataQuality,
) -> Explainability {
    let drivers = peril_contributions(&breakdown.peril_scores);
    let impacts = structural_impacts(structural, breakdown);
    let narrative = narrative_summary(
        &drivers,
        breakdown.resilience_score,
        decision,
        data_quality,
    );
    Explainability {
        drivers,
        structural_impacts: impacts,
        narrative,
    }
}
