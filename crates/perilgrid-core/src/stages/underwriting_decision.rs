// perilgrid-core/src/stages/underwriting_decision.rs
// ============================================================================
// Module: Perilgrid Underwriting Decision Engine
// Description: Score/peril thresholds to ACCEPT/DECLINE/REFER/NEEDS_DATA.
// Purpose: Produce explainable dispositions with mitigation guidance.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The decision engine applies the policy in strict decline → refer →
//! needs-data → accept order: an enrichment failure under best-effort needs
//! data immediately; scores at or below the decline ceiling (or any peril
//! at or above its decline threshold) decline; scores below the accept
//! floor (or any peril at or above its refer threshold) refer; too many
//! missing perils or absent required structural fields need data; anything
//! left accepts. Confidence starts at 1.0 and loses 0.15 for the
//! unknown-hazard fallback, 0.10 for missing required structural fields,
//! and 0.10 for queued/failed enrichment; below 0.7 the decision carries a
//! LOW_CONFIDENCE_DATA code. Mitigation recommendations fire on elevated
//! wildfire/flood/wind hazards and on weak or unverified structure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::DataQuality;
use crate::core::HazardEntry;
use crate::core::MitigationRecommendation;
use crate::core::StructuralAttributes;
use crate::core::UnderwritingDecision;
use crate::core::UnderwritingDisposition;
use crate::core::UnderwritingPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Roof materials the scorer recognises.
const KNOWN_ROOF_MATERIALS: [&str; 4] = ["metal", "tile", "asphalt_shingle", "wood_shake"];
/// Roof materials considered weak against wind.
const WEAK_ROOF_MATERIALS: [&str; 1] = ["wood_shake"];
/// Wildfire hazard score that triggers the defensible-space recommendation.
const WILDFIRE_MITIGATION_SCORE: f64 = 0.70;
/// Flood hazard score that triggers the flood-resilience recommendation.
const FLOOD_MITIGATION_SCORE: f64 = 0.70;
/// Wind hazard score that triggers the roof-hardening recommendation.
const WIND_MITIGATION_SCORE: f64 = 0.75;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the numeric score of one peril's worst-in-peril entry.
fn peril_score(hazards: &BTreeMap<String, HazardEntry>, peril: &str) -> Option<f64> {
    hazards.get(peril).and_then(|entry| entry.score)
}

/// Returns true when a named required structural field is present.
///
/// Unknown field names count as missing so misconfigured policies fail
/// closed into NEEDS_DATA rather than accepting blind.
fn structural_field_present(structural: &StructuralAttributes, field: &str) -> bool {
    match field {
        "roof_material" => structural.roof_material.is_some(),
        "elevation_m" => structural.elevation_m.is_some(),
        "vegetation_proximity_m" => structural.vegetation_proximity_m.is_some(),
        _ => false,
    }
}

/// Deduplicates while preserving first occurrence.
fn unique_preserve(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Rounds to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// SECTION: Confidence
// ============================================================================

/// Computes the decision confidence from the data-quality penalties.
fn compute_confidence(
    used_unknown_fallback: bool,
    required_missing: &[String],
    enrichment_status: Option<&str>,
) -> f64 {
    let mut confidence: f64 = 1.0;
    if used_unknown_fallback {
        confidence -= 0.15;
    }
    if !required_missing.is_empty() {
        confidence -= 0.10;
    }
    if matches!(enrichment_status, Some("queued" | "failed")) {
        confidence -= 0.10;
    }
    round2(confidence.clamp(0.0, 1.0))
}

// ============================================================================
// SECTION: Mitigation
// ============================================================================

/// Builds the mitigation recommendations for elevated perils and weak or
/// unverified structure.
#[must_use]
pub fn mitigation_recommendations(
    hazards: &BTreeMap<String, HazardEntry>,
    structural: &StructuralAttributes,
) -> Vec<MitigationRecommendation> {
    let mut recommendations = Vec::new();

    let wildfire = peril_score(hazards, "wildfire");
    let vegetation_close =
        structural.vegetation_proximity_m.is_some_and(|value| value <= 30.0);
    if wildfire.is_some_and(|score| score >= WILDFIRE_MITIGATION_SCORE) || vegetation_close {
        recommendations.push(MitigationRecommendation {
            code: "MIT_WILDFIRE_DEFENSIBLE_SPACE".to_string(),
            title: "Improve defensible space".to_string(),
            detail: "Create defensible space and manage nearby vegetation within 30 meters."
                .to_string(),
            applies_to: vec!["wildfire".to_string()],
        });
    }

    let flood = peril_score(hazards, "flood");
    let elevation_low_or_unknown =
        structural.elevation_m.is_none_or(|value| value <= 5.0);
    if flood.is_some_and(|score| score >= FLOOD_MITIGATION_SCORE) || elevation_low_or_unknown
    {
        recommendations.push(MitigationRecommendation {
            code: "MIT_FLOOD_ELEVATION_DRAINAGE".to_string(),
            title: "Improve flood resilience".to_string(),
            detail: "Consider flood vents, elevation verification, and drainage improvements."
                .to_string(),
            applies_to: vec!["flood".to_string()],
        });
    }

    let wind = peril_score(hazards, "wind");
    let roof = structural.roof_material.as_deref();
    let roof_unknown = roof.is_none_or(|value| !KNOWN_ROOF_MATERIALS.contains(&value));
    let roof_weak = roof.is_some_and(|value| WEAK_ROOF_MATERIALS.contains(&value));
    if wind.is_some_and(|score| score >= WIND_MITIGATION_SCORE) || roof_unknown || roof_weak {
        recommendations.push(MitigationRecommendation {
            code: "MIT_WIND_ROOF_HARDENING".to_string(),
            title: "Harden roof against wind".to_string(),
            detail: "Inspect roof, add tie-downs, and verify fastening for wind resilience."
                .to_string(),
            applies_to: vec!["wind".to_string()],
        });
    }

    recommendations
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates the underwriting decision for one scored property.
#[must_use]
#[allow(
    clippy::too_many_lines,
    reason = "The decline→refer→needs-data→accept ladder reads best as one linear flow."
)]
pub fn evaluate_underwriting_decision(
    resilience_score: i64,
    hazards: &BTreeMap<String, HazardEntry>,
    structural: &StructuralAttributes,
    data_quality: &DataQuality,
    policy: &UnderwritingPolicy,
) -> UnderwritingDecision {
    let mut reason_codes = Vec::new();
    let mut reasons = Vec::new();
    let mut decision: Option<UnderwritingDisposition> = None;

    if data_quality.enrichment_failed && data_quality.best_effort {
        reason_codes.push("ENRICHMENT_FAILED".to_string());
        reasons.push("Property enrichment failed; decision needs more data.".to_string());
        decision = Some(UnderwritingDisposition::NeedsData);
    }

    if decision.is_none() {
        if resilience_score <= policy.decline_score_max {
            reason_codes.push("SCORE_LOW_DECLINE".to_string());
            reasons.push("Resilience score is below decline threshold.".to_string());
            decision = Some(UnderwritingDisposition::Decline);
        } else {
            for (peril, threshold) in &policy.peril_decline_thresholds {
                let Some(score) = peril_score(hazards, peril) else {
                    continue;
                };
                if score >= *threshold {
                    reason_codes.push(format!(
                        "PERIL_HIGH_DECLINE_{}",
                        peril.to_uppercase()
                    ));
                    reasons.push(format!("{peril} hazard exceeds decline threshold."));
                    decision = Some(UnderwritingDisposition::Decline);
                    break;
                }
            }
        }
    }

    if decision.is_none() {
        if resilience_score < policy.score_accept_min {
            reason_codes.push("SCORE_MEDIUM_REFER".to_string());
            reasons.push("Resilience score is below accept threshold.".to_string());
            decision = Some(UnderwritingDisposition::Refer);
        } else {
            for (peril, threshold) in &policy.peril_refer_thresholds {
                let Some(score) = peril_score(hazards, peril) else {
                    continue;
                };
                if score >= *threshold {
                    reason_codes.push(format!(
                        "PERIL_ELEVATED_REFER_{}",
                        peril.to_uppercase()
                    ));
                    reasons.push(format!("{peril} hazard exceeds refer threshold."));
                    decision = Some(UnderwritingDisposition::Refer);
                    break;
                }
            }
        }
    }

    let required_missing: Vec<String> = policy
        .require_structural_fields
        .iter()
        .filter(|field| !structural_field_present(structural, field))
        .cloned()
        .collect();

    if decision.is_none() {
        let missing_count = data_quality.peril_missing.len() as u64;
        if missing_count > policy.max_missing_perils_for_accept || !required_missing.is_empty()
        {
            if missing_count > policy.max_missing_perils_for_accept {
                reason_codes.push("MISSING_PERIL_DATA".to_string());
                reasons.push("Missing hazard data for required perils.".to_string());
            }
            for field in &required_missing {
                reason_codes
                    .push(format!("STRUCTURAL_MISSING_{}", field.to_uppercase()));
                reasons.push(format!("Missing required structural field: {field}."));
            }
            decision = Some(UnderwritingDisposition::NeedsData);
        }
    }

    let decision = decision.unwrap_or(UnderwritingDisposition::Accept);

    let confidence = compute_confidence(
        data_quality.used_unknown_hazard_fallback,
        &required_missing,
        data_quality.enrichment_status.as_deref(),
    );
    if confidence < 0.7 {
        reason_codes.push("LOW_CONFIDENCE_DATA".to_string());
        reasons.push("Confidence is reduced due to data gaps.".to_string());
    }

    UnderwritingDecision {
        decision,
        confidence,
        reason_codes: unique_preserve(reason_codes),
        reasons: unique_preserve(reasons),
        mitigation_recommendations: mitigation_recommendations(hazards, structural),
        policy_used: policy.clone(),
    }
}
