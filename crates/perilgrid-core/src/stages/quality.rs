// perilgrid-core/src/stages/quality.rs
// ============================================================================
// Module: Perilgrid Geocode Quality Scoring
// Description: Completeness, geocode, and financial sanity scoring.
// Purpose: Assign deterministic quality tiers to locations.
// Dependencies: crate::core::exposure
// ============================================================================

//! ## Overview
//! Quality scoring folds address completeness, geocode confidence, and
//! financial sanity into an overall score and a tier. Tier A requires
//! overall ≥ 85 with geocode ≥ 80; tier B requires overall ≥ 70 with
//! geocode ≥ 60; everything else is tier C.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::QualityTier;

// ============================================================================
// SECTION: Scores
// ============================================================================

/// Quality scoring outcome for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScores {
    /// Address and financial completeness score.
    pub completeness_score: i64,
    /// Geocode confidence score (confidence × 100).
    pub geocode_score: i64,
    /// Financial sanity score.
    pub financial_sanity_score: i64,
    /// Mean of the three component scores.
    pub overall_score: i64,
    /// Assigned tier.
    pub quality_tier: QualityTier,
    /// Reason codes explaining deductions.
    pub reasons: Vec<String>,
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Scores one location's quality inputs.
#[must_use]
pub fn quality_scores(
    address_line1: Option<&str>,
    tiv: Option<f64>,
    geocode_confidence: Option<f64>,
) -> QualityScores {
    let mut completeness: i64 = 100;
    let mut reasons = Vec::new();
    if address_line1.is_none_or(|value| value.trim().is_empty()) {
        completeness -= 20;
        reasons.push("MISSING_ADDRESS".to_string());
    }
    if tiv.is_none() {
        completeness -= 30;
        reasons.push("MISSING_TIV".to_string());
    }

    let confidence = geocode_confidence.unwrap_or(0.0);
    let geocode_score = crate::stages::round_score(confidence * 100.0);
    let financial_sanity = match tiv {
        Some(value) if value >= 0.0 => 100,
        _ => 60,
    };
    let overall = (completeness + geocode_score + financial_sanity) / 3;

    let tier = if overall >= 85 && geocode_score >= 80 {
        QualityTier::A
    } else if overall >= 70 && geocode_score >= 60 {
        QualityTier::B
    } else {
        QualityTier::C
    };
    if confidence < 0.6 {
        reasons.push("LOW_GEOCODE_CONFIDENCE".to_string());
    }

    QualityScores {
        completeness_score: completeness,
        geocode_score,
        financial_sanity_score: financial_sanity,
        overall_score: overall,
        quality_tier: tier,
        reasons,
    }
}
