// perilgrid-core/src/core/underwriting.rs
// ============================================================================
// Module: Perilgrid Underwriting Entities
// Description: Underwriting rules and findings with lifecycle state.
// Purpose: Provide typed entities for predicate-based underwriting review.
// Dependencies: crate::core::{breach, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Underwriting rules evaluate structured predicates against location or
//! rollup records and raise [`UwFinding`] rows with the same
//! open/acked/resolved lifecycle as breaches. Location findings are keyed
//! per `(rule, exposure_version, location)`; rollup findings per
//! `(rule, exposure_version, rollup_key_hash)`.
//!
//! The underwriting decision types model the score- and peril-threshold
//! decision engine: an [`UnderwritingPolicy`] turns a resilience score,
//! worst-in-peril hazards, structural attributes, and a [`DataQuality`]
//! snapshot into an ACCEPT/DECLINE/REFER/NEEDS_DATA disposition with reason
//! codes, a confidence value, and mitigation recommendations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::breach::LifecycleStatus;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::RollupResultId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UwFindingId;
use crate::core::identifiers::UwRuleId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Record kind an underwriting rule evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UwTarget {
    /// Evaluate once per location record.
    Location,
    /// Evaluate once per rollup item record.
    Rollup,
}

impl UwTarget {
    /// Returns the stable wire string for this target.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "LOCATION",
            Self::Rollup => "ROLLUP",
        }
    }

    /// Parses a stable wire string into a target.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOCATION" => Some(Self::Location),
            "ROLLUP" => Some(Self::Rollup),
            _ => None,
        }
    }
}

/// Underwriting rule entity.
///
/// # Invariants
/// - `rule` carries `when: {all|any: [{field, op, value}]}` predicates and
///   an optional `then: {disposition, suggested_conditions}` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UwRule {
    /// Rule identifier.
    pub id: UwRuleId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Rule name.
    pub name: String,
    /// Rule category label.
    pub category: String,
    /// Severity label surfaced on findings.
    pub severity: String,
    /// Record kind the rule targets.
    pub target: UwTarget,
    /// Inactive rules are skipped by evaluation.
    pub active: bool,
    /// Predicate document.
    pub rule: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Decision Policy
// ============================================================================

/// Score- and peril-threshold policy driving underwriting dispositions.
///
/// # Invariants
/// - `score_accept_min > score_refer_min > decline_score_max` in any sane
///   policy; the evaluator applies thresholds in decline→refer→accept order
///   regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingPolicy {
    /// Minimum resilience score for ACCEPT.
    #[serde(default = "default_score_accept_min")]
    pub score_accept_min: i64,
    /// Minimum resilience score for REFER.
    #[serde(default = "default_score_refer_min")]
    pub score_refer_min: i64,
    /// Scores at or below this decline outright.
    #[serde(default = "default_decline_score_max")]
    pub decline_score_max: i64,
    /// Per-peril hazard scores at or above these decline outright.
    #[serde(default = "default_peril_decline_thresholds")]
    pub peril_decline_thresholds: BTreeMap<String, f64>,
    /// Per-peril hazard scores at or above these refer for review.
    #[serde(default = "default_peril_refer_thresholds")]
    pub peril_refer_thresholds: BTreeMap<String, f64>,
    /// Structural fields that must be present for ACCEPT.
    #[serde(default = "default_require_structural_fields")]
    pub require_structural_fields: Vec<String>,
    /// Maximum perils allowed to lack hazard data for ACCEPT.
    #[serde(default)]
    pub max_missing_perils_for_accept: u64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            score_accept_min: default_score_accept_min(),
            score_refer_min: default_score_refer_min(),
            decline_score_max: default_decline_score_max(),
            peril_decline_thresholds: default_peril_decline_thresholds(),
            peril_refer_thresholds: default_peril_refer_thresholds(),
            require_structural_fields: default_require_structural_fields(),
            max_missing_perils_for_accept: 0,
        }
    }
}

/// Returns the default ACCEPT score floor.
const fn default_score_accept_min() -> i64 {
    70
}

/// Returns the default REFER score floor.
const fn default_score_refer_min() -> i64 {
    40
}

/// Returns the default DECLINE score ceiling.
const fn default_decline_score_max() -> i64 {
    39
}

/// Returns the default per-peril decline thresholds.
fn default_peril_decline_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([("flood".to_string(), 0.90), ("wildfire".to_string(), 0.90)])
}

/// Returns the default per-peril refer thresholds.
fn default_peril_refer_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("flood".to_string(), 0.70),
        ("wildfire".to_string(), 0.70),
        ("wind".to_string(), 0.75),
        ("heat".to_string(), 0.80),
    ])
}

/// Returns the default required structural fields.
fn default_require_structural_fields() -> Vec<String> {
    vec!["roof_material".to_string()]
}

// ============================================================================
// SECTION: Decision Output
// ============================================================================

/// Underwriting disposition produced by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnderwritingDisposition {
    /// Bindable without referral.
    Accept,
    /// Declined outright.
    Decline,
    /// Referred for manual review.
    Refer,
    /// Decision requires more data.
    NeedsData,
}

impl UnderwritingDisposition {
    /// Returns the stable wire string for this disposition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Decline => "DECLINE",
            Self::Refer => "REFER",
            Self::NeedsData => "NEEDS_DATA",
        }
    }

    /// Parses a stable wire string into a disposition.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACCEPT" => Some(Self::Accept),
            "DECLINE" => Some(Self::Decline),
            "REFER" => Some(Self::Refer),
            "NEEDS_DATA" => Some(Self::NeedsData),
            _ => None,
        }
    }
}

/// Data-quality snapshot feeding the decision confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataQuality {
    /// Perils lacking a hazard score.
    #[serde(default)]
    pub peril_missing: Vec<String>,
    /// True when any peril fell back to the unknown-hazard score.
    #[serde(default)]
    pub used_unknown_hazard_fallback: bool,
    /// Enrichment state at scoring time (`ready`, `queued`, `failed`).
    #[serde(default)]
    pub enrichment_status: Option<String>,
    /// True when enrichment failed outright.
    #[serde(default)]
    pub enrichment_failed: bool,
    /// True when the caller requested best-effort scoring.
    #[serde(default)]
    pub best_effort: bool,
}

/// One mitigation recommendation attached to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitigationRecommendation {
    /// Stable recommendation code.
    pub code: String,
    /// Short display title.
    pub title: String,
    /// Actionable detail text.
    pub detail: String,
    /// Perils the recommendation mitigates.
    pub applies_to: Vec<String>,
}

/// Full underwriting decision output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    /// Disposition.
    pub decision: UnderwritingDisposition,
    /// Confidence in `[0, 1]`, rounded to two places.
    pub confidence: f64,
    /// Stable reason codes, first occurrence preserved.
    pub reason_codes: Vec<String>,
    /// Human-readable reasons matching the codes.
    pub reasons: Vec<String>,
    /// Mitigation recommendations for elevated perils and weak structure.
    pub mitigation_recommendations: Vec<MitigationRecommendation>,
    /// Effective policy snapshot the decision was made under.
    pub policy_used: UnderwritingPolicy,
}

// ============================================================================
// SECTION: Findings
// ============================================================================

/// Underwriting finding raised by a matching rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UwFinding {
    /// Finding identifier.
    pub id: UwFindingId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Raising rule.
    pub uw_rule_id: UwRuleId,
    /// Evaluated exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Matched location, for location-target rules.
    pub location_id: Option<LocationId>,
    /// Rollup result evaluated, when any.
    pub rollup_result_id: Option<RollupResultId>,
    /// Matched rollup key hash, for rollup-target rules.
    pub rollup_key_hash: Option<String>,
    /// Lifecycle status.
    pub status: LifecycleStatus,
    /// Disposition suggested by the rule's `then` block.
    pub disposition: String,
    /// Evaluation explanation with observed values and context.
    pub explanation: Value,
    /// First time the record matched.
    pub first_seen_at: Timestamp,
    /// Most recent time the record matched.
    pub last_seen_at: Timestamp,
    /// Time the finding was resolved; cleared on reopen.
    pub resolved_at: Option<Timestamp>,
    /// Run that last evaluated this finding.
    pub last_eval_run_id: Option<RunId>,
}
