// perilgrid-core/src/core/breach.rs
// ============================================================================
// Module: Perilgrid Threshold Rules & Breaches
// Description: Threshold rule predicates and the breach lifecycle.
// Purpose: Provide typed entities for rule evaluation across rollup results.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A [`ThresholdRule`] compares one rollup metric against a bound for every
//! item whose group key is a superset of the rule's `where` clause. Matches
//! open or refresh [`Breach`] rows keyed by
//! `(tenant, rule, exposure_version, rollup_key_hash)`; keys that stop
//! matching are resolved, and re-matching reopens them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::BreachId;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::RollupResultId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::ThresholdRuleId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Comparison Operators
// ============================================================================

/// Comparison operator in a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal.
    #[serde(rename = "==")]
    Eq,
    /// Not equal.
    #[serde(rename = "!=")]
    Ne,
    /// Less than.
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "<=")]
    Le,
    /// Greater than.
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    Ge,
}

impl ComparisonOp {
    /// Applies the operator to two numeric values.
    #[must_use]
    pub fn compare(self, actual: f64, bound: f64) -> bool {
        match self {
            Self::Eq => (actual - bound).abs() < f64::EPSILON,
            Self::Ne => (actual - bound).abs() >= f64::EPSILON,
            Self::Lt => actual < bound,
            Self::Le => actual <= bound,
            Self::Gt => actual > bound,
            Self::Ge => actual >= bound,
        }
    }
}

// ============================================================================
// SECTION: Threshold Rules
// ============================================================================

/// Predicate body of a threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRuleSpec {
    /// Metric name read from rollup item metrics.
    pub metric: String,
    /// Comparison operator.
    pub operator: ComparisonOp,
    /// Bound value; coerced numerically, mismatches skip the row.
    pub value: Value,
    /// Group-key subset the item key must contain.
    #[serde(default)]
    pub r#where: BTreeMap<String, Value>,
}

/// Threshold rule entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Rule identifier.
    pub id: ThresholdRuleId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Rule name.
    pub name: String,
    /// Severity label surfaced on breaches.
    pub severity: String,
    /// Inactive rules are skipped by evaluation.
    pub active: bool,
    /// Predicate body.
    pub rule: ThresholdRuleSpec,
    /// Creating user, when known.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Lifecycle Status
// ============================================================================

/// Open/acked/resolved lifecycle shared by breaches and underwriting findings.
///
/// # Invariants
/// - Transitions are strictly `OPEN→ACKED`, `OPEN→RESOLVED`,
///   `ACKED→RESOLVED`, and `RESOLVED→OPEN` (reopen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// Currently violating.
    Open,
    /// Acknowledged by an operator, still violating.
    Acked,
    /// No longer violating.
    Resolved,
}

impl LifecycleStatus {
    /// Returns the stable wire string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Acked => "ACKED",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Parses a stable wire string into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(Self::Open),
            "ACKED" => Some(Self::Acked),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Returns true when the transition to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Open => matches!(next, Self::Acked | Self::Resolved),
            Self::Acked => matches!(next, Self::Resolved),
            Self::Resolved => matches!(next, Self::Open),
        }
    }
}

// ============================================================================
// SECTION: Breaches
// ============================================================================

/// Breach of a threshold rule by one rollup group key.
///
/// # Invariants
/// - `(tenant, threshold_rule, exposure_version, rollup_key_hash)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    /// Breach identifier.
    pub id: BreachId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Violated rule.
    pub threshold_rule_id: ThresholdRuleId,
    /// Exposure version the rollup aggregated.
    pub exposure_version_id: ExposureVersionId,
    /// Rollup result that most recently evaluated the key.
    pub rollup_result_id: RollupResultId,
    /// Violating group key object.
    pub rollup_key: Value,
    /// Lowercase hex SHA-256 over the canonical JSON of `rollup_key`.
    pub rollup_key_hash: String,
    /// Metric name evaluated.
    pub metric_name: String,
    /// Most recently observed metric value.
    pub metric_value: f64,
    /// Rule bound at the last evaluation.
    pub threshold_value: f64,
    /// Lifecycle status.
    pub status: LifecycleStatus,
    /// First time the key matched.
    pub first_seen_at: Timestamp,
    /// Most recent time the key matched.
    pub last_seen_at: Timestamp,
    /// Time the breach was resolved; cleared on reopen.
    pub resolved_at: Option<Timestamp>,
    /// Run that last evaluated this breach.
    pub last_eval_run_id: Option<RunId>,
}
