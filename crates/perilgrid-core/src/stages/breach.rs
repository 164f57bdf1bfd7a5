// perilgrid-core/src/stages/breach.rs
// ============================================================================
// Module: Perilgrid Breach Rule Evaluation
// Description: Threshold predicate evaluation over rollup items.
// Purpose: Produce deterministic rule match sets for the breach lifecycle.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! A threshold rule matches every rollup item whose group key contains the
//! rule's `where` entries and whose metric, coerced numerically, satisfies
//! the comparison. Rows whose metric or bound fails numeric coercion are
//! skipped. Matches are sorted by the canonical JSON of their group key so
//! upsert order is deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::HashError;
use crate::core::RollupItem;
use crate::core::ThresholdRuleSpec;
use crate::core::hashing::canonical_json_string;
use crate::stages::coerce_f64;

// ============================================================================
// SECTION: Matches
// ============================================================================

/// One rollup item matched by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Violating group key object.
    pub rollup_key: Value,
    /// Key hash carried from the item.
    pub rollup_key_hash: String,
    /// Coerced metric value observed.
    pub metric_value: f64,
    /// Coerced rule bound.
    pub threshold_value: f64,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Returns true when the item key contains every `where` entry.
fn key_matches_where(key: &Value, rule: &ThresholdRuleSpec) -> bool {
    let Some(key_map) = key.as_object() else {
        return rule.r#where.is_empty();
    };
    rule.r#where
        .iter()
        .all(|(field, expected)| key_map.get(field).unwrap_or(&Value::Null) == expected)
}

/// Evaluates one rule over the items of a rollup result.
///
/// # Errors
///
/// Returns [`HashError`] when a group key cannot be canonicalized for the
/// deterministic match ordering.
pub fn evaluate_rule_on_items(
    items: &[RollupItem],
    rule: &ThresholdRuleSpec,
) -> Result<Vec<RuleMatch>, HashError> {
    let Some(bound) = coerce_f64(&rule.value) else {
        return Ok(Vec::new());
    };
    let mut matches = Vec::new();
    for item in items {
        if !key_matches_where(&item.key, rule) {
            continue;
        }
        let Some(metric_value) = item.metrics.get(&rule.metric).and_then(coerce_f64) else {
            continue;
        };
        if rule.operator.compare(metric_value, bound) {
            matches.push(RuleMatch {
                rollup_key: item.key.clone(),
                rollup_key_hash: item.key_hash.clone(),
                metric_value,
                threshold_value: bound,
            });
        }
    }
    let mut keyed: Vec<(String, RuleMatch)> = Vec::with_capacity(matches.len());
    for matched in matches {
        let canonical = canonical_json_string(&matched.rollup_key)?;
        keyed.push((canonical, matched));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, matched)| matched).collect())
}
