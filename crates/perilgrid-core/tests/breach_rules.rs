// perilgrid-core/tests/breach_rules.rs
// ============================================================================
// Module: Breach Rule Evaluation Tests
// Description: Threshold predicate matching over rollup items.
// ============================================================================
//! ## Overview
//! Validates where-clause subset matching, numeric coercion with row skips,
//! every comparison operator, and the deterministic match ordering.

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

use perilgrid_core::ComparisonOp;
use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::RollupItem;
use perilgrid_core::RollupItemId;
use perilgrid_core::RollupResultId;
use perilgrid_core::TenantId;
use perilgrid_core::ThresholdRuleSpec;
use perilgrid_core::hashing::hash_canonical_json;
use perilgrid_core::stages::breach::evaluate_rule_on_items;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn item(key: Value, metrics: Value) -> RollupItem {
    let key_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &key).unwrap().value;
    RollupItem {
        id: RollupItemId::new(0),
        tenant_id: TenantId::new("t1"),
        rollup_result_id: RollupResultId::new(1),
        key,
        key_hash,
        metrics: metrics.as_object().cloned().unwrap_or_default(),
    }
}

fn rule(metric: &str, operator: ComparisonOp, value: Value, where_clause: Value) -> ThresholdRuleSpec {
    let r#where: BTreeMap<String, Value> = where_clause
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    ThresholdRuleSpec {
        metric: metric.to_string(),
        operator,
        value,
        r#where,
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Tests the canonical scenario: only the US/HIGH bucket over 100 matches.
#[test]
fn test_where_subset_and_threshold() {
    let items = vec![
        item(
            json!({"country": "US", "hazard_band": "HIGH"}),
            json!({"tiv_sum": 120.0}),
        ),
        item(
            json!({"country": "US", "hazard_band": "LOW"}),
            json!({"tiv_sum": 10.0}),
        ),
        item(
            json!({"country": "DE", "hazard_band": "HIGH"}),
            json!({"tiv_sum": 500.0}),
        ),
    ];
    let rule = rule("tiv_sum", ComparisonOp::Gt, json!(100), json!({"country": "US"}));
    let matches = evaluate_rule_on_items(&items, &rule).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(
        matches[0].rollup_key,
        json!({"country": "US", "hazard_band": "HIGH"})
    );
    assert!((matches[0].metric_value - 120.0).abs() < f64::EPSILON);
    assert!((matches[0].threshold_value - 100.0).abs() < f64::EPSILON);
}

/// Tests rows without a coercible metric are skipped.
#[test]
fn test_uncoercible_metric_skips_row() {
    let items = vec![
        item(json!({"country": "US"}), json!({"tiv_sum": "broken"})),
        item(json!({"country": "DE"}), json!({})),
        item(json!({"country": "FR"}), json!({"tiv_sum": "250"})),
    ];
    let rule = rule("tiv_sum", ComparisonOp::Gt, json!(100), json!({}));
    let matches = evaluate_rule_on_items(&items, &rule).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rollup_key, json!({"country": "FR"}));
}

/// Tests an uncoercible rule bound matches nothing.
#[test]
fn test_uncoercible_bound_matches_nothing() {
    let items = vec![item(json!({"country": "US"}), json!({"tiv_sum": 500.0}))];
    let rule = rule("tiv_sum", ComparisonOp::Gt, json!("banana"), json!({}));
    assert!(evaluate_rule_on_items(&items, &rule).unwrap().is_empty());
}

/// Tests every comparison operator.
#[test]
fn test_comparison_operators() {
    assert!(ComparisonOp::Eq.compare(5.0, 5.0));
    assert!(ComparisonOp::Ne.compare(5.0, 4.0));
    assert!(ComparisonOp::Lt.compare(4.0, 5.0));
    assert!(ComparisonOp::Le.compare(5.0, 5.0));
    assert!(ComparisonOp::Gt.compare(6.0, 5.0));
    assert!(ComparisonOp::Ge.compare(5.0, 5.0));
    assert!(!ComparisonOp::Gt.compare(5.0, 5.0));
}

/// Tests matches sort by the canonical JSON of their group key.
#[test]
fn test_matches_sorted_by_canonical_key() {
    let items = vec![
        item(json!({"country": "US"}), json!({"tiv_sum": 300.0})),
        item(json!({"country": "DE"}), json!({"tiv_sum": 200.0})),
        item(json!({"country": "FR"}), json!({"tiv_sum": 400.0})),
    ];
    let rule = rule("tiv_sum", ComparisonOp::Gt, json!(100), json!({}));
    let matches = evaluate_rule_on_items(&items, &rule).unwrap();
    let keys: Vec<String> = matches
        .iter()
        .map(|m| perilgrid_core::hashing::canonical_json_string(&m.rollup_key).unwrap())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
