// perilgrid-core/tests/underwriting.rs
// ============================================================================
// Module: Underwriting Predicate Tests
// Description: Structured predicate evaluation and explanations.
// ============================================================================
//! ## Overview
//! Validates predicate operators, dotted field paths, list-valued actuals
//! with membership semantics, all/any logic, and the evaluation
//! explanation's observed values.

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

use perilgrid_core::stages::underwriting::build_rollup_record;
use perilgrid_core::stages::underwriting::evaluate_rule;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn record(pairs: Value) -> Map<String, Value> {
    pairs.as_object().cloned().unwrap_or_default()
}

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Tests numeric comparison predicates under `all` logic.
#[test]
fn test_all_logic_numeric_comparison() {
    let rule = json!({
        "when": {"all": [
            {"field": "tiv", "op": ">", "value": 100},
            {"field": "country", "op": "==", "value": "US"},
        ]}
    });
    let (matched, explanation) =
        evaluate_rule(&rule, &record(json!({"tiv": 250, "country": "US"})));
    assert!(matched);
    assert_eq!(explanation.get("logic"), Some(&json!("all")));

    let (matched, _) = evaluate_rule(&rule, &record(json!({"tiv": 50, "country": "US"})));
    assert!(!matched);
}

/// Tests `any` logic matches when one predicate holds.
#[test]
fn test_any_logic() {
    let rule = json!({
        "when": {"any": [
            {"field": "quality_tier", "op": "==", "value": "C"},
            {"field": "tiv", "op": ">", "value": 1_000_000},
        ]}
    });
    let (matched, _) =
        evaluate_rule(&rule, &record(json!({"quality_tier": "C", "tiv": 10})));
    assert!(matched);
    let (matched, _) =
        evaluate_rule(&rule, &record(json!({"quality_tier": "A", "tiv": 10})));
    assert!(!matched);
}

/// Tests an empty `all` clause never matches.
#[test]
fn test_empty_all_never_matches() {
    let rule = json!({"when": {"all": []}});
    let (matched, _) = evaluate_rule(&rule, &record(json!({"tiv": 10})));
    assert!(!matched);
}

/// Tests list-valued actuals use membership semantics.
#[test]
fn test_list_valued_actual_membership() {
    let rule = json!({
        "when": {"all": [
            {"field": "hazard_band", "op": "in", "value": ["HIGH", "SEVERE"]},
        ]}
    });
    let (matched, _) =
        evaluate_rule(&rule, &record(json!({"hazard_band": ["LOW", "HIGH"]})));
    assert!(matched);
    let (matched, _) = evaluate_rule(&rule, &record(json!({"hazard_band": ["LOW"]})));
    assert!(!matched);
}

/// Tests the `exists` operator on lists, strings, and nulls.
#[test]
fn test_exists_operator() {
    let rule = json!({"when": {"all": [{"field": "hazard_band", "op": "exists"}]}});
    let (matched, _) = evaluate_rule(&rule, &record(json!({"hazard_band": ["HIGH"]})));
    assert!(matched);
    let (matched, _) = evaluate_rule(&rule, &record(json!({"hazard_band": []})));
    assert!(!matched);
    let (matched, _) = evaluate_rule(&rule, &record(json!({"hazard_band": null})));
    assert!(!matched);
}

/// Tests dotted paths reach nested rollup metrics.
#[test]
fn test_dotted_path_into_rollup_metrics() {
    let rollup_record = build_rollup_record(
        &json!({"country": "US"}),
        &record(json!({"tiv_sum": 500.0})),
    );
    let rule = json!({
        "when": {"all": [{"field": "rollup.tiv_sum", "op": ">=", "value": 500}]}
    });
    let (matched, explanation) = evaluate_rule(&rule, &rollup_record);
    assert!(matched);
    assert_eq!(
        explanation.get("observed").and_then(|o| o.get("rollup.tiv_sum")),
        Some(&json!(500.0))
    );
}

/// Tests observed values report sorted-unique lists.
#[test]
fn test_observed_values_sorted_unique() {
    let rule = json!({
        "when": {"all": [{"field": "hazard_band", "op": "in", "value": ["HIGH"]}]}
    });
    let (_, explanation) = evaluate_rule(
        &rule,
        &record(json!({"hazard_band": ["HIGH", "LOW", "HIGH"]})),
    );
    let observed = explanation
        .get("observed")
        .and_then(|o| o.get("hazard_band"))
        .cloned()
        .unwrap();
    assert_eq!(observed, json!(["HIGH", "LOW"]));
}
