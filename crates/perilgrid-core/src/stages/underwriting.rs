// perilgrid-core/src/stages/underwriting.rs
// ============================================================================
// Module: Perilgrid Underwriting Predicates
// Description: Structured predicate evaluation over location/rollup records.
// Purpose: Produce explainable underwriting rule matches.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Underwriting rules carry `when: {all|any: [{field, op, value}]}`
//! predicates evaluated against flat records built from locations (with
//! their overlay hazard bands/categories) or rollup items. Fields support
//! dotted paths; list-valued actuals use membership semantics and are
//! reported sorted-unique. Every evaluation returns an explanation with the
//! per-predicate observations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use serde_json::json;

use crate::core::HazardAttributes;
use crate::core::Location;
use crate::core::UwRule;
use crate::stages::coerce_f64;

// ============================================================================
// SECTION: Field Access
// ============================================================================

/// Resolves a dotted field path against a record.
fn field_value(record: &Map<String, Value>, field: &str) -> Value {
    if !field.contains('.') {
        return record.get(field).cloned().unwrap_or(Value::Null);
    }
    let mut current = Value::Object(record.clone());
    for part in field.split('.') {
        let Value::Object(map) = current else {
            return Value::Null;
        };
        current = map.get(part).cloned().unwrap_or(Value::Null);
    }
    current
}

/// Sorts and dedups a list value by string form, dropping nulls.
fn sorted_unique(values: &[Value]) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let mut items: Vec<&Value> =
        values.iter().filter(|value| !value.is_null()).collect();
    items.sort_by_key(|value| value.to_string());
    for value in items {
        if seen.insert(value.to_string()) {
            out.push(value.clone());
        }
    }
    out
}

// ============================================================================
// SECTION: Predicate Evaluation
// ============================================================================

/// Compares a scalar actual against the expected value.
fn compare_scalar(actual: &Value, op: &str, expected: &Value) -> bool {
    match op {
        "==" => actual == expected,
        "!=" => actual != expected,
        "in" => expected
            .as_array()
            .is_some_and(|allowed| allowed.contains(actual)),
        "not_in" => expected
            .as_array()
            .is_none_or(|denied| !denied.contains(actual)),
        ">" | ">=" | "<" | "<=" => {
            let (Some(actual_num), Some(expected_num)) =
                (coerce_f64(actual), coerce_f64(expected))
            else {
                return false;
            };
            match op {
                ">" => actual_num > expected_num,
                ">=" => actual_num >= expected_num,
                "<" => actual_num < expected_num,
                _ => actual_num <= expected_num,
            }
        }
        _ => false,
    }
}

/// Evaluates one predicate and returns its explanation entry.
#[must_use]
pub fn evaluate_predicate(predicate: &Value, record: &Map<String, Value>) -> Value {
    let field = predicate.get("field").and_then(Value::as_str).unwrap_or_default();
    let op = predicate.get("op").and_then(Value::as_str).unwrap_or_default();
    let expected = predicate.get("value").cloned().unwrap_or(Value::Null);
    let actual = field_value(record, field);

    let matched = if op == "exists" {
        match &actual {
            Value::Array(items) => !items.is_empty(),
            Value::Null => false,
            Value::String(text) => !text.is_empty(),
            _ => true,
        }
    } else if let Value::Array(items) = &actual {
        let uniques = sorted_unique(items);
        match op {
            "in" => {
                let allowed = expected.as_array().cloned().unwrap_or_default();
                uniques.iter().any(|item| allowed.contains(item))
            }
            "not_in" => {
                let denied = expected.as_array().cloned().unwrap_or_default();
                uniques.iter().all(|item| !denied.contains(item))
            }
            "==" => match &expected {
                Value::Array(allowed) => uniques.iter().any(|item| allowed.contains(item)),
                scalar => uniques.iter().any(|item| item == scalar),
            },
            "!=" => match &expected {
                Value::Array(denied) => uniques.iter().all(|item| !denied.contains(item)),
                scalar => uniques.iter().all(|item| item != scalar),
            },
            _ => false,
        }
    } else {
        compare_scalar(&actual, op, &expected)
    };

    let reported_actual = match &actual {
        Value::Array(items) => Value::Array(sorted_unique(items)),
        other => other.clone(),
    };
    json!({
        "field": field,
        "op": op,
        "expected": expected,
        "actual": reported_actual,
        "matched": matched,
    })
}

/// Evaluates a rule document against a record.
///
/// Returns the match flag plus an explanation carrying the logic mode,
/// per-predicate entries, and first-observed values per field.
#[must_use]
pub fn evaluate_rule(rule_json: &Value, record: &Map<String, Value>) -> (bool, Value) {
    let when = rule_json.get("when").cloned().unwrap_or_else(|| json!({}));
    let (logic, clauses) = if let Some(all) = when.get("all") {
        ("all", all.as_array().cloned().unwrap_or_default())
    } else if let Some(any) = when.get("any") {
        ("any", any.as_array().cloned().unwrap_or_default())
    } else {
        ("none", Vec::new())
    };

    let predicates: Vec<Value> = clauses
        .iter()
        .map(|predicate| evaluate_predicate(predicate, record))
        .collect();
    let matched = match logic {
        "all" => {
            !predicates.is_empty()
                && predicates
                    .iter()
                    .all(|p| p.get("matched").and_then(Value::as_bool).unwrap_or(false))
        }
        "any" => predicates
            .iter()
            .any(|p| p.get("matched").and_then(Value::as_bool).unwrap_or(false)),
        _ => false,
    };

    let mut observed = Map::new();
    for predicate in &predicates {
        let Some(field) = predicate.get("field").and_then(Value::as_str) else {
            continue;
        };
        if field.is_empty() || observed.contains_key(field) {
            continue;
        }
        observed.insert(
            field.to_string(),
            predicate.get("actual").cloned().unwrap_or(Value::Null),
        );
    }

    let explanation = json!({
        "logic": logic,
        "predicates": predicates,
        "observed": observed,
    });
    (matched, explanation)
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Builds the evaluation record for one location and its hazard attributes.
#[must_use]
pub fn build_location_record(
    location: &Location,
    hazard_attributes: &[HazardAttributes],
) -> Map<String, Value> {
    let bands: Vec<Value> = hazard_attributes
        .iter()
        .filter_map(|attrs| attrs.band.clone())
        .map(Value::String)
        .collect();
    let categories: Vec<Value> = hazard_attributes
        .iter()
        .filter_map(|attrs| attrs.hazard_category.clone())
        .map(Value::String)
        .collect();

    let mut record = Map::new();
    record.insert("location_id".to_string(), Value::from(location.id.value()));
    record.insert(
        "external_location_id".to_string(),
        Value::String(location.external_location_id.clone()),
    );
    record.insert("tiv".to_string(), optional_number(location.tiv));
    record.insert("country".to_string(), optional_string(location.country.as_deref()));
    record.insert(
        "state_region".to_string(),
        optional_string(location.state_region.as_deref()),
    );
    record.insert(
        "postal_code".to_string(),
        optional_string(location.postal_code.as_deref()),
    );
    record.insert("lob".to_string(), optional_string(location.lob.as_deref()));
    record.insert(
        "product_code".to_string(),
        optional_string(location.product_code.as_deref()),
    );
    record.insert("currency".to_string(), optional_string(location.currency.as_deref()));
    record.insert(
        "quality_tier".to_string(),
        optional_string(location.quality_tier.map(|tier| tier.as_str())),
    );
    record.insert(
        "geocode_confidence".to_string(),
        optional_number(location.geocode_confidence),
    );
    record.insert("hazard_band".to_string(), Value::Array(sorted_unique(&bands)));
    record.insert(
        "hazard_category".to_string(),
        Value::Array(sorted_unique(&categories)),
    );
    record
}

/// Builds the evaluation record for one rollup item.
#[must_use]
pub fn build_rollup_record(key: &Value, metrics: &Map<String, Value>) -> Map<String, Value> {
    let mut record = Map::new();
    if let Value::Object(key_map) = key {
        for (field, value) in key_map {
            record.insert(field.clone(), value.clone());
        }
    }
    record.insert("rollup".to_string(), Value::Object(metrics.clone()));
    record
}

/// Wraps an optional string as a JSON value.
fn optional_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::String(text.to_string()))
}

/// Wraps an optional float as a JSON value.
fn optional_number(value: Option<f64>) -> Value {
    value.and_then(Number::from_f64).map_or(Value::Null, Value::Number)
}

// ============================================================================
// SECTION: Rule Metadata
// ============================================================================

/// Returns the disposition from the rule's `then` block.
#[must_use]
pub fn rule_disposition(rule_json: &Value) -> String {
    rule_json
        .get("then")
        .and_then(|then| then.get("disposition"))
        .and_then(Value::as_str)
        .unwrap_or("NONE")
        .to_string()
}

/// Builds the persisted explanation for a matched rule.
#[must_use]
pub fn build_explanation(
    rule: &UwRule,
    record: &Map<String, Value>,
    evaluation: &Value,
) -> Value {
    let context_fields = [
        "tiv",
        "country",
        "state_region",
        "postal_code",
        "lob",
        "product_code",
        "currency",
        "quality_tier",
        "geocode_confidence",
        "hazard_band",
        "hazard_category",
    ];
    let mut context = Map::new();
    for field in context_fields {
        if let Some(value) = record.get(field) {
            context.insert(field.to_string(), value.clone());
        }
    }
    if let Some(rollup) = record.get("rollup") {
        context.insert("rollup".to_string(), rollup.clone());
    }
    json!({
        "rule_id": rule.id,
        "rule_name": rule.name,
        "category": rule.category,
        "severity": rule.severity,
        "target": rule.target,
        "disposition": rule_disposition(&rule.rule),
        "evaluation": evaluation,
        "observed": evaluation.get("observed").cloned().unwrap_or_else(|| json!({})),
        "context": context,
    })
}
