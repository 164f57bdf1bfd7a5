// perilgrid-core/src/stages/rollup.rs
// ============================================================================
// Module: Perilgrid Rollup Aggregator
// Description: Filtered group-by aggregation with deterministic ordering.
// Purpose: Produce byte-stable rollup items and checksums.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! The aggregator filters enriched records (membership for list-valued
//! filters, equality otherwise), groups them by the dimension tuple, and
//! computes `count`/`sum` measures per group. Items are emitted sorted by
//! the canonical JSON of their group key and the result checksum hashes the
//! sorted `{rollup_key_json, metrics_json}` list, so item sets and
//! checksums are byte-identical across input permutations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::HashDigest;
use crate::core::HazardAttributes;
use crate::core::Location;
use crate::core::MeasureOp;
use crate::core::MeasureSpec;
use crate::core::hashing::canonical_json_string;
use crate::core::hashing::hash_canonical_json;
use crate::stages::EngineError;
use crate::stages::coerce_f64;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Builds the enriched aggregation record for one location.
///
/// Hazard attributes from the joined overlay contribute `hazard_band` and
/// `hazard_category`; absent values stay null so nullable dimensions group
/// correctly.
#[must_use]
pub fn record_for_location(
    location: &Location,
    attributes: Option<&HazardAttributes>,
) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(
        "external_location_id".to_string(),
        Value::String(location.external_location_id.clone()),
    );
    record.insert("country".to_string(), optional_string(location.country.as_deref()));
    record.insert(
        "state_region".to_string(),
        optional_string(location.state_region.as_deref()),
    );
    record.insert(
        "postal_code".to_string(),
        optional_string(location.postal_code.as_deref()),
    );
    record.insert("currency".to_string(), optional_string(location.currency.as_deref()));
    record.insert("lob".to_string(), optional_string(location.lob.as_deref()));
    record.insert(
        "product_code".to_string(),
        optional_string(location.product_code.as_deref()),
    );
    record.insert(
        "quality_tier".to_string(),
        optional_string(location.quality_tier.map(|tier| tier.as_str())),
    );
    record.insert(
        "hazard_band".to_string(),
        optional_string(attributes.and_then(|attrs| attrs.band.as_deref())),
    );
    record.insert(
        "hazard_category".to_string(),
        optional_string(attributes.and_then(|attrs| attrs.hazard_category.as_deref())),
    );
    record.insert("tiv".to_string(), optional_number(location.tiv));
    record.insert("limit".to_string(), optional_number(location.limit));
    record.insert("premium".to_string(), optional_number(location.premium));
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
// SECTION: Filtering
// ============================================================================

/// Returns true when the record passes every filter.
fn record_passes(record: &Map<String, Value>, filters: &BTreeMap<String, Value>) -> bool {
    for (key, expected) in filters {
        let actual = record.get(key).unwrap_or(&Value::Null);
        match expected {
            Value::Array(allowed) => {
                if !allowed.contains(actual) {
                    return false;
                }
            }
            scalar => {
                if actual != scalar {
                    return false;
                }
            }
        }
    }
    true
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// One emitted rollup row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupRow {
    /// Group key object (`dimension → value`).
    pub rollup_key_json: Value,
    /// Lowercase hex SHA-256 over the canonical JSON of the key.
    pub rollup_key_hash: String,
    /// Metric values for the group.
    pub metrics_json: Map<String, Value>,
}

/// Measure accumulator per group.
enum Accumulator {
    /// Row count.
    Count(u64),
    /// Numeric sum; invalid values accumulate as zero.
    Sum(f64),
}

/// Checksum payload entry: key plus metrics, without the hash.
#[derive(Debug, Serialize)]
struct ChecksumEntry<'a> {
    /// Group key object.
    rollup_key_json: &'a Value,
    /// Metric values.
    metrics_json: &'a Map<String, Value>,
}

/// Computes the rollup rows and result checksum.
///
/// # Errors
///
/// Returns [`EngineError`] when a group key cannot be canonicalized.
pub fn compute_rollup(
    records: &[Map<String, Value>],
    dimensions: &[String],
    measures: &[MeasureSpec],
    filters: &BTreeMap<String, Value>,
) -> Result<(Vec<RollupRow>, HashDigest), EngineError> {
    // Grouping keys on the canonical JSON string makes the map ordering the
    // emission ordering.
    let mut grouped: BTreeMap<String, (Value, BTreeMap<String, Accumulator>)> = BTreeMap::new();

    for record in records {
        if !record_passes(record, filters) {
            continue;
        }
        let mut key = Map::new();
        for dimension in dimensions {
            let value = record.get(dimension).cloned().unwrap_or(Value::Null);
            key.insert(dimension.clone(), value);
        }
        let key_value = Value::Object(key);
        let canonical_key = canonical_json_string(&key_value)?;
        let entry = grouped
            .entry(canonical_key)
            .or_insert_with(|| (key_value, BTreeMap::new()));

        for measure in measures {
            match measure.op {
                MeasureOp::Count => {
                    match entry.1.entry(measure.name.clone()).or_insert(Accumulator::Count(0)) {
                        Accumulator::Count(count) => *count += 1,
                        Accumulator::Sum(_) => {}
                    }
                }
                MeasureOp::Sum => {
                    let increment = measure
                        .field
                        .as_deref()
                        .and_then(|field| record.get(field))
                        .and_then(coerce_f64)
                        .unwrap_or(0.0);
                    match entry.1.entry(measure.name.clone()).or_insert(Accumulator::Sum(0.0)) {
                        Accumulator::Sum(sum) => *sum += increment,
                        Accumulator::Count(_) => {}
                    }
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(grouped.len());
    for (_, (key_value, accumulators)) in grouped {
        let mut metrics = Map::new();
        for (name, accumulator) in accumulators {
            let value = match accumulator {
                Accumulator::Count(count) => Value::from(count),
                Accumulator::Sum(sum) => optional_number(Some(sum)),
            };
            metrics.insert(name, value);
        }
        let key_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &key_value)?.value;
        rows.push(RollupRow {
            rollup_key_json: key_value,
            rollup_key_hash: key_hash,
            metrics_json: metrics,
        });
    }

    let checksum_entries: Vec<ChecksumEntry<'_>> = rows
        .iter()
        .map(|row| ChecksumEntry {
            rollup_key_json: &row.rollup_key_json,
            metrics_json: &row.metrics_json,
        })
        .collect();
    let checksum = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &checksum_entries)?;
    Ok((rows, checksum))
}
