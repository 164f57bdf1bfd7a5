// perilgrid-core/src/stages/drift.rs
// ============================================================================
// Module: Perilgrid Drift Engine
// Description: Classified diff between two exposure versions.
// Purpose: Produce deterministic drift details and artifacts.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Drift indexes both location sets by `external_location_id` and classifies
//! every key as NEW (only in B), REMOVED (only in A), or MODIFIED (changed
//! compare fields). Monetary compare fields carry a numeric `delta`.
//! Details sort by `(classification, external_location_id)` and serialize
//! into a canonical checksummed artifact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use serde_json::json;

use crate::core::COMPARE_FIELDS;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::DriftClassification;
use crate::core::DriftSummary;
use crate::core::HashDigest;
use crate::core::Location;
use crate::core::NUMERIC_DELTA_FIELDS;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::stages::EngineError;
use crate::stages::coerce_f64;

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

/// One classified drift detail before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftDetailDraft {
    /// External location key.
    pub external_location_id: String,
    /// Classification of the key.
    pub classification: DriftClassification,
    /// Before/after snapshots and per-field changes.
    pub delta_json: Value,
}

/// Full drift comparison outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftOutcome {
    /// Aggregate counts.
    pub summary: DriftSummary,
    /// Sorted detail drafts.
    pub details: Vec<DriftDetailDraft>,
    /// Canonical artifact bytes (the serialized detail list).
    pub artifact: Vec<u8>,
    /// Checksum over the artifact bytes.
    pub checksum: HashDigest,
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Projects a location onto the compare fields.
fn snapshot(location: &Location) -> Map<String, Value> {
    let mut map = Map::new();
    for field in COMPARE_FIELDS {
        let value = match field {
            "external_location_id" => {
                Value::String(location.external_location_id.clone())
            }
            "address_line1" => optional_string(location.address_line1.as_deref()),
            "city" => optional_string(location.city.as_deref()),
            "state_region" => optional_string(location.state_region.as_deref()),
            "postal_code" => optional_string(location.postal_code.as_deref()),
            "country" => optional_string(location.country.as_deref()),
            "latitude" => optional_number(location.latitude),
            "longitude" => optional_number(location.longitude),
            "currency" => optional_string(location.currency.as_deref()),
            "lob" => optional_string(location.lob.as_deref()),
            "product_code" => optional_string(location.product_code.as_deref()),
            "tiv" => optional_number(location.tiv),
            "limit" => optional_number(location.limit),
            "premium" => optional_number(location.premium),
            "quality_tier" => {
                optional_string(location.quality_tier.map(|tier| tier.as_str()))
            }
            _ => Value::Null,
        };
        map.insert(field.to_string(), value);
    }
    map
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
// SECTION: Comparison
// ============================================================================

/// Compares two exposure versions' location sets.
///
/// # Errors
///
/// Returns [`EngineError`] when the artifact cannot be canonicalized.
pub fn compare_exposures(
    locations_a: &[Location],
    locations_b: &[Location],
) -> Result<DriftOutcome, EngineError> {
    let index_a: BTreeMap<&str, &Location> = locations_a
        .iter()
        .map(|location| (location.external_location_id.as_str(), location))
        .collect();
    let index_b: BTreeMap<&str, &Location> = locations_b
        .iter()
        .map(|location| (location.external_location_id.as_str(), location))
        .collect();
    let keys: BTreeSet<&str> =
        index_a.keys().chain(index_b.keys()).copied().collect();

    let mut summary = DriftSummary::default();
    let mut details = Vec::new();
    for key in keys {
        match (index_a.get(key), index_b.get(key)) {
            (Some(a), None) => {
                summary.removed += 1;
                details.push(DriftDetailDraft {
                    external_location_id: key.to_string(),
                    classification: DriftClassification::Removed,
                    delta_json: json!({ "before": snapshot(a) }),
                });
            }
            (None, Some(b)) => {
                summary.new += 1;
                details.push(DriftDetailDraft {
                    external_location_id: key.to_string(),
                    classification: DriftClassification::New,
                    delta_json: json!({ "after": snapshot(b) }),
                });
            }
            (Some(a), Some(b)) => {
                let before = snapshot(a);
                let after = snapshot(b);
                let mut changed_fields = Vec::new();
                let mut changes = Map::new();
                for field in COMPARE_FIELDS {
                    let before_value = before.get(field).unwrap_or(&Value::Null);
                    let after_value = after.get(field).unwrap_or(&Value::Null);
                    if before_value == after_value {
                        continue;
                    }
                    changed_fields.push(field.to_string());
                    let mut change = Map::new();
                    change.insert("before".to_string(), before_value.clone());
                    change.insert("after".to_string(), after_value.clone());
                    if NUMERIC_DELTA_FIELDS.contains(&field) {
                        if let (Some(before_num), Some(after_num)) =
                            (coerce_f64(before_value), coerce_f64(after_value))
                        {
                            change.insert(
                                "delta".to_string(),
                                optional_number(Some(after_num - before_num)),
                            );
                        }
                    }
                    changes.insert(field.to_string(), Value::Object(change));
                }
                if !changed_fields.is_empty() {
                    summary.modified += 1;
                    details.push(DriftDetailDraft {
                        external_location_id: key.to_string(),
                        classification: DriftClassification::Modified,
                        delta_json: json!({
                            "changed_fields": changed_fields,
                            "changes": changes,
                        }),
                    });
                }
            }
            (None, None) => {}
        }
    }

    details.sort_by(|a, b| {
        (a.classification.order(), a.external_location_id.as_str())
            .cmp(&(b.classification.order(), b.external_location_id.as_str()))
    });
    summary.total = details.len() as u64;

    let artifact = canonical_json_bytes(&details)?;
    let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, &artifact);
    Ok(DriftOutcome {
        summary,
        details,
        artifact,
        checksum,
    })
}
