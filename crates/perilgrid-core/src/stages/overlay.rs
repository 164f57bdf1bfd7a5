// perilgrid-core/src/stages/overlay.rs
// ============================================================================
// Module: Perilgrid Overlay Combination
// Description: Hazard entry extraction and worst-in-peril merging.
// Purpose: Combine containing features into deterministic hazard attributes.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! For each containing feature the overlay extracts a [`HazardEntry`]
//! (peril, score, band, source, raw properties) and merges entries per
//! peril by worst-in-peril: highest score wins, a numeric score beats null,
//! and numeric ties break to the smallest feature id. One representative
//! entry per location (highest score across perils, same tie-break) is
//! persisted as the location's hazard attributes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::HazardAttributes;
use crate::core::HazardEntry;
use crate::core::HazardFeatureId;
use crate::core::OVERLAY_METHOD;
use crate::stages::coerce_f64;

// ============================================================================
// SECTION: Entry Extraction
// ============================================================================

/// Extracts a hazard entry from feature properties.
///
/// The peril comes from the `hazard_category` property, falling back to the
/// dataset peril; score and band accept capitalized property spellings.
#[must_use]
pub fn extract_hazard_entry(
    properties: &Value,
    dataset_peril: Option<&str>,
    dataset_name: &str,
    version_label: &str,
    feature_id: HazardFeatureId,
) -> HazardEntry {
    let props = properties.as_object();
    let category = props
        .and_then(|map| map.get("hazard_category"))
        .and_then(Value::as_str)
        .or(dataset_peril);
    let peril = category
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let score = props
        .and_then(|map| map.get("score").or_else(|| map.get("Score")))
        .and_then(coerce_f64);
    let band = props
        .and_then(|map| map.get("band").or_else(|| map.get("Band")))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    HazardEntry {
        peril,
        score,
        band,
        source: format!("{dataset_name}:{version_label}"),
        raw: properties.clone(),
        feature_id: Some(feature_id),
    }
}

// ============================================================================
// SECTION: Worst-In-Peril Merge
// ============================================================================

/// Returns true when `candidate` displaces `incumbent` under worst-in-peril.
fn displaces(candidate: &HazardEntry, incumbent: &HazardEntry) -> bool {
    match (candidate.score, incumbent.score) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(new), Some(old)) => {
            if new > old {
                true
            } else if new < old {
                false
            } else {
                match (candidate.feature_id, incumbent.feature_id) {
                    (Some(new_id), Some(old_id)) => new_id < old_id,
                    _ => false,
                }
            }
        }
    }
}

/// Merges one entry into the per-peril map under worst-in-peril rules.
pub fn merge_worst_in_peril(hazards: &mut BTreeMap<String, HazardEntry>, entry: HazardEntry) {
    let Some(peril) = entry.peril.clone() else {
        return;
    };
    match hazards.get(&peril) {
        None => {
            hazards.insert(peril, entry);
        }
        Some(existing) => {
            if displaces(&entry, existing) {
                hazards.insert(peril, entry);
            }
        }
    }
}

/// Picks the representative entry across perils: highest score, numeric
/// beats null, ties to the smallest feature id, then peril name for
/// stability when no tie-breaker survives.
#[must_use]
pub fn representative_entry(hazards: &BTreeMap<String, HazardEntry>) -> Option<&HazardEntry> {
    let mut best: Option<&HazardEntry> = None;
    for entry in hazards.values() {
        match best {
            None => best = Some(entry),
            Some(current) => {
                if displaces(entry, current) {
                    best = Some(entry);
                }
            }
        }
    }
    best
}

// ============================================================================
// SECTION: Persistence Shapes
// ============================================================================

/// Builds the persisted attribute payload for the representative entry.
#[must_use]
pub fn attributes_from_entry(entry: &HazardEntry) -> HazardAttributes {
    HazardAttributes {
        hazard_category: entry.peril.clone(),
        band: entry.band.clone(),
        score: entry.score,
        source: Some(entry.source.clone()),
        method: OVERLAY_METHOD.to_string(),
        raw: entry.raw.clone(),
    }
}

/// Strips tie-breaker ids so persisted hazard maps hash deterministically.
#[must_use]
pub fn normalized_hazards(
    hazards: &BTreeMap<String, HazardEntry>,
) -> BTreeMap<String, HazardEntry> {
    hazards
        .iter()
        .map(|(peril, entry)| {
            let mut cleaned = entry.clone();
            cleaned.feature_id = None;
            (peril.clone(), cleaned)
        })
        .collect()
}
