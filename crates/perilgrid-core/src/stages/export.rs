// perilgrid-core/src/stages/export.rs
// ============================================================================
// Module: Perilgrid Resilience CSV Export
// Description: Fixed-column CSV serialization of score items.
// Purpose: Provide byte-stable score exports with canonical JSON cells.
// Dependencies: crate::core, csv, serde_json
// ============================================================================

//! ## Overview
//! Score exports join score items with their locations and the owning
//! result, emitting a fixed column order. JSON-valued cells serialize as
//! canonical JSON; warnings join with `;`. Batched callers pass
//! `include_header` only for the first page.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::core::Location;
use crate::core::ResilienceScoreItem;
use crate::core::ResilienceScoreResult;
use crate::core::hashing::canonical_json_string;
use crate::stages::EngineError;

// ============================================================================
// SECTION: Columns
// ============================================================================

/// Export columns in wire order.
pub const EXPORT_COLUMNS: [&str; 20] = [
    "location_id",
    "external_location_id",
    "latitude",
    "longitude",
    "address_line1",
    "city",
    "state_region",
    "postal_code",
    "country",
    "lob",
    "tiv",
    "resilience_score",
    "risk_score",
    "warnings",
    "hazards_json",
    "structural_json",
    "input_structural_json",
    "policy_pack_version_id",
    "policy_used_json",
    "policy_version_label",
];

// ============================================================================
// SECTION: Rows
// ============================================================================

/// One serialized export row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    /// Location identifier.
    pub location_id: i64,
    /// External location key.
    pub external_location_id: String,
    /// WGS84 latitude.
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    pub longitude: Option<f64>,
    /// Street address line.
    pub address_line1: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state_region: String,
    /// Postal code.
    pub postal_code: String,
    /// Country.
    pub country: String,
    /// Line of business.
    pub lob: String,
    /// Total insured value.
    pub tiv: Option<f64>,
    /// Resilience score.
    pub resilience_score: i64,
    /// Risk score.
    pub risk_score: f64,
    /// Warnings joined with `;`.
    pub warnings: String,
    /// Canonical JSON of the hazard map.
    pub hazards_json: String,
    /// Canonical JSON of the location's structural attributes.
    pub structural_json: String,
    /// Canonical JSON of the scoring input structural attributes.
    pub input_structural_json: String,
    /// Policy pack version id, when any.
    pub policy_pack_version_id: Option<i64>,
    /// Canonical JSON of the resolved policy metadata.
    pub policy_used_json: String,
    /// Policy version label; `default` when no pack applied.
    pub policy_version_label: String,
}

/// Serializes a JSON value as a canonical cell, empty for null.
fn json_cell<T: Serialize>(value: &T) -> Result<String, EngineError> {
    let as_value =
        serde_json::to_value(value).map_err(|err| EngineError::Invalid(err.to_string()))?;
    if as_value.is_null() {
        return Ok(String::new());
    }
    Ok(canonical_json_string(&as_value)?)
}

/// Builds one export row from a score item, its location, and the result.
///
/// # Errors
///
/// Returns [`EngineError`] when a JSON cell cannot be canonicalized.
pub fn export_row(
    item: &ResilienceScoreItem,
    location: &Location,
    result: &ResilienceScoreResult,
) -> Result<ExportRow, EngineError> {
    let policy_version_label = result
        .policy_used
        .get("version_label")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string();
    Ok(ExportRow {
        location_id: item.location_id.value(),
        external_location_id: location.external_location_id.clone(),
        latitude: location.latitude,
        longitude: location.longitude,
        address_line1: location.address_line1.clone().unwrap_or_default(),
        city: location.city.clone().unwrap_or_default(),
        state_region: location.state_region.clone().unwrap_or_default(),
        postal_code: location.postal_code.clone().unwrap_or_default(),
        country: location.country.clone().unwrap_or_default(),
        lob: location.lob.clone().unwrap_or_default(),
        tiv: location.tiv,
        resilience_score: item.resilience_score,
        risk_score: item.risk_score,
        warnings: item.breakdown.warnings.join(";"),
        hazards_json: json_cell(&item.hazards)?,
        structural_json: json_cell(&location.structural)?,
        input_structural_json: json_cell(&item.input_structural)?,
        policy_pack_version_id: result.policy_pack_version_id.map(|id| id.value()),
        policy_used_json: json_cell(&result.policy_used)?,
        policy_version_label,
    })
}

// ============================================================================
// SECTION: CSV Writing
// ============================================================================

/// Writes rows as CSV with the fixed column order.
///
/// # Errors
///
/// Returns [`EngineError`] when CSV serialization fails.
pub fn rows_to_csv(rows: &[ExportRow], include_header: bool) -> Result<String, EngineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if include_header {
        writer
            .write_record(EXPORT_COLUMNS)
            .map_err(|err| EngineError::Csv(err.to_string()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| EngineError::Csv(err.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| EngineError::Csv(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| EngineError::Csv(err.to_string()))
}
