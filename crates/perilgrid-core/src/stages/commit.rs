// perilgrid-core/src/stages/commit.rs
// ============================================================================
// Module: Perilgrid Commit Engine
// Description: Canonical row ordering and location materialisation.
// Purpose: Turn a validated upload into deterministic location rows.
// Dependencies: crate::core, crate::stages::validation
// ============================================================================

//! ## Overview
//! Commit parses the upload with its mapping, sorts rows by
//! `external_location_id` so materialisation order is canonical, and builds
//! [`Location`] drafts. Rows without either `lob` or `product_code` are
//! skipped; currency falls back to the tenant default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::ExposureVersionId;
use crate::core::Location;
use crate::core::LocationId;
use crate::core::StructuralAttributes;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::stages::EngineError;
use crate::stages::parse_f64;
use crate::stages::validation::apply_mapping;
use crate::stages::validation::parse_csv_rows;

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Parses and maps upload bytes, sorted by `external_location_id`.
///
/// # Errors
///
/// Returns [`EngineError::Csv`] when the bytes are not valid CSV.
pub fn canonicalize_rows(
    bytes: &[u8],
    mapping: &BTreeMap<String, String>,
) -> Result<Vec<BTreeMap<String, String>>, EngineError> {
    let mut rows: Vec<BTreeMap<String, String>> = parse_csv_rows(bytes)?
        .iter()
        .map(|row| apply_mapping(row, mapping))
        .collect();
    rows.sort_by(|a, b| {
        let key_a = a.get("external_location_id").map(String::as_str).unwrap_or_default();
        let key_b = b.get("external_location_id").map(String::as_str).unwrap_or_default();
        key_a.cmp(key_b)
    });
    Ok(rows)
}

// ============================================================================
// SECTION: Location Materialisation
// ============================================================================

/// Returns the trimmed field value, treating blanks as absent.
fn field(row: &BTreeMap<String, String>, name: &str) -> Option<String> {
    row.get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds a location draft from one canonical row.
///
/// Returns `None` when the row lacks both `lob` and `product_code`; such
/// rows cannot be segmented and are not materialised.
#[must_use]
pub fn location_from_row(
    row: &BTreeMap<String, String>,
    tenant_id: &TenantId,
    exposure_version_id: ExposureVersionId,
    default_currency: Option<&str>,
    now: Timestamp,
) -> Option<Location> {
    let lob = field(row, "lob");
    let product_code = field(row, "product_code");
    if lob.is_none() && product_code.is_none() {
        return None;
    }
    let latitude = parse_f64(row.get("latitude").map(String::as_str))
        .or_else(|| parse_f64(row.get("lat").map(String::as_str)));
    let longitude = parse_f64(row.get("longitude").map(String::as_str))
        .or_else(|| parse_f64(row.get("lon").map(String::as_str)));
    let currency =
        field(row, "currency").or_else(|| default_currency.map(ToString::to_string));
    Some(Location {
        id: LocationId::new(0),
        tenant_id: tenant_id.clone(),
        exposure_version_id,
        external_location_id: field(row, "external_location_id").unwrap_or_default(),
        address_line1: field(row, "address_line1"),
        city: field(row, "city"),
        state_region: field(row, "state_region"),
        postal_code: field(row, "postal_code"),
        country: field(row, "country"),
        latitude,
        longitude,
        geocode_method: None,
        geocode_confidence: None,
        quality_tier: None,
        quality_reasons: Vec::new(),
        currency,
        lob,
        product_code,
        tiv: parse_f64(row.get("tiv").map(String::as_str)),
        limit: parse_f64(row.get("limit").map(String::as_str)),
        premium: parse_f64(row.get("premium").map(String::as_str)),
        structural: StructuralAttributes::default(),
        updated_at: None,
        created_at: now,
    })
}
