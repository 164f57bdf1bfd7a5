// perilgrid-core/src/stages/validation.rs
// ============================================================================
// Module: Perilgrid Validation Engine
// Description: Canonical CSV parsing and per-row rule checks.
// Purpose: Produce the deterministic validation issue artifact.
// Dependencies: crate::core, csv, serde, serde_json
// ============================================================================

//! ## Overview
//! Validation parses the upload CSV, applies the optional source→destination
//! mapping, and checks every row against the exposure contract. Issues are
//! sorted by `(row_number, severity, field, code)` and serialized into a
//! canonical JSON artifact whose bytes and checksum are identical for
//! identical input and mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::HashDigest;
use crate::core::ValidationSummary;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::stages::EngineError;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Issue severity; the ordering index drives the artifact sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Contract violation; blocks commit quality.
    Error,
    /// Suspicious value; commit proceeds.
    Warn,
    /// Informational note.
    Info,
}

impl Severity {
    /// Returns the sort index (ERROR < WARN < INFO).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Warn => 1,
            Self::Info => 2,
        }
    }
}

// ============================================================================
// SECTION: Issues
// ============================================================================

/// One validation issue attached to a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// One-based row number.
    pub row_number: u64,
    /// Issue severity.
    pub severity: Severity,
    /// Offending field name.
    pub field: String,
    /// Stable issue code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a new issue.
    fn new(
        row_number: u64,
        severity: Severity,
        field: &str,
        code: &str,
        message: &str,
    ) -> Self {
        Self {
            row_number,
            severity,
            field: field.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Full validation outcome for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Issue counts plus total rows.
    pub summary: ValidationSummary,
    /// Sorted issues.
    pub issues: Vec<ValidationIssue>,
    /// Canonical artifact bytes (the serialized issue list).
    pub artifact: Vec<u8>,
    /// Checksum over the artifact bytes.
    pub checksum: HashDigest,
}

// ============================================================================
// SECTION: CSV Parsing
// ============================================================================

/// Parses CSV bytes into header-keyed rows.
///
/// # Errors
///
/// Returns [`EngineError::Csv`] when the bytes are not valid CSV.
pub fn parse_csv_rows(bytes: &[u8]) -> Result<Vec<BTreeMap<String, String>>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|err| EngineError::Csv(err.to_string()))?
        .clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| EngineError::Csv(err.to_string()))?;
        let mut row = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            let value = record.get(index).unwrap_or_default();
            row.insert(header.to_string(), value.to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Applies a source→destination column mapping to one row.
///
/// With an empty mapping the row passes through unchanged.
#[must_use]
pub fn apply_mapping(
    row: &BTreeMap<String, String>,
    mapping: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    if mapping.is_empty() {
        return row.clone();
    }
    mapping
        .iter()
        .map(|(src, dst)| {
            let value = row.get(src).cloned().unwrap_or_default();
            (dst.clone(), value)
        })
        .collect()
}

// ============================================================================
// SECTION: Row Checks
// ============================================================================

/// Returns the trimmed field value, treating blanks as absent.
fn field<'a>(row: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    row.get(name).map(String::as_str).map(str::trim).filter(|value| !value.is_empty())
}

/// Checks one mapped row and appends its issues.
fn check_row(row: &BTreeMap<String, String>, row_number: u64, issues: &mut Vec<ValidationIssue>) {
    if field(row, "external_location_id").is_none() {
        issues.push(ValidationIssue::new(
            row_number,
            Severity::Error,
            "external_location_id",
            "MISSING_EXTERNAL_ID",
            "external_location_id is required",
        ));
    }

    let has_coords = (field(row, "latitude").or_else(|| field(row, "lat")).is_some())
        && (field(row, "longitude").or_else(|| field(row, "lon")).is_some());
    let has_address = field(row, "address_line1").is_some()
        && field(row, "city").is_some()
        && field(row, "state_region").is_some()
        && field(row, "postal_code").is_some()
        && field(row, "country").is_some();
    if !has_coords && !has_address {
        issues.push(ValidationIssue::new(
            row_number,
            Severity::Error,
            "location",
            "MISSING_LOCATION",
            "latitude/longitude or full address fields required",
        ));
    }

    match field(row, "tiv") {
        None => issues.push(ValidationIssue::new(
            row_number,
            Severity::Error,
            "tiv",
            "MISSING_TIV",
            "tiv is required",
        )),
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value < 0.0 => issues.push(ValidationIssue::new(
                row_number,
                Severity::Error,
                "tiv",
                "NEGATIVE_TIV",
                "tiv must be non-negative",
            )),
            Ok(_) => {}
            Err(_) => issues.push(ValidationIssue::new(
                row_number,
                Severity::Error,
                "tiv",
                "INVALID_TIV",
                "tiv must be numeric",
            )),
        },
    }

    if field(row, "lob").is_none() && field(row, "product_code").is_none() {
        issues.push(ValidationIssue::new(
            row_number,
            Severity::Error,
            "segmentation",
            "MISSING_SEGMENTATION",
            "lob or product_code is required",
        ));
    }

    if field(row, "currency").is_none() {
        issues.push(ValidationIssue::new(
            row_number,
            Severity::Warn,
            "currency",
            "MISSING_CURRENCY_DEFAULTED",
            "currency missing; tenant default will be applied",
        ));
    }

    check_optional_amount(row, row_number, "limit", issues);
    check_optional_amount(row, row_number, "premium", issues);
}

/// Warns on invalid or negative optional monetary fields.
fn check_optional_amount(
    row: &BTreeMap<String, String>,
    row_number: u64,
    name: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(raw) = field(row, name) else {
        return;
    };
    let upper = name.to_uppercase();
    match raw.parse::<f64>() {
        Ok(value) if value < 0.0 => issues.push(ValidationIssue::new(
            row_number,
            Severity::Warn,
            name,
            &format!("NEGATIVE_{upper}"),
            &format!("{name} must be non-negative"),
        )),
        Ok(_) => {}
        Err(_) => issues.push(ValidationIssue::new(
            row_number,
            Severity::Warn,
            name,
            &format!("INVALID_{upper}"),
            &format!("{name} must be numeric"),
        )),
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates mapped rows and produces the deterministic issue artifact.
///
/// # Errors
///
/// Returns [`EngineError`] when the artifact cannot be canonicalized.
pub fn validate_rows(
    rows: &[BTreeMap<String, String>],
    mapping: &BTreeMap<String, String>,
) -> Result<ValidationOutcome, EngineError> {
    let mut issues = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let row_number = index as u64 + 1;
        let mapped = apply_mapping(row, mapping);
        check_row(&mapped, row_number, &mut issues);
    }
    issues.sort_by(|a, b| {
        (a.row_number, a.severity.index(), a.field.as_str(), a.code.as_str()).cmp(&(
            b.row_number,
            b.severity.index(),
            b.field.as_str(),
            b.code.as_str(),
        ))
    });

    let mut summary = ValidationSummary {
        total_rows: rows.len() as u64,
        ..ValidationSummary::default()
    };
    for issue in &issues {
        match issue.severity {
            Severity::Error => summary.errors += 1,
            Severity::Warn => summary.warnings += 1,
            Severity::Info => summary.infos += 1,
        }
    }

    let artifact = canonical_json_bytes(&issues)?;
    let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, &artifact);
    Ok(ValidationOutcome {
        summary,
        issues,
        artifact,
        checksum,
    })
}
