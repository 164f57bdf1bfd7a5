// perilgrid-core/tests/validation.rs
// ============================================================================
// Module: Validation Engine Tests
// Description: Per-row rule checks and artifact determinism.
// ============================================================================
//! ## Overview
//! Exercises the exposure contract checks, the issue ordering contract, and
//! the byte-identical artifact guarantee for identical input and mapping.

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

use perilgrid_core::stages::validation::Severity;
use perilgrid_core::stages::validation::parse_csv_rows;
use perilgrid_core::stages::validation::validate_rows;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const CLEAN_CSV: &str = "\
external_location_id,latitude,longitude,currency,lob,tiv,limit,premium
L1,40.0,-75.0,USD,property,100,50,5
L2,41.0,-76.0,USD,property,200,80,9
L3,42.0,-77.0,USD,property,50,20,2
";

fn rows_from(csv: &str) -> Vec<BTreeMap<String, String>> {
    parse_csv_rows(csv.as_bytes()).unwrap()
}

// ============================================================================
// SECTION: Contract Checks
// ============================================================================

/// Tests a clean three-row upload validates without issues.
#[test]
fn test_clean_upload_has_no_issues() {
    let rows = rows_from(CLEAN_CSV);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    assert_eq!(outcome.summary.errors, 0);
    assert_eq!(outcome.summary.warnings, 0);
    assert_eq!(outcome.summary.infos, 0);
    assert_eq!(outcome.summary.total_rows, 3);
    assert!(outcome.issues.is_empty());
}

/// Tests every contract violation produces its stable code.
#[test]
fn test_contract_violation_codes() {
    let csv = "\
external_location_id,latitude,longitude,currency,lob,tiv
,40.0,-75.0,USD,property,abc
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    let codes: Vec<&str> = outcome.issues.iter().map(|issue| issue.code.as_str()).collect();
    assert!(codes.contains(&"MISSING_EXTERNAL_ID"));
    assert!(codes.contains(&"INVALID_TIV"));
}

/// Tests the full-address alternative to coordinates.
#[test]
fn test_address_satisfies_location_requirement() {
    let csv = "\
external_location_id,address_line1,city,state_region,postal_code,country,currency,lob,tiv
L1,1 Main St,Springfield,PA,19064,US,USD,property,100
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    assert!(!outcome.issues.iter().any(|issue| issue.code == "MISSING_LOCATION"));
}

/// Tests a partial address without coordinates is rejected.
#[test]
fn test_partial_address_fails_location_requirement() {
    let csv = "\
external_location_id,address_line1,city,currency,lob,tiv
L1,1 Main St,Springfield,USD,property,100
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    assert!(outcome.issues.iter().any(|issue| issue.code == "MISSING_LOCATION"));
}

/// Tests negative monetary values and missing currency produce warnings.
#[test]
fn test_warning_severities() {
    let csv = "\
external_location_id,latitude,longitude,lob,tiv,limit,premium
L1,40.0,-75.0,property,100,-5,oops
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    assert_eq!(outcome.summary.errors, 0);
    let warning_codes: Vec<&str> = outcome
        .issues
        .iter()
        .filter(|issue| issue.severity == Severity::Warn)
        .map(|issue| issue.code.as_str())
        .collect();
    assert!(warning_codes.contains(&"MISSING_CURRENCY_DEFAULTED"));
    assert!(warning_codes.contains(&"NEGATIVE_LIMIT"));
    assert!(warning_codes.contains(&"INVALID_PREMIUM"));
}

/// Tests missing segmentation is an error only when both fields are empty.
#[test]
fn test_missing_segmentation() {
    let csv = "\
external_location_id,latitude,longitude,currency,tiv,product_code
L1,40.0,-75.0,USD,100,
L2,40.0,-75.0,USD,100,PC-1
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    let rows_with_code: Vec<u64> = outcome
        .issues
        .iter()
        .filter(|issue| issue.code == "MISSING_SEGMENTATION")
        .map(|issue| issue.row_number)
        .collect();
    assert_eq!(rows_with_code, vec![1]);
}

// ============================================================================
// SECTION: Ordering & Determinism
// ============================================================================

/// Tests issues sort by row, severity, field, and code.
#[test]
fn test_issue_ordering_contract() {
    let csv = "\
external_location_id,latitude,longitude,lob,tiv
L2,40.0,-75.0,property,-1
,,,,
";
    let rows = rows_from(csv);
    let outcome = validate_rows(&rows, &BTreeMap::new()).unwrap();
    let sorted = outcome.issues.clone();
    let mut resorted = outcome.issues.clone();
    resorted.sort_by(|a, b| {
        (a.row_number, a.severity.index(), a.field.as_str(), a.code.as_str()).cmp(&(
            b.row_number,
            b.severity.index(),
            b.field.as_str(),
            b.code.as_str(),
        ))
    });
    assert_eq!(sorted, resorted);
    assert!(outcome.issues.windows(2).all(|pair| pair[0].row_number <= pair[1].row_number));
}

/// Tests identical input and mapping produce byte-identical artifacts.
#[test]
fn test_artifact_bytes_are_deterministic() {
    let rows = rows_from(CLEAN_CSV);
    let mapping: BTreeMap<String, String> = BTreeMap::new();
    let first = validate_rows(&rows, &mapping).unwrap();
    let second = validate_rows(&rows, &mapping).unwrap();
    assert_eq!(first.artifact, second.artifact);
    assert_eq!(first.checksum, second.checksum);
}

/// Tests mapping renames source columns before checks run.
#[test]
fn test_mapping_applies_before_checks() {
    let csv = "\
site_id,lat,lon,curr,segment,value
L1,40.0,-75.0,USD,property,100
";
    let rows = rows_from(csv);
    let mapping: BTreeMap<String, String> = [
        ("site_id", "external_location_id"),
        ("lat", "latitude"),
        ("lon", "longitude"),
        ("curr", "currency"),
        ("segment", "lob"),
        ("value", "tiv"),
    ]
    .iter()
    .map(|(src, dst)| ((*src).to_string(), (*dst).to_string()))
    .collect();
    let outcome = validate_rows(&rows, &mapping).unwrap();
    assert_eq!(outcome.summary.errors, 0);
    assert_eq!(outcome.summary.warnings, 0);
}
