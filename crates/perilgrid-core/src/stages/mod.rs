// perilgrid-core/src/stages/mod.rs
// ============================================================================
// Module: Perilgrid Stage Engines
// Description: Pure deterministic engines for each pipeline stage.
// Purpose: Keep stage semantics free of storage and I/O concerns.
// Dependencies: crate::core, csv, serde_json
// ============================================================================

//! ## Overview
//! Stage engines implement the deterministic semantics of each pipeline
//! stage over plain data: validation, commit canonicalization, geocode
//! quality, enrichment mapping, overlay combination, resilience scoring,
//! the underwriting decision engine, score explainability, rollup
//! aggregation, breach and underwriting rule evaluation, drift diffing,
//! score bucketing, and CSV export. Workers orchestrate stores and
//! providers around these engines; the engines themselves never touch a
//! store, a clock, or the network.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::HashError;

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod breach;
pub mod bucketing;
pub mod commit;
pub mod drift;
pub mod enrichment;
pub mod explainability;
pub mod export;
pub mod overlay;
pub mod quality;
pub mod resilience;
pub mod rollup;
pub mod underwriting;
pub mod underwriting_decision;
pub mod validation;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by stage engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Canonicalization or hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// CSV input failed to parse.
    #[error("csv parse failure: {0}")]
    Csv(String),
    /// Stage input failed validation.
    #[error("invalid stage input: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Numeric Coercion
// ============================================================================

/// Coerces a JSON value to `f64`; numeric strings are accepted.
#[must_use]
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parses an optional string field into `f64`, treating blanks as absent.
#[must_use]
pub fn parse_f64(value: Option<&str>) -> Option<f64> {
    value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            trimmed.parse::<f64>().ok()
        }
    })
}

/// Rounds a bounded score value to the nearest integer.
#[allow(
    clippy::cast_possible_truncation,
    reason = "Score values are clamped well inside the i64 range before rounding."
)]
#[must_use]
pub fn round_score(value: f64) -> i64 {
    value.round() as i64
}
