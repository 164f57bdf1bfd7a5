// perilgrid-core/src/core/providers.rs
// ============================================================================
// Module: Perilgrid Provider Payloads
// Description: Typed provider results and the provider error taxonomy.
// Purpose: Provide backend-agnostic enrichment payloads with retry hints.
// Dependencies: crate::core::profile, serde, thiserror
// ============================================================================

//! ## Overview
//! Enrichment providers (geocoder, parcel, characteristics) return typed
//! payloads plus confidence and the raw upstream response. Failures carry a
//! closed error-code taxonomy that classifies them as retryable
//! (`timeout`, `rate_limited`, `upstream`) or not (`auth`, `bad_request`,
//! `parse`). Errors are recorded into provenance without aborting the
//! pipeline unless a required downstream input is missing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::profile::NormalizedAddress;

// ============================================================================
// SECTION: Error Taxonomy
// ============================================================================

/// Closed provider error-code taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// Request exceeded its deadline.
    Timeout,
    /// Upstream rate limit hit.
    RateLimited,
    /// Upstream failure (5xx or transport).
    Upstream,
    /// Credentials missing or rejected.
    Auth,
    /// Request rejected as malformed.
    BadRequest,
    /// Response could not be parsed.
    Parse,
}

impl ProviderErrorCode {
    /// Returns true when a retry may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Upstream)
    }

    /// Returns the stable wire string for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::Auth => "auth",
            Self::BadRequest => "bad_request",
            Self::Parse => "parse",
        }
    }
}

/// Provider call failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("provider error ({provider}/{}): {message}", .code.as_str())]
pub struct ProviderError {
    /// Provider name that failed.
    pub provider: String,
    /// Taxonomy code.
    pub code: ProviderErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ProviderError {
    /// Creates a new provider error.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        code: ProviderErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns true when a retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// Provider failure captured into profile provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Provider category (`geocoder`, `parcel`, `characteristics`).
    pub category: String,
    /// Taxonomy code.
    pub code: ProviderErrorCode,
    /// Human-readable message.
    pub message: String,
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Timeout and retry budget for one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            max_retries: 2,
        }
    }
}

// ============================================================================
// SECTION: Provider Payloads
// ============================================================================

/// Forward-geocode payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    /// Provider name.
    pub provider: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Geocode confidence in `[0, 1]`.
    pub confidence: f64,
    /// Geocode method tag.
    pub method: String,
    /// Elevation above sea level in meters, when resolved.
    pub elevation_m: Option<f64>,
    /// Address as standardized by the provider.
    pub standardized_address: NormalizedAddress,
    /// Raw upstream payload.
    pub raw: Value,
}

/// Parcel lookup payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelResult {
    /// Provider name.
    pub provider: String,
    /// Parcel identifier.
    pub parcel_id: String,
    /// Lookup confidence in `[0, 1]`.
    pub confidence: f64,
    /// Elevation above sea level in meters, when resolved.
    pub elevation_m: Option<f64>,
    /// Distance to significant vegetation in meters, when resolved.
    pub vegetation_proximity_m: Option<f64>,
    /// Parcel boundary geometry payload.
    pub boundary: Value,
    /// Raw upstream payload.
    pub raw: Value,
}

/// Property characteristics payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicsResult {
    /// Provider name.
    pub provider: String,
    /// Roof material key, when resolved.
    pub roof_material: Option<String>,
    /// Year built, when resolved.
    pub year_built: Option<i64>,
    /// Story count, when resolved.
    pub stories: Option<i64>,
    /// Floor area in square feet, when resolved.
    pub sqft: Option<f64>,
    /// Distance to significant vegetation in meters, when resolved.
    pub vegetation_proximity_m: Option<f64>,
    /// Per-field confidence values.
    pub field_confidence: BTreeMap<String, f64>,
    /// Raw upstream payload.
    pub raw: Value,
}
