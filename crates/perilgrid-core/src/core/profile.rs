// perilgrid-core/src/core/profile.rs
// ============================================================================
// Module: Perilgrid Property Profiles
// Description: Normalized addresses, structural attributes, and provenance.
// Purpose: Provide typed entities for property enrichment and caching.
// Dependencies: crate::core::{identifiers, providers, time}, serde
// ============================================================================

//! ## Overview
//! A [`PropertyProfile`] caches the enrichment pipeline output for one
//! normalized address, keyed by the address fingerprint and unique within a
//! tenant. Profiles carry the typed provider payloads, the canonical
//! structural mapping, field-level provenance, and an `updated_at` stamp
//! used for the 30-day freshness window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::LocationId;
use crate::core::identifiers::PropertyProfileId;
use crate::core::identifiers::TenantId;
use crate::core::providers::CharacteristicsResult;
use crate::core::providers::GeocodeResult;
use crate::core::providers::ParcelResult;
use crate::core::providers::ProviderFailure;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Addresses
// ============================================================================

/// Raw address fields accepted by enrichment requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AddressInput {
    /// Street address line.
    pub address_line1: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region.
    pub state_region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
}

/// Normalized address used for fingerprinting.
///
/// # Invariants
/// - Fields are trimmed; state, country, and postal code are uppercased and
///   postal whitespace is stripped. Empty fields are absent so the canonical
///   JSON only carries present keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizedAddress {
    /// Street address line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State or region, uppercased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_region: Option<String>,
    /// Postal code, uppercased with whitespace removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Country, uppercased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

// ============================================================================
// SECTION: Structural Attributes
// ============================================================================

/// Canonical structural attributes consumed by resilience scoring.
///
/// # Invariants
/// - Only the three canonical keys exist; unknown keys are dropped during
///   mapping and numerics are coerced or dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructuralAttributes {
    /// Roof material key (for example `metal`, `tile`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roof_material: Option<String>,
    /// Elevation above sea level in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
    /// Distance to significant vegetation in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vegetation_proximity_m: Option<f64>,
}

impl StructuralAttributes {
    /// Returns true when no attribute is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.roof_material.is_none()
            && self.elevation_m.is_none()
            && self.vegetation_proximity_m.is_none()
    }

    /// Merges `override_with` over `self`, field by field.
    #[must_use]
    pub fn merged_with(&self, override_with: &Self) -> Self {
        Self {
            roof_material: override_with
                .roof_material
                .clone()
                .or_else(|| self.roof_material.clone()),
            elevation_m: override_with.elevation_m.or(self.elevation_m),
            vegetation_proximity_m: override_with
                .vegetation_proximity_m
                .or(self.vegetation_proximity_m),
        }
    }
}

/// The canonical structural keys, in provenance order.
pub const STRUCTURAL_KEYS: [&str; 3] =
    ["roof_material", "elevation_m", "vegetation_proximity_m"];

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Provenance for one structural field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Provider category the value came from, when present.
    pub source: Option<String>,
    /// Provider name, when known.
    pub provider: Option<String>,
    /// Provider confidence for the field.
    pub confidence: f64,
    /// Retrieval time.
    pub retrieved_at: Timestamp,
    /// Mapping method tag (`stub`, `http`, or `missing`).
    pub method: String,
}

/// Provider names contributing to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProvenanceProviders {
    /// Geocoder provider name.
    pub geocoder: Option<String>,
    /// Parcel provider name.
    pub parcel: Option<String>,
    /// Characteristics provider name.
    pub characteristics: Option<String>,
}

/// Full enrichment provenance persisted with a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Pipeline retrieval time.
    pub retrieved_at: Timestamp,
    /// Providers consulted.
    pub providers: ProvenanceProviders,
    /// Per-field provenance for structural attributes.
    pub field_provenance: BTreeMap<String, FieldProvenance>,
    /// Provider errors captured without aborting the pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ProviderFailure>,
}

// ============================================================================
// SECTION: Property Profile
// ============================================================================

/// Cached enrichment output for one normalized address.
///
/// # Invariants
/// - `(tenant_id, address_fingerprint)` is unique.
/// - Fresh when `updated_at ≥ now − freshness window`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyProfile {
    /// Profile identifier.
    pub id: PropertyProfileId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Location the profile was last resolved for, when any.
    pub location_id: Option<LocationId>,
    /// Lowercase hex SHA-256 over the canonical normalized address.
    pub address_fingerprint: String,
    /// Normalized address.
    pub standardized_address: NormalizedAddress,
    /// Geocoder payload, when the call succeeded.
    pub geocode: Option<GeocodeResult>,
    /// Parcel payload, when the call succeeded.
    pub parcel: Option<ParcelResult>,
    /// Characteristics payload, when the call succeeded.
    pub characteristics: Option<CharacteristicsResult>,
    /// Canonical structural mapping.
    pub structural: StructuralAttributes,
    /// Enrichment provenance.
    pub provenance: Provenance,
    /// Engine code version that produced the profile.
    pub code_version: Option<String>,
    /// Last refresh time; drives the freshness window.
    pub updated_at: Timestamp,
    /// Creation time.
    pub created_at: Timestamp,
}

impl PropertyProfile {
    /// Returns true when the profile is fresh at `now` for the given window.
    #[must_use]
    pub fn is_fresh(&self, now: Timestamp, freshness_days: i64) -> bool {
        self.updated_at.is_at_or_after(now.minus_days(freshness_days))
    }
}
