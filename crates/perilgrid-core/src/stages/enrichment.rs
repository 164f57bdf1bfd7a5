// perilgrid-core/src/stages/enrichment.rs
// ============================================================================
// Module: Perilgrid Enrichment Mapping
// Description: Address normalization, fingerprints, and structural mapping.
// Purpose: Provide the deterministic parts of property enrichment.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Enrichment normalizes addresses (trim; uppercase state, country, postal;
//! strip postal whitespace), fingerprints the normalized address with the
//! canonical hash, and maps provider payloads onto the three canonical
//! structural keys with per-field provenance. The sync-vs-async mode and
//! the wait/best-effort decision table are pure functions so their matrix
//! is testable without providers or stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::AddressInput;
use crate::core::CharacteristicsResult;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::FieldProvenance;
use crate::core::GeocodeResult;
use crate::core::HashError;
use crate::core::NormalizedAddress;
use crate::core::ParcelResult;
use crate::core::RunStatus;
use crate::core::StructuralAttributes;
use crate::core::Timestamp;
use crate::core::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Address Normalization
// ============================================================================

/// Trims a field, treating blanks as absent.
fn cleaned(value: Option<&String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

/// Normalizes a raw address for fingerprinting.
#[must_use]
pub fn normalize_address(address: &AddressInput) -> NormalizedAddress {
    NormalizedAddress {
        address_line1: cleaned(address.address_line1.as_ref()),
        city: cleaned(address.city.as_ref()),
        state_region: cleaned(address.state_region.as_ref()).map(|text| text.to_uppercase()),
        postal_code: cleaned(address.postal_code.as_ref())
            .map(|text| text.to_uppercase().split_whitespace().collect::<String>())
            .filter(|text| !text.is_empty()),
        country: cleaned(address.country.as_ref()).map(|text| text.to_uppercase()),
    }
}

/// Computes the address fingerprint as lowercase hex.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn address_fingerprint(address: &NormalizedAddress) -> Result<String, HashError> {
    Ok(hash_canonical_json(DEFAULT_HASH_ALGORITHM, address)?.value)
}

// ============================================================================
// SECTION: Structural Mapping
// ============================================================================

/// Provenance entry for a field no provider supplied.
fn missing_provenance(retrieved_at: Timestamp) -> FieldProvenance {
    FieldProvenance {
        source: None,
        provider: None,
        confidence: 0.0,
        retrieved_at,
        method: "missing".to_string(),
    }
}

/// Maps provider payloads onto the canonical structural keys.
///
/// Preference order: `roof_material` from characteristics; `elevation_m`
/// from geocode, then parcel; `vegetation_proximity_m` from
/// characteristics, then parcel. Unknown keys are dropped by construction.
#[must_use]
pub fn map_to_structural(
    characteristics: Option<&CharacteristicsResult>,
    parcel: Option<&ParcelResult>,
    geocode: Option<&GeocodeResult>,
    retrieved_at: Timestamp,
) -> (StructuralAttributes, BTreeMap<String, FieldProvenance>) {
    let mut structural = StructuralAttributes::default();
    let mut provenance = BTreeMap::new();

    let roof_material = characteristics.and_then(|c| c.roof_material.clone());
    if let Some(roof) = roof_material {
        let confidence = characteristics
            .and_then(|c| c.field_confidence.get("roof_material").copied())
            .unwrap_or(0.0);
        structural.roof_material = Some(roof);
        provenance.insert(
            "roof_material".to_string(),
            FieldProvenance {
                source: Some("characteristics".to_string()),
                provider: characteristics.map(|c| c.provider.clone()),
                confidence,
                retrieved_at,
                method: "provider".to_string(),
            },
        );
    } else {
        provenance.insert("roof_material".to_string(), missing_provenance(retrieved_at));
    }

    let geocode_elevation = geocode.and_then(|g| g.elevation_m);
    let elevation = geocode_elevation.or_else(|| parcel.and_then(|p| p.elevation_m));
    if let Some(value) = elevation {
        let from_geocode = geocode_elevation.is_some();
        structural.elevation_m = Some(value);
        provenance.insert(
            "elevation_m".to_string(),
            FieldProvenance {
                source: Some(if from_geocode { "geocode" } else { "parcel" }.to_string()),
                provider: if from_geocode {
                    geocode.map(|g| g.provider.clone())
                } else {
                    parcel.map(|p| p.provider.clone())
                },
                confidence: if from_geocode {
                    geocode.map_or(0.0, |g| g.confidence)
                } else {
                    parcel.map_or(0.0, |p| p.confidence)
                },
                retrieved_at,
                method: "provider".to_string(),
            },
        );
    } else {
        provenance.insert("elevation_m".to_string(), missing_provenance(retrieved_at));
    }

    let characteristics_vegetation = characteristics.and_then(|c| c.vegetation_proximity_m);
    let vegetation =
        characteristics_vegetation.or_else(|| parcel.and_then(|p| p.vegetation_proximity_m));
    if let Some(value) = vegetation {
        let from_characteristics = characteristics_vegetation.is_some();
        structural.vegetation_proximity_m = Some(value);
        provenance.insert(
            "vegetation_proximity_m".to_string(),
            FieldProvenance {
                source: Some(
                    if from_characteristics { "characteristics" } else { "parcel" }.to_string(),
                ),
                provider: if from_characteristics {
                    characteristics.map(|c| c.provider.clone())
                } else {
                    parcel.map(|p| p.provider.clone())
                },
                confidence: characteristics
                    .and_then(|c| c.field_confidence.get("vegetation_proximity_m").copied())
                    .unwrap_or(0.0),
                retrieved_at,
                method: "provider".to_string(),
            },
        );
    } else {
        provenance
            .insert("vegetation_proximity_m".to_string(), missing_provenance(retrieved_at));
    }

    (structural, provenance)
}

// ============================================================================
// SECTION: Mode Decision
// ============================================================================

/// Enrichment execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    /// Run inside the request.
    Sync,
    /// Enqueue an enrichment run.
    Async,
}

/// Decides the execution mode; explicit modes win, otherwise all-stub
/// providers run synchronously.
#[must_use]
pub const fn determine_enrich_mode(
    requested: Option<EnrichMode>,
    providers_stub: bool,
) -> EnrichMode {
    match requested {
        Some(mode) => mode,
        None => {
            if providers_stub {
                EnrichMode::Sync
            } else {
                EnrichMode::Async
            }
        }
    }
}

// ============================================================================
// SECTION: Wait Decision Table
// ============================================================================

/// Enrichment state reported with a scoring response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// Enrichment output is available.
    Ready,
    /// Enrichment is still queued or running.
    Queued,
    /// Enrichment failed; scoring proceeded best-effort.
    Failed,
}

/// Action decided for a scoring request that depends on enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentAction {
    /// Score now, reporting the given enrichment status.
    Score {
        /// Status reported with the scoring response.
        status: EnrichmentStatus,
    },
    /// Return 202 with the queued run reference.
    Accepted,
    /// Return 502; enrichment failed and best-effort was not requested.
    UpstreamFailed,
}

/// Applies the deterministic sync-vs-async decision table.
#[must_use]
pub const fn decide_enrichment_action(
    async_required: bool,
    wait_seconds: u64,
    best_effort: bool,
    run_status: Option<RunStatus>,
) -> EnrichmentAction {
    if !async_required {
        return EnrichmentAction::Score { status: EnrichmentStatus::Ready };
    }
    match run_status {
        Some(RunStatus::Succeeded) => {
            EnrichmentAction::Score { status: EnrichmentStatus::Ready }
        }
        Some(RunStatus::Failed | RunStatus::Cancelled) => {
            if best_effort {
                EnrichmentAction::Score { status: EnrichmentStatus::Failed }
            } else {
                EnrichmentAction::UpstreamFailed
            }
        }
        Some(RunStatus::Queued | RunStatus::Running) | None => {
            if wait_seconds == 0 {
                if best_effort {
                    EnrichmentAction::Score { status: EnrichmentStatus::Queued }
                } else {
                    EnrichmentAction::Accepted
                }
            } else if best_effort {
                EnrichmentAction::Score { status: EnrichmentStatus::Queued }
            } else {
                EnrichmentAction::Accepted
            }
        }
    }
}
