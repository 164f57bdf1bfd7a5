// perilgrid-providers/src/stub.rs
// ============================================================================
// Module: Stub Providers
// Description: Deterministic hash-derived enrichment providers.
// Purpose: Replayable provider outputs without network access.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Stub providers derive every field from SHA-256 digests of their inputs:
//! the geocoder maps a normalized address onto the lat/lon ranges, the
//! parcel provider builds a square boundary around the coordinate, and the
//! characteristics provider picks attributes from the address fingerprint.
//! Identical inputs always produce identical payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use perilgrid_core::CharacteristicsProvider;
use perilgrid_core::CharacteristicsResult;
use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::GeocodeResult;
use perilgrid_core::Geocoder;
use perilgrid_core::NormalizedAddress;
use perilgrid_core::ParcelProvider;
use perilgrid_core::ParcelResult;
use perilgrid_core::ProviderError;
use perilgrid_core::ProviderErrorCode;
use perilgrid_core::hashing::hash_bytes;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stub provider name.
pub const STUB_PROVIDER: &str = "stub";
/// Geocode method tag emitted by the stub.
pub const STUB_GEOCODE_METHOD: &str = "STUB_HASH";
/// Roof materials cycled by the characteristics stub.
const ROOF_MATERIALS: [&str; 4] = ["metal", "tile", "asphalt_shingle", "wood_shake"];

// ============================================================================
// SECTION: Digest Helpers
// ============================================================================

/// Parses a hex digest slice as an integer.
fn hex_window(digest: &str, range: std::ops::Range<usize>) -> Result<u64, ProviderError> {
    u64::from_str_radix(&digest[range], 16).map_err(|err| {
        ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string())
    })
}

// ============================================================================
// SECTION: Geocoder
// ============================================================================

/// Deterministic stub geocoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubGeocoder;

impl Geocoder for StubGeocoder {
    fn name(&self) -> &str {
        STUB_PROVIDER
    }

    fn is_stub(&self) -> bool {
        true
    }

    fn forward_geocode(
        &self,
        address: &NormalizedAddress,
    ) -> Result<GeocodeResult, ProviderError> {
        let normalized = format!(
            "{}|{}|{}|{}|{}",
            address.address_line1.as_deref().unwrap_or_default(),
            address.city.as_deref().unwrap_or_default(),
            address.state_region.as_deref().unwrap_or_default(),
            address.postal_code.as_deref().unwrap_or_default(),
            address.country.as_deref().unwrap_or_default(),
        )
        .to_lowercase();
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, normalized.trim().as_bytes()).value;
        // Map the hash deterministically into the lat/lon ranges.
        let latitude = f64::from(u32::try_from(hex_window(&digest, 0..8)? % 18_000).map_err(
            |err| ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string()),
        )?) / 100.0
            - 90.0;
        let longitude = f64::from(u32::try_from(hex_window(&digest, 8..16)? % 36_000).map_err(
            |err| ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string()),
        )?) / 100.0
            - 180.0;
        Ok(GeocodeResult {
            provider: STUB_PROVIDER.to_string(),
            latitude,
            longitude,
            confidence: 0.6,
            method: STUB_GEOCODE_METHOD.to_string(),
            elevation_m: None,
            standardized_address: address.clone(),
            raw: json!({ "input": address }),
        })
    }
}

// ============================================================================
// SECTION: Parcel Provider
// ============================================================================

/// Deterministic stub parcel provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubParcelProvider;

impl ParcelProvider for StubParcelProvider {
    fn name(&self) -> &str {
        STUB_PROVIDER
    }

    fn is_stub(&self) -> bool {
        true
    }

    fn parcel_lookup(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ParcelResult, ProviderError> {
        let token = format!("{latitude:.6}:{longitude:.6}");
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, token.as_bytes()).value;
        let parcel_id = format!("PARCEL-{}", &digest[..12]);
        let delta = 0.001;
        let boundary = json!({
            "type": "Polygon",
            "coordinates": [[
                [longitude - delta, latitude - delta],
                [longitude + delta, latitude - delta],
                [longitude + delta, latitude + delta],
                [longitude - delta, latitude + delta],
                [longitude - delta, latitude - delta],
            ]],
        });
        Ok(ParcelResult {
            provider: STUB_PROVIDER.to_string(),
            parcel_id,
            confidence: 0.7,
            elevation_m: None,
            vegetation_proximity_m: None,
            boundary,
            raw: json!({ "lat": latitude, "lon": longitude }),
        })
    }
}

// ============================================================================
// SECTION: Characteristics Provider
// ============================================================================

/// Deterministic stub characteristics provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubCharacteristicsProvider;

impl CharacteristicsProvider for StubCharacteristicsProvider {
    fn name(&self) -> &str {
        STUB_PROVIDER
    }

    fn is_stub(&self) -> bool {
        true
    }

    fn characteristics(
        &self,
        address_fingerprint: &str,
    ) -> Result<CharacteristicsResult, ProviderError> {
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, address_fingerprint.as_bytes()).value;
        let roof_index = usize::try_from(hex_window(&digest, 0..2)? % 4).map_err(|err| {
            ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string())
        })?;
        let roof_material = ROOF_MATERIALS[roof_index].to_string();
        let year_built = 1_950 + i64::try_from(hex_window(&digest, 2..6)? % 71).map_err(
            |err| ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string()),
        )?;
        let stories = 1 + i64::try_from(hex_window(&digest, 6..8)? % 3).map_err(|err| {
            ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string())
        })?;
        let sqft = 900.0
            + f64::from(u32::try_from(hex_window(&digest, 8..12)? % 3_100).map_err(|err| {
                ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string())
            })?);
        let vegetation = f64::from(u32::try_from(hex_window(&digest, 12..14)? % 60).map_err(
            |err| ProviderError::new(STUB_PROVIDER, ProviderErrorCode::Parse, err.to_string()),
        )?) + 1.0;
        Ok(CharacteristicsResult {
            provider: STUB_PROVIDER.to_string(),
            roof_material: Some(roof_material),
            year_built: Some(year_built),
            stories: Some(stories),
            sqft: Some(sqft),
            vegetation_proximity_m: Some(vegetation),
            field_confidence: [
                ("roof_material".to_string(), 0.7),
                ("year_built".to_string(), 0.6),
                ("stories".to_string(), 0.65),
                ("sqft".to_string(), 0.6),
                ("vegetation_proximity_m".to_string(), 0.55),
            ]
            .into_iter()
            .collect(),
            raw: json!({ "fingerprint": address_fingerprint }),
        })
    }
}
