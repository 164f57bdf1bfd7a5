// perilgrid-providers/src/registry.rs
// ============================================================================
// Module: Provider Registry
// Description: Builds the provider set from configuration.
// Purpose: Select stub or HTTP backends per provider.
// Dependencies: perilgrid-config, perilgrid-core
// ============================================================================

//! ## Overview
//! The registry turns a validated [`ProvidersConfig`] into a
//! [`ProviderSet`]. Configuration validation guarantees HTTP backends carry
//! a base URL, so the registry only fails when an HTTP client cannot be
//! constructed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use perilgrid_config::ProviderBackend;
use perilgrid_config::ProvidersConfig;
use perilgrid_core::ProviderError;
use perilgrid_core::ProviderErrorCode;
use perilgrid_core::ProviderSet;

use crate::http::HttpCharacteristicsProvider;
use crate::http::HttpGeocoder;
use crate::http::HttpParcelProvider;
use crate::stub::StubCharacteristicsProvider;
use crate::stub::StubGeocoder;
use crate::stub::StubParcelProvider;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Returns the missing-URL error for an HTTP backend.
fn missing_url(name: &str) -> ProviderError {
    ProviderError::new(
        name,
        ProviderErrorCode::BadRequest,
        "http backend requires a base url".to_string(),
    )
}

/// Builds the provider set selected by configuration.
///
/// # Errors
///
/// Returns [`ProviderError`] when an HTTP client cannot be constructed or a
/// base URL is missing.
pub fn provider_set(config: &ProvidersConfig) -> Result<ProviderSet, ProviderError> {
    let geocoder: Arc<dyn perilgrid_core::Geocoder> = match config.geocoder {
        ProviderBackend::Stub => Arc::new(StubGeocoder),
        ProviderBackend::Http => {
            let url = config
                .geocoder_url
                .as_deref()
                .ok_or_else(|| missing_url("http_geocoder"))?;
            Arc::new(HttpGeocoder::new(url, config.retry)?)
        }
    };
    let parcel: Arc<dyn perilgrid_core::ParcelProvider> = match config.parcel {
        ProviderBackend::Stub => Arc::new(StubParcelProvider),
        ProviderBackend::Http => {
            let url = config
                .parcel_url
                .as_deref()
                .ok_or_else(|| missing_url("http_parcel"))?;
            Arc::new(HttpParcelProvider::new(url, config.retry)?)
        }
    };
    let characteristics: Arc<dyn perilgrid_core::CharacteristicsProvider> =
        match config.characteristics {
            ProviderBackend::Stub => Arc::new(StubCharacteristicsProvider),
            ProviderBackend::Http => {
                let url = config
                    .characteristics_url
                    .as_deref()
                    .ok_or_else(|| missing_url("http_characteristics"))?;
                Arc::new(HttpCharacteristicsProvider::new(url, config.retry)?)
            }
        };
    Ok(ProviderSet {
        geocoder,
        parcel,
        characteristics,
    })
}
