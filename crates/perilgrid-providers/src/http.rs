// perilgrid-providers/src/http.rs
// ============================================================================
// Module: HTTP Providers
// Description: Blocking HTTP adapters for enrichment providers.
// Purpose: Bounded provider calls with retry classification.
// Dependencies: perilgrid-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! HTTP providers issue bounded blocking GET requests with explicit
//! timeouts, redirects disabled, and failures classified into the retry
//! taxonomy: `timeout`, `rate_limited`, and `upstream` retry; `auth`,
//! `bad_request`, and `parse` do not. Each call retries up to the
//! configured budget before surfacing the last error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use perilgrid_core::CharacteristicsProvider;
use perilgrid_core::CharacteristicsResult;
use perilgrid_core::GeocodeResult;
use perilgrid_core::Geocoder;
use perilgrid_core::NormalizedAddress;
use perilgrid_core::ParcelProvider;
use perilgrid_core::ParcelResult;
use perilgrid_core::ProviderError;
use perilgrid_core::ProviderErrorCode;
use perilgrid_core::RetryPolicy;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde_json::Value;
use url::Url;

// ============================================================================
// SECTION: Shared Client
// ============================================================================

/// Builds the bounded blocking client for one provider.
fn build_client(provider: &str, policy: RetryPolicy) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_millis(policy.timeout_ms))
        .redirect(Policy::none())
        .build()
        .map_err(|err| {
            ProviderError::new(provider, ProviderErrorCode::Upstream, err.to_string())
        })
}

/// Classifies a transport error into the taxonomy.
fn classify_transport(provider: &str, err: &reqwest::Error) -> ProviderError {
    let code = if err.is_timeout() {
        ProviderErrorCode::Timeout
    } else {
        ProviderErrorCode::Upstream
    };
    ProviderError::new(provider, code, err.to_string())
}

/// Classifies a non-success status into the taxonomy.
fn classify_status(provider: &str, status: StatusCode) -> ProviderError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorCode::Auth,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderErrorCode::BadRequest
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorCode::RateLimited,
        _ => ProviderErrorCode::Upstream,
    };
    ProviderError::new(provider, code, format!("status {status}"))
}

/// Issues one GET returning parsed JSON.
fn get_json(provider: &str, client: &Client, url: &Url) -> Result<Value, ProviderError> {
    let response = client
        .get(url.clone())
        .send()
        .map_err(|err| classify_transport(provider, &err))?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(provider, status));
    }
    response
        .json::<Value>()
        .map_err(|err| ProviderError::new(provider, ProviderErrorCode::Parse, err.to_string()))
}

/// Runs an operation under the retry budget; only retryable codes retry.
fn call_with_retry<T>(
    policy: RetryPolicy,
    mut operation: impl FnMut() -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Builds a provider endpoint URL with query pairs.
fn endpoint(
    provider: &str,
    base_url: &str,
    path: &str,
    query: &[(&str, String)],
) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base_url).map_err(|err| {
        ProviderError::new(provider, ProviderErrorCode::BadRequest, err.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::new(
            provider,
            ProviderErrorCode::BadRequest,
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    url.set_path(path);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Reads a required float field from a payload.
fn required_f64(provider: &str, payload: &Value, field: &str) -> Result<f64, ProviderError> {
    payload.get(field).and_then(Value::as_f64).ok_or_else(|| {
        ProviderError::new(
            provider,
            ProviderErrorCode::Parse,
            format!("missing numeric field {field}"),
        )
    })
}

// ============================================================================
// SECTION: Geocoder
// ============================================================================

/// HTTP geocoder adapter.
pub struct HttpGeocoder {
    /// Base URL of the geocoding service.
    base_url: String,
    /// Retry budget.
    policy: RetryPolicy,
    /// Bounded blocking client.
    client: Client,
}

impl HttpGeocoder {
    /// Creates a geocoder against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the client cannot be built.
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, ProviderError> {
        let client = build_client("http_geocoder", policy)?;
        Ok(Self {
            base_url: base_url.into(),
            policy,
            client,
        })
    }
}

impl Geocoder for HttpGeocoder {
    fn name(&self) -> &str {
        "http_geocoder"
    }

    fn forward_geocode(
        &self,
        address: &NormalizedAddress,
    ) -> Result<GeocodeResult, ProviderError> {
        let url = endpoint(
            self.name(),
            &self.base_url,
            "/geocode/forward",
            &[
                (
                    "address_line1",
                    address.address_line1.clone().unwrap_or_default(),
                ),
                ("city", address.city.clone().unwrap_or_default()),
                (
                    "state_region",
                    address.state_region.clone().unwrap_or_default(),
                ),
                (
                    "postal_code",
                    address.postal_code.clone().unwrap_or_default(),
                ),
                ("country", address.country.clone().unwrap_or_default()),
            ],
        )?;
        let payload =
            call_with_retry(self.policy, || get_json(self.name(), &self.client, &url))?;
        Ok(GeocodeResult {
            provider: self.name().to_string(),
            latitude: required_f64(self.name(), &payload, "lat")?,
            longitude: required_f64(self.name(), &payload, "lon")?,
            confidence: payload.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
            method: payload
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("HTTP")
                .to_string(),
            elevation_m: payload.get("elevation_m").and_then(Value::as_f64),
            standardized_address: address.clone(),
            raw: payload,
        })
    }
}

// ============================================================================
// SECTION: Parcel Provider
// ============================================================================

/// HTTP parcel adapter.
pub struct HttpParcelProvider {
    /// Base URL of the parcel service.
    base_url: String,
    /// Retry budget.
    policy: RetryPolicy,
    /// Bounded blocking client.
    client: Client,
}

impl HttpParcelProvider {
    /// Creates a parcel provider against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the client cannot be built.
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, ProviderError> {
        let client = build_client("http_parcel", policy)?;
        Ok(Self {
            base_url: base_url.into(),
            policy,
            client,
        })
    }
}

impl ParcelProvider for HttpParcelProvider {
    fn name(&self) -> &str {
        "http_parcel"
    }

    fn parcel_lookup(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ParcelResult, ProviderError> {
        let url = endpoint(
            self.name(),
            &self.base_url,
            "/parcel/lookup",
            &[
                ("lat", format!("{latitude}")),
                ("lon", format!("{longitude}")),
            ],
        )?;
        let payload =
            call_with_retry(self.policy, || get_json(self.name(), &self.client, &url))?;
        let parcel_id = payload
            .get("parcel_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::new(
                    self.name(),
                    ProviderErrorCode::Parse,
                    "missing parcel_id".to_string(),
                )
            })?
            .to_string();
        Ok(ParcelResult {
            provider: self.name().to_string(),
            parcel_id,
            confidence: payload.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
            elevation_m: payload.get("elevation_m").and_then(Value::as_f64),
            vegetation_proximity_m: payload
                .get("vegetation_proximity_m")
                .and_then(Value::as_f64),
            boundary: payload
                .get("boundary_geojson")
                .cloned()
                .unwrap_or(Value::Null),
            raw: payload,
        })
    }
}

// ============================================================================
// SECTION: Characteristics Provider
// ============================================================================

/// HTTP characteristics adapter.
pub struct HttpCharacteristicsProvider {
    /// Base URL of the characteristics service.
    base_url: String,
    /// Retry budget.
    policy: RetryPolicy,
    /// Bounded blocking client.
    client: Client,
}

impl HttpCharacteristicsProvider {
    /// Creates a characteristics provider against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the client cannot be built.
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, ProviderError> {
        let client = build_client("http_characteristics", policy)?;
        Ok(Self {
            base_url: base_url.into(),
            policy,
            client,
        })
    }
}

impl CharacteristicsProvider for HttpCharacteristicsProvider {
    fn name(&self) -> &str {
        "http_characteristics"
    }

    fn characteristics(
        &self,
        address_fingerprint: &str,
    ) -> Result<CharacteristicsResult, ProviderError> {
        let url = endpoint(
            self.name(),
            &self.base_url,
            "/characteristics",
            &[("fingerprint", address_fingerprint.to_string())],
        )?;
        let payload =
            call_with_retry(self.policy, || get_json(self.name(), &self.client, &url))?;
        let field_confidence = payload
            .get("field_confidence")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| {
                        value.as_f64().map(|confidence| (key.clone(), confidence))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(CharacteristicsResult {
            provider: self.name().to_string(),
            roof_material: payload
                .get("roof_material")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            year_built: payload.get("year_built").and_then(Value::as_i64),
            stories: payload.get("stories").and_then(Value::as_i64),
            sqft: payload.get("sqft").and_then(Value::as_f64),
            vegetation_proximity_m: payload
                .get("vegetation_proximity_m")
                .and_then(Value::as_f64),
            field_confidence,
            raw: payload,
        })
    }
}
