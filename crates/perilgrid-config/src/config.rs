// perilgrid-config/src/config.rs
// ============================================================================
// Module: Perilgrid Engine Configuration
// Description: Engine, provider, storage, and worker configuration values.
// Purpose: Provide validated, immutable configuration for the pipeline.
// Dependencies: perilgrid-core, serde, toml, thiserror
// ============================================================================

//! ## Overview
//! [`EngineConfig`] carries the process snapshot frozen into runs
//! (`code_version`), provider selection with timeout and retry budgets,
//! object-store and database locations, worker-pool sizing, and the
//! deduplication windows. Loading from TOML applies serde defaults, then
//! [`EngineConfig::validate`] rejects inconsistent values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use perilgrid_core::RetryPolicy;
use perilgrid_core::runtime::RuntimeOptions;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration load and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Provider Configuration
// ============================================================================

/// Provider backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderBackend {
    /// Deterministic hash-derived stub.
    #[default]
    Stub,
    /// HTTP adapter against a configured base URL.
    Http,
}

/// Enrichment provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Geocoder backend.
    #[serde(default)]
    pub geocoder: ProviderBackend,
    /// Geocoder base URL for the HTTP backend.
    #[serde(default)]
    pub geocoder_url: Option<String>,
    /// Parcel backend.
    #[serde(default)]
    pub parcel: ProviderBackend,
    /// Parcel base URL for the HTTP backend.
    #[serde(default)]
    pub parcel_url: Option<String>,
    /// Characteristics backend.
    #[serde(default)]
    pub characteristics: ProviderBackend,
    /// Characteristics base URL for the HTTP backend.
    #[serde(default)]
    pub characteristics_url: Option<String>,
    /// Timeout and retry budget applied to every provider call.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            geocoder: ProviderBackend::Stub,
            geocoder_url: None,
            parcel: ProviderBackend::Stub,
            parcel_url: None,
            characteristics: ProviderBackend::Stub,
            characteristics_url: None,
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Storage Configuration
// ============================================================================

/// Relational and object storage locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Object store root directory.
    #[serde(default = "default_object_store_root")]
    pub object_store_root: PathBuf,
    /// Logical bucket name embedded in object URIs.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            object_store_root: default_object_store_root(),
            bucket: default_bucket(),
        }
    }
}

/// Returns the default database path.
fn default_database_path() -> PathBuf {
    PathBuf::from("perilgrid.sqlite")
}

/// Returns the default object store root.
fn default_object_store_root() -> PathBuf {
    PathBuf::from("objects")
}

/// Returns the default bucket name.
fn default_bucket() -> String {
    "perilgrid".to_string()
}

// ============================================================================
// SECTION: Worker Configuration
// ============================================================================

/// Worker pool sizing and batch boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker thread count.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Queue poll interval in milliseconds when idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Progress batch size for scorers.
    #[serde(default = "default_scorer_batch_size")]
    pub scorer_batch_size: usize,
    /// Progress batch size for overlays.
    #[serde(default = "default_overlay_batch_size")]
    pub overlay_batch_size: usize,
    /// Claims older than this are released back to the queue, in
    /// milliseconds.
    #[serde(default = "default_stale_claim_ms")]
    pub stale_claim_ms: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            scorer_batch_size: default_scorer_batch_size(),
            overlay_batch_size: default_overlay_batch_size(),
            stale_claim_ms: default_stale_claim_ms(),
        }
    }
}

/// Returns the default worker count.
const fn default_workers() -> usize {
    4
}

/// Returns the default idle poll interval.
const fn default_poll_interval_ms() -> u64 {
    250
}

/// Returns the default scorer batch size.
const fn default_scorer_batch_size() -> usize {
    1_000
}

/// Returns the default overlay batch size.
const fn default_overlay_batch_size() -> usize {
    200
}

/// Returns the default stale-claim window.
const fn default_stale_claim_ms() -> i64 {
    600_000
}

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine code version recorded on runs and fingerprints.
    #[serde(default = "default_code_version")]
    pub code_version: String,
    /// Reuse window for request-fingerprint deduplication, in days.
    #[serde(default = "default_fingerprint_reuse_days")]
    pub fingerprint_reuse_days: i64,
    /// Freshness window for property profiles, in days.
    #[serde(default = "default_profile_freshness_days")]
    pub profile_freshness_days: i64,
    /// Provider configuration.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            code_version: default_code_version(),
            fingerprint_reuse_days: default_fingerprint_reuse_days(),
            profile_freshness_days: default_profile_freshness_days(),
            providers: ProvidersConfig::default(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

/// Returns the default code version.
fn default_code_version() -> String {
    "dev".to_string()
}

/// Returns the default fingerprint reuse window.
const fn default_fingerprint_reuse_days() -> i64 {
    30
}

/// Returns the default profile freshness window.
const fn default_profile_freshness_days() -> i64 {
    30
}

impl EngineConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, unparseable, or
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_version.trim().is_empty() {
            return Err(ConfigError::Invalid("code_version must not be empty".to_string()));
        }
        if self.fingerprint_reuse_days <= 0 {
            return Err(ConfigError::Invalid(
                "fingerprint_reuse_days must be positive".to_string(),
            ));
        }
        if self.profile_freshness_days <= 0 {
            return Err(ConfigError::Invalid(
                "profile_freshness_days must be positive".to_string(),
            ));
        }
        if self.worker.workers == 0 {
            return Err(ConfigError::Invalid("workers must be positive".to_string()));
        }
        if self.worker.scorer_batch_size == 0 || self.worker.overlay_batch_size == 0 {
            return Err(ConfigError::Invalid("batch sizes must be positive".to_string()));
        }
        if self.providers.retry.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "provider timeout_ms must be positive".to_string(),
            ));
        }
        for (backend, url, name) in [
            (self.providers.geocoder, &self.providers.geocoder_url, "geocoder"),
            (self.providers.parcel, &self.providers.parcel_url, "parcel"),
            (
                self.providers.characteristics,
                &self.providers.characteristics_url,
                "characteristics",
            ),
        ] {
            if backend == ProviderBackend::Http
                && url.as_deref().is_none_or(|value| value.trim().is_empty())
            {
                return Err(ConfigError::Invalid(format!(
                    "{name} http backend requires a base url"
                )));
            }
        }
        Ok(())
    }

    /// Returns the runtime options frozen into runs.
    #[must_use]
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            code_version: self.code_version.clone(),
            scoring_version: perilgrid_core::SCORING_VERSION.to_string(),
            fingerprint_reuse_days: self.fingerprint_reuse_days,
            profile_freshness_days: self.profile_freshness_days,
        }
    }
}
