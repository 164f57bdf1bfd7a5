// perilgrid-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load & Validation Tests
// Description: TOML loading, defaults, and fail-closed validation.
// ============================================================================
//! ## Overview
//! Validates that a minimal TOML file loads with defaults, that inconsistent
//! values fail closed, and that HTTP backends demand base URLs.

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

use std::fs;

use perilgrid_config::ConfigError;
use perilgrid_config::EngineConfig;
use perilgrid_config::ProviderBackend;
use tempfile::TempDir;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Tests the built-in defaults validate.
#[test]
fn test_defaults_validate() {
    let config = EngineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.fingerprint_reuse_days, 30);
    assert_eq!(config.profile_freshness_days, 30);
    assert_eq!(config.worker.scorer_batch_size, 1_000);
    assert_eq!(config.worker.overlay_batch_size, 200);
    assert_eq!(config.providers.geocoder, ProviderBackend::Stub);
}

/// Tests a minimal TOML file loads with defaults applied.
#[test]
fn test_minimal_toml_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("perilgrid.toml");
    fs::write(&path, "code_version = \"2026.08\"\n").unwrap();
    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.code_version, "2026.08");
    assert_eq!(config.worker.workers, 4);
}

/// Tests a full TOML file overrides sections.
#[test]
fn test_sectioned_toml_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("perilgrid.toml");
    fs::write(
        &path,
        "code_version = \"2026.08\"\n\
         fingerprint_reuse_days = 14\n\
         [providers]\n\
         geocoder = \"http\"\n\
         geocoder_url = \"https://geocoder.internal\"\n\
         [worker]\n\
         workers = 2\n\
         scorer_batch_size = 500\n",
    )
    .unwrap();
    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.fingerprint_reuse_days, 14);
    assert_eq!(config.providers.geocoder, ProviderBackend::Http);
    assert_eq!(config.worker.workers, 2);
    assert_eq!(config.worker.scorer_batch_size, 500);
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Tests non-positive windows and empty versions fail closed.
#[test]
fn test_invalid_values_rejected() {
    let mut config = EngineConfig::default();
    config.fingerprint_reuse_days = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = EngineConfig::default();
    config.code_version = "  ".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = EngineConfig::default();
    config.worker.workers = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

/// Tests HTTP provider backends require a base URL.
#[test]
fn test_http_backend_requires_url() {
    let mut config = EngineConfig::default();
    config.providers.parcel = ProviderBackend::Http;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    config.providers.parcel_url = Some("https://parcel.internal".to_string());
    config.validate().unwrap();
}
