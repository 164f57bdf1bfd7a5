// perilgrid-broker/src/gateway.rs
// ============================================================================
// Module: Blob URI Gateway
// Description: Key validation and URI ↔ key translation.
// Purpose: Keep object addressing stable across backends.
// Dependencies: perilgrid-core, url
// ============================================================================

//! ## Overview
//! Artifact URIs use the `blob://bucket/key` scheme. Keys are restricted to
//! a safe character set with bounded component lengths and no traversal, so
//! the filesystem backend can map them directly to paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use perilgrid_core::ObjectStoreError;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI scheme for broker-managed blobs.
pub const BLOB_SCHEME: &str = "blob";
/// Maximum length of a single key component.
const MAX_COMPONENT_LENGTH: usize = 255;
/// Maximum total key length.
const MAX_KEY_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Key Validation
// ============================================================================

/// Validates an object key: bounded, slash-separated, no traversal.
///
/// # Errors
///
/// Returns [`ObjectStoreError::InvalidKey`] when the key is unsafe.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(ObjectStoreError::InvalidKey(format!(
            "key length out of bounds: {}",
            key.len()
        )));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(ObjectStoreError::InvalidKey(
            "key must not start or end with '/'".to_string(),
        ));
    }
    for component in key.split('/') {
        if component.is_empty() || component.len() > MAX_COMPONENT_LENGTH {
            return Err(ObjectStoreError::InvalidKey(
                "key component length out of bounds".to_string(),
            ));
        }
        if component == "." || component == ".." {
            return Err(ObjectStoreError::InvalidKey(
                "key must not contain traversal components".to_string(),
            ));
        }
        let safe = component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
        if !safe {
            return Err(ObjectStoreError::InvalidKey(format!(
                "key component contains unsafe characters: {component}"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: URI Translation
// ============================================================================

/// Builds the blob URI for a bucket and key.
#[must_use]
pub fn uri_for_key(bucket: &str, key: &str) -> String {
    format!("{BLOB_SCHEME}://{bucket}/{key}")
}

/// Extracts the key from a blob URI belonging to the given bucket.
///
/// # Errors
///
/// Returns [`ObjectStoreError::InvalidKey`] when the URI does not parse,
/// carries the wrong scheme or bucket, or embeds an unsafe key.
pub fn key_from_uri(bucket: &str, uri: &str) -> Result<String, ObjectStoreError> {
    let parsed = Url::parse(uri)
        .map_err(|err| ObjectStoreError::InvalidKey(format!("uri parse: {err}")))?;
    if parsed.scheme() != BLOB_SCHEME {
        return Err(ObjectStoreError::InvalidKey(format!(
            "unsupported uri scheme: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str() != Some(bucket) {
        return Err(ObjectStoreError::InvalidKey(format!(
            "uri bucket mismatch: {uri}"
        )));
    }
    let key = parsed.path().trim_start_matches('/').to_string();
    validate_key(&key)?;
    Ok(key)
}
