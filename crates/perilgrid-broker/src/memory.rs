// perilgrid-broker/src/memory.rs
// ============================================================================
// Module: In-Memory Object Store
// Description: Map-backed object store for tests and sync pipelines.
// Purpose: Provide a deterministic ObjectStore without filesystem state.
// Dependencies: perilgrid-core
// ============================================================================

//! ## Overview
//! The memory store keeps objects in a mutex-guarded map. Checksums and URI
//! translation behave identically to the filesystem backend, so engine
//! tests exercise the same contract the workers see in deployment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::ObjectStore;
use perilgrid_core::ObjectStoreError;
use perilgrid_core::StoredObject;
use perilgrid_core::hashing::hash_bytes;

use crate::gateway::key_from_uri;
use crate::gateway::uri_for_key;
use crate::gateway::validate_key;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Map-backed object store.
pub struct MemoryObjectStore {
    /// Logical bucket name embedded in URIs.
    bucket: String,
    /// Stored objects keyed by object key.
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store for the given bucket.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        validate_key(key)?;
        let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, bytes);
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object map poisoned".to_string()))?;
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(StoredObject {
            uri: uri_for_key(&self.bucket, key),
            checksum,
        })
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        validate_key(key)?;
        let objects = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object map poisoned".to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    fn key_for_uri(&self, uri: &str) -> Result<String, ObjectStoreError> {
        key_from_uri(&self.bucket, uri)
    }
}
