// perilgrid-broker/src/fs_store.rs
// ============================================================================
// Module: Filesystem Object Store
// Description: Directory-backed object store with atomic-enough writes.
// Purpose: Persist artifacts under a root directory keyed by object key.
// Dependencies: perilgrid-core
// ============================================================================

//! ## Overview
//! The filesystem store maps validated keys directly onto paths under its
//! root. Writes go through a temporary sibling file followed by a rename so
//! readers never observe partial artifacts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

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

/// Directory-backed object store.
pub struct FsObjectStore {
    /// Root directory holding objects.
    root: PathBuf,
    /// Logical bucket name embedded in URIs.
    bucket: String,
}

impl FsObjectStore {
    /// Creates a store rooted at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::Io`] when the root cannot be created.
    pub fn new(root: PathBuf, bucket: impl Into<String>) -> Result<Self, ObjectStoreError> {
        fs::create_dir_all(&root).map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        Ok(Self {
            root,
            bucket: bucket.into(),
        })
    }

    /// Resolves the path for a validated key.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in key.split('/') {
            path.push(component);
        }
        path
    }
}

impl ObjectStore for FsObjectStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        validate_key(key)?;
        let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, bytes);
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        }
        let temp = path.with_extension("tmp-write");
        fs::write(&temp, bytes).map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        fs::rename(&temp, &path).map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        Ok(StoredObject {
            uri: uri_for_key(&self.bucket, key),
            checksum,
        })
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        validate_key(key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        fs::read(&path).map_err(|err| ObjectStoreError::Io(err.to_string()))
    }

    fn key_for_uri(&self, uri: &str) -> Result<String, ObjectStoreError> {
        key_from_uri(&self.bucket, uri)
    }
}
