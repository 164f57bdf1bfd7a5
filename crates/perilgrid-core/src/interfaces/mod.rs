// perilgrid-core/src/interfaces/mod.rs
// ============================================================================
// Module: Perilgrid Interfaces
// Description: Backend-agnostic seams for storage, blobs, providers, and time.
// Purpose: Define the contract surfaces used by the runtime and workers.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Perilgrid integrates with external systems without
//! embedding backend-specific details. Implementations must be deterministic
//! where the contract demands it and fail closed on missing or invalid data.
//! Every store method is tenant-scoped: implementations must apply the
//! tenant predicate to each query and never join across tenants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AuditEvent;
use crate::core::AuditEventId;
use crate::core::Breach;
use crate::core::BreachId;
use crate::core::CharacteristicsResult;
use crate::core::DriftDetail;
use crate::core::DriftRun;
use crate::core::DriftRunId;
use crate::core::ExposureUpload;
use crate::core::ExposureVersion;
use crate::core::ExposureVersionId;
use crate::core::GeoPoint;
use crate::core::GeocodeResult;
use crate::core::HashDigest;
use crate::core::HazardDataset;
use crate::core::HazardDatasetId;
use crate::core::HazardDatasetVersion;
use crate::core::HazardDatasetVersionId;
use crate::core::HazardFeature;
use crate::core::HazardOverlayResult;
use crate::core::IdempotencyKey;
use crate::core::Location;
use crate::core::LocationHazardAttribute;
use crate::core::LocationId;
use crate::core::MappingTemplate;
use crate::core::MappingTemplateId;
use crate::core::NormalizedAddress;
use crate::core::OverlayResultId;
use crate::core::ParcelResult;
use crate::core::PolicyPack;
use crate::core::PolicyPackId;
use crate::core::PolicyPackVersion;
use crate::core::PolicyPackVersionId;
use crate::core::PropertyProfile;
use crate::core::PropertyProfileId;
use crate::core::ProviderError;
use crate::core::QueuedTask;
use crate::core::ResilienceScoreItem;
use crate::core::ResilienceScoreResult;
use crate::core::RollupConfig;
use crate::core::RollupConfigId;
use crate::core::RollupItem;
use crate::core::RollupResult;
use crate::core::RollupResultId;
use crate::core::Run;
use crate::core::RunId;
use crate::core::RunType;
use crate::core::ScoreItemId;
use crate::core::ScoreResultId;
use crate::core::TaskId;
use crate::core::Tenant;
use crate::core::TenantId;
use crate::core::ThresholdRule;
use crate::core::User;
use crate::core::UserId;
use crate::core::ThresholdRuleId;
use crate::core::Timestamp;
use crate::core::UploadId;
use crate::core::UwFinding;
use crate::core::UwFindingId;
use crate::core::UwRule;
use crate::core::UwRuleId;
use crate::core::ValidationResult;
use crate::core::ValidationResultId;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock seam; the core never reads system time directly.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Object Store
// ============================================================================

/// Object store errors.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// Underlying I/O failure.
    #[error("object store io error: {0}")]
    Io(String),
    /// Key or URI failed validation.
    #[error("object store invalid key: {0}")]
    InvalidKey(String),
    /// Object not found.
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Reference to a stored object, returned by `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object URI.
    pub uri: String,
    /// SHA-256 checksum of the stored bytes.
    pub checksum: HashDigest,
}

/// Byte-addressed object store gateway.
pub trait ObjectStore: Send + Sync {
    /// Stores bytes under a key and returns the URI plus checksum.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the key is invalid or the write fails.
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError>;

    /// Fetches the bytes stored under a key.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the key is invalid or missing.
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Translates a stored URI back to its key.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::InvalidKey`] when the URI does not belong
    /// to this store.
    fn key_for_uri(&self, uri: &str) -> Result<String, ObjectStoreError>;
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Relational store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Unique-constraint or idempotency violation.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Tenant-scoped lookup failed.
    #[error("store not found: {0}")]
    NotFound(String),
    /// Stored data failed to decode or validate.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Store engine reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Persistence for run records.
///
/// Insert methods ignore the entity's `id` field and return the assigned id.
pub trait RunStore {
    /// Inserts a run and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_run(&self, run: &Run) -> Result<RunId, StoreError>;

    /// Loads a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn run(&self, tenant_id: &TenantId, run_id: RunId) -> Result<Option<Run>, StoreError>;

    /// Updates a run row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn update_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Finds a non-terminal run of the given type matching a fingerprint
    /// recorded in its input references.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn find_active_run_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        run_type: RunType,
        fingerprint: &str,
    ) -> Result<Option<Run>, StoreError>;
}

// ============================================================================
// SECTION: Task Queue
// ============================================================================

/// Durable FIFO task queue consumed by the worker pool.
pub trait TaskQueue {
    /// Appends a task and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the enqueue fails.
    fn enqueue(&self, task: &QueuedTask) -> Result<TaskId, StoreError>;

    /// Claims the oldest unclaimed task, marking it with the worker name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the claim fails.
    fn claim_next(&self, worker: &str, now: Timestamp)
    -> Result<Option<QueuedTask>, StoreError>;

    /// Completes a claimed task, removing it from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the completion fails.
    fn complete(&self, task_id: TaskId) -> Result<(), StoreError>;

    /// Releases tasks claimed before the cutoff back to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the release fails.
    fn release_stale(&self, claimed_before: Timestamp) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Exposure Store
// ============================================================================

/// Persistence for tenants, uploads, mappings, versions, and locations.
pub trait ExposureStore {
    /// Inserts a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_tenant(&self, tenant: &Tenant) -> Result<(), StoreError>;

    /// Loads a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, StoreError>;

    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate `(tenant, email)`.
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Loads a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn user(&self, tenant_id: &TenantId, user_id: &UserId)
    -> Result<Option<User>, StoreError>;

    /// Inserts an upload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate idempotency key.
    fn insert_upload(&self, upload: &ExposureUpload) -> Result<(), StoreError>;

    /// Loads an upload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn upload(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
    ) -> Result<Option<ExposureUpload>, StoreError>;

    /// Finds an upload by idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn upload_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &IdempotencyKey,
    ) -> Result<Option<ExposureUpload>, StoreError>;

    /// Attaches a mapping template to an upload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the upload does not exist.
    fn set_upload_mapping(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        mapping_template_id: MappingTemplateId,
    ) -> Result<(), StoreError>;

    /// Inserts a mapping template and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_mapping_template(
        &self,
        template: &MappingTemplate,
    ) -> Result<MappingTemplateId, StoreError>;

    /// Loads a mapping template.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn mapping_template(
        &self,
        tenant_id: &TenantId,
        template_id: MappingTemplateId,
    ) -> Result<Option<MappingTemplate>, StoreError>;

    /// Returns the latest version number for a template name, when any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_mapping_version(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<i64>, StoreError>;

    /// Inserts a validation result and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_validation_result(
        &self,
        result: &ValidationResult,
    ) -> Result<ValidationResultId, StoreError>;

    /// Inserts an exposure version and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the uniqueness constraints are
    /// violated.
    fn insert_exposure_version(
        &self,
        version: &ExposureVersion,
    ) -> Result<ExposureVersionId, StoreError>;

    /// Loads an exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn exposure_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Option<ExposureVersion>, StoreError>;

    /// Finds an exposure version by upload and mapping template.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn exposure_version_by_upload(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        mapping_template_id: Option<MappingTemplateId>,
    ) -> Result<Option<ExposureVersion>, StoreError>;

    /// Finds an exposure version by upload and idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn exposure_version_by_idempotency(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        key: &IdempotencyKey,
    ) -> Result<Option<ExposureVersion>, StoreError>;

    /// Bulk-inserts locations and returns the inserted count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on duplicate external location ids.
    fn insert_locations(&self, locations: &[Location]) -> Result<u64, StoreError>;

    /// Loads all locations of an exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn locations_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<Location>, StoreError>;

    /// Loads one location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn location(
        &self,
        tenant_id: &TenantId,
        location_id: LocationId,
    ) -> Result<Option<Location>, StoreError>;

    /// Updates a location row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the location does not exist.
    fn update_location(&self, location: &Location) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Hazard Store
// ============================================================================

/// Persistence for the hazard registry and overlay output.
pub trait HazardStore {
    /// Inserts a hazard dataset and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_hazard_dataset(
        &self,
        dataset: &HazardDataset,
    ) -> Result<HazardDatasetId, StoreError>;

    /// Loads a hazard dataset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn hazard_dataset(
        &self,
        tenant_id: &TenantId,
        dataset_id: HazardDatasetId,
    ) -> Result<Option<HazardDataset>, StoreError>;

    /// Inserts a dataset version and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_hazard_dataset_version(
        &self,
        version: &HazardDatasetVersion,
    ) -> Result<HazardDatasetVersionId, StoreError>;

    /// Loads a dataset version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn hazard_dataset_version(
        &self,
        tenant_id: &TenantId,
        version_id: HazardDatasetVersionId,
    ) -> Result<Option<HazardDatasetVersion>, StoreError>;

    /// Bulk-inserts features and returns the inserted count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_hazard_features(&self, features: &[HazardFeature]) -> Result<u64, StoreError>;

    /// Returns the features of the given dataset versions containing a point.
    ///
    /// Implementations prefilter by bounding box and confirm containment
    /// with the exact multipolygon test.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn features_containing(
        &self,
        tenant_id: &TenantId,
        version_ids: &[HazardDatasetVersionId],
        point: GeoPoint,
    ) -> Result<Vec<HazardFeature>, StoreError>;

    /// Inserts an overlay result and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_overlay_result(
        &self,
        result: &HazardOverlayResult,
    ) -> Result<OverlayResultId, StoreError>;

    /// Loads an overlay result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn overlay_result(
        &self,
        tenant_id: &TenantId,
        result_id: OverlayResultId,
    ) -> Result<Option<HazardOverlayResult>, StoreError>;

    /// Updates an overlay result row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the result does not exist.
    fn update_overlay_result(&self, result: &HazardOverlayResult) -> Result<(), StoreError>;

    /// Bulk-inserts location hazard attributes and returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_location_hazard_attributes(
        &self,
        attributes: &[LocationHazardAttribute],
    ) -> Result<u64, StoreError>;

    /// Loads the attributes produced by one overlay.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn attributes_for_overlay(
        &self,
        tenant_id: &TenantId,
        overlay_result_id: OverlayResultId,
    ) -> Result<Vec<LocationHazardAttribute>, StoreError>;

    /// Loads all attributes attached to locations of an exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn attributes_for_exposure(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<LocationHazardAttribute>, StoreError>;

    /// Deletes the attributes produced by one overlay (retry clearing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_attributes_for_overlay(
        &self,
        tenant_id: &TenantId,
        overlay_result_id: OverlayResultId,
    ) -> Result<u64, StoreError>;

    /// Loads the overlay results targeting one exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn overlay_results_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<HazardOverlayResult>, StoreError>;
}

// ============================================================================
// SECTION: Rollup Store
// ============================================================================

/// Persistence for rollup configurations and results.
pub trait RollupStore {
    /// Inserts a rollup configuration and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_rollup_config(&self, config: &RollupConfig)
    -> Result<RollupConfigId, StoreError>;

    /// Loads a rollup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn rollup_config(
        &self,
        tenant_id: &TenantId,
        config_id: RollupConfigId,
    ) -> Result<Option<RollupConfig>, StoreError>;

    /// Returns the latest version number for a configuration name, when any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_rollup_config_version(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<i64>, StoreError>;

    /// Inserts a rollup result and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_rollup_result(&self, result: &RollupResult)
    -> Result<RollupResultId, StoreError>;

    /// Loads a rollup result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<Option<RollupResult>, StoreError>;

    /// Updates a rollup result row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the result does not exist.
    fn update_rollup_result(&self, result: &RollupResult) -> Result<(), StoreError>;

    /// Bulk-inserts rollup items and returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on duplicate key hashes per result.
    fn insert_rollup_items(&self, items: &[RollupItem]) -> Result<u64, StoreError>;

    /// Loads the items of one rollup result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn items_for_rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<Vec<RollupItem>, StoreError>;

    /// Deletes the items of one rollup result (retry clearing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_items_for_rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<u64, StoreError>;

    /// Loads the rollup results aggregating one exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn rollup_results_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<RollupResult>, StoreError>;
}

// ============================================================================
// SECTION: Breach Store
// ============================================================================

/// Persistence for threshold rules and breaches.
pub trait BreachStore {
    /// Inserts a threshold rule and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_threshold_rule(&self, rule: &ThresholdRule)
    -> Result<ThresholdRuleId, StoreError>;

    /// Loads the active threshold rules, optionally restricted to ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn active_threshold_rules(
        &self,
        tenant_id: &TenantId,
        rule_ids: Option<&[ThresholdRuleId]>,
    ) -> Result<Vec<ThresholdRule>, StoreError>;

    /// Loads a breach by its uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn breach_by_key(
        &self,
        tenant_id: &TenantId,
        rule_id: ThresholdRuleId,
        version_id: ExposureVersionId,
        rollup_key_hash: &str,
    ) -> Result<Option<Breach>, StoreError>;

    /// Loads a breach by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn breach(
        &self,
        tenant_id: &TenantId,
        breach_id: BreachId,
    ) -> Result<Option<Breach>, StoreError>;

    /// Inserts a breach and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate uniqueness key.
    fn insert_breach(&self, breach: &Breach) -> Result<BreachId, StoreError>;

    /// Updates a breach row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the breach does not exist.
    fn update_breach(&self, breach: &Breach) -> Result<(), StoreError>;

    /// Loads every breach of one rule against one exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn breaches_for_rule_version(
        &self,
        tenant_id: &TenantId,
        rule_id: ThresholdRuleId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<Breach>, StoreError>;
}

// ============================================================================
// SECTION: Drift Store
// ============================================================================

/// Persistence for drift runs and details.
pub trait DriftStore {
    /// Inserts a drift run and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_drift_run(&self, run: &DriftRun) -> Result<DriftRunId, StoreError>;

    /// Loads a drift run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn drift_run(
        &self,
        tenant_id: &TenantId,
        drift_run_id: DriftRunId,
    ) -> Result<Option<DriftRun>, StoreError>;

    /// Updates a drift run row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn update_drift_run(&self, run: &DriftRun) -> Result<(), StoreError>;

    /// Bulk-inserts drift details and returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_drift_details(&self, details: &[DriftDetail]) -> Result<u64, StoreError>;

    /// Deletes the details of one drift run (retry clearing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_details_for_drift_run(
        &self,
        tenant_id: &TenantId,
        drift_run_id: DriftRunId,
    ) -> Result<u64, StoreError>;

    /// Loads the drift runs touching one exposure version (as A or B).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn drift_runs_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<DriftRun>, StoreError>;
}

// ============================================================================
// SECTION: Resilience Store
// ============================================================================

/// Persistence for resilience score results.
pub trait ResilienceStore {
    /// Inserts a score result and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate request fingerprint;
    /// the losing writer translates this into an existing-in-progress
    /// response.
    fn insert_score_result(
        &self,
        result: &ResilienceScoreResult,
    ) -> Result<ScoreResultId, StoreError>;

    /// Loads a score result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn score_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<Option<ResilienceScoreResult>, StoreError>;

    /// Finds a score result by request fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn score_result_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
    ) -> Result<Option<ResilienceScoreResult>, StoreError>;

    /// Updates a score result row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the result does not exist.
    fn update_score_result(&self, result: &ResilienceScoreResult) -> Result<(), StoreError>;

    /// Bulk-inserts score items and returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_score_items(&self, items: &[ResilienceScoreItem]) -> Result<u64, StoreError>;

    /// Loads all score items of one result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn score_items_for_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<Vec<ResilienceScoreItem>, StoreError>;

    /// Loads one keyset page of score items ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn score_items_page(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
        after: ScoreItemId,
        limit: u64,
    ) -> Result<Vec<ResilienceScoreItem>, StoreError>;

    /// Deletes the items of one score result (retry clearing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_items_for_score_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Profile Store
// ============================================================================

/// Persistence for property profiles.
pub trait ProfileStore {
    /// Loads a profile by address fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn profile_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
    ) -> Result<Option<PropertyProfile>, StoreError>;

    /// Loads a profile by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn profile(
        &self,
        tenant_id: &TenantId,
        profile_id: PropertyProfileId,
    ) -> Result<Option<PropertyProfile>, StoreError>;

    /// Inserts or replaces a profile by `(tenant, address_fingerprint)` and
    /// returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upsert fails.
    fn upsert_profile(&self, profile: &PropertyProfile)
    -> Result<PropertyProfileId, StoreError>;
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Persistence for policy packs.
pub trait PolicyStore {
    /// Inserts a policy pack and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_policy_pack(&self, pack: &PolicyPack) -> Result<PolicyPackId, StoreError>;

    /// Loads a policy pack.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn policy_pack(
        &self,
        tenant_id: &TenantId,
        pack_id: PolicyPackId,
    ) -> Result<Option<PolicyPack>, StoreError>;

    /// Inserts a policy pack version and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_policy_pack_version(
        &self,
        version: &PolicyPackVersion,
    ) -> Result<PolicyPackVersionId, StoreError>;

    /// Loads a policy pack version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the load fails.
    fn policy_pack_version(
        &self,
        tenant_id: &TenantId,
        version_id: PolicyPackVersionId,
    ) -> Result<Option<PolicyPackVersion>, StoreError>;
}

// ============================================================================
// SECTION: Underwriting Store
// ============================================================================

/// Persistence for underwriting rules and findings.
pub trait UwStore {
    /// Inserts an underwriting rule and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_uw_rule(&self, rule: &UwRule) -> Result<UwRuleId, StoreError>;

    /// Loads the active underwriting rules, optionally restricted to ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn active_uw_rules(
        &self,
        tenant_id: &TenantId,
        rule_ids: Option<&[UwRuleId]>,
    ) -> Result<Vec<UwRule>, StoreError>;

    /// Loads a finding by its location uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn uw_finding_by_location(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
        location_id: LocationId,
    ) -> Result<Option<UwFinding>, StoreError>;

    /// Loads a finding by its rollup-key uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn uw_finding_by_rollup_key(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
        rollup_key_hash: &str,
    ) -> Result<Option<UwFinding>, StoreError>;

    /// Inserts a finding and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_uw_finding(&self, finding: &UwFinding) -> Result<UwFindingId, StoreError>;

    /// Updates a finding row in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the finding does not exist.
    fn update_uw_finding(&self, finding: &UwFinding) -> Result<(), StoreError>;

    /// Loads every finding of one rule against one exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn uw_findings_for_rule_version(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<UwFinding>, StoreError>;
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// Persistence for append-only audit events.
pub trait AuditStore {
    /// Appends an audit event and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_audit_event(&self, event: &AuditEvent) -> Result<AuditEventId, StoreError>;
}

// ============================================================================
// SECTION: Combined Store
// ============================================================================

/// Combined store surface consumed by the runtime and workers.
pub trait Store:
    RunStore
    + TaskQueue
    + ExposureStore
    + HazardStore
    + RollupStore
    + BreachStore
    + DriftStore
    + ResilienceStore
    + ProfileStore
    + PolicyStore
    + UwStore
    + AuditStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: RunStore
        + TaskQueue
        + ExposureStore
        + HazardStore
        + RollupStore
        + BreachStore
        + DriftStore
        + ResilienceStore
        + ProfileStore
        + PolicyStore
        + UwStore
        + AuditStore
        + Send
        + Sync
{
}

// ============================================================================
// SECTION: Providers
// ============================================================================

/// Forward geocoding provider.
pub trait Geocoder: Send + Sync {
    /// Returns the provider name.
    fn name(&self) -> &str;

    /// Returns true when the provider is the deterministic stub.
    fn is_stub(&self) -> bool {
        false
    }

    /// Resolves coordinates for a normalized address.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] classified by the retry taxonomy.
    fn forward_geocode(&self, address: &NormalizedAddress)
    -> Result<GeocodeResult, ProviderError>;
}

/// Parcel lookup provider.
pub trait ParcelProvider: Send + Sync {
    /// Returns the provider name.
    fn name(&self) -> &str;

    /// Returns true when the provider is the deterministic stub.
    fn is_stub(&self) -> bool {
        false
    }

    /// Looks up the parcel containing a coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] classified by the retry taxonomy.
    fn parcel_lookup(&self, latitude: f64, longitude: f64)
    -> Result<ParcelResult, ProviderError>;
}

/// Property characteristics provider.
pub trait CharacteristicsProvider: Send + Sync {
    /// Returns the provider name.
    fn name(&self) -> &str;

    /// Returns true when the provider is the deterministic stub.
    fn is_stub(&self) -> bool {
        false
    }

    /// Fetches characteristics for an address fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] classified by the retry taxonomy.
    fn characteristics(
        &self,
        address_fingerprint: &str,
    ) -> Result<CharacteristicsResult, ProviderError>;
}

/// Bundle of the three enrichment providers.
#[derive(Clone)]
pub struct ProviderSet {
    /// Geocoder implementation.
    pub geocoder: Arc<dyn Geocoder>,
    /// Parcel provider implementation.
    pub parcel: Arc<dyn ParcelProvider>,
    /// Characteristics provider implementation.
    pub characteristics: Arc<dyn CharacteristicsProvider>,
}

impl ProviderSet {
    /// Returns true when every provider is the deterministic stub.
    #[must_use]
    pub fn all_stub(&self) -> bool {
        self.geocoder.is_stub() && self.parcel.is_stub() && self.characteristics.is_stub()
    }
}
