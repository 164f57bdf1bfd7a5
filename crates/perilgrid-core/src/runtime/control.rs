// perilgrid-core/src/runtime/control.rs
// ============================================================================
// Module: Perilgrid Control Plane
// Description: Role-gated control-plane operations with idempotent dedup.
// Purpose: Provide the single canonical execution path for every surface.
// Dependencies: crate::{core, interfaces, runtime, stages}
// ============================================================================

//! ## Overview
//! The control plane is the single canonical execution path for Perilgrid.
//! All API surfaces must call into these methods to preserve idempotency,
//! tenancy, and auditability: uploads and mappings, run triggers for every
//! pipeline stage, fingerprint-deduplicated batch scoring, property profile
//! resolution, cancel/retry, breach acknowledgement, lineage, and exports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::AddressInput;
use crate::core::AuditEvent;
use crate::core::AuditEventId;
use crate::core::Breach;
use crate::core::BreachId;
use crate::core::CallerIdentity;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::DataQuality;
use crate::core::DriftRun;
use crate::core::DriftRunId;
use crate::core::Explainability;
use crate::core::ExposureUpload;
use crate::core::ExposureVersionId;
use crate::core::HashDigest;
use crate::core::HashError;
use crate::core::HazardDataset;
use crate::core::HazardDatasetId;
use crate::core::HazardDatasetVersion;
use crate::core::HazardDatasetVersionId;
use crate::core::HazardEntry;
use crate::core::HazardFeature;
use crate::core::HazardFeatureCollection;
use crate::core::HazardFeatureId;
use crate::core::IdempotencyKey;
use crate::core::LifecycleStatus;
use crate::core::MappingTemplate;
use crate::core::MappingTemplateId;
use crate::core::MeasureSpec;
use crate::core::OVERLAY_METHOD;
use crate::core::OverlayResultId;
use crate::core::PolicyMeta;
use crate::core::PolicyPack;
use crate::core::PolicyPackId;
use crate::core::PolicyPackVersion;
use crate::core::PolicyPackVersionId;
use crate::core::PropertyProfileId;
use crate::core::RequestId;
use crate::core::ResilienceScoreResult;
use crate::core::ResolvedPolicy;
use crate::core::RollupConfig;
use crate::core::RollupConfigId;
use crate::core::RollupResult;
use crate::core::RollupResultId;
use crate::core::Run;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::RunType;
use crate::core::ScoreBreakdown;
use crate::core::ScoreItemId;
use crate::core::ScoreRequestIdentity;
use crate::core::ScoreResultId;
use crate::core::ScoringConfig;
use crate::core::StructuralAttributes;
use crate::core::ThresholdRule;
use crate::core::ThresholdRuleId;
use crate::core::ThresholdRuleSpec;
use crate::core::Timestamp;
use crate::core::UnderwritingDecision;
use crate::core::UnderwritingPolicy;
use crate::core::UploadId;
use crate::core::UwRule;
use crate::core::UwRuleId;
use crate::core::UwTarget;
use crate::core::underwriting_policy_with_overrides;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::merge_policy_overrides;
use crate::core::score_request_fingerprint;
use crate::interfaces::Clock;
use crate::interfaces::ObjectStore;
use crate::interfaces::ObjectStoreError;
use crate::interfaces::ProviderSet;
use crate::interfaces::Store;
use crate::interfaces::StoreError;
use crate::runtime::RuntimeOptions;
use crate::runtime::lineage::LineageEntityType;
use crate::runtime::lineage::LineageGraph;
use crate::runtime::lineage::build_lineage;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::RunRegistry;
use crate::stages::EngineError;
use crate::stages::bucketing::ScoreBuckets;
use crate::stages::enrichment::EnrichMode;
use crate::stages::enrichment::EnrichmentAction;
use crate::stages::enrichment::EnrichmentStatus;
use crate::stages::enrichment::address_fingerprint;
use crate::stages::enrichment::decide_enrichment_action;
use crate::stages::enrichment::determine_enrich_mode;
use crate::stages::enrichment::normalize_address;
use crate::stages::explainability::build_explainability;
use crate::stages::export::export_row;
use crate::stages::export::rows_to_csv;
use crate::stages::resilience::compute_resilience_score;
use crate::stages::underwriting_decision::evaluate_underwriting_decision;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by control-plane operations.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Request payload failed its contract.
    #[error("validation error: {0}")]
    Validation(String),
    /// Tenant-scoped lookup failed.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller role does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Idempotency or lifecycle conflict.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Enrichment failed and best-effort was not requested.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Object store operation failed.
    #[error(transparent)]
    Objects(#[from] ObjectStoreError),
    /// Canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Stage engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Run registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Requests & Responses
// ============================================================================

/// Reference to a queued run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    /// Run identifier.
    pub run_id: RunId,
    /// Status at creation.
    pub status: RunStatus,
}

/// Upload creation payload.
#[derive(Debug, Clone)]
pub struct CreateUploadRequest {
    /// Raw file bytes.
    pub file_bytes: Vec<u8>,
    /// Declared content type.
    pub content_type: String,
    /// Original filename.
    pub filename: String,
    /// Optional idempotency key.
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Upload creation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCreated {
    /// Upload identifier.
    pub upload_id: UploadId,
    /// Object-store URI of the raw bytes.
    pub object_uri: String,
    /// SHA-256 checksum of the raw bytes.
    pub checksum: HashDigest,
}

/// Mapping attachment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachMappingRequest {
    /// Template name.
    pub name: String,
    /// Source→destination column renames.
    pub mapping: BTreeMap<String, String>,
}

/// Mapping attachment outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingAttached {
    /// Template identifier.
    pub mapping_template_id: MappingTemplateId,
    /// Template name.
    pub name: String,
    /// Assigned monotonic version.
    pub version: i64,
}

/// Commit request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommitUploadRequest {
    /// Display name for the exposure version.
    pub name: Option<String>,
    /// Optional idempotency key.
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Commit outcome: an existing version or a queued run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CommitOutcome {
    /// A matching exposure version already exists.
    Existing {
        /// Existing exposure version identifier.
        exposure_version_id: ExposureVersionId,
    },
    /// A commit run was queued.
    Queued {
        /// Queued run reference.
        run: RunHandle,
    },
}

/// Hazard dataset creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHazardDatasetRequest {
    /// Dataset name.
    pub name: String,
    /// Default peril for features without a category.
    pub peril: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Hazard version upload payload.
#[derive(Debug, Clone)]
pub struct UploadHazardVersionRequest {
    /// Version label; generated from the upload time when absent.
    pub version_label: Option<String>,
    /// Raw dataset bytes (feature collection JSON).
    pub file_bytes: Vec<u8>,
    /// Effective date of the dataset.
    pub effective_date: Option<Timestamp>,
}

/// Hazard version upload outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardVersionUploaded {
    /// Version identifier.
    pub id: HazardDatasetVersionId,
    /// SHA-256 checksum of the raw bytes.
    pub checksum: HashDigest,
    /// Features indexed from the payload.
    pub features_indexed: u64,
}

/// Overlay trigger payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerOverlayRequest {
    /// Target exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Hazard dataset versions to join, one overlay result per version.
    pub hazard_dataset_version_ids: Vec<HazardDatasetVersionId>,
    /// Caller-supplied overlay parameters.
    #[serde(default)]
    pub params: Value,
}

/// One triggered overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayTriggered {
    /// Overlay result identifier.
    pub overlay_result_id: OverlayResultId,
    /// Queued run reference.
    pub run: RunHandle,
}

/// Rollup configuration creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRollupConfigRequest {
    /// Configuration name.
    pub name: String,
    /// Group-by dimension fields.
    pub dimensions: Vec<String>,
    /// Record filters.
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    /// Measures computed per group.
    pub measures: Vec<MeasureSpec>,
}

/// Rollup trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRollupRequest {
    /// Target exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Configuration to execute.
    pub rollup_config_id: RollupConfigId,
    /// Overlay results joined for hazard dimensions.
    #[serde(default)]
    pub hazard_overlay_result_ids: Vec<OverlayResultId>,
}

/// Rollup trigger outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupTriggered {
    /// Rollup result identifier.
    pub rollup_result_id: RollupResultId,
    /// Queued run reference.
    pub run: RunHandle,
}

/// Threshold rule creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateThresholdRuleRequest {
    /// Rule name.
    pub name: String,
    /// Severity label.
    pub severity: String,
    /// Predicate body.
    pub rule: ThresholdRuleSpec,
}

/// Breach evaluation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBreachEvalRequest {
    /// Rollup result to evaluate.
    pub rollup_result_id: RollupResultId,
    /// Restrict evaluation to these rules, when present.
    #[serde(default)]
    pub threshold_rule_ids: Option<Vec<ThresholdRuleId>>,
}

/// Drift trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDriftRequest {
    /// Baseline exposure version (A).
    pub exposure_version_a_id: ExposureVersionId,
    /// Candidate exposure version (B).
    pub exposure_version_b_id: ExposureVersionId,
}

/// Drift trigger outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftTriggered {
    /// Drift run identifier.
    pub drift_run_id: DriftRunId,
    /// Queued run reference.
    pub run: RunHandle,
}

/// Underwriting rule creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUwRuleRequest {
    /// Rule name.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Severity label.
    pub severity: String,
    /// Record kind the rule targets.
    pub target: UwTarget,
    /// Predicate document.
    pub rule: Value,
}

/// Underwriting evaluation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUwEvalRequest {
    /// Exposure version to evaluate.
    pub exposure_version_id: ExposureVersionId,
    /// Rollup result supplying rollup-target records, when any.
    #[serde(default)]
    pub rollup_result_id: Option<RollupResultId>,
    /// Restrict evaluation to these rules, when present.
    #[serde(default)]
    pub uw_rule_ids: Option<Vec<UwRuleId>>,
}

/// Batch scoring payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResilienceBatchRequest {
    /// Exposure version to score.
    pub exposure_version_id: ExposureVersionId,
    /// Hazard dataset versions consulted for worst-in-peril entries.
    #[serde(default)]
    pub hazard_dataset_version_ids: Vec<HazardDatasetVersionId>,
    /// Scoring configuration overrides.
    #[serde(default)]
    pub config: Option<Value>,
    /// Forces a rerun by perturbing the fingerprint inputs.
    #[serde(default)]
    pub force: bool,
    /// Explicit policy pack version.
    #[serde(default)]
    pub policy_pack_version_id: Option<PolicyPackVersionId>,
}

/// Batch scoring dedup status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchScoreStatus {
    /// A new scoring run was queued.
    Queued,
    /// An equal-fingerprint request is already queued or running.
    ExistingInProgress,
    /// An equal-fingerprint result already succeeded inside the window.
    ExistingSucceeded,
}

/// Batch scoring outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchScoreOutcome {
    /// Score result identifier.
    pub resilience_score_result_id: ScoreResultId,
    /// Run executing (or having executed) the scoring, when known.
    pub run_id: Option<RunId>,
    /// Dedup status.
    pub status: BatchScoreStatus,
}

/// Single-property scoring payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreResilienceRequest {
    /// Property address for enrichment.
    pub address: AddressInput,
    /// Caller-supplied per-peril hazard entries.
    #[serde(default)]
    pub hazards: BTreeMap<String, HazardEntry>,
    /// Caller-supplied structural overrides.
    #[serde(default)]
    pub structural: Option<StructuralAttributes>,
    /// Scoring configuration overrides.
    #[serde(default)]
    pub config: Option<Value>,
    /// Explicit policy pack version.
    #[serde(default)]
    pub policy_pack_version_id: Option<PolicyPackVersionId>,
    /// Prefer a fresh cached profile over re-enrichment.
    #[serde(default = "default_true")]
    pub prefer_cached: bool,
    /// Force provider refresh even when a fresh profile exists.
    #[serde(default)]
    pub force_refresh: bool,
    /// Explicit enrichment mode (`sync`/`async`); decided from providers
    /// when absent.
    #[serde(default)]
    pub enrich_mode: Option<String>,
    /// Seconds the caller is willing to wait for async enrichment.
    #[serde(default)]
    pub wait_for_enrichment_seconds: u64,
    /// Score best-effort when enrichment is pending or failed.
    #[serde(default)]
    pub best_effort: bool,
}

/// Serde default helper returning true.
const fn default_true() -> bool {
    true
}

/// Single-property scoring response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ScoreResilienceResponse {
    /// Scoring completed.
    Scored {
        /// Full scoring breakdown.
        breakdown: ScoreBreakdown,
        /// Underwriting disposition with mitigation recommendations.
        decision: UnderwritingDecision,
        /// Explainability payload: drivers, impacts, narrative.
        explainability: Explainability,
        /// Enrichment state at scoring time.
        enrichment_status: String,
        /// Profile used for structural input, when any.
        property_profile_id: Option<PropertyProfileId>,
        /// Resolved policy metadata.
        policy: PolicyMeta,
    },
    /// Enrichment was queued; retry after it completes (202).
    EnrichmentQueued {
        /// Queued enrichment run.
        run_id: RunId,
    },
}

/// Profile resolution payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePropertyProfileRequest {
    /// Property address.
    pub address: AddressInput,
    /// Return a fresh cached profile when available.
    #[serde(default = "default_true")]
    pub prefer_cached: bool,
    /// Force provider refresh.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Profile resolution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileResolutionStatus {
    /// A fresh cached profile was returned.
    Cached,
    /// An enrichment run was queued.
    Queued,
    /// An equal-fingerprint enrichment run is already queued or running.
    ExistingInProgress,
}

/// Profile resolution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResolution {
    /// Resolution status.
    pub status: ProfileResolutionStatus,
    /// Cached profile, when status is CACHED.
    pub property_profile_id: Option<PropertyProfileId>,
    /// Queued or in-flight run, when any.
    pub run_id: Option<RunId>,
}

/// Disclosure summary for one score result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResilienceSummary {
    /// Scored location count.
    pub total_locations: u64,
    /// Portfolio TIV over every location of the exposure version.
    pub total_tiv: f64,
    /// Scored-location count per bucket.
    pub bucket_counts: BTreeMap<String, u64>,
    /// TIV sum per bucket.
    pub bucket_tiv: BTreeMap<String, f64>,
}

// ============================================================================
// SECTION: Control Plane
// ============================================================================

/// Control plane over the store, object-store, and provider seams.
pub struct ControlPlane<'a> {
    /// Combined store.
    store: &'a dyn Store,
    /// Object store gateway.
    objects: &'a dyn ObjectStore,
    /// Enrichment providers.
    providers: &'a ProviderSet,
    /// Time source.
    clock: &'a dyn Clock,
    /// Runtime options.
    options: RuntimeOptions,
}

impl<'a> ControlPlane<'a> {
    /// Creates a control plane.
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        objects: &'a dyn ObjectStore,
        providers: &'a ProviderSet,
        clock: &'a dyn Clock,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            store,
            objects,
            providers,
            clock,
            options,
        }
    }

    /// Returns a registry bound to this control plane's seams.
    fn registry(&self) -> RunRegistry<'a> {
        RunRegistry::new(self.store, self.clock, self.options.code_version.clone())
    }

    /// Requires a role permitted to mutate the control plane.
    fn require_mutating(identity: &CallerIdentity) -> Result<(), ControlPlaneError> {
        if identity.role.can_mutate() {
            Ok(())
        } else {
            Err(ControlPlaneError::Forbidden(format!(
                "role {:?} may not mutate the control plane",
                identity.role
            )))
        }
    }

    /// Requires a role permitted to trigger scoring and rollups.
    fn require_analytics(identity: &CallerIdentity) -> Result<(), ControlPlaneError> {
        if identity.role.can_trigger_analytics() {
            Ok(())
        } else {
            Err(ControlPlaneError::Forbidden(format!(
                "role {:?} may not trigger analytics runs",
                identity.role
            )))
        }
    }

    /// Honors the inbound correlation id or derives a deterministic one.
    fn ensure_request_id(
        &self,
        identity: &CallerIdentity,
        operation: &str,
        request_id: Option<RequestId>,
    ) -> Result<RequestId, ControlPlaneError> {
        if let Some(id) = request_id {
            return Ok(id);
        }
        let seed = json!([
            identity.tenant_id,
            operation,
            self.clock.now(),
        ]);
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &seed)?;
        Ok(RequestId::new(format!("req-{}", &digest.value[..32])))
    }

    /// Appends an audit event for a mutating operation.
    fn audit(
        &self,
        identity: &CallerIdentity,
        action: &str,
        metadata: Value,
        request_id: Option<&RequestId>,
    ) -> Result<(), ControlPlaneError> {
        let event = AuditEvent {
            id: AuditEventId::new(0),
            tenant_id: identity.tenant_id.clone(),
            user_id: Some(identity.user_id.clone()),
            action: action.to_string(),
            metadata,
            request_id: request_id.cloned(),
            created_at: self.clock.now(),
        };
        self.store.append_audit_event(&event)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Uploads & mapping
    // ------------------------------------------------------------------

    /// Creates an exposure upload, idempotent on the caller key.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role, store, or blob failures.
    pub fn create_upload(
        &self,
        identity: &CallerIdentity,
        request: &CreateUploadRequest,
        request_id: Option<RequestId>,
    ) -> Result<UploadCreated, ControlPlaneError> {
        Self::require_mutating(identity)?;
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) =
                self.store.upload_by_idempotency_key(&identity.tenant_id, key)?
            {
                return Ok(UploadCreated {
                    upload_id: existing.id,
                    object_uri: existing.object_uri,
                    checksum: existing.checksum,
                });
            }
        }

        let now = self.clock.now();
        let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, &request.file_bytes);
        let id_seed = json!([
            identity.tenant_id,
            checksum.value,
            request
                .idempotency_key
                .as_ref()
                .map_or_else(|| now.as_unix_millis().to_string(), ToString::to_string),
        ]);
        let id_digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &id_seed)?;
        let upload_id = UploadId::new(format!("up-{}", &id_digest.value[..16]));

        let key = format!(
            "uploads/{}/{}/{}",
            identity.tenant_id, upload_id, request.filename
        );
        let stored = self.objects.put(&key, &request.file_bytes, &request.content_type)?;

        let upload = ExposureUpload {
            id: upload_id.clone(),
            tenant_id: identity.tenant_id.clone(),
            filename: request.filename.clone(),
            content_type: request.content_type.clone(),
            object_uri: stored.uri.clone(),
            checksum: checksum.clone(),
            idempotency_key: request.idempotency_key.clone(),
            mapping_template_id: None,
            created_by: Some(identity.user_id.clone()),
            created_at: now,
        };
        match self.store.insert_upload(&upload) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                // Idempotency-key race: the concurrent writer won.
                if let Some(key) = &request.idempotency_key {
                    if let Some(existing) =
                        self.store.upload_by_idempotency_key(&identity.tenant_id, key)?
                    {
                        return Ok(UploadCreated {
                            upload_id: existing.id,
                            object_uri: existing.object_uri,
                            checksum: existing.checksum,
                        });
                    }
                }
                return Err(ControlPlaneError::Conflict("duplicate upload".to_string()));
            }
            Err(other) => return Err(other.into()),
        }

        self.audit(
            identity,
            "upload_created",
            json!({ "upload_id": upload_id, "checksum": checksum.value.clone() }),
            request_id.as_ref(),
        )?;
        Ok(UploadCreated {
            upload_id,
            object_uri: stored.uri,
            checksum,
        })
    }

    /// Attaches a versioned mapping template to an upload.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the upload is missing.
    pub fn attach_mapping(
        &self,
        identity: &CallerIdentity,
        upload_id: &UploadId,
        request: &AttachMappingRequest,
        request_id: Option<RequestId>,
    ) -> Result<MappingAttached, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let upload = self
            .store
            .upload(&identity.tenant_id, upload_id)?
            .ok_or_else(|| ControlPlaneError::NotFound(format!("upload {upload_id}")))?;

        let version = self
            .store
            .latest_mapping_version(&identity.tenant_id, &request.name)?
            .unwrap_or(0)
            + 1;
        let template = MappingTemplate {
            id: MappingTemplateId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: request.name.clone(),
            version,
            template: request.mapping.clone(),
            created_at: self.clock.now(),
        };
        let template_id = self.store.insert_mapping_template(&template)?;
        self.store
            .set_upload_mapping(&identity.tenant_id, &upload.id, template_id)?;

        self.audit(
            identity,
            "mapping_attached",
            json!({ "upload_id": upload.id, "mapping_template_id": template_id }),
            request_id.as_ref(),
        )?;
        Ok(MappingAttached {
            mapping_template_id: template_id,
            name: request.name.clone(),
            version,
        })
    }

    /// Queues a validation run for an upload.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the upload is missing.
    pub fn validate_upload(
        &self,
        identity: &CallerIdentity,
        upload_id: &UploadId,
        request_id: Option<RequestId>,
    ) -> Result<RunHandle, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let upload = self
            .store
            .upload(&identity.tenant_id, upload_id)?
            .ok_or_else(|| ControlPlaneError::NotFound(format!("upload {upload_id}")))?;
        let request_id = self.ensure_request_id(identity, "validate_upload", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::Validation,
            json!({ "upload_id": upload.id }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        Ok(RunHandle {
            run_id: run.id,
            status: run.status,
        })
    }

    /// Commits an upload, returning the existing version when idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the upload is missing.
    pub fn commit_upload(
        &self,
        identity: &CallerIdentity,
        upload_id: &UploadId,
        request: &CommitUploadRequest,
        request_id: Option<RequestId>,
    ) -> Result<CommitOutcome, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let upload = self
            .store
            .upload(&identity.tenant_id, upload_id)?
            .ok_or_else(|| ControlPlaneError::NotFound(format!("upload {upload_id}")))?;

        if let Some(existing) = self.store.exposure_version_by_upload(
            &identity.tenant_id,
            &upload.id,
            upload.mapping_template_id,
        )? {
            return Ok(CommitOutcome::Existing {
                exposure_version_id: existing.id,
            });
        }
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.store.exposure_version_by_idempotency(
                &identity.tenant_id,
                &upload.id,
                key,
            )? {
                return Ok(CommitOutcome::Existing {
                    exposure_version_id: existing.id,
                });
            }
        }

        let request_id = self.ensure_request_id(identity, "commit_upload", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::Commit,
            json!({
                "upload_id": upload.id,
                "name": request.name.clone().unwrap_or_else(|| "Exposure".to_string()),
            }),
            json!({ "idempotency_key": request.idempotency_key }),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        Ok(CommitOutcome::Queued {
            run: RunHandle {
                run_id: run.id,
                status: run.status,
            },
        })
    }

    /// Queues a geocode-and-quality run for an exposure version.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the version is missing.
    pub fn geocode(
        &self,
        identity: &CallerIdentity,
        exposure_version_id: ExposureVersionId,
        request_id: Option<RequestId>,
    ) -> Result<RunHandle, ControlPlaneError> {
        Self::require_mutating(identity)?;
        self.store
            .exposure_version(&identity.tenant_id, exposure_version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "exposure version {exposure_version_id}"
                ))
            })?;
        let request_id = self.ensure_request_id(identity, "geocode", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::Geocode,
            json!({ "exposure_version_id": exposure_version_id }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        Ok(RunHandle {
            run_id: run.id,
            status: run.status,
        })
    }

    // ------------------------------------------------------------------
    // Hazard registry
    // ------------------------------------------------------------------

    /// Registers a hazard dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn create_hazard_dataset(
        &self,
        identity: &CallerIdentity,
        request: &CreateHazardDatasetRequest,
        request_id: Option<RequestId>,
    ) -> Result<HazardDatasetId, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let dataset = HazardDataset {
            id: HazardDatasetId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: request.name.clone(),
            peril: request
                .peril
                .as_deref()
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty()),
            description: request.description.clone(),
            created_at: self.clock.now(),
        };
        let dataset_id = self.store.insert_hazard_dataset(&dataset)?;
        self.audit(
            identity,
            "hazard_dataset_created",
            json!({ "hazard_dataset_id": dataset_id, "name": request.name }),
            request_id.as_ref(),
        )?;
        Ok(dataset_id)
    }

    /// Uploads and indexes a hazard dataset version.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::Validation`] when the payload is not a
    /// feature collection.
    pub fn upload_hazard_version(
        &self,
        identity: &CallerIdentity,
        dataset_id: HazardDatasetId,
        request: &UploadHazardVersionRequest,
        request_id: Option<RequestId>,
    ) -> Result<HazardVersionUploaded, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let dataset = self
            .store
            .hazard_dataset(&identity.tenant_id, dataset_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("hazard dataset {dataset_id}"))
            })?;

        let now = self.clock.now();
        let checksum = hash_bytes(DEFAULT_HASH_ALGORITHM, &request.file_bytes);
        let version_label = request
            .version_label
            .clone()
            .unwrap_or_else(|| format!("v{}", now.as_unix_millis()));
        let collection: HazardFeatureCollection =
            serde_json::from_slice(&request.file_bytes).map_err(|err| {
                ControlPlaneError::Validation(format!("hazard payload: {err}"))
            })?;

        let key = format!(
            "hazards/{}/{}/{}.json",
            identity.tenant_id, dataset_id, version_label
        );
        let stored = self.objects.put(&key, &request.file_bytes, "application/json")?;

        let version = HazardDatasetVersion {
            id: HazardDatasetVersionId::new(0),
            tenant_id: identity.tenant_id.clone(),
            dataset_id: dataset.id,
            version_label,
            object_uri: stored.uri,
            checksum: checksum.clone(),
            effective_date: request.effective_date,
            created_at: now,
        };
        let version_id = self.store.insert_hazard_dataset_version(&version)?;

        let features: Vec<HazardFeature> = collection
            .features
            .into_iter()
            .map(|payload| HazardFeature {
                id: HazardFeatureId::new(0),
                tenant_id: identity.tenant_id.clone(),
                dataset_version_id: version_id,
                geometry: payload.geometry,
                properties: payload.properties,
            })
            .collect();
        let features_indexed = self.store.insert_hazard_features(&features)?;

        self.audit(
            identity,
            "hazard_version_uploaded",
            json!({
                "hazard_dataset_id": dataset.id,
                "hazard_dataset_version_id": version_id,
                "features_indexed": features_indexed,
            }),
            request_id.as_ref(),
        )?;
        Ok(HazardVersionUploaded {
            id: version_id,
            checksum,
            features_indexed,
        })
    }

    // ------------------------------------------------------------------
    // Stage triggers
    // ------------------------------------------------------------------

    /// Triggers one overlay run per hazard dataset version.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when a referenced entity is
    /// missing.
    pub fn trigger_overlay(
        &self,
        identity: &CallerIdentity,
        request: &TriggerOverlayRequest,
        request_id: Option<RequestId>,
    ) -> Result<Vec<OverlayTriggered>, ControlPlaneError> {
        Self::require_analytics(identity)?;
        if request.hazard_dataset_version_ids.is_empty() {
            return Err(ControlPlaneError::Validation(
                "hazard_dataset_version_ids must not be empty".to_string(),
            ));
        }
        self.store
            .exposure_version(&identity.tenant_id, request.exposure_version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "exposure version {}",
                    request.exposure_version_id
                ))
            })?;

        let request_id = self.ensure_request_id(identity, "trigger_overlay", request_id)?;
        let mut triggered = Vec::with_capacity(request.hazard_dataset_version_ids.len());
        for version_id in &request.hazard_dataset_version_ids {
            self.store
                .hazard_dataset_version(&identity.tenant_id, *version_id)?
                .ok_or_else(|| {
                    ControlPlaneError::NotFound(format!(
                        "hazard dataset version {version_id}"
                    ))
                })?;
            let mut overlay = crate::core::HazardOverlayResult {
                id: OverlayResultId::new(0),
                tenant_id: identity.tenant_id.clone(),
                exposure_version_id: request.exposure_version_id,
                dataset_version_id: *version_id,
                run_id: None,
                method: OVERLAY_METHOD.to_string(),
                params: request.params.clone(),
                created_at: self.clock.now(),
            };
            overlay.id = self.store.insert_overlay_result(&overlay)?;
            let run = self.registry().create_queued(
                &identity.tenant_id,
                RunType::Overlay,
                json!({
                    "overlay_result_id": overlay.id,
                    "exposure_version_id": request.exposure_version_id,
                    "hazard_dataset_version_id": version_id,
                }),
                json!({ "params": request.params }),
                Some(identity.user_id.clone()),
                Some(request_id.clone()),
            )?;
            overlay.run_id = Some(run.id);
            self.store.update_overlay_result(&overlay)?;
            triggered.push(OverlayTriggered {
                overlay_result_id: overlay.id,
                run: RunHandle {
                    run_id: run.id,
                    status: run.status,
                },
            });
        }
        Ok(triggered)
    }

    /// Creates a versioned rollup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn create_rollup_config(
        &self,
        identity: &CallerIdentity,
        request: &CreateRollupConfigRequest,
    ) -> Result<RollupConfigId, ControlPlaneError> {
        Self::require_analytics(identity)?;
        if request.dimensions.is_empty() {
            return Err(ControlPlaneError::Validation(
                "dimensions must not be empty".to_string(),
            ));
        }
        let version = self
            .store
            .latest_rollup_config_version(&identity.tenant_id, &request.name)?
            .unwrap_or(0)
            + 1;
        let config = RollupConfig {
            id: RollupConfigId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: request.name.clone(),
            version,
            dimensions: request.dimensions.clone(),
            filters: request.filters.clone(),
            measures: request.measures.clone(),
            created_by: Some(identity.user_id.clone()),
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_rollup_config(&config)?)
    }

    /// Triggers a rollup run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when a referenced entity is
    /// missing.
    pub fn trigger_rollup(
        &self,
        identity: &CallerIdentity,
        request: &TriggerRollupRequest,
        request_id: Option<RequestId>,
    ) -> Result<RollupTriggered, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let version = self
            .store
            .exposure_version(&identity.tenant_id, request.exposure_version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "exposure version {}",
                    request.exposure_version_id
                ))
            })?;
        self.store
            .rollup_config(&identity.tenant_id, request.rollup_config_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "rollup config {}",
                    request.rollup_config_id
                ))
            })?;

        let mut result = RollupResult {
            id: RollupResultId::new(0),
            tenant_id: identity.tenant_id.clone(),
            exposure_version_id: version.id,
            rollup_config_id: request.rollup_config_id,
            run_id: None,
            overlay_result_ids: request.hazard_overlay_result_ids.clone(),
            checksum: None,
            created_at: self.clock.now(),
        };
        result.id = self.store.insert_rollup_result(&result)?;

        let request_id = self.ensure_request_id(identity, "trigger_rollup", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::Rollup,
            json!({
                "rollup_result_id": result.id,
                "exposure_version_id": version.id,
                "rollup_config_id": request.rollup_config_id,
                "hazard_overlay_result_ids": request.hazard_overlay_result_ids,
            }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        result.run_id = Some(run.id);
        self.store.update_rollup_result(&result)?;
        Ok(RollupTriggered {
            rollup_result_id: result.id,
            run: RunHandle {
                run_id: run.id,
                status: run.status,
            },
        })
    }

    /// Creates a threshold rule.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn create_threshold_rule(
        &self,
        identity: &CallerIdentity,
        request: &CreateThresholdRuleRequest,
    ) -> Result<ThresholdRuleId, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let rule = ThresholdRule {
            id: ThresholdRuleId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: request.name.clone(),
            severity: request.severity.clone(),
            active: true,
            rule: request.rule.clone(),
            created_by: Some(identity.user_id.clone()),
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_threshold_rule(&rule)?)
    }

    /// Queues a breach evaluation run over a rollup result.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the rollup result is
    /// missing.
    pub fn run_breach_eval(
        &self,
        identity: &CallerIdentity,
        request: &RunBreachEvalRequest,
        request_id: Option<RequestId>,
    ) -> Result<RunHandle, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let rollup = self
            .store
            .rollup_result(&identity.tenant_id, request.rollup_result_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "rollup result {}",
                    request.rollup_result_id
                ))
            })?;
        let request_id = self.ensure_request_id(identity, "run_breach_eval", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::BreachEval,
            json!({
                "rollup_result_id": rollup.id,
                "exposure_version_id": rollup.exposure_version_id,
                "threshold_rule_ids": request.threshold_rule_ids,
            }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        Ok(RunHandle {
            run_id: run.id,
            status: run.status,
        })
    }

    /// Acknowledges or resolves a breach, validating the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::Conflict`] on an invalid transition.
    pub fn update_breach_status(
        &self,
        identity: &CallerIdentity,
        breach_id: BreachId,
        status: LifecycleStatus,
        request_id: Option<RequestId>,
    ) -> Result<Breach, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let mut breach = self
            .store
            .breach(&identity.tenant_id, breach_id)?
            .ok_or_else(|| ControlPlaneError::NotFound(format!("breach {breach_id}")))?;
        if !breach.status.can_transition_to(status) {
            return Err(ControlPlaneError::Conflict(format!(
                "breach transition {} -> {} not allowed",
                breach.status.as_str(),
                status.as_str()
            )));
        }
        let now = self.clock.now();
        breach.status = status;
        match status {
            LifecycleStatus::Resolved => breach.resolved_at = Some(now),
            LifecycleStatus::Open => breach.resolved_at = None,
            LifecycleStatus::Acked => {}
        }
        self.store.update_breach(&breach)?;
        self.audit(
            identity,
            "breach_status_updated",
            json!({ "breach_id": breach_id, "status": status.as_str() }),
            request_id.as_ref(),
        )?;
        Ok(breach)
    }

    /// Triggers a drift comparison run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when a version is missing.
    pub fn trigger_drift(
        &self,
        identity: &CallerIdentity,
        request: &TriggerDriftRequest,
        request_id: Option<RequestId>,
    ) -> Result<DriftTriggered, ControlPlaneError> {
        Self::require_analytics(identity)?;
        for version_id in [request.exposure_version_a_id, request.exposure_version_b_id] {
            self.store
                .exposure_version(&identity.tenant_id, version_id)?
                .ok_or_else(|| {
                    ControlPlaneError::NotFound(format!("exposure version {version_id}"))
                })?;
        }
        let mut drift = DriftRun {
            id: DriftRunId::new(0),
            tenant_id: identity.tenant_id.clone(),
            exposure_version_a_id: request.exposure_version_a_id,
            exposure_version_b_id: request.exposure_version_b_id,
            run_id: None,
            storage_uri: None,
            checksum: None,
            config: json!({}),
            created_at: self.clock.now(),
        };
        drift.id = self.store.insert_drift_run(&drift)?;

        let request_id = self.ensure_request_id(identity, "trigger_drift", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::Drift,
            json!({
                "drift_run_id": drift.id,
                "exposure_version_a_id": request.exposure_version_a_id,
                "exposure_version_b_id": request.exposure_version_b_id,
            }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        drift.run_id = Some(run.id);
        self.store.update_drift_run(&drift)?;
        Ok(DriftTriggered {
            drift_run_id: drift.id,
            run: RunHandle {
                run_id: run.id,
                status: run.status,
            },
        })
    }

    /// Creates an underwriting rule.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn create_uw_rule(
        &self,
        identity: &CallerIdentity,
        request: &CreateUwRuleRequest,
    ) -> Result<UwRuleId, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let rule = UwRule {
            id: UwRuleId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: request.name.clone(),
            category: request.category.clone(),
            severity: request.severity.clone(),
            target: request.target,
            active: true,
            rule: request.rule.clone(),
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_uw_rule(&rule)?)
    }

    /// Queues an underwriting evaluation run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the version is missing.
    pub fn run_uw_eval(
        &self,
        identity: &CallerIdentity,
        request: &RunUwEvalRequest,
        request_id: Option<RequestId>,
    ) -> Result<RunHandle, ControlPlaneError> {
        Self::require_analytics(identity)?;
        self.store
            .exposure_version(&identity.tenant_id, request.exposure_version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "exposure version {}",
                    request.exposure_version_id
                ))
            })?;
        let request_id = self.ensure_request_id(identity, "run_uw_eval", request_id)?;
        let run = self.registry().create_queued(
            &identity.tenant_id,
            RunType::UwEval,
            json!({
                "exposure_version_id": request.exposure_version_id,
                "rollup_result_id": request.rollup_result_id,
                "uw_rule_ids": request.uw_rule_ids,
            }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?;
        Ok(RunHandle {
            run_id: run.id,
            status: run.status,
        })
    }

    // ------------------------------------------------------------------
    // Policy resolution
    // ------------------------------------------------------------------

    /// Resolves the effective policy: explicit version, tenant default,
    /// then built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when an explicit version is
    /// missing within the tenant.
    pub fn resolve_policy(
        &self,
        identity: &CallerIdentity,
        policy_pack_version_id: Option<PolicyPackVersionId>,
    ) -> Result<ResolvedPolicy, ControlPlaneError> {
        let resolved_id = match policy_pack_version_id {
            Some(id) => Some(id),
            None => self
                .store
                .tenant(&identity.tenant_id)?
                .and_then(|tenant| tenant.default_policy_pack_version_id),
        };
        let Some(version_id) = resolved_id else {
            return Ok(ResolvedPolicy {
                scoring_config: ScoringConfig::default(),
                underwriting_policy: UnderwritingPolicy::default(),
                meta: PolicyMeta::default(),
            });
        };
        let version = self
            .store
            .policy_pack_version(&identity.tenant_id, version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("policy pack version {version_id}"))
            })?;
        let pack = self
            .store
            .policy_pack(&identity.tenant_id, version.policy_pack_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "policy pack {}",
                    version.policy_pack_id
                ))
            })?;
        let scoring_config =
            crate::core::scoring_config_with_overrides(Some(&version.scoring_config));
        let underwriting_policy =
            underwriting_policy_with_overrides(Some(&version.underwriting_policy));
        Ok(ResolvedPolicy {
            scoring_config,
            underwriting_policy,
            meta: PolicyMeta {
                policy_pack_id: Some(pack.id),
                policy_pack_version_id: Some(version.id),
                version_label: version.version_label,
                policy_pack_name: pack.name,
            },
        })
    }

    /// Creates a policy pack.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn create_policy_pack(
        &self,
        identity: &CallerIdentity,
        name: &str,
    ) -> Result<PolicyPackId, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let pack = PolicyPack {
            id: PolicyPackId::new(0),
            tenant_id: identity.tenant_id.clone(),
            name: name.to_string(),
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_policy_pack(&pack)?)
    }

    /// Creates an immutable policy pack version.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the pack is missing.
    pub fn create_policy_pack_version(
        &self,
        identity: &CallerIdentity,
        pack_id: PolicyPackId,
        version_label: &str,
        scoring_config: Value,
        underwriting_policy: Value,
    ) -> Result<PolicyPackVersionId, ControlPlaneError> {
        Self::require_mutating(identity)?;
        self.store
            .policy_pack(&identity.tenant_id, pack_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("policy pack {pack_id}"))
            })?;
        let version = PolicyPackVersion {
            id: PolicyPackVersionId::new(0),
            tenant_id: identity.tenant_id.clone(),
            policy_pack_id: pack_id,
            version_label: version_label.to_string(),
            scoring_config,
            underwriting_policy,
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_policy_pack_version(&version)?)
    }

    // ------------------------------------------------------------------
    // Resilience scoring
    // ------------------------------------------------------------------

    /// Submits batch scoring with request-fingerprint deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when a referenced entity is
    /// missing.
    pub fn score_resilience_batch(
        &self,
        identity: &CallerIdentity,
        request: &ScoreResilienceBatchRequest,
        request_id: Option<RequestId>,
    ) -> Result<BatchScoreOutcome, ControlPlaneError> {
        Self::require_analytics(identity)?;
        self.store
            .exposure_version(&identity.tenant_id, request.exposure_version_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!(
                    "exposure version {}",
                    request.exposure_version_id
                ))
            })?;
        for version_id in &request.hazard_dataset_version_ids {
            self.store
                .hazard_dataset_version(&identity.tenant_id, *version_id)?
                .ok_or_else(|| {
                    ControlPlaneError::NotFound(format!(
                        "hazard dataset version {version_id}"
                    ))
                })?;
        }

        let policy = self.resolve_policy(identity, request.policy_pack_version_id)?;
        let base_config = serde_json::to_value(&policy.scoring_config)
            .map_err(|err| ControlPlaneError::Validation(err.to_string()))?;
        let merged_config = request
            .config
            .as_ref()
            .map_or_else(|| base_config.clone(), |c| merge_policy_overrides(&base_config, c));
        let scoring_config: ScoringConfig = serde_json::from_value(merged_config)
            .map_err(|err| ControlPlaneError::Validation(format!("scoring config: {err}")))?;

        let now = self.clock.now();
        let fingerprint = score_request_fingerprint(&ScoreRequestIdentity {
            tenant_id: &identity.tenant_id,
            exposure_version_id: request.exposure_version_id,
            hazard_dataset_version_ids: &request.hazard_dataset_version_ids,
            config: &scoring_config,
            scoring_version: &self.options.scoring_version,
            code_version: Some(&self.options.code_version),
            policy_pack_version_id: policy.meta.policy_pack_version_id,
            forced_at: request.force.then_some(now),
        })?;

        if let Some(existing) =
            self.store.score_result_by_fingerprint(&identity.tenant_id, &fingerprint)?
        {
            return self.reuse_or_rescore(
                identity,
                existing,
                &policy.underwriting_policy,
                now,
                request_id,
            );
        }

        let mut sorted_version_ids = request.hazard_dataset_version_ids.clone();
        sorted_version_ids.sort_unstable();
        let mut result = ResilienceScoreResult {
            id: ScoreResultId::new(0),
            tenant_id: identity.tenant_id.clone(),
            exposure_version_id: request.exposure_version_id,
            run_id: None,
            request_fingerprint: fingerprint.clone(),
            scoring_version: self.options.scoring_version.clone(),
            hazard_dataset_version_ids: sorted_version_ids,
            config: scoring_config,
            policy_pack_version_id: policy.meta.policy_pack_version_id,
            policy_used: serde_json::to_value(&policy.meta)
                .map_err(|err| ControlPlaneError::Validation(err.to_string()))?,
            created_at: now,
        };
        result.id = match self.store.insert_score_result(&result) {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => {
                // Lost the fingerprint race; the concurrent submitter owns it.
                let existing = self
                    .store
                    .score_result_by_fingerprint(&identity.tenant_id, &fingerprint)?
                    .ok_or_else(|| {
                        ControlPlaneError::Conflict("score result vanished".to_string())
                    })?;
                return Ok(BatchScoreOutcome {
                    resilience_score_result_id: existing.id,
                    run_id: existing.run_id,
                    status: BatchScoreStatus::ExistingInProgress,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let run =
            self.queue_score_run(identity, &result, &policy.underwriting_policy, request_id)?;
        result.run_id = Some(run.id);
        self.store.update_score_result(&result)?;
        Ok(BatchScoreOutcome {
            resilience_score_result_id: result.id,
            run_id: Some(run.id),
            status: BatchScoreStatus::Queued,
        })
    }

    /// Reuses an existing fingerprint-matched result or repoints it to a
    /// fresh run when it is failed, cancelled, or stale.
    fn reuse_or_rescore(
        &self,
        identity: &CallerIdentity,
        mut existing: ResilienceScoreResult,
        underwriting_policy: &UnderwritingPolicy,
        now: Timestamp,
        request_id: Option<RequestId>,
    ) -> Result<BatchScoreOutcome, ControlPlaneError> {
        let run_status = match existing.run_id {
            Some(run_id) => self
                .store
                .run(&identity.tenant_id, run_id)?
                .map(|run| run.status),
            None => None,
        };
        let window_start = now.minus_days(self.options.fingerprint_reuse_days);
        match run_status {
            Some(RunStatus::Succeeded) if existing.created_at.is_at_or_after(window_start) => {
                Ok(BatchScoreOutcome {
                    resilience_score_result_id: existing.id,
                    run_id: existing.run_id,
                    status: BatchScoreStatus::ExistingSucceeded,
                })
            }
            Some(RunStatus::Queued | RunStatus::Running) => Ok(BatchScoreOutcome {
                resilience_score_result_id: existing.id,
                run_id: existing.run_id,
                status: BatchScoreStatus::ExistingInProgress,
            }),
            _ => {
                // Failed, cancelled, stale, or runless: clear items and
                // repoint the unique fingerprint row at a fresh run.
                self.store
                    .delete_items_for_score_result(&identity.tenant_id, existing.id)?;
                let run = self.queue_score_run(
                    identity,
                    &existing,
                    underwriting_policy,
                    request_id,
                )?;
                existing.run_id = Some(run.id);
                self.store.update_score_result(&existing)?;
                Ok(BatchScoreOutcome {
                    resilience_score_result_id: existing.id,
                    run_id: Some(run.id),
                    status: BatchScoreStatus::Queued,
                })
            }
        }
    }

    /// Queues the batch scoring run for a result row.
    fn queue_score_run(
        &self,
        identity: &CallerIdentity,
        result: &ResilienceScoreResult,
        underwriting_policy: &UnderwritingPolicy,
        request_id: Option<RequestId>,
    ) -> Result<Run, ControlPlaneError> {
        let request_id =
            self.ensure_request_id(identity, "score_resilience_batch", request_id)?;
        let config_value = serde_json::to_value(&result.config)
            .map_err(|err| ControlPlaneError::Validation(err.to_string()))?;
        let policy_value = serde_json::to_value(underwriting_policy)
            .map_err(|err| ControlPlaneError::Validation(err.to_string()))?;
        Ok(self.registry().create_queued(
            &identity.tenant_id,
            RunType::ResilienceScore,
            json!({
                "resilience_score_result_id": result.id,
                "exposure_version_id": result.exposure_version_id,
                "hazard_dataset_version_ids": result.hazard_dataset_version_ids,
                "request_fingerprint": result.request_fingerprint,
            }),
            json!({
                "scoring_config": config_value,
                "underwriting_policy": policy_value,
                "policy_used": result.policy_used,
            }),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?)
    }

    /// Scores one property, resolving enrichment per the decision table.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::UpstreamUnavailable`] when enrichment
    /// failed and best-effort was not requested.
    pub fn score_resilience(
        &self,
        identity: &CallerIdentity,
        request: &ScoreResilienceRequest,
        request_id: Option<RequestId>,
    ) -> Result<ScoreResilienceResponse, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let normalized = normalize_address(&request.address);
        let fingerprint = address_fingerprint(&normalized)?;
        let now = self.clock.now();

        let cached = self.store.profile_by_fingerprint(&identity.tenant_id, &fingerprint)?;
        let fresh_cached = cached.as_ref().is_some_and(|profile| {
            profile.is_fresh(now, self.options.profile_freshness_days)
        });

        let requested_mode = match request.enrich_mode.as_deref() {
            Some("sync") => Some(EnrichMode::Sync),
            Some("async") => Some(EnrichMode::Async),
            _ => None,
        };
        let mode = determine_enrich_mode(requested_mode, self.providers.all_stub());

        let (profile_structural, profile_id, enrichment_status) = if fresh_cached
            && request.prefer_cached
            && !request.force_refresh
        {
            let profile = cached.ok_or_else(|| {
                ControlPlaneError::NotFound("property profile vanished".to_string())
            })?;
            (profile.structural.clone(), Some(profile.id), EnrichmentStatus::Ready)
        } else if mode == EnrichMode::Sync {
            // All-stub providers run inside the request.
            let profile = self.enrich_profile_sync(identity, &normalized, &fingerprint)?;
            (profile.structural.clone(), Some(profile.id), EnrichmentStatus::Ready)
        } else {
            let run = self.find_or_queue_enrichment(
                identity,
                &request.address,
                &fingerprint,
                request.force_refresh,
                request_id.clone(),
            )?;
            let action = decide_enrichment_action(
                true,
                request.wait_for_enrichment_seconds,
                request.best_effort,
                Some(run.status),
            );
            match action {
                EnrichmentAction::Accepted => {
                    return Ok(ScoreResilienceResponse::EnrichmentQueued { run_id: run.id });
                }
                EnrichmentAction::UpstreamFailed => {
                    return Err(ControlPlaneError::UpstreamUnavailable(
                        "property enrichment failed".to_string(),
                    ));
                }
                EnrichmentAction::Score { status } => {
                    let profile = self
                        .store
                        .profile_by_fingerprint(&identity.tenant_id, &fingerprint)?;
                    (
                        profile
                            .as_ref()
                            .map(|p| p.structural.clone())
                            .unwrap_or_default(),
                        profile.map(|p| p.id),
                        status,
                    )
                }
            }
        };

        let structural = request
            .structural
            .as_ref()
            .map_or_else(|| profile_structural.clone(), |s| profile_structural.merged_with(s));

        let policy = self.resolve_policy(identity, request.policy_pack_version_id)?;
        let base_config = serde_json::to_value(&policy.scoring_config)
            .map_err(|err| ControlPlaneError::Validation(err.to_string()))?;
        let merged_config = request
            .config
            .as_ref()
            .map_or_else(|| base_config.clone(), |c| merge_policy_overrides(&base_config, c));
        let scoring_config: ScoringConfig = serde_json::from_value(merged_config)
            .map_err(|err| ControlPlaneError::Validation(format!("scoring config: {err}")))?;

        let breakdown =
            compute_resilience_score(&request.hazards, &structural, &scoring_config);
        let status_label = match enrichment_status {
            EnrichmentStatus::Ready => "ready",
            EnrichmentStatus::Queued => "queued",
            EnrichmentStatus::Failed => "failed",
        };

        let peril_missing: Vec<String> = scoring_config
            .weights
            .keys()
            .filter(|peril| {
                request.hazards.get(*peril).and_then(|entry| entry.score).is_none()
            })
            .cloned()
            .collect();
        let data_quality = DataQuality {
            used_unknown_hazard_fallback: !peril_missing.is_empty(),
            peril_missing,
            enrichment_status: Some(status_label.to_string()),
            enrichment_failed: enrichment_status == EnrichmentStatus::Failed,
            best_effort: request.best_effort,
        };
        let decision = evaluate_underwriting_decision(
            breakdown.resilience_score,
            &request.hazards,
            &structural,
            &data_quality,
            &policy.underwriting_policy,
        );
        let explainability =
            build_explainability(&breakdown, &structural, Some(&decision), &data_quality);

        Ok(ScoreResilienceResponse::Scored {
            breakdown,
            decision,
            explainability,
            enrichment_status: status_label.to_string(),
            property_profile_id: profile_id,
            policy: policy.meta,
        })
    }

    /// Runs the enrichment pipeline synchronously and upserts the profile.
    fn enrich_profile_sync(
        &self,
        identity: &CallerIdentity,
        normalized: &crate::core::NormalizedAddress,
        fingerprint: &str,
    ) -> Result<crate::core::PropertyProfile, ControlPlaneError> {
        let now = self.clock.now();
        let mut profile = build_profile_from_providers(
            self.providers,
            &identity.tenant_id,
            normalized,
            fingerprint,
            now,
            Some(self.options.code_version.clone()),
        );
        profile.id = self.store.upsert_profile(&profile)?;
        Ok(profile)
    }

    /// Finds an in-flight enrichment run for the fingerprint or queues one.
    fn find_or_queue_enrichment(
        &self,
        identity: &CallerIdentity,
        address: &AddressInput,
        fingerprint: &str,
        force_refresh: bool,
        request_id: Option<RequestId>,
    ) -> Result<Run, ControlPlaneError> {
        if let Some(existing) = self.store.find_active_run_by_fingerprint(
            &identity.tenant_id,
            RunType::PropertyEnrichment,
            fingerprint,
        )? {
            return Ok(existing);
        }
        let request_id =
            self.ensure_request_id(identity, "property_enrichment", request_id)?;
        let address_value = serde_json::to_value(address)
            .map_err(|err| ControlPlaneError::Validation(err.to_string()))?;
        Ok(self.registry().create_queued(
            &identity.tenant_id,
            RunType::PropertyEnrichment,
            json!({
                "address": address_value,
                "address_fingerprint": fingerprint,
                "force_refresh": force_refresh,
            }),
            json!({}),
            Some(identity.user_id.clone()),
            Some(request_id),
        )?)
    }

    /// Resolves a property profile: cached, queued, or in progress.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] on role or store failures.
    pub fn resolve_property_profile(
        &self,
        identity: &CallerIdentity,
        request: &ResolvePropertyProfileRequest,
        request_id: Option<RequestId>,
    ) -> Result<ProfileResolution, ControlPlaneError> {
        Self::require_analytics(identity)?;
        let normalized = normalize_address(&request.address);
        let fingerprint = address_fingerprint(&normalized)?;
        let now = self.clock.now();

        if request.prefer_cached && !request.force_refresh {
            if let Some(profile) =
                self.store.profile_by_fingerprint(&identity.tenant_id, &fingerprint)?
            {
                if profile.is_fresh(now, self.options.profile_freshness_days) {
                    return Ok(ProfileResolution {
                        status: ProfileResolutionStatus::Cached,
                        property_profile_id: Some(profile.id),
                        run_id: None,
                    });
                }
            }
        }

        if let Some(existing) = self.store.find_active_run_by_fingerprint(
            &identity.tenant_id,
            RunType::PropertyEnrichment,
            &fingerprint,
        )? {
            return Ok(ProfileResolution {
                status: ProfileResolutionStatus::ExistingInProgress,
                property_profile_id: None,
                run_id: Some(existing.id),
            });
        }

        let run = self.find_or_queue_enrichment(
            identity,
            &request.address,
            &fingerprint,
            request.force_refresh,
            request_id,
        )?;
        Ok(ProfileResolution {
            status: ProfileResolutionStatus::Queued,
            property_profile_id: None,
            run_id: Some(run.id),
        })
    }

    // ------------------------------------------------------------------
    // Run lifecycle
    // ------------------------------------------------------------------

    /// Returns a run's current state.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the run is missing.
    pub fn run_status(
        &self,
        identity: &CallerIdentity,
        run_id: RunId,
    ) -> Result<Run, ControlPlaneError> {
        self.store
            .run(&identity.tenant_id, run_id)?
            .ok_or_else(|| ControlPlaneError::NotFound(format!("run {run_id}")))
    }

    /// Requests cancellation of a queued or running run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] when the run is terminal.
    pub fn cancel_run(
        &self,
        identity: &CallerIdentity,
        run_id: RunId,
        request_id: Option<RequestId>,
    ) -> Result<Run, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let run = self.registry().cancel(&identity.tenant_id, run_id)?;
        self.audit(
            identity,
            "run_cancelled",
            json!({ "run_id": run_id }),
            request_id.as_ref(),
        )?;
        Ok(run)
    }

    /// Retries a failed or cancelled run as a new run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] when the run is not retryable.
    pub fn retry_run(
        &self,
        identity: &CallerIdentity,
        run_id: RunId,
        request_id: Option<RequestId>,
    ) -> Result<Run, ControlPlaneError> {
        Self::require_mutating(identity)?;
        let run = self.registry().retry(&identity.tenant_id, run_id)?;
        self.audit(
            identity,
            "run_retried",
            json!({ "run_id": run_id, "new_run_id": run.id }),
            request_id.as_ref(),
        )?;
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Builds the lineage graph for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the root is missing.
    pub fn lineage(
        &self,
        identity: &CallerIdentity,
        entity_type: LineageEntityType,
        entity_id: i64,
    ) -> Result<LineageGraph, ControlPlaneError> {
        build_lineage(self.store, &identity.tenant_id, entity_type, entity_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("{entity_type:?} {entity_id}"))
            })
    }

    /// Exports a score result as CSV with the fixed column order.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the result is missing.
    pub fn export_resilience_csv(
        &self,
        identity: &CallerIdentity,
        result_id: ScoreResultId,
    ) -> Result<String, ControlPlaneError> {
        let result = self
            .store
            .score_result(&identity.tenant_id, result_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("score result {result_id}"))
            })?;
        let mut output = String::new();
        let mut after = ScoreItemId::new(0);
        let mut first = true;
        loop {
            let page =
                self.store
                    .score_items_page(&identity.tenant_id, result_id, after, 2_000)?;
            if page.is_empty() {
                break;
            }
            let mut rows = Vec::with_capacity(page.len());
            for item in &page {
                let location = self
                    .store
                    .location(&identity.tenant_id, item.location_id)?
                    .ok_or_else(|| {
                        ControlPlaneError::NotFound(format!(
                            "location {}",
                            item.location_id
                        ))
                    })?;
                rows.push(export_row(item, &location, &result)?);
                after = item.id;
            }
            output.push_str(&rows_to_csv(&rows, first)?);
            first = false;
        }
        if first {
            output.push_str(&rows_to_csv(&[], true)?);
        }
        Ok(output)
    }

    /// Builds the disclosure summary for a score result.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::NotFound`] when the result is missing.
    pub fn resilience_summary(
        &self,
        identity: &CallerIdentity,
        result_id: ScoreResultId,
    ) -> Result<ResilienceSummary, ControlPlaneError> {
        let result = self
            .store
            .score_result(&identity.tenant_id, result_id)?
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("score result {result_id}"))
            })?;
        let locations = self
            .store
            .locations_for_version(&identity.tenant_id, result.exposure_version_id)?;
        let total_tiv: f64 = locations.iter().filter_map(|location| location.tiv).sum();
        let tiv_by_location: BTreeMap<i64, Option<f64>> = locations
            .iter()
            .map(|location| (location.id.value(), location.tiv))
            .collect();

        let mut buckets = ScoreBuckets::new();
        for item in self.store.score_items_for_result(&identity.tenant_id, result_id)? {
            let tiv = tiv_by_location
                .get(&item.location_id.value())
                .copied()
                .flatten();
            buckets.add(item.resilience_score, tiv);
        }
        Ok(ResilienceSummary {
            total_locations: buckets.total_count(),
            total_tiv,
            bucket_counts: buckets.counts,
            bucket_tiv: buckets.tiv,
        })
    }
}

// ============================================================================
// SECTION: Profile Construction
// ============================================================================

/// Runs the provider pipeline and assembles a profile row.
///
/// Provider failures are captured into provenance; downstream providers are
/// skipped only when their required input (coordinates) is unavailable.
#[must_use]
pub fn build_profile_from_providers(
    providers: &ProviderSet,
    tenant_id: &crate::core::TenantId,
    normalized: &crate::core::NormalizedAddress,
    fingerprint: &str,
    now: Timestamp,
    code_version: Option<String>,
) -> crate::core::PropertyProfile {
    use crate::core::ProviderFailure;
    use crate::core::Provenance;
    use crate::core::ProvenanceProviders;
    use crate::core::PropertyProfileId;

    let mut errors = Vec::new();
    let geocode = match providers.geocoder.forward_geocode(normalized) {
        Ok(result) => Some(result),
        Err(err) => {
            errors.push(ProviderFailure {
                category: "geocoder".to_string(),
                code: err.code,
                message: err.message,
            });
            None
        }
    };
    let parcel = match &geocode {
        Some(geo) => match providers.parcel.parcel_lookup(geo.latitude, geo.longitude) {
            Ok(result) => Some(result),
            Err(err) => {
                errors.push(ProviderFailure {
                    category: "parcel".to_string(),
                    code: err.code,
                    message: err.message,
                });
                None
            }
        },
        None => None,
    };
    let characteristics = match providers.characteristics.characteristics(fingerprint) {
        Ok(result) => Some(result),
        Err(err) => {
            errors.push(ProviderFailure {
                category: "characteristics".to_string(),
                code: err.code,
                message: err.message,
            });
            None
        }
    };

    let (structural, field_provenance) = crate::stages::enrichment::map_to_structural(
        characteristics.as_ref(),
        parcel.as_ref(),
        geocode.as_ref(),
        now,
    );
    crate::core::PropertyProfile {
        id: PropertyProfileId::new(0),
        tenant_id: tenant_id.clone(),
        location_id: None,
        address_fingerprint: fingerprint.to_string(),
        standardized_address: normalized.clone(),
        geocode,
        parcel,
        characteristics,
        structural,
        provenance: Provenance {
            retrieved_at: now,
            providers: ProvenanceProviders {
                geocoder: Some(providers.geocoder.name().to_string()),
                parcel: Some(providers.parcel.name().to_string()),
                characteristics: Some(providers.characteristics.name().to_string()),
            },
            field_provenance,
            errors,
        },
        code_version,
        updated_at: now,
        created_at: now,
    }
}
