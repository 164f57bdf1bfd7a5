// perilgrid-core/src/core/mod.rs
// ============================================================================
// Module: Perilgrid Core Types
// Description: Canonical Perilgrid entities, identifiers, and hashing.
// Purpose: Provide stable, serializable types for the pipeline engine.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Core types define the tenant-scoped data model, the run state machine,
//! canonical hashing, and provider payloads. These types are the canonical
//! source of truth for any derived API surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod breach;
pub mod drift;
pub mod explainability;
pub mod exposure;
pub mod fingerprint;
pub mod geometry;
pub mod hashing;
pub mod hazard;
pub mod identifiers;
pub mod policy;
pub mod profile;
pub mod providers;
pub mod resilience;
pub mod rollup;
pub mod run;
pub mod time;
pub mod underwriting;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use breach::Breach;
pub use breach::ComparisonOp;
pub use breach::LifecycleStatus;
pub use breach::ThresholdRule;
pub use breach::ThresholdRuleSpec;
pub use drift::COMPARE_FIELDS;
pub use drift::DriftClassification;
pub use drift::DriftDetail;
pub use drift::DriftRun;
pub use drift::DriftSummary;
pub use drift::NUMERIC_DELTA_FIELDS;
pub use explainability::Explainability;
pub use explainability::PerilContribution;
pub use explainability::StructuralImpact;
pub use exposure::CallerIdentity;
pub use exposure::ExposureUpload;
pub use exposure::ExposureVersion;
pub use exposure::Location;
pub use exposure::MappingTemplate;
pub use exposure::QualityTier;
pub use exposure::Tenant;
pub use exposure::User;
pub use exposure::UserRole;
pub use exposure::ValidationResult;
pub use exposure::ValidationSummary;
pub use fingerprint::ScoreRequestIdentity;
pub use fingerprint::score_request_fingerprint;
pub use geometry::BoundingBox;
pub use geometry::GeoPoint;
pub use geometry::MultiPolygon;
pub use geometry::Polygon;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hazard::HazardAttributes;
pub use hazard::HazardDataset;
pub use hazard::HazardDatasetVersion;
pub use hazard::HazardEntry;
pub use hazard::HazardFeature;
pub use hazard::HazardFeatureCollection;
pub use hazard::HazardFeaturePayload;
pub use hazard::HazardOverlayResult;
pub use hazard::LocationHazardAttribute;
pub use hazard::OVERLAY_METHOD;
pub use identifiers::AuditEventId;
pub use identifiers::BreachId;
pub use identifiers::DriftDetailId;
pub use identifiers::DriftRunId;
pub use identifiers::ExposureVersionId;
pub use identifiers::HazardDatasetId;
pub use identifiers::HazardDatasetVersionId;
pub use identifiers::HazardFeatureId;
pub use identifiers::IdempotencyKey;
pub use identifiers::LocationHazardAttributeId;
pub use identifiers::LocationId;
pub use identifiers::MappingTemplateId;
pub use identifiers::OverlayResultId;
pub use identifiers::PolicyPackId;
pub use identifiers::PolicyPackVersionId;
pub use identifiers::PropertyProfileId;
pub use identifiers::RequestId;
pub use identifiers::RollupConfigId;
pub use identifiers::RollupItemId;
pub use identifiers::RollupResultId;
pub use identifiers::RunId;
pub use identifiers::ScoreItemId;
pub use identifiers::ScoreResultId;
pub use identifiers::TaskId;
pub use identifiers::TenantId;
pub use identifiers::ThresholdRuleId;
pub use identifiers::UploadId;
pub use identifiers::UserId;
pub use identifiers::UwFindingId;
pub use identifiers::UwRuleId;
pub use identifiers::ValidationResultId;
pub use policy::PolicyMeta;
pub use policy::PolicyPack;
pub use policy::PolicyPackVersion;
pub use policy::ResolvedPolicy;
pub use policy::merge_policy_overrides;
pub use policy::scoring_config_with_overrides;
pub use policy::underwriting_policy_with_overrides;
pub use profile::AddressInput;
pub use profile::FieldProvenance;
pub use profile::NormalizedAddress;
pub use profile::PropertyProfile;
pub use profile::Provenance;
pub use profile::ProvenanceProviders;
pub use profile::STRUCTURAL_KEYS;
pub use profile::StructuralAttributes;
pub use providers::CharacteristicsResult;
pub use providers::GeocodeResult;
pub use providers::ParcelResult;
pub use providers::ProviderError;
pub use providers::ProviderErrorCode;
pub use providers::ProviderFailure;
pub use providers::RetryPolicy;
pub use resilience::PerilScore;
pub use resilience::ResilienceScoreItem;
pub use resilience::ResilienceScoreResult;
pub use resilience::SCORING_VERSION;
pub use resilience::ScoreBreakdown;
pub use resilience::ScoringConfig;
pub use resilience::StructuralAdjustments;
pub use rollup::MeasureOp;
pub use rollup::MeasureSpec;
pub use rollup::RollupConfig;
pub use rollup::RollupItem;
pub use rollup::RollupResult;
pub use run::QueuedTask;
pub use run::Run;
pub use run::RunStatus;
pub use run::RunType;
pub use run::merge_progress;
pub use time::MILLIS_PER_DAY;
pub use time::Timestamp;
pub use underwriting::DataQuality;
pub use underwriting::MitigationRecommendation;
pub use underwriting::UnderwritingDecision;
pub use underwriting::UnderwritingDisposition;
pub use underwriting::UnderwritingPolicy;
pub use underwriting::UwFinding;
pub use underwriting::UwRule;
pub use underwriting::UwTarget;
