// perilgrid-core/src/core/exposure.rs
// ============================================================================
// Module: Perilgrid Exposure Entities
// Description: Tenants, users, uploads, mapping templates, and locations.
// Purpose: Provide typed, tenant-scoped entities for the exposure pipeline.
// Dependencies: crate::core::{hashing, identifiers, profile, time}, serde
// ============================================================================

//! ## Overview
//! Exposure entities model the ingest side of the pipeline: a raw
//! [`ExposureUpload`] is validated against an optional [`MappingTemplate`],
//! committed into an immutable [`ExposureVersion`], and materialised as
//! [`Location`] rows. Every entity carries its tenant and is only ever read
//! or written with a tenant predicate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::MappingTemplateId;
use crate::core::identifiers::PolicyPackVersionId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UploadId;
use crate::core::identifiers::UserId;
use crate::core::identifiers::ValidationResultId;
use crate::core::profile::StructuralAttributes;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Tenancy
// ============================================================================

/// Tenant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant identifier.
    pub id: TenantId,
    /// Display name, unique across tenants.
    pub name: String,
    /// Default currency applied to locations without one.
    pub default_currency: String,
    /// Default policy pack version for scoring, when configured.
    pub default_policy_pack_version_id: Option<PolicyPackVersionId>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// User role controlling control-plane access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Full administrative access.
    Admin,
    /// Operational access to the mutating control plane.
    Ops,
    /// Analytical access; may trigger scoring and rollups.
    Analyst,
    /// Read-only audit access.
    Auditor,
    /// Read-only access.
    ReadOnly,
}

impl UserRole {
    /// Returns true when the role may call mutating control-plane operations.
    #[must_use]
    pub const fn can_mutate(self) -> bool {
        matches!(self, Self::Admin | Self::Ops)
    }

    /// Returns true when the role may trigger scoring and rollup runs.
    #[must_use]
    pub const fn can_trigger_analytics(self) -> bool {
        matches!(self, Self::Admin | Self::Ops | Self::Analyst)
    }
}

/// User record; `(tenant_id, email)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Email address, unique within the tenant.
    pub email: String,
    /// Access role.
    pub role: UserRole,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Caller identity attached to every control-plane request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Tenant the caller acts within.
    pub tenant_id: TenantId,
    /// Calling user.
    pub user_id: UserId,
    /// Role carried by the caller's credentials.
    pub role: UserRole,
}

// ============================================================================
// SECTION: Uploads & Mapping
// ============================================================================

/// Raw exposure file reference.
///
/// # Invariants
/// - `idempotency_key` is unique within the tenant when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureUpload {
    /// Upload identifier.
    pub id: UploadId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Original filename.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// Object-store URI of the raw bytes.
    pub object_uri: String,
    /// SHA-256 checksum of the raw bytes.
    pub checksum: HashDigest,
    /// Optional idempotency key.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Mapping template attached for validation and commit.
    pub mapping_template_id: Option<MappingTemplateId>,
    /// Creating user, when known.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Versioned source→destination column mapping.
///
/// # Invariants
/// - `(tenant_id, name, version)` is unique; versions grow monotonically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTemplate {
    /// Template identifier.
    pub id: MappingTemplateId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Template name.
    pub name: String,
    /// Monotonic version within `(tenant, name)`.
    pub version: i64,
    /// Source-column to destination-column renames.
    pub template: BTreeMap<String, String>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Validation Result
// ============================================================================

/// Issue counts recorded with a validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationSummary {
    /// Error-severity issue count.
    #[serde(rename = "ERROR")]
    pub errors: u64,
    /// Warning-severity issue count.
    #[serde(rename = "WARN")]
    pub warnings: u64,
    /// Info-severity issue count.
    #[serde(rename = "INFO")]
    pub infos: u64,
    /// Total rows inspected.
    pub total_rows: u64,
}

/// Persisted validation outcome for an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Result identifier.
    pub id: ValidationResultId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Validated upload.
    pub upload_id: UploadId,
    /// Mapping template applied, when any.
    pub mapping_template_id: Option<MappingTemplateId>,
    /// Issue counts.
    pub summary: ValidationSummary,
    /// Object-store URI of the deterministic issue artifact.
    pub row_errors_uri: String,
    /// Checksum of the issue artifact bytes.
    pub checksum: HashDigest,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Exposure Version & Locations
// ============================================================================

/// Materialised snapshot of a committed upload.
///
/// # Invariants
/// - Unique per `(tenant, upload, mapping_template_id)` and per
///   `(tenant, upload, idempotency_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureVersion {
    /// Exposure version identifier.
    pub id: ExposureVersionId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Source upload.
    pub upload_id: UploadId,
    /// Mapping template the snapshot was committed with.
    pub mapping_template_id: Option<MappingTemplateId>,
    /// Display name.
    pub name: String,
    /// Optional idempotency key copied from the commit request.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Geocode-derived data quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityTier {
    /// High completeness and geocode confidence.
    A,
    /// Acceptable completeness and geocode confidence.
    B,
    /// Low completeness or geocode confidence.
    C,
}

impl QualityTier {
    /// Returns the stable wire string for this tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }

    /// Parses a stable wire string into a tier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            _ => None,
        }
    }
}

/// Location row within an exposure version.
///
/// # Invariants
/// - Unique per `(tenant, exposure_version, external_location_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Location identifier.
    pub id: LocationId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Caller-supplied location key.
    pub external_location_id: String,
    /// Street address line.
    pub address_line1: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region.
    pub state_region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// WGS84 latitude.
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    pub longitude: Option<f64>,
    /// Geocode method tag (provider method or `PROVIDED`).
    pub geocode_method: Option<String>,
    /// Geocode confidence in `[0, 1]`.
    pub geocode_confidence: Option<f64>,
    /// Data quality tier.
    pub quality_tier: Option<QualityTier>,
    /// Quality reason codes.
    pub quality_reasons: Vec<String>,
    /// Currency code; defaults to the tenant currency at commit.
    pub currency: Option<String>,
    /// Line of business.
    pub lob: Option<String>,
    /// Product code.
    pub product_code: Option<String>,
    /// Total insured value.
    pub tiv: Option<f64>,
    /// Limit.
    pub limit: Option<f64>,
    /// Premium.
    pub premium: Option<f64>,
    /// Structural attributes merged from enrichment.
    pub structural: StructuralAttributes,
    /// Last mutation time.
    pub updated_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
}
