// perilgrid-core/src/core/identifiers.rs
// ============================================================================
// Module: Perilgrid Identifiers
// Description: Canonical opaque identifiers for Perilgrid entities and runs.
// Purpose: Provide strongly typed, serializable IDs with stable forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Perilgrid.
//! Externally supplied identifiers (tenants, users, uploads, request
//! correlation) are opaque strings; relational entities use numeric row
//! identifiers assigned by the store. Validation is handled at control-plane
//! or store boundaries rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// Tenant identifier scoping every entity and query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// User identifier within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Exposure upload identifier (content-derived, unique within a tenant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Creates a new upload identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UploadId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Request identifier correlating control-plane calls with runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a new request identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Idempotency key deduplicating uploads and commits within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a new idempotency key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IdempotencyKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Numeric Identifiers
// ============================================================================

/// Declares a numeric row identifier with the standard accessors.
macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            Default,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new identifier from a raw row id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self::new(value)
            }
        }
    };
}

numeric_id!(
    /// Run identifier for one pipeline-stage execution.
    RunId
);
numeric_id!(
    /// Queued task identifier in the durable worker queue.
    TaskId
);
numeric_id!(
    /// Mapping template identifier.
    MappingTemplateId
);
numeric_id!(
    /// Validation result identifier.
    ValidationResultId
);
numeric_id!(
    /// Exposure version identifier.
    ExposureVersionId
);
numeric_id!(
    /// Location identifier within an exposure version.
    LocationId
);
numeric_id!(
    /// Hazard dataset identifier.
    HazardDatasetId
);
numeric_id!(
    /// Hazard dataset version identifier.
    HazardDatasetVersionId
);
numeric_id!(
    /// Hazard feature polygon identifier (also the overlay tie-breaker).
    HazardFeatureId
);
numeric_id!(
    /// Hazard overlay result identifier.
    OverlayResultId
);
numeric_id!(
    /// Per-location hazard attribute identifier.
    LocationHazardAttributeId
);
numeric_id!(
    /// Rollup configuration identifier.
    RollupConfigId
);
numeric_id!(
    /// Rollup result identifier.
    RollupResultId
);
numeric_id!(
    /// Rollup result item identifier.
    RollupItemId
);
numeric_id!(
    /// Threshold rule identifier.
    ThresholdRuleId
);
numeric_id!(
    /// Breach identifier.
    BreachId
);
numeric_id!(
    /// Drift run identifier.
    DriftRunId
);
numeric_id!(
    /// Drift detail identifier.
    DriftDetailId
);
numeric_id!(
    /// Resilience score result identifier.
    ScoreResultId
);
numeric_id!(
    /// Resilience score item identifier.
    ScoreItemId
);
numeric_id!(
    /// Property profile identifier.
    PropertyProfileId
);
numeric_id!(
    /// Policy pack identifier.
    PolicyPackId
);
numeric_id!(
    /// Policy pack version identifier.
    PolicyPackVersionId
);
numeric_id!(
    /// Underwriting rule identifier.
    UwRuleId
);
numeric_id!(
    /// Underwriting finding identifier.
    UwFindingId
);
numeric_id!(
    /// Audit event identifier.
    AuditEventId
);
