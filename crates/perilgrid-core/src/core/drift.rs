// perilgrid-core/src/core/drift.rs
// ============================================================================
// Module: Perilgrid Drift Entities
// Description: Exposure version diff runs and classified details.
// Purpose: Provide typed entities for A/B exposure comparison.
// Dependencies: crate::core::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A drift run compares the location sets of two exposure versions keyed by
//! `external_location_id` and classifies each key as NEW, REMOVED, or
//! MODIFIED over an enumerated set of compare fields. Details are sorted by
//! `(classification, external_location_id)` and serialized into a canonical
//! checksummed artifact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::DriftDetailId;
use crate::core::identifiers::DriftRunId;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Compare Fields
// ============================================================================

/// Location fields compared between versions, in artifact order.
pub const COMPARE_FIELDS: [&str; 15] = [
    "external_location_id",
    "address_line1",
    "city",
    "state_region",
    "postal_code",
    "country",
    "latitude",
    "longitude",
    "currency",
    "lob",
    "product_code",
    "tiv",
    "limit",
    "premium",
    "quality_tier",
];

/// Numeric fields that carry a `delta` entry when modified.
pub const NUMERIC_DELTA_FIELDS: [&str; 3] = ["tiv", "limit", "premium"];

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Drift classification of one external location key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftClassification {
    /// Present only in version B.
    New,
    /// Present only in version A.
    Removed,
    /// Present in both with at least one changed compare field.
    Modified,
}

impl DriftClassification {
    /// Returns the stable wire string for this classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Removed => "REMOVED",
            Self::Modified => "MODIFIED",
        }
    }

    /// Parses a stable wire string into a classification.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW" => Some(Self::New),
            "REMOVED" => Some(Self::Removed),
            "MODIFIED" => Some(Self::Modified),
            _ => None,
        }
    }

    /// Returns the sort order index (NEW < REMOVED < MODIFIED).
    #[must_use]
    pub const fn order(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Removed => 1,
            Self::Modified => 2,
        }
    }
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Drift comparison run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRun {
    /// Drift run identifier.
    pub id: DriftRunId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Baseline exposure version (A).
    pub exposure_version_a_id: ExposureVersionId,
    /// Candidate exposure version (B).
    pub exposure_version_b_id: ExposureVersionId,
    /// Producing run; nulled when the run is garbage-collected.
    pub run_id: Option<RunId>,
    /// Object-store URI of the detail artifact; set on completion.
    pub storage_uri: Option<String>,
    /// Checksum of the detail artifact bytes; set on completion.
    pub checksum: Option<HashDigest>,
    /// Caller-supplied comparison configuration.
    pub config: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

/// One classified drift detail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetail {
    /// Detail identifier.
    pub id: DriftDetailId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning drift run.
    pub drift_run_id: DriftRunId,
    /// External location key.
    pub external_location_id: String,
    /// Classification of the key.
    pub classification: DriftClassification,
    /// Before/after snapshots and per-field changes.
    pub delta: Value,
}

/// Aggregate drift counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DriftSummary {
    /// Keys present only in version B.
    #[serde(rename = "NEW")]
    pub new: u64,
    /// Keys present only in version A.
    #[serde(rename = "REMOVED")]
    pub removed: u64,
    /// Keys changed between versions.
    #[serde(rename = "MODIFIED")]
    pub modified: u64,
    /// Total detail rows.
    pub total: u64,
}
