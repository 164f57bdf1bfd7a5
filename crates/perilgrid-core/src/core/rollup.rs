// perilgrid-core/src/core/rollup.rs
// ============================================================================
// Module: Perilgrid Rollup Entities
// Description: Rollup configuration and materialised aggregation results.
// Purpose: Provide typed entities for the group-by aggregation pipeline.
// Dependencies: crate::core::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A [`RollupConfig`] names the dimensions, filters, and measures of a
//! group-by aggregation over an exposure version (optionally joined with one
//! overlay's attributes). Execution materialises a [`RollupResult`] with one
//! [`RollupItem`] per group key, each keyed by the canonical JSON of its
//! `rollup_key` and its SHA-256 hash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::OverlayResultId;
use crate::core::identifiers::RollupConfigId;
use crate::core::identifiers::RollupItemId;
use crate::core::identifiers::RollupResultId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Measures
// ============================================================================

/// Aggregation operator for a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureOp {
    /// Numeric sum over a record field; invalid values accumulate as zero.
    Sum,
    /// Record count.
    Count,
}

/// One measure computed per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureSpec {
    /// Output metric name.
    pub name: String,
    /// Aggregation operator.
    pub op: MeasureOp,
    /// Source record field; required for `sum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Versioned rollup configuration.
///
/// # Invariants
/// - `(tenant_id, name, version)` is unique; versions grow monotonically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Configuration identifier.
    pub id: RollupConfigId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Configuration name.
    pub name: String,
    /// Monotonic version within `(tenant, name)`.
    pub version: i64,
    /// Group-by dimension fields.
    pub dimensions: Vec<String>,
    /// Record filters; list values use membership, scalars use equality.
    pub filters: BTreeMap<String, Value>,
    /// Measures computed per group.
    pub measures: Vec<MeasureSpec>,
    /// Creating user, when known.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Materialised rollup execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupResult {
    /// Result identifier.
    pub id: RollupResultId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Aggregated exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Configuration executed.
    pub rollup_config_id: RollupConfigId,
    /// Producing run; nulled when the run is garbage-collected.
    pub run_id: Option<RunId>,
    /// Overlay results joined for hazard dimensions.
    pub overlay_result_ids: Vec<OverlayResultId>,
    /// Checksum over the sorted item list; set on completion.
    pub checksum: Option<HashDigest>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// One group row of a rollup result.
///
/// # Invariants
/// - `(rollup_result_id, key_hash)` is unique.
/// - `key_hash` is the SHA-256 of the canonical JSON of `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupItem {
    /// Item identifier.
    pub id: RollupItemId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning rollup result.
    pub rollup_result_id: RollupResultId,
    /// Group key object (`dimension → value`, nullable values allowed).
    pub key: Value,
    /// Lowercase hex SHA-256 over the canonical JSON of `key`.
    pub key_hash: String,
    /// Metric values for the group.
    pub metrics: Map<String, Value>,
}
