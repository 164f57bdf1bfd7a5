// perilgrid-core/src/core/hazard.rs
// ============================================================================
// Module: Perilgrid Hazard Entities
// Description: Hazard dataset registry, feature polygons, and overlay output.
// Purpose: Provide typed entities for the spatial overlay pipeline.
// Dependencies: crate::core::{geometry, hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Hazard data is registered as a dataset, versioned as checksummed blobs,
//! and expanded into spatially indexed [`HazardFeature`] polygons. The
//! overlay engine joins locations against containing features, combines
//! them worst-in-peril, and persists one [`LocationHazardAttribute`] per
//! location and overlay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::geometry::MultiPolygon;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::HazardDatasetId;
use crate::core::identifiers::HazardDatasetVersionId;
use crate::core::identifiers::HazardFeatureId;
use crate::core::identifiers::LocationHazardAttributeId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::OverlayResultId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Method tag recorded on overlay attributes.
pub const OVERLAY_METHOD: &str = "POSTGIS_SPATIAL_JOIN";

// ============================================================================
// SECTION: Dataset Registry
// ============================================================================

/// Hazard dataset registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardDataset {
    /// Dataset identifier.
    pub id: HazardDatasetId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Dataset name, unique within the tenant.
    pub name: String,
    /// Default peril for features without a `hazard_category` property.
    pub peril: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Versioned, checksummed hazard dataset blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardDatasetVersion {
    /// Version identifier.
    pub id: HazardDatasetVersionId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning dataset.
    pub dataset_id: HazardDatasetId,
    /// Version label, unique within the dataset.
    pub version_label: String,
    /// Object-store URI of the raw dataset bytes.
    pub object_uri: String,
    /// SHA-256 checksum of the raw bytes.
    pub checksum: HashDigest,
    /// Effective date of the dataset, when supplied.
    pub effective_date: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Features
// ============================================================================

/// Spatially indexed MULTIPOLYGON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardFeature {
    /// Feature identifier; smallest id wins overlay score ties.
    pub id: HazardFeatureId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning dataset version.
    pub dataset_version_id: HazardDatasetVersionId,
    /// Feature geometry.
    pub geometry: MultiPolygon,
    /// Raw feature properties.
    pub properties: Value,
}

/// Feature payload inside an uploaded hazard dataset blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardFeaturePayload {
    /// Feature geometry.
    pub geometry: MultiPolygon,
    /// Raw feature properties.
    #[serde(default)]
    pub properties: Value,
}

/// Parsed hazard dataset blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardFeatureCollection {
    /// Member features.
    pub features: Vec<HazardFeaturePayload>,
}

// ============================================================================
// SECTION: Hazard Entries
// ============================================================================

/// One hazard assignment extracted from a containing feature.
///
/// # Invariants
/// - `source` is `datasetName:versionLabel`.
/// - `feature_id` carries the tie-breaker and is stripped before the entry
///   is persisted or hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEntry {
    /// Peril category, lowercased; falls back to the dataset peril.
    pub peril: Option<String>,
    /// Numeric hazard score in `[0, 1]`, when present.
    pub score: Option<f64>,
    /// Categorical band (for example LOW/MED/HIGH).
    pub band: Option<String>,
    /// Source tag `datasetName:versionLabel`.
    pub source: String,
    /// Raw feature properties.
    pub raw: Value,
    /// Originating feature id used for deterministic tie-breaking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<HazardFeatureId>,
}

// ============================================================================
// SECTION: Overlay Output
// ============================================================================

/// Overlay execution record, one per `(exposure_version, dataset_version, run)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardOverlayResult {
    /// Overlay result identifier.
    pub id: OverlayResultId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Target exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Hazard dataset version joined against.
    pub dataset_version_id: HazardDatasetVersionId,
    /// Producing run; nulled when the run is garbage-collected.
    pub run_id: Option<RunId>,
    /// Overlay method tag.
    pub method: String,
    /// Caller-supplied overlay parameters.
    pub params: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Persisted per-location hazard attributes for one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHazardAttribute {
    /// Attribute row identifier.
    pub id: LocationHazardAttributeId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Location the attributes belong to.
    pub location_id: LocationId,
    /// Producing overlay result.
    pub overlay_result_id: OverlayResultId,
    /// Attribute payload.
    pub attributes: HazardAttributes,
}

/// Attribute payload persisted for the representative hazard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardAttributes {
    /// Peril category of the representative entry.
    pub hazard_category: Option<String>,
    /// Categorical band.
    pub band: Option<String>,
    /// Numeric score.
    pub score: Option<f64>,
    /// Source tag `datasetName:versionLabel`.
    pub source: Option<String>,
    /// Overlay method tag.
    pub method: String,
    /// Raw feature properties of the representative entry.
    pub raw: Value,
}
