// perilgrid-worker/src/handlers/overlay.rs
// ============================================================================
// Module: Overlay Handler
// Description: Point-in-polygon hazard assignment for one dataset version.
// Purpose: Execute OVERLAY runs with worst-in-peril combination.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! For every location with coordinates the handler finds the containing
//! features of the target dataset version, combines them worst-in-peril,
//! and persists one representative attribute row per location. Locations
//! without coordinates are skipped and counted; progress is written every
//! overlay batch, where cancellation is also observed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use perilgrid_core::ExposureVersionId;
use perilgrid_core::GeoPoint;
use perilgrid_core::HazardDatasetVersionId;
use perilgrid_core::LocationHazardAttribute;
use perilgrid_core::LocationHazardAttributeId;
use perilgrid_core::OverlayResultId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::stages::overlay::attributes_from_entry;
use perilgrid_core::stages::overlay::extract_hazard_entry;
use perilgrid_core::stages::overlay::merge_worst_in_peril;
use perilgrid_core::stages::overlay::representative_entry;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for OVERLAY runs.
pub struct OverlayHandler;

impl RunHandler for OverlayHandler {
    fn run_type(&self) -> RunType {
        RunType::Overlay
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let overlay_result_id = OverlayResultId::new(
            ref_i64(&run.input_refs, "overlay_result_id").ok_or_else(|| {
                HandlerError::Invalid("missing overlay_result_id".to_string())
            })?,
        );
        let version_id = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_id".to_string())
            })?,
        );
        let dataset_version_id = HazardDatasetVersionId::new(
            ref_i64(&run.input_refs, "hazard_dataset_version_id").ok_or_else(|| {
                HandlerError::Invalid("missing hazard_dataset_version_id".to_string())
            })?,
        );

        let overlay = ctx
            .store
            .overlay_result(&run.tenant_id, overlay_result_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("overlay result {overlay_result_id} not found"))
            })?;
        let dataset_version = ctx
            .store
            .hazard_dataset_version(&run.tenant_id, dataset_version_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!(
                    "hazard dataset version {dataset_version_id} not found"
                ))
            })?;
        let dataset = ctx
            .store
            .hazard_dataset(&run.tenant_id, dataset_version.dataset_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!(
                    "hazard dataset {} not found",
                    dataset_version.dataset_id
                ))
            })?;

        let locations = ctx.store.locations_for_version(&run.tenant_id, version_id)?;
        let total = locations.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let mut processed = 0_u64;
        let mut skipped_missing_coords = 0_u64;
        let mut attributes_created = 0_u64;
        let mut batch: Vec<LocationHazardAttribute> = Vec::new();
        for location in &locations {
            let (Some(latitude), Some(longitude)) = (location.latitude, location.longitude)
            else {
                skipped_missing_coords += 1;
                processed += 1;
                continue;
            };
            let point = GeoPoint::new(longitude, latitude);
            let features = ctx.store.features_containing(
                &run.tenant_id,
                &[dataset_version_id],
                point,
            )?;
            if !features.is_empty() {
                let mut hazards = BTreeMap::new();
                for feature in &features {
                    let entry = extract_hazard_entry(
                        &feature.properties,
                        dataset.peril.as_deref(),
                        &dataset.name,
                        &dataset_version.version_label,
                        feature.id,
                    );
                    merge_worst_in_peril(&mut hazards, entry);
                }
                if let Some(best) = representative_entry(&hazards) {
                    batch.push(LocationHazardAttribute {
                        id: LocationHazardAttributeId::new(0),
                        tenant_id: run.tenant_id.clone(),
                        location_id: location.id,
                        overlay_result_id: overlay.id,
                        attributes: attributes_from_entry(best),
                    });
                }
            }
            processed += 1;
            if processed % ctx.overlay_batch_size as u64 == 0 {
                if !batch.is_empty() {
                    attributes_created += ctx.store.insert_location_hazard_attributes(&batch)?;
                    batch.clear();
                }
                if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                    return Err(HandlerError::Cancelled);
                }
                ctx.registry().progress(run, Some(processed), Some(total), None)?;
            }
        }
        if !batch.is_empty() {
            attributes_created += ctx.store.insert_location_hazard_attributes(&batch)?;
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "hazard_overlay_result_id": overlay.id,
                "summary": {
                    "locations": total,
                    "attributes_created": attributes_created,
                    "skipped_missing_coords": skipped_missing_coords,
                },
                "processed": processed,
                "total": total,
            }),
            artifact_checksums: json!({}),
        })
    }
}
