// perilgrid-worker/src/handlers/rollup.rs
// ============================================================================
// Module: Rollup Handler
// Description: Group-by aggregation over an exposure × overlay join.
// Purpose: Execute ROLLUP runs with byte-stable output.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Builds enriched records from the exposure version's locations joined with
//! the first referenced overlay's attributes, runs the deterministic rollup
//! aggregator, persists items sorted by canonical group key, and stamps the
//! result checksum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use perilgrid_core::ExposureVersionId;
use perilgrid_core::OverlayResultId;
use perilgrid_core::RollupConfigId;
use perilgrid_core::RollupItem;
use perilgrid_core::RollupItemId;
use perilgrid_core::RollupResultId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::runtime::registry::ref_i64_list;
use perilgrid_core::stages::rollup::compute_rollup;
use perilgrid_core::stages::rollup::record_for_location;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for ROLLUP runs.
pub struct RollupHandler;

impl RunHandler for RollupHandler {
    fn run_type(&self) -> RunType {
        RunType::Rollup
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let result_id = RollupResultId::new(
            ref_i64(&run.input_refs, "rollup_result_id")
                .ok_or_else(|| HandlerError::Invalid("missing rollup_result_id".to_string()))?,
        );
        let version_id = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_id".to_string())
            })?,
        );
        let config_id = RollupConfigId::new(
            ref_i64(&run.input_refs, "rollup_config_id")
                .ok_or_else(|| HandlerError::Invalid("missing rollup_config_id".to_string()))?,
        );
        let overlay_ids: Vec<OverlayResultId> =
            ref_i64_list(&run.input_refs, "hazard_overlay_result_ids")
                .into_iter()
                .map(OverlayResultId::new)
                .collect();

        let mut result = ctx
            .store
            .rollup_result(&run.tenant_id, result_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("rollup result {result_id} not found"))
            })?;
        let config = ctx
            .store
            .rollup_config(&run.tenant_id, config_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("rollup config {config_id} not found"))
            })?;

        // One overlay supplies the hazard dimensions; extra overlays are
        // recorded for lineage only.
        let attribute_map: BTreeMap<i64, perilgrid_core::HazardAttributes> =
            match overlay_ids.first() {
                Some(first) => ctx
                    .store
                    .attributes_for_overlay(&run.tenant_id, *first)?
                    .into_iter()
                    .map(|attr| (attr.location_id.value(), attr.attributes))
                    .collect(),
                None => BTreeMap::new(),
            };

        let locations = ctx.store.locations_for_version(&run.tenant_id, version_id)?;
        let total = locations.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let records: Vec<_> = locations
            .iter()
            .map(|location| {
                record_for_location(location, attribute_map.get(&location.id.value()))
            })
            .collect();
        let (rows, checksum) = compute_rollup(
            &records,
            &config.dimensions,
            &config.measures,
            &config.filters,
        )?;

        let items: Vec<RollupItem> = rows
            .iter()
            .map(|row| RollupItem {
                id: RollupItemId::new(0),
                tenant_id: run.tenant_id.clone(),
                rollup_result_id: result.id,
                key: row.rollup_key_json.clone(),
                key_hash: row.rollup_key_hash.clone(),
                metrics: row.metrics_json.clone(),
            })
            .collect();
        ctx.store.insert_rollup_items(&items)?;

        result.checksum = Some(checksum.clone());
        result.overlay_result_ids = overlay_ids;
        ctx.store.update_rollup_result(&result)?;

        Ok(HandlerOutcome {
            output_refs: json!({
                "rollup_result_id": result.id,
                "items": items.len() as u64,
                "processed": total,
                "total": total,
            }),
            artifact_checksums: json!({ "rollup_result_checksum": checksum.value }),
        })
    }
}
