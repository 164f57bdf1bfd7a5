// perilgrid-worker/src/handlers/drift.rs
// ============================================================================
// Module: Drift Handler
// Description: Diffs two exposure versions and persists details.
// Purpose: Execute DRIFT runs with a canonical artifact.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Loads both location sets, runs the classified diff, writes the canonical
//! detail artifact to the object store, stamps the drift run with its URI
//! and checksum, and persists the detail rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use perilgrid_core::DriftDetail;
use perilgrid_core::DriftDetailId;
use perilgrid_core::DriftRunId;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::stages::drift::compare_exposures;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for DRIFT runs.
pub struct DriftHandler;

impl RunHandler for DriftHandler {
    fn run_type(&self) -> RunType {
        RunType::Drift
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let drift_run_id = DriftRunId::new(
            ref_i64(&run.input_refs, "drift_run_id")
                .ok_or_else(|| HandlerError::Invalid("missing drift_run_id".to_string()))?,
        );
        let version_a = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_a_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_a_id".to_string())
            })?,
        );
        let version_b = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_b_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_b_id".to_string())
            })?,
        );

        let mut drift = ctx
            .store
            .drift_run(&run.tenant_id, drift_run_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("drift run {drift_run_id} not found"))
            })?;
        let locations_a = ctx.store.locations_for_version(&run.tenant_id, version_a)?;
        let locations_b = ctx.store.locations_for_version(&run.tenant_id, version_b)?;
        let total = (locations_a.len() + locations_b.len()) as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let outcome = compare_exposures(&locations_a, &locations_b)?;
        let key = format!("drift/{}/{}/details.json", run.tenant_id, drift.id);
        let stored = ctx.objects.put(&key, &outcome.artifact, "application/json")?;

        drift.storage_uri = Some(stored.uri.clone());
        drift.checksum = Some(outcome.checksum.clone());
        ctx.store.update_drift_run(&drift)?;

        let details: Vec<DriftDetail> = outcome
            .details
            .iter()
            .map(|draft| DriftDetail {
                id: DriftDetailId::new(0),
                tenant_id: run.tenant_id.clone(),
                drift_run_id: drift.id,
                external_location_id: draft.external_location_id.clone(),
                classification: draft.classification,
                delta: draft.delta_json.clone(),
            })
            .collect();
        ctx.store.insert_drift_details(&details)?;

        Ok(HandlerOutcome {
            output_refs: json!({
                "drift_run_id": drift.id,
                "storage_uri": stored.uri,
                "checksum": outcome.checksum.value.clone(),
                "summary": outcome.summary,
                "processed": total,
                "total": total,
            }),
            artifact_checksums: json!({ "drift_details": outcome.checksum.value }),
        })
    }
}
