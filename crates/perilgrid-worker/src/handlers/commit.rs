// perilgrid-worker/src/handlers/commit.rs
// ============================================================================
// Module: Commit Handler
// Description: Materialises an exposure version from a validated upload.
// Purpose: Execute COMMIT runs idempotently.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Canonicalises the upload rows, creates the exposure version (reusing the
//! existing one when the uniqueness constraints already hold it), and
//! bulk-inserts locations with the tenant default currency applied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use perilgrid_core::ExposureVersion;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::IdempotencyKey;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::StoreError;
use perilgrid_core::UploadId;
use perilgrid_core::runtime::registry::ref_str;
use perilgrid_core::stages::commit::canonicalize_rows;
use perilgrid_core::stages::commit::location_from_row;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for COMMIT runs.
pub struct CommitHandler;

impl RunHandler for CommitHandler {
    fn run_type(&self) -> RunType {
        RunType::Commit
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let upload_id = UploadId::new(
            ref_str(&run.input_refs, "upload_id")
                .ok_or_else(|| HandlerError::Invalid("missing upload_id".to_string()))?,
        );
        let name = ref_str(&run.input_refs, "name").unwrap_or("Exposure").to_string();
        let idempotency_key =
            ref_str(&run.config_refs, "idempotency_key").map(IdempotencyKey::new);

        let upload = ctx
            .store
            .upload(&run.tenant_id, &upload_id)?
            .ok_or_else(|| HandlerError::Invalid(format!("upload {upload_id} not found")))?;
        let mapping = match upload.mapping_template_id {
            Some(template_id) => ctx
                .store
                .mapping_template(&run.tenant_id, template_id)?
                .map(|template| template.template)
                .unwrap_or_default(),
            None => BTreeMap::new(),
        };
        let tenant = ctx.store.tenant(&run.tenant_id)?;
        let default_currency = tenant.as_ref().map(|t| t.default_currency.clone());

        let key = ctx.objects.key_for_uri(&upload.object_uri)?;
        let raw_bytes = ctx.objects.get(&key)?;
        let rows = canonicalize_rows(&raw_bytes, &mapping)?;
        let total_rows = rows.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total_rows), None)?;

        let now = ctx.clock.now();
        let draft = ExposureVersion {
            id: ExposureVersionId::new(0),
            tenant_id: run.tenant_id.clone(),
            upload_id: upload.id.clone(),
            mapping_template_id: upload.mapping_template_id,
            name,
            idempotency_key,
            created_at: now,
        };
        let version_id = match ctx.store.insert_exposure_version(&draft) {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => {
                // Redelivery or concurrent commit: reuse the existing row.
                let existing = ctx
                    .store
                    .exposure_version_by_upload(
                        &run.tenant_id,
                        &upload.id,
                        upload.mapping_template_id,
                    )?
                    .ok_or_else(|| {
                        HandlerError::Invalid("exposure version vanished".to_string())
                    })?;
                existing.id
            }
            Err(other) => return Err(other.into()),
        };

        let locations: Vec<_> = rows
            .iter()
            .filter_map(|row| {
                location_from_row(
                    row,
                    &run.tenant_id,
                    version_id,
                    default_currency.as_deref(),
                    now,
                )
            })
            .collect();
        match ctx.store.insert_locations(&locations) {
            Ok(_) => {}
            // Redelivery: the bulk insert is transactional, so a conflict
            // means the rows already landed.
            Err(StoreError::Conflict(_)) => {}
            Err(other) => return Err(other.into()),
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "exposure_version_id": version_id,
                "locations": locations.len() as u64,
                "processed": total_rows,
                "total": total_rows,
            }),
            artifact_checksums: json!({}),
        })
    }
}
