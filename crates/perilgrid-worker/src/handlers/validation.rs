// perilgrid-worker/src/handlers/validation.rs
// ============================================================================
// Module: Validation Handler
// Description: Runs upload validation and persists the issue artifact.
// Purpose: Execute VALIDATION runs.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Loads the upload bytes, applies the attached mapping, validates every
//! row, writes the deterministic issue artifact to the object store, and
//! persists the [`ValidationResult`] before reporting success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::UploadId;
use perilgrid_core::ValidationResult;
use perilgrid_core::ValidationResultId;
use perilgrid_core::runtime::registry::ref_str;
use perilgrid_core::stages::validation::parse_csv_rows;
use perilgrid_core::stages::validation::validate_rows;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for VALIDATION runs.
pub struct ValidationHandler;

impl RunHandler for ValidationHandler {
    fn run_type(&self) -> RunType {
        RunType::Validation
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

        let key = ctx.objects.key_for_uri(&upload.object_uri)?;
        let raw_bytes = ctx.objects.get(&key)?;
        let rows = parse_csv_rows(&raw_bytes)?;
        let total_rows = rows.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total_rows), None)?;

        let outcome = validate_rows(&rows, &mapping)?;
        let errors_key = format!(
            "validations/{}/{}/row_errors.json",
            run.tenant_id, upload.id
        );
        let stored = ctx.objects.put(&errors_key, &outcome.artifact, "application/json")?;

        let validation = ValidationResult {
            id: ValidationResultId::new(0),
            tenant_id: run.tenant_id.clone(),
            upload_id: upload.id.clone(),
            mapping_template_id: upload.mapping_template_id,
            summary: outcome.summary,
            row_errors_uri: stored.uri,
            checksum: outcome.checksum.clone(),
            created_at: ctx.clock.now(),
        };
        let validation_result_id = ctx.store.insert_validation_result(&validation)?;

        Ok(HandlerOutcome {
            output_refs: json!({
                "validation_result_id": validation_result_id,
                "summary": outcome.summary,
                "processed": total_rows,
                "total": total_rows,
            }),
            artifact_checksums: json!({ "row_errors": outcome.checksum.value }),
        })
    }
}
