// perilgrid-worker/src/handlers/geocode.rs
// ============================================================================
// Module: Geocode Handler
// Description: Geocodes locations and assigns quality tiers.
// Purpose: Execute GEOCODE runs.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Locations without coordinates are geocoded through the provider;
//! locations arriving with coordinates get method `PROVIDED` and full
//! confidence. Every location then receives completeness/geocode/financial
//! quality scores and a tier. Provider failures skip the location and are
//! counted rather than failing the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use perilgrid_core::AddressInput;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::stages::enrichment::normalize_address;
use perilgrid_core::stages::quality::quality_scores;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for GEOCODE runs.
pub struct GeocodeHandler;

impl RunHandler for GeocodeHandler {
    fn run_type(&self) -> RunType {
        RunType::Geocode
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let version_id = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_id".to_string())
            })?,
        );
        let locations = ctx.store.locations_for_version(&run.tenant_id, version_id)?;
        let total = locations.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let now = ctx.clock.now();
        let mut processed = 0_u64;
        let mut geocoded = 0_u64;
        let mut geocode_failures = 0_u64;
        for mut location in locations {
            if processed % ctx.scorer_batch_size as u64 == 0 && processed > 0 {
                if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                    return Err(HandlerError::Cancelled);
                }
                ctx.registry().progress(run, Some(processed), Some(total), None)?;
            }
            if location.latitude.is_none() || location.longitude.is_none() {
                let normalized = normalize_address(&AddressInput {
                    address_line1: location.address_line1.clone(),
                    city: location.city.clone(),
                    state_region: location.state_region.clone(),
                    postal_code: location.postal_code.clone(),
                    country: location.country.clone(),
                });
                match ctx.providers.geocoder.forward_geocode(&normalized) {
                    Ok(geocode) => {
                        location.latitude = Some(geocode.latitude);
                        location.longitude = Some(geocode.longitude);
                        location.geocode_method = Some(geocode.method);
                        location.geocode_confidence = Some(geocode.confidence);
                        geocoded += 1;
                    }
                    Err(_) => {
                        geocode_failures += 1;
                    }
                }
            } else if location.geocode_confidence.is_none() {
                location.geocode_method = Some("PROVIDED".to_string());
                location.geocode_confidence = Some(1.0);
            }

            let scores = quality_scores(
                location.address_line1.as_deref(),
                location.tiv,
                location.geocode_confidence,
            );
            location.quality_tier = Some(scores.quality_tier);
            location.quality_reasons = scores.reasons;
            location.updated_at = Some(now);
            ctx.store.update_location(&location)?;
            processed += 1;
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "exposure_version_id": version_id,
                "geocoded": geocoded,
                "geocode_failures": geocode_failures,
                "processed": processed,
                "total": total,
            }),
            artifact_checksums: json!({}),
        })
    }
}
