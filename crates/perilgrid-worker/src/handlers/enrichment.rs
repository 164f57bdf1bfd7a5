// perilgrid-worker/src/handlers/enrichment.rs
// ============================================================================
// Module: Property Enrichment Handler
// Description: Provider orchestration and profile upsert.
// Purpose: Execute PROPERTY_ENRICHMENT runs.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Resolves the address fingerprint, reuses a fresh cached profile unless a
//! refresh was forced, otherwise runs geocoder → parcel → characteristics
//! (capturing provider failures into provenance) and upserts the profile.
//! When a location reference is present its empty address, coordinate, and
//! structural fields are backfilled from the profile.

// ============================================================================
// SECTION: Imports
// ============================================================================

use perilgrid_core::AddressInput;
use perilgrid_core::AuditEvent;
use perilgrid_core::AuditEventId;
use perilgrid_core::LocationId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::STRUCTURAL_KEYS;
use perilgrid_core::runtime::control::build_profile_from_providers;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::runtime::registry::ref_str;
use perilgrid_core::stages::enrichment::address_fingerprint;
use perilgrid_core::stages::enrichment::normalize_address;
use serde_json::Value;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for PROPERTY_ENRICHMENT runs.
pub struct PropertyEnrichmentHandler;

impl RunHandler for PropertyEnrichmentHandler {
    fn run_type(&self) -> RunType {
        RunType::PropertyEnrichment
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let address: AddressInput = run
            .input_refs
            .get("address")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| HandlerError::Invalid(format!("address payload: {err}")))?
            .ok_or_else(|| HandlerError::Invalid("missing address".to_string()))?;
        let force_refresh = run
            .input_refs
            .get("force_refresh")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let location_id = ref_i64(&run.input_refs, "location_id").map(LocationId::new);

        ctx.registry().progress(run, Some(0), Some(1), None)?;

        let normalized = normalize_address(&address);
        let fingerprint = ref_str(&run.input_refs, "address_fingerprint")
            .map(ToString::to_string)
            .map_or_else(|| address_fingerprint(&normalized), Ok)?;
        let now = ctx.clock.now();

        let cached = ctx.store.profile_by_fingerprint(&run.tenant_id, &fingerprint)?;
        let profile = match cached {
            Some(profile)
                if profile.is_fresh(now, ctx.options.profile_freshness_days)
                    && !force_refresh =>
            {
                profile
            }
            _ => {
                let mut fresh = build_profile_from_providers(
                    &ctx.providers,
                    &run.tenant_id,
                    &normalized,
                    &fingerprint,
                    now,
                    Some(ctx.options.code_version.clone()),
                );
                fresh.location_id = location_id;
                fresh.id = ctx.store.upsert_profile(&fresh)?;
                fresh
            }
        };

        if let Some(location_id) = location_id {
            if let Some(mut location) = ctx.store.location(&run.tenant_id, location_id)? {
                let standardized = &profile.standardized_address;
                if location.address_line1.is_none() {
                    location.address_line1 = standardized.address_line1.clone();
                }
                if location.city.is_none() {
                    location.city = standardized.city.clone();
                }
                if location.state_region.is_none() {
                    location.state_region = standardized.state_region.clone();
                }
                if location.postal_code.is_none() {
                    location.postal_code = standardized.postal_code.clone();
                }
                if location.country.is_none() {
                    location.country = standardized.country.clone();
                }
                if let Some(geocode) = &profile.geocode {
                    if location.latitude.is_none() {
                        location.latitude = Some(geocode.latitude);
                    }
                    if location.longitude.is_none() {
                        location.longitude = Some(geocode.longitude);
                    }
                }
                if !profile.structural.is_empty() {
                    // Location-level values win over profile values.
                    location.structural = profile.structural.merged_with(&location.structural);
                }
                location.updated_at = Some(now);
                ctx.store.update_location(&location)?;
            }
        }

        let field_coverage: serde_json::Map<String, Value> = STRUCTURAL_KEYS
            .iter()
            .map(|key| {
                let present = match *key {
                    "roof_material" => profile.structural.roof_material.is_some(),
                    "elevation_m" => profile.structural.elevation_m.is_some(),
                    _ => profile.structural.vegetation_proximity_m.is_some(),
                };
                ((*key).to_string(), Value::Bool(present))
            })
            .collect();

        let audit = AuditEvent {
            id: AuditEventId::new(0),
            tenant_id: run.tenant_id.clone(),
            user_id: None,
            action: "property_enriched".to_string(),
            metadata: json!({
                "property_profile_id": profile.id,
                "location_id": location_id,
            }),
            request_id: run.request_id.clone(),
            created_at: now,
        };
        ctx.store.append_audit_event(&audit)?;

        Ok(HandlerOutcome {
            output_refs: json!({
                "property_profile_id": profile.id,
                "address_fingerprint": fingerprint,
                "providers": profile.provenance.providers,
                "field_coverage": field_coverage,
                "provider_errors": profile.provenance.errors.len() as u64,
                "processed": 1,
                "total": 1,
            }),
            artifact_checksums: json!({}),
        })
    }
}
