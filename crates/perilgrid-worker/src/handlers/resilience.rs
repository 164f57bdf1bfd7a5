// perilgrid-worker/src/handlers/resilience.rs
// ============================================================================
// Module: Resilience Scoring Handler
// Description: Batch resilience scoring over an exposure version.
// Purpose: Execute RESILIENCE_SCORE runs with per-batch cancellation.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Every location with coordinates is scored: containing hazard features
//! are combined worst-in-peril, the location's structural attributes feed
//! the adjustments, and one score item is written per location carrying
//! its underwriting decision (under the policy frozen into the run's
//! config refs) and its explainability payload. Items are inserted in
//! scorer batches; cancellation is observed and progress is written at
//! each batch boundary, so a cancelled run keeps the items already
//! persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use perilgrid_core::DataQuality;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::GeoPoint;
use perilgrid_core::HazardDatasetVersionId;
use perilgrid_core::ResilienceScoreItem;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::ScoreItemId;
use perilgrid_core::ScoreResultId;
use perilgrid_core::UnderwritingPolicy;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::runtime::registry::ref_i64_list;
use perilgrid_core::stages::explainability::build_explainability;
use perilgrid_core::stages::overlay::extract_hazard_entry;
use perilgrid_core::stages::overlay::merge_worst_in_peril;
use perilgrid_core::stages::overlay::normalized_hazards;
use perilgrid_core::stages::resilience::compute_resilience_score;
use perilgrid_core::stages::underwriting_decision::evaluate_underwriting_decision;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for RESILIENCE_SCORE runs.
pub struct ResilienceScoreHandler;

impl RunHandler for ResilienceScoreHandler {
    fn run_type(&self) -> RunType {
        RunType::ResilienceScore
    }

    #[allow(
        clippy::too_many_lines,
        reason = "One linear scoring loop keeps batch and counter handling auditable."
    )]
    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let result_id = ScoreResultId::new(
            ref_i64(&run.input_refs, "resilience_score_result_id").ok_or_else(|| {
                HandlerError::Invalid("missing resilience_score_result_id".to_string())
            })?,
        );
        let version_id = ExposureVersionId::new(
            ref_i64(&run.input_refs, "exposure_version_id").ok_or_else(|| {
                HandlerError::Invalid("missing exposure_version_id".to_string())
            })?,
        );
        let hazard_version_ids: Vec<HazardDatasetVersionId> =
            ref_i64_list(&run.input_refs, "hazard_dataset_version_ids")
                .into_iter()
                .map(HazardDatasetVersionId::new)
                .collect();

        let result = ctx
            .store
            .score_result(&run.tenant_id, result_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("score result {result_id} not found"))
            })?;
        let config = result.config.clone();
        // The decision policy was frozen into the run at trigger time.
        let underwriting_policy: UnderwritingPolicy = run
            .config_refs
            .get("underwriting_policy")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        // Dataset metadata for entry extraction, keyed by version id.
        let mut dataset_info: BTreeMap<i64, (String, Option<String>, String)> = BTreeMap::new();
        for version_id in &hazard_version_ids {
            let version = ctx
                .store
                .hazard_dataset_version(&run.tenant_id, *version_id)?
                .ok_or_else(|| {
                    HandlerError::Invalid(format!(
                        "hazard dataset version {version_id} not found"
                    ))
                })?;
            let dataset = ctx
                .store
                .hazard_dataset(&run.tenant_id, version.dataset_id)?
                .ok_or_else(|| {
                    HandlerError::Invalid(format!(
                        "hazard dataset {} not found",
                        version.dataset_id
                    ))
                })?;
            dataset_info.insert(
                version_id.value(),
                (dataset.name, dataset.peril, version.version_label),
            );
        }

        let locations = ctx.store.locations_for_version(&run.tenant_id, version_id)?;
        let total = locations.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let perils: Vec<String> = config.weights.keys().cloned().collect();
        let mut peril_coverage: BTreeMap<String, BTreeMap<&'static str, u64>> = perils
            .iter()
            .map(|peril| {
                (
                    peril.clone(),
                    BTreeMap::from([("with_score", 0_u64), ("missing_score", 0_u64)]),
                )
            })
            .collect();

        let mut scored = 0_u64;
        let mut skipped_missing_coords = 0_u64;
        let mut with_structural = 0_u64;
        let mut without_structural = 0_u64;
        let mut unknown_fallback_used = 0_u64;
        let mut missing_tiv = 0_u64;
        let mut batch: Vec<ResilienceScoreItem> = Vec::new();

        for location in &locations {
            let (Some(latitude), Some(longitude)) = (location.latitude, location.longitude)
            else {
                skipped_missing_coords += 1;
                continue;
            };
            if location.tiv.is_none() {
                missing_tiv += 1;
            }
            if location.structural.is_empty() {
                without_structural += 1;
            } else {
                with_structural += 1;
            }

            let mut hazards = BTreeMap::new();
            if !hazard_version_ids.is_empty() {
                let point = GeoPoint::new(longitude, latitude);
                let features = ctx.store.features_containing(
                    &run.tenant_id,
                    &hazard_version_ids,
                    point,
                )?;
                for feature in &features {
                    let Some((name, peril, label)) =
                        dataset_info.get(&feature.dataset_version_id.value())
                    else {
                        continue;
                    };
                    let entry = extract_hazard_entry(
                        &feature.properties,
                        peril.as_deref(),
                        name,
                        label,
                        feature.id,
                    );
                    merge_worst_in_peril(&mut hazards, entry);
                }
            }

            for peril in &perils {
                let has_score =
                    hazards.get(peril).and_then(|entry| entry.score).is_some();
                if let Some(counters) = peril_coverage.get_mut(peril) {
                    let key = if has_score { "with_score" } else { "missing_score" };
                    if let Some(count) = counters.get_mut(key) {
                        *count += 1;
                    }
                }
            }
            let fallback_used = perils
                .iter()
                .any(|peril| hazards.get(peril).and_then(|entry| entry.score).is_none());
            if fallback_used {
                unknown_fallback_used += 1;
            }

            let clean_hazards = normalized_hazards(&hazards);
            let breakdown =
                compute_resilience_score(&clean_hazards, &location.structural, &config);
            let data_quality = DataQuality {
                peril_missing: perils
                    .iter()
                    .filter(|peril| {
                        clean_hazards.get(*peril).and_then(|entry| entry.score).is_none()
                    })
                    .cloned()
                    .collect(),
                used_unknown_hazard_fallback: fallback_used,
                enrichment_status: None,
                enrichment_failed: false,
                best_effort: false,
            };
            let decision = evaluate_underwriting_decision(
                breakdown.resilience_score,
                &clean_hazards,
                &location.structural,
                &data_quality,
                &underwriting_policy,
            );
            let explainability = build_explainability(
                &breakdown,
                &location.structural,
                Some(&decision),
                &data_quality,
            );
            batch.push(ResilienceScoreItem {
                id: ScoreItemId::new(0),
                tenant_id: run.tenant_id.clone(),
                score_result_id: result.id,
                location_id: location.id,
                resilience_score: breakdown.resilience_score,
                risk_score: breakdown.risk_score,
                hazards: clean_hazards,
                breakdown,
                decision,
                explainability,
                input_structural: location.structural.clone(),
            });
            scored += 1;

            if batch.len() >= ctx.scorer_batch_size {
                ctx.store.insert_score_items(&batch)?;
                batch.clear();
                if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                    return Err(HandlerError::Cancelled);
                }
                ctx.registry().progress(
                    run,
                    Some(scored + skipped_missing_coords),
                    Some(total),
                    None,
                )?;
            }
        }
        if !batch.is_empty() {
            ctx.store.insert_score_items(&batch)?;
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "resilience_score_result_id": result.id,
                "scored": scored,
                "skipped_missing_coords": skipped_missing_coords,
                "with_structural_count": with_structural,
                "without_structural_count": without_structural,
                "peril_coverage": peril_coverage,
                "unknown_hazard_fallback_used_count": unknown_fallback_used,
                "missing_tiv_count": missing_tiv,
                "processed": scored + skipped_missing_coords,
                "total": total,
            }),
            artifact_checksums: json!({}),
        })
    }
}
