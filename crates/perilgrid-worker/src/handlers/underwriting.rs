// perilgrid-worker/src/handlers/underwriting.rs
// ============================================================================
// Module: Underwriting Evaluation Handler
// Description: Predicate evaluation over location and rollup records.
// Purpose: Execute UW_EVAL runs with the finding lifecycle.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Location-target rules evaluate every location record (including its
//! overlay hazard bands and categories); rollup-target rules evaluate the
//! referenced rollup result's items. Matches upsert findings with the same
//! open/reopen/refresh semantics as breaches, and stale findings of each
//! rule resolve exactly once. Cancellation is observed between rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use perilgrid_core::ExposureVersionId;
use perilgrid_core::LifecycleStatus;
use perilgrid_core::RollupResultId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::Timestamp;
use perilgrid_core::UwFinding;
use perilgrid_core::UwFindingId;
use perilgrid_core::UwRule;
use perilgrid_core::UwRuleId;
use perilgrid_core::UwTarget;
use perilgrid_core::hashing::canonical_json_string;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::runtime::registry::ref_i64_list;
use perilgrid_core::stages::underwriting::build_explanation;
use perilgrid_core::stages::underwriting::build_location_record;
use perilgrid_core::stages::underwriting::build_rollup_record;
use perilgrid_core::stages::underwriting::evaluate_rule;
use perilgrid_core::stages::underwriting::rule_disposition;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for UW_EVAL runs.
pub struct UwEvalHandler;

/// Mutable evaluation counters shared by both rule targets.
struct EvalCounters {
    /// Findings opened or reopened.
    opened: u64,
    /// Findings resolved.
    resolved: u64,
}

impl RunHandler for UwEvalHandler {
    fn run_type(&self) -> RunType {
        RunType::UwEval
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
        let rollup_result_id =
            ref_i64(&run.input_refs, "rollup_result_id").map(RollupResultId::new);
        let rule_filter: Vec<UwRuleId> = ref_i64_list(&run.input_refs, "uw_rule_ids")
            .into_iter()
            .map(UwRuleId::new)
            .collect();

        let rules = ctx.store.active_uw_rules(
            &run.tenant_id,
            if rule_filter.is_empty() { None } else { Some(rule_filter.as_slice()) },
        )?;
        let location_rules: Vec<&UwRule> =
            rules.iter().filter(|rule| rule.target == UwTarget::Location).collect();
        let rollup_rules: Vec<&UwRule> =
            rules.iter().filter(|rule| rule.target == UwTarget::Rollup).collect();

        let locations = ctx.store.locations_for_version(&run.tenant_id, version_id)?;
        let mut hazards_by_location: BTreeMap<i64, Vec<perilgrid_core::HazardAttributes>> =
            BTreeMap::new();
        for attribute in ctx.store.attributes_for_exposure(&run.tenant_id, version_id)? {
            hazards_by_location
                .entry(attribute.location_id.value())
                .or_default()
                .push(attribute.attributes);
        }
        let rollup_items = match rollup_result_id {
            Some(result_id) => ctx.store.items_for_rollup_result(&run.tenant_id, result_id)?,
            None => Vec::new(),
        };

        let total = (locations.len() + rollup_items.len()) as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let now = ctx.clock.now();
        let mut counters = EvalCounters {
            opened: 0,
            resolved: 0,
        };

        for rule in &location_rules {
            if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                return Err(HandlerError::Cancelled);
            }
            let mut matched_locations = BTreeSet::new();
            let mut matches = Vec::new();
            for location in &locations {
                let record = build_location_record(
                    location,
                    hazards_by_location
                        .get(&location.id.value())
                        .map_or(&[][..], Vec::as_slice),
                );
                let (matched, evaluation) = evaluate_rule(&rule.rule, &record);
                if matched {
                    matched_locations.insert(location.id.value());
                    matches.push((location.id, record, evaluation));
                }
            }
            matches.sort_by_key(|(location_id, _, _)| location_id.value());

            let disposition = rule_disposition(&rule.rule);
            for (location_id, record, evaluation) in &matches {
                let explanation = build_explanation(rule, record, evaluation);
                let existing = ctx.store.uw_finding_by_location(
                    &run.tenant_id,
                    rule.id,
                    version_id,
                    *location_id,
                )?;
                upsert_finding(
                    ctx,
                    run,
                    existing,
                    UwFinding {
                        id: UwFindingId::new(0),
                        tenant_id: run.tenant_id.clone(),
                        uw_rule_id: rule.id,
                        exposure_version_id: version_id,
                        location_id: Some(*location_id),
                        rollup_result_id,
                        rollup_key_hash: None,
                        status: LifecycleStatus::Open,
                        disposition: disposition.clone(),
                        explanation,
                        first_seen_at: now,
                        last_seen_at: now,
                        resolved_at: None,
                        last_eval_run_id: Some(run.id),
                    },
                    now,
                    &mut counters,
                )?;
            }
            resolve_stale(
                ctx,
                run,
                rule.id,
                version_id,
                |finding| {
                    finding.location_id.is_some_and(|id| !matched_locations.contains(&id.value()))
                },
                now,
                &mut counters,
            )?;
        }

        for rule in &rollup_rules {
            if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                return Err(HandlerError::Cancelled);
            }
            if rollup_items.is_empty() {
                continue;
            }
            let mut matched_hashes = BTreeSet::new();
            let mut matches = Vec::new();
            for item in &rollup_items {
                let record = build_rollup_record(&item.key, &item.metrics);
                let (matched, evaluation) = evaluate_rule(&rule.rule, &record);
                if matched {
                    matched_hashes.insert(item.key_hash.clone());
                    let sort_key = canonical_json_string(&item.key)?;
                    matches.push((sort_key, item.key_hash.clone(), record, evaluation));
                }
            }
            matches.sort_by(|a, b| a.0.cmp(&b.0));

            let disposition = rule_disposition(&rule.rule);
            for (_, key_hash, record, evaluation) in &matches {
                let explanation = build_explanation(rule, record, evaluation);
                let existing = ctx.store.uw_finding_by_rollup_key(
                    &run.tenant_id,
                    rule.id,
                    version_id,
                    key_hash,
                )?;
                upsert_finding(
                    ctx,
                    run,
                    existing,
                    UwFinding {
                        id: UwFindingId::new(0),
                        tenant_id: run.tenant_id.clone(),
                        uw_rule_id: rule.id,
                        exposure_version_id: version_id,
                        location_id: None,
                        rollup_result_id,
                        rollup_key_hash: Some(key_hash.clone()),
                        status: LifecycleStatus::Open,
                        disposition: disposition.clone(),
                        explanation,
                        first_seen_at: now,
                        last_seen_at: now,
                        resolved_at: None,
                        last_eval_run_id: Some(run.id),
                    },
                    now,
                    &mut counters,
                )?;
            }
            resolve_stale(
                ctx,
                run,
                rule.id,
                version_id,
                |finding| {
                    finding
                        .rollup_key_hash
                        .as_deref()
                        .is_some_and(|hash| !matched_hashes.contains(hash))
                },
                now,
                &mut counters,
            )?;
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "exposure_version_id": version_id,
                "rollup_result_id": rollup_result_id,
                "uw_findings_open": counters.opened,
                "uw_findings_resolved": counters.resolved,
                "rules_evaluated": rules.len() as u64,
                "location_rules": location_rules.len() as u64,
                "rollup_rules": rollup_rules.len() as u64,
                "processed": total,
                "total": total,
            }),
            artifact_checksums: json!({}),
        })
    }
}

// ============================================================================
// SECTION: Finding Upserts
// ============================================================================

/// Inserts a new finding or refreshes/reopens the existing one.
fn upsert_finding(
    ctx: &WorkerContext,
    run: &Run,
    existing: Option<UwFinding>,
    fresh: UwFinding,
    now: Timestamp,
    counters: &mut EvalCounters,
) -> Result<(), HandlerError> {
    match existing {
        None => {
            ctx.store.insert_uw_finding(&fresh)?;
            counters.opened += 1;
        }
        Some(mut finding) => {
            finding.disposition = fresh.disposition;
            finding.explanation = fresh.explanation;
            finding.last_seen_at = now;
            finding.rollup_result_id = fresh.rollup_result_id;
            finding.last_eval_run_id = Some(run.id);
            if finding.status == LifecycleStatus::Resolved {
                finding.status = LifecycleStatus::Open;
                finding.resolved_at = None;
                counters.opened += 1;
            }
            ctx.store.update_uw_finding(&finding)?;
        }
    }
    Ok(())
}

/// Resolves open/acked findings of the rule that stopped matching.
fn resolve_stale(
    ctx: &WorkerContext,
    run: &Run,
    rule_id: UwRuleId,
    version_id: ExposureVersionId,
    is_stale: impl Fn(&UwFinding) -> bool,
    now: Timestamp,
    counters: &mut EvalCounters,
) -> Result<(), HandlerError> {
    let findings =
        ctx.store.uw_findings_for_rule_version(&run.tenant_id, rule_id, version_id)?;
    for mut finding in findings {
        if !is_stale(&finding) {
            continue;
        }
        if matches!(finding.status, LifecycleStatus::Open | LifecycleStatus::Acked) {
            finding.status = LifecycleStatus::Resolved;
            finding.resolved_at = Some(now);
            finding.last_seen_at = now;
            finding.last_eval_run_id = Some(run.id);
            ctx.store.update_uw_finding(&finding)?;
            counters.resolved += 1;
        }
    }
    Ok(())
}
