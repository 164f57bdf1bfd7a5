// perilgrid-worker/src/handlers/breach.rs
// ============================================================================
// Module: Breach Evaluation Handler
// Description: Threshold rule evaluation with the breach lifecycle.
// Purpose: Execute BREACH_EVAL runs.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Every active threshold rule is evaluated over the rollup result's items.
//! Matches upsert breaches keyed by `(rule, exposure_version,
//! rollup_key_hash)`: new keys open, resolved keys reopen, open/acked keys
//! refresh. Keys of the rule that stopped matching resolve exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use perilgrid_core::Breach;
use perilgrid_core::BreachId;
use perilgrid_core::LifecycleStatus;
use perilgrid_core::RollupResultId;
use perilgrid_core::Run;
use perilgrid_core::RunType;
use perilgrid_core::ThresholdRuleId;
use perilgrid_core::runtime::registry::ref_i64;
use perilgrid_core::runtime::registry::ref_i64_list;
use perilgrid_core::stages::breach::evaluate_rule_on_items;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::HandlerOutcome;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler for BREACH_EVAL runs.
pub struct BreachEvalHandler;

impl RunHandler for BreachEvalHandler {
    fn run_type(&self) -> RunType {
        RunType::BreachEval
    }

    fn execute(
        &self,
        run: &mut Run,
        ctx: &WorkerContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let rollup_result_id = RollupResultId::new(
            ref_i64(&run.input_refs, "rollup_result_id")
                .ok_or_else(|| HandlerError::Invalid("missing rollup_result_id".to_string()))?,
        );
        let rule_filter: Vec<ThresholdRuleId> =
            ref_i64_list(&run.input_refs, "threshold_rule_ids")
                .into_iter()
                .map(ThresholdRuleId::new)
                .collect();

        let rollup = ctx
            .store
            .rollup_result(&run.tenant_id, rollup_result_id)?
            .ok_or_else(|| {
                HandlerError::Invalid(format!("rollup result {rollup_result_id} not found"))
            })?;
        let rules = ctx.store.active_threshold_rules(
            &run.tenant_id,
            if rule_filter.is_empty() { None } else { Some(rule_filter.as_slice()) },
        )?;
        let items = ctx.store.items_for_rollup_result(&run.tenant_id, rollup.id)?;
        let total = items.len() as u64;
        ctx.registry().progress(run, Some(0), Some(total), None)?;

        let now = ctx.clock.now();
        let mut opened = 0_u64;
        let mut resolved = 0_u64;
        for rule in &rules {
            if ctx.cancellation_requested(&run.tenant_id, run.id)? {
                return Err(HandlerError::Cancelled);
            }
            let matches = evaluate_rule_on_items(&items, &rule.rule)?;
            let matched_hashes: BTreeSet<&str> =
                matches.iter().map(|m| m.rollup_key_hash.as_str()).collect();

            for matched in &matches {
                let existing = ctx.store.breach_by_key(
                    &run.tenant_id,
                    rule.id,
                    rollup.exposure_version_id,
                    &matched.rollup_key_hash,
                )?;
                match existing {
                    None => {
                        let breach = Breach {
                            id: BreachId::new(0),
                            tenant_id: run.tenant_id.clone(),
                            threshold_rule_id: rule.id,
                            exposure_version_id: rollup.exposure_version_id,
                            rollup_result_id: rollup.id,
                            rollup_key: matched.rollup_key.clone(),
                            rollup_key_hash: matched.rollup_key_hash.clone(),
                            metric_name: rule.rule.metric.clone(),
                            metric_value: matched.metric_value,
                            threshold_value: matched.threshold_value,
                            status: LifecycleStatus::Open,
                            first_seen_at: now,
                            last_seen_at: now,
                            resolved_at: None,
                            last_eval_run_id: Some(run.id),
                        };
                        ctx.store.insert_breach(&breach)?;
                        opened += 1;
                    }
                    Some(mut breach) => {
                        breach.metric_value = matched.metric_value;
                        breach.threshold_value = matched.threshold_value;
                        breach.last_seen_at = now;
                        breach.rollup_result_id = rollup.id;
                        breach.last_eval_run_id = Some(run.id);
                        if breach.status == LifecycleStatus::Resolved {
                            breach.status = LifecycleStatus::Open;
                            breach.resolved_at = None;
                            opened += 1;
                        }
                        ctx.store.update_breach(&breach)?;
                    }
                }
            }

            let stale = ctx.store.breaches_for_rule_version(
                &run.tenant_id,
                rule.id,
                rollup.exposure_version_id,
            )?;
            for mut breach in stale {
                if matched_hashes.contains(breach.rollup_key_hash.as_str()) {
                    continue;
                }
                if matches!(
                    breach.status,
                    LifecycleStatus::Open | LifecycleStatus::Acked
                ) {
                    breach.status = LifecycleStatus::Resolved;
                    breach.resolved_at = Some(now);
                    breach.last_seen_at = now;
                    breach.rollup_result_id = rollup.id;
                    breach.last_eval_run_id = Some(run.id);
                    ctx.store.update_breach(&breach)?;
                    resolved += 1;
                }
            }
        }

        Ok(HandlerOutcome {
            output_refs: json!({
                "rollup_result_id": rollup.id,
                "breaches_open": opened,
                "breaches_resolved": resolved,
                "rules_evaluated": rules.len() as u64,
                "processed": total,
                "total": total,
            }),
            artifact_checksums: json!({}),
        })
    }
}
