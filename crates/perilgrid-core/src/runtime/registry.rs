// perilgrid-core/src/runtime/registry.rs
// ============================================================================
// Module: Perilgrid Run Registry
// Description: Run creation, lifecycle transitions, cancel, and retry.
// Purpose: Provide the single canonical path for run state changes.
// Dependencies: crate::{core, interfaces}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry creates queued runs with their durable task, validates every
//! status transition, and implements cancel and retry. Retry never reuses a
//! run: it creates a new run with the same input and config references and
//! repoints stage-specific result rows to it after clearing their per-result
//! items, preserving the idempotency invariants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::QueuedTask;
use crate::core::RequestId;
use crate::core::Run;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::RunType;
use crate::core::TaskId;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::UserId;
use crate::core::merge_progress;
use crate::interfaces::Clock;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the run registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Run not found within the tenant.
    #[error("run not found: {0}")]
    NotFound(RunId),
    /// Requested transition violates the state machine.
    #[error("invalid run transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },
    /// Retry requested for a run that is not FAILED or CANCELLED.
    #[error("run is not retryable from status {0:?}")]
    NotRetryable(RunStatus),
}

// ============================================================================
// SECTION: Reference Helpers
// ============================================================================

/// Reads a numeric id from a reference object.
#[must_use]
pub fn ref_i64(refs: &Value, key: &str) -> Option<i64> {
    refs.get(key).and_then(Value::as_i64)
}

/// Reads a numeric id list from a reference object.
#[must_use]
pub fn ref_i64_list(refs: &Value, key: &str) -> Vec<i64> {
    refs.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// Reads a string from a reference object.
#[must_use]
pub fn ref_str<'a>(refs: &'a Value, key: &str) -> Option<&'a str> {
    refs.get(key).and_then(Value::as_str)
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Run registry over the store and clock seams.
pub struct RunRegistry<'a> {
    /// Combined store.
    store: &'a dyn Store,
    /// Time source.
    clock: &'a dyn Clock,
    /// Engine code version recorded on completion.
    code_version: String,
}

impl<'a> RunRegistry<'a> {
    /// Creates a registry.
    #[must_use]
    pub fn new(store: &'a dyn Store, clock: &'a dyn Clock, code_version: String) -> Self {
        Self {
            store,
            clock,
            code_version,
        }
    }

    /// Creates a queued run and its durable task.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persistence fails.
    pub fn create_queued(
        &self,
        tenant_id: &TenantId,
        run_type: RunType,
        input_refs: Value,
        config_refs: Value,
        created_by: Option<UserId>,
        request_id: Option<RequestId>,
    ) -> Result<Run, RegistryError> {
        let now = self.clock.now();
        let mut run = Run {
            id: RunId::new(0),
            tenant_id: tenant_id.clone(),
            run_type,
            status: RunStatus::Queued,
            input_refs,
            config_refs,
            output_refs: json!({}),
            artifact_checksums: json!({}),
            code_version: None,
            created_by,
            created_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            request_id,
            task_id: None,
        };
        run.id = self.store.insert_run(&run)?;
        let task = QueuedTask {
            id: TaskId::new(0),
            tenant_id: tenant_id.clone(),
            run_id: run.id,
            run_type,
            request_id: run.request_id.clone(),
            enqueued_at: now,
        };
        run.task_id = Some(self.store.enqueue(&task)?);
        self.store.update_run(&run)?;
        Ok(run)
    }

    /// Loads a run, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the run is missing.
    pub fn load(&self, tenant_id: &TenantId, run_id: RunId) -> Result<Run, RegistryError> {
        self.store
            .run(tenant_id, run_id)?
            .ok_or(RegistryError::NotFound(run_id))
    }

    /// Marks a run RUNNING, recording the start time and request id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidTransition`] unless the run is QUEUED
    /// or already RUNNING (at-least-once redelivery).
    pub fn begin(&self, run: &mut Run, request_id: Option<&RequestId>) -> Result<(), RegistryError> {
        match run.status {
            RunStatus::Queued => {
                run.status = RunStatus::Running;
                run.started_at = Some(self.clock.now());
            }
            RunStatus::Running => {}
            other => {
                return Err(RegistryError::InvalidTransition {
                    from: other,
                    to: RunStatus::Running,
                });
            }
        }
        if run.request_id.is_none() {
            run.request_id = request_id.cloned();
        }
        self.store.update_run(run)?;
        Ok(())
    }

    /// Writes a progress update into the run's output references.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the update fails.
    pub fn progress(
        &self,
        run: &mut Run,
        processed: Option<u64>,
        total: Option<u64>,
        extra: Option<&Map<String, Value>>,
    ) -> Result<(), RegistryError> {
        run.output_refs = merge_progress(&run.output_refs, processed, total, extra);
        self.store.update_run(run)?;
        Ok(())
    }

    /// Returns true when cancellation has been requested for the run.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the refetch fails.
    pub fn cancellation_requested(
        &self,
        tenant_id: &TenantId,
        run_id: RunId,
    ) -> Result<bool, RegistryError> {
        let current = self.load(tenant_id, run_id)?;
        Ok(current.status == RunStatus::Cancelled)
    }

    /// Flips a run to SUCCEEDED after its artifacts are persisted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidTransition`] unless the run is RUNNING.
    pub fn complete_success(
        &self,
        run: &mut Run,
        output_refs: Value,
        artifact_checksums: Value,
    ) -> Result<(), RegistryError> {
        if !run.status.can_transition_to(RunStatus::Succeeded) {
            return Err(RegistryError::InvalidTransition {
                from: run.status,
                to: RunStatus::Succeeded,
            });
        }
        run.status = RunStatus::Succeeded;
        run.completed_at = Some(self.clock.now());
        run.output_refs = output_refs;
        run.artifact_checksums = artifact_checksums;
        run.code_version = Some(self.code_version.clone());
        self.store.update_run(run)?;
        Ok(())
    }

    /// Flips a run to FAILED, retaining partial artifacts for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the update fails.
    pub fn complete_failure(&self, run: &mut Run) -> Result<(), RegistryError> {
        if !run.status.can_transition_to(RunStatus::Failed) {
            return Err(RegistryError::InvalidTransition {
                from: run.status,
                to: RunStatus::Failed,
            });
        }
        run.status = RunStatus::Failed;
        run.completed_at = Some(self.clock.now());
        self.store.update_run(run)?;
        Ok(())
    }

    /// Requests cancellation of a queued or running run.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidTransition`] when the run is terminal.
    pub fn cancel(&self, tenant_id: &TenantId, run_id: RunId) -> Result<Run, RegistryError> {
        let mut run = self.load(tenant_id, run_id)?;
        if !run.status.can_transition_to(RunStatus::Cancelled) {
            return Err(RegistryError::InvalidTransition {
                from: run.status,
                to: RunStatus::Cancelled,
            });
        }
        let now = self.clock.now();
        run.status = RunStatus::Cancelled;
        run.cancelled_at = Some(now);
        run.completed_at = Some(now);
        self.store.update_run(&run)?;
        Ok(run)
    }

    /// Retries a FAILED or CANCELLED run by creating a new run.
    ///
    /// Stage-specific result rows referenced by the input refs are repointed
    /// to the new run after clearing their per-result items.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRetryable`] unless the run is terminal
    /// FAILED or CANCELLED.
    pub fn retry(&self, tenant_id: &TenantId, run_id: RunId) -> Result<Run, RegistryError> {
        let original = self.load(tenant_id, run_id)?;
        if !matches!(original.status, RunStatus::Failed | RunStatus::Cancelled) {
            return Err(RegistryError::NotRetryable(original.status));
        }
        let new_run = self.create_queued(
            tenant_id,
            original.run_type,
            original.input_refs.clone(),
            original.config_refs.clone(),
            original.created_by.clone(),
            original.request_id.clone(),
        )?;
        self.repoint_results(tenant_id, &original, new_run.id)?;
        Ok(new_run)
    }

    /// Repoints stage result rows from the original run to the new run.
    fn repoint_results(
        &self,
        tenant_id: &TenantId,
        original: &Run,
        new_run_id: RunId,
    ) -> Result<(), RegistryError> {
        match original.run_type {
            RunType::Overlay => {
                if let Some(id) = ref_i64(&original.input_refs, "overlay_result_id") {
                    let overlay_id = id.into();
                    if let Some(mut overlay) =
                        self.store.overlay_result(tenant_id, overlay_id)?
                    {
                        self.store.delete_attributes_for_overlay(tenant_id, overlay_id)?;
                        overlay.run_id = Some(new_run_id);
                        self.store.update_overlay_result(&overlay)?;
                    }
                }
            }
            RunType::Rollup => {
                if let Some(id) = ref_i64(&original.input_refs, "rollup_result_id") {
                    let result_id = id.into();
                    if let Some(mut result) = self.store.rollup_result(tenant_id, result_id)? {
                        self.store.delete_items_for_rollup_result(tenant_id, result_id)?;
                        result.run_id = Some(new_run_id);
                        result.checksum = None;
                        self.store.update_rollup_result(&result)?;
                    }
                }
            }
            RunType::ResilienceScore => {
                if let Some(id) = ref_i64(&original.input_refs, "resilience_score_result_id") {
                    let result_id = id.into();
                    if let Some(mut result) = self.store.score_result(tenant_id, result_id)? {
                        self.store.delete_items_for_score_result(tenant_id, result_id)?;
                        result.run_id = Some(new_run_id);
                        self.store.update_score_result(&result)?;
                    }
                }
            }
            RunType::Drift => {
                if let Some(id) = ref_i64(&original.input_refs, "drift_run_id") {
                    let drift_id = id.into();
                    if let Some(mut drift) = self.store.drift_run(tenant_id, drift_id)? {
                        self.store.delete_details_for_drift_run(tenant_id, drift_id)?;
                        drift.run_id = Some(new_run_id);
                        drift.storage_uri = None;
                        drift.checksum = None;
                        self.store.update_drift_run(&drift)?;
                    }
                }
            }
            RunType::Validation
            | RunType::Commit
            | RunType::Geocode
            | RunType::BreachEval
            | RunType::PropertyEnrichment
            | RunType::UwEval => {}
        }
        Ok(())
    }

    /// Returns the current time from the registry clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}
