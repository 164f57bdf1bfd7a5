// perilgrid-worker/src/context.rs
// ============================================================================
// Module: Worker Context & Handler Contract
// Description: Shared seams and the handler trait for stage execution.
// Purpose: Give handlers store, blob, provider, and clock access.
// Dependencies: perilgrid-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`WorkerContext`] bundles the seams a handler needs. Handlers read
//! their inputs from the run's input references (so retries are fully
//! described by the copied refs), write artifacts before returning, and
//! surface [`HandlerError::Cancelled`] when they observe cooperative
//! cancellation at a batch boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use perilgrid_core::Clock;
use perilgrid_core::HashError;
use perilgrid_core::ObjectStore;
use perilgrid_core::ObjectStoreError;
use perilgrid_core::ProviderSet;
use perilgrid_core::RegistryError;
use perilgrid_core::Run;
use perilgrid_core::RunId;
use perilgrid_core::RunRegistry;
use perilgrid_core::RunStatus;
use perilgrid_core::RunType;
use perilgrid_core::Store;
use perilgrid_core::StoreError;
use perilgrid_core::TenantId;
use perilgrid_core::runtime::RuntimeOptions;
use perilgrid_core::stages::EngineError;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by stage handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Cooperative cancellation observed; the run is already final.
    #[error("run cancelled")]
    Cancelled,
    /// Handler input references are incomplete or malformed.
    #[error("invalid task input: {0}")]
    Invalid(String),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Object store operation failed.
    #[error(transparent)]
    Objects(#[from] ObjectStoreError),
    /// Stage engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Seams shared by every handler invocation.
#[derive(Clone)]
pub struct WorkerContext {
    /// Combined store.
    pub store: Arc<dyn Store>,
    /// Object store gateway.
    pub objects: Arc<dyn ObjectStore>,
    /// Enrichment providers.
    pub providers: ProviderSet,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Runtime options frozen into runs.
    pub options: RuntimeOptions,
    /// Progress batch size for scorers.
    pub scorer_batch_size: usize,
    /// Progress batch size for overlays.
    pub overlay_batch_size: usize,
}

impl WorkerContext {
    /// Returns a registry bound to this context's seams.
    #[must_use]
    pub fn registry(&self) -> RunRegistry<'_> {
        RunRegistry::new(
            self.store.as_ref(),
            self.clock.as_ref(),
            self.options.code_version.clone(),
        )
    }

    /// Returns true when cancellation has been requested for the run.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Store`] when the refetch fails.
    pub fn cancellation_requested(
        &self,
        tenant_id: &TenantId,
        run_id: RunId,
    ) -> Result<bool, HandlerError> {
        let current = self
            .store
            .run(tenant_id, run_id)?
            .ok_or_else(|| HandlerError::Invalid(format!("run {run_id} vanished")))?;
        Ok(current.status == RunStatus::Cancelled)
    }
}

// ============================================================================
// SECTION: Handler Contract
// ============================================================================

/// Output of a successful handler execution.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Final output references (progress plus stage outputs).
    pub output_refs: Value,
    /// Checksums of artifacts produced by the run.
    pub artifact_checksums: Value,
}

/// One pipeline-stage handler.
pub trait RunHandler: Send + Sync {
    /// Run type this handler executes.
    fn run_type(&self) -> RunType;

    /// Executes the stage for one run.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Cancelled`] on observed cancellation, any
    /// other variant on failure; the pool flips the run to FAILED.
    fn execute(&self, run: &mut Run, ctx: &WorkerContext) -> Result<HandlerOutcome, HandlerError>;
}
