// perilgrid-worker/src/handlers/mod.rs
// ============================================================================
// Module: Stage Handlers
// Description: One handler per run type, wiring stores around stage engines.
// Purpose: Execute pipeline stages with progress and cancellation.
// Dependencies: perilgrid-core, serde_json
// ============================================================================

//! ## Overview
//! Handlers orchestrate stores, blobs, and providers around the pure stage
//! engines. Every handler reads its inputs from the run's input references,
//! checks cancellation at batch boundaries, writes artifacts before
//! returning, and reports `{processed, total, …extras}` progress.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod breach;
pub mod commit;
pub mod drift;
pub mod enrichment;
pub mod geocode;
pub mod overlay;
pub mod resilience;
pub mod rollup;
pub mod underwriting;
pub mod validation;

// ============================================================================
// SECTION: Registry
// ============================================================================

use crate::context::RunHandler;

/// Returns the default handler set covering every run type.
#[must_use]
pub fn default_handlers() -> Vec<Box<dyn RunHandler>> {
    vec![
        Box::new(validation::ValidationHandler),
        Box::new(commit::CommitHandler),
        Box::new(geocode::GeocodeHandler),
        Box::new(overlay::OverlayHandler),
        Box::new(rollup::RollupHandler),
        Box::new(breach::BreachEvalHandler),
        Box::new(drift::DriftHandler),
        Box::new(resilience::ResilienceScoreHandler),
        Box::new(enrichment::PropertyEnrichmentHandler),
        Box::new(underwriting::UwEvalHandler),
    ]
}
