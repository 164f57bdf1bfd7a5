// perilgrid-core/src/runtime/mod.rs
// ============================================================================
// Module: Perilgrid Runtime
// Description: Run registry, control plane, and lineage traversal.
// Purpose: Expose the canonical execution paths over the store seams.
// Dependencies: crate::{core, interfaces, stages}
// ============================================================================

//! ## Overview
//! The runtime owns run orchestration: the registry creates, transitions,
//! cancels, and retries runs; the control plane is the single canonical
//! execution path for every control-plane operation; lineage walks the
//! entity DAG read-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod control;
pub mod lineage;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use control::BatchScoreOutcome;
pub use control::BatchScoreStatus;
pub use control::CommitOutcome;
pub use control::ControlPlane;
pub use control::ControlPlaneError;
pub use control::ProfileResolution;
pub use control::ProfileResolutionStatus;
pub use control::ResilienceSummary;
pub use control::RunHandle;
pub use control::ScoreResilienceResponse;
pub use lineage::LineageEdge;
pub use lineage::LineageEntityType;
pub use lineage::LineageGraph;
pub use lineage::LineageNode;
pub use lineage::LineageRelation;
pub use lineage::build_lineage;
pub use registry::RegistryError;
pub use registry::RunRegistry;

// ============================================================================
// SECTION: Runtime Options
// ============================================================================

/// Immutable runtime knobs frozen into runs and fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Engine code version recorded on runs and fingerprints.
    pub code_version: String,
    /// Scoring algorithm version.
    pub scoring_version: String,
    /// Reuse window for request-fingerprint deduplication, in days.
    pub fingerprint_reuse_days: i64,
    /// Freshness window for property profiles, in days.
    pub profile_freshness_days: i64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            code_version: "dev".to_string(),
            scoring_version: crate::core::SCORING_VERSION.to_string(),
            fingerprint_reuse_days: 30,
            profile_freshness_days: 30,
        }
    }
}
