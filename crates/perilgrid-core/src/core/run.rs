// perilgrid-core/src/core/run.rs
// ============================================================================
// Module: Perilgrid Run Records
// Description: Run orchestration record, lifecycle states, and progress.
// Purpose: Capture deterministic run evolution for audit and retry.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Run`] is the orchestration record for one execution of a pipeline
//! stage. It carries lifecycle state, input/config/output references,
//! artifact checksums, and timing. Status transitions are validated here;
//! the worker and control plane never mutate status without going through
//! [`RunStatus::can_transition_to`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::RequestId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TaskId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Type
// ============================================================================

/// Pipeline stage executed by a run.
///
/// # Invariants
/// - Variants serialize as stable SCREAMING_SNAKE_CASE strings; the set is
///   strictly expanding across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunType {
    /// Upload validation.
    Validation,
    /// Exposure version materialisation.
    Commit,
    /// Geocoding and quality scoring.
    Geocode,
    /// Spatial hazard overlay.
    Overlay,
    /// Group-by rollup aggregation.
    Rollup,
    /// Threshold rule evaluation.
    BreachEval,
    /// Exposure version diff.
    Drift,
    /// Batch resilience scoring.
    ResilienceScore,
    /// Property profile enrichment.
    PropertyEnrichment,
    /// Underwriting rule evaluation.
    UwEval,
}

impl RunType {
    /// Returns the stable wire string for this run type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Commit => "COMMIT",
            Self::Geocode => "GEOCODE",
            Self::Overlay => "OVERLAY",
            Self::Rollup => "ROLLUP",
            Self::BreachEval => "BREACH_EVAL",
            Self::Drift => "DRIFT",
            Self::ResilienceScore => "RESILIENCE_SCORE",
            Self::PropertyEnrichment => "PROPERTY_ENRICHMENT",
            Self::UwEval => "UW_EVAL",
        }
    }

    /// Parses a stable wire string into a run type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VALIDATION" => Some(Self::Validation),
            "COMMIT" => Some(Self::Commit),
            "GEOCODE" => Some(Self::Geocode),
            "OVERLAY" => Some(Self::Overlay),
            "ROLLUP" => Some(Self::Rollup),
            "BREACH_EVAL" => Some(Self::BreachEval),
            "DRIFT" => Some(Self::Drift),
            "RESILIENCE_SCORE" => Some(Self::ResilienceScore),
            "PROPERTY_ENRICHMENT" => Some(Self::PropertyEnrichment),
            "UW_EVAL" => Some(Self::UwEval),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - `QUEUED → RUNNING → {SUCCEEDED, FAILED, CANCELLED}` plus
///   `QUEUED → CANCELLED`; terminal states never transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Awaiting a worker claim.
    Queued,
    /// Claimed and executing.
    Running,
    /// Completed successfully; artifacts are retrievable.
    Succeeded,
    /// Handler raised an error; partial artifacts retained.
    Failed,
    /// Cooperative cancellation observed; partial writes retained.
    Cancelled,
}

impl RunStatus {
    /// Returns the stable wire string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a stable wire string into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true when the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true when the transition to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(next, Self::Succeeded | Self::Failed | Self::Cancelled),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// Central orchestration record for one pipeline-stage execution.
///
/// # Invariants
/// - `input_refs`, `config_refs`, `output_refs`, and `artifact_checksums`
///   are JSON objects; handlers read their inputs from `input_refs` so a
///   retried run is fully described by the copied references.
/// - Artifact writes complete before the terminal status flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub id: RunId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Pipeline stage type.
    pub run_type: RunType,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Input entity references (ids, URIs, fingerprints).
    pub input_refs: Value,
    /// Frozen configuration references captured at creation.
    pub config_refs: Value,
    /// Output references and progress counters.
    pub output_refs: Value,
    /// Checksums of artifacts produced by this run.
    pub artifact_checksums: Value,
    /// Engine code version recorded at completion.
    pub code_version: Option<String>,
    /// Creating user, when known.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Time the worker started executing.
    pub started_at: Option<Timestamp>,
    /// Terminal completion time.
    pub completed_at: Option<Timestamp>,
    /// Time cancellation was observed.
    pub cancelled_at: Option<Timestamp>,
    /// Correlation request identifier.
    pub request_id: Option<RequestId>,
    /// Durable queue task identifier.
    pub task_id: Option<TaskId>,
}

// ============================================================================
// SECTION: Queued Task
// ============================================================================

/// Durable FIFO queue entry dispatched to the worker pool.
///
/// # Invariants
/// - Delivery is at-least-once; handlers are idempotent and read their
///   inputs from the referenced run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Task identifier.
    pub id: TaskId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Run to execute.
    pub run_id: RunId,
    /// Pipeline stage type (handler routing key).
    pub run_type: RunType,
    /// Correlation request identifier.
    pub request_id: Option<RequestId>,
    /// Enqueue time.
    pub enqueued_at: Timestamp,
}

// ============================================================================
// SECTION: Progress Merge
// ============================================================================

/// Merges progress counters and extras into an output-reference object.
///
/// Existing keys are preserved unless overwritten; `processed` and `total`
/// are only written when provided.
#[must_use]
pub fn merge_progress(
    existing: &Value,
    processed: Option<u64>,
    total: Option<u64>,
    extra: Option<&Map<String, Value>>,
) -> Value {
    let mut merged = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(processed) = processed {
        merged.insert("processed".to_string(), Value::from(processed));
    }
    if let Some(total) = total {
        merged.insert("total".to_string(), Value::from(total));
    }
    if let Some(extra) = extra {
        for (key, value) in extra {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}
