// perilgrid-core/tests/run_state.rs
// ============================================================================
// Module: Run State Machine Tests
// Description: Lifecycle transition and progress-merge checks.
// ============================================================================
//! ## Overview
//! Validates the run state machine edges, terminal detection, wire strings,
//! the breach lifecycle edges, and the progress merge semantics.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use perilgrid_core::LifecycleStatus;
use perilgrid_core::RunStatus;
use perilgrid_core::RunType;
use perilgrid_core::merge_progress;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Run Transitions
// ============================================================================

/// Tests the allowed run transitions and nothing else.
#[test]
fn test_run_transition_edges() {
    use RunStatus::{Cancelled, Failed, Queued, Running, Succeeded};
    assert!(Queued.can_transition_to(Running));
    assert!(Queued.can_transition_to(Cancelled));
    assert!(Running.can_transition_to(Succeeded));
    assert!(Running.can_transition_to(Failed));
    assert!(Running.can_transition_to(Cancelled));

    assert!(!Queued.can_transition_to(Succeeded));
    assert!(!Succeeded.can_transition_to(Running));
    assert!(!Failed.can_transition_to(Running));
    assert!(!Cancelled.can_transition_to(Running));
    for status in [Succeeded, Failed, Cancelled] {
        assert!(status.is_terminal());
    }
}

/// Tests run type and status wire strings round-trip.
#[test]
fn test_wire_string_roundtrip() {
    for run_type in [
        RunType::Validation,
        RunType::Commit,
        RunType::Geocode,
        RunType::Overlay,
        RunType::Rollup,
        RunType::BreachEval,
        RunType::Drift,
        RunType::ResilienceScore,
        RunType::PropertyEnrichment,
        RunType::UwEval,
    ] {
        assert_eq!(RunType::parse(run_type.as_str()), Some(run_type));
    }
    for status in [
        RunStatus::Queued,
        RunStatus::Running,
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ] {
        assert_eq!(RunStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(RunType::parse("NOT_A_RUN_TYPE"), None);
}

// ============================================================================
// SECTION: Breach Lifecycle
// ============================================================================

/// Tests the strict breach lifecycle edges.
#[test]
fn test_breach_lifecycle_edges() {
    use LifecycleStatus::{Acked, Open, Resolved};
    assert!(Open.can_transition_to(Acked));
    assert!(Open.can_transition_to(Resolved));
    assert!(Acked.can_transition_to(Resolved));
    assert!(Resolved.can_transition_to(Open));

    assert!(!Acked.can_transition_to(Open));
    assert!(!Resolved.can_transition_to(Acked));
}

// ============================================================================
// SECTION: Progress Merge
// ============================================================================

/// Tests counters overwrite and extras merge without losing keys.
#[test]
fn test_progress_merge_semantics() {
    let existing = json!({"processed": 10, "total": 100, "stage_output_id": 7});
    let mut extra = Map::new();
    extra.insert("scored".to_string(), Value::from(25));
    let merged = merge_progress(&existing, Some(25), None, Some(&extra));
    assert_eq!(merged.get("processed"), Some(&json!(25)));
    assert_eq!(merged.get("total"), Some(&json!(100)));
    assert_eq!(merged.get("stage_output_id"), Some(&json!(7)));
    assert_eq!(merged.get("scored"), Some(&json!(25)));
}

/// Tests merging into a non-object starts a fresh object.
#[test]
fn test_progress_merge_replaces_non_object() {
    let merged = merge_progress(&Value::Null, Some(1), Some(2), None);
    assert_eq!(merged, json!({"processed": 1, "total": 2}));
}
