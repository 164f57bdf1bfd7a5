// perilgrid-core/tests/fingerprint.rs
// ============================================================================
// Module: Request Fingerprint Tests
// Description: Idempotency-bearing fingerprint invariance checks.
// ============================================================================
//! ## Overview
//! Equal requests must fingerprint identically regardless of hazard-id
//! order; force markers and differing policy versions must not collide.

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

use perilgrid_core::ExposureVersionId;
use perilgrid_core::HazardDatasetVersionId;
use perilgrid_core::PolicyPackVersionId;
use perilgrid_core::ScoreRequestIdentity;
use perilgrid_core::ScoringConfig;
use perilgrid_core::TenantId;
use perilgrid_core::Timestamp;
use perilgrid_core::score_request_fingerprint;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn identity<'a>(
    tenant: &'a TenantId,
    config: &'a ScoringConfig,
    hazard_ids: &'a [HazardDatasetVersionId],
) -> ScoreRequestIdentity<'a> {
    ScoreRequestIdentity {
        tenant_id: tenant,
        exposure_version_id: ExposureVersionId::new(7),
        hazard_dataset_version_ids: hazard_ids,
        config,
        scoring_version: "2",
        code_version: Some("test"),
        policy_pack_version_id: None,
        forced_at: None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests hazard version id order does not change the fingerprint.
#[test]
fn test_fingerprint_invariant_under_hazard_order() {
    let tenant = TenantId::new("t1");
    let config = ScoringConfig::default();
    let forward = [HazardDatasetVersionId::new(1), HazardDatasetVersionId::new(2)];
    let reverse = [HazardDatasetVersionId::new(2), HazardDatasetVersionId::new(1)];

    let first = score_request_fingerprint(&identity(&tenant, &config, &forward)).unwrap();
    let second = score_request_fingerprint(&identity(&tenant, &config, &reverse)).unwrap();
    assert_eq!(first, second);
}

/// Tests tenants never share fingerprints.
#[test]
fn test_fingerprint_differs_per_tenant() {
    let config = ScoringConfig::default();
    let hazard_ids = [HazardDatasetVersionId::new(1)];
    let first = score_request_fingerprint(&identity(
        &TenantId::new("t1"),
        &config,
        &hazard_ids,
    ))
    .unwrap();
    let second = score_request_fingerprint(&identity(
        &TenantId::new("t2"),
        &config,
        &hazard_ids,
    ))
    .unwrap();
    assert_ne!(first, second);
}

/// Tests a force marker perturbs the fingerprint.
#[test]
fn test_forced_rerun_changes_fingerprint() {
    let tenant = TenantId::new("t1");
    let config = ScoringConfig::default();
    let hazard_ids = [HazardDatasetVersionId::new(1)];
    let plain = score_request_fingerprint(&identity(&tenant, &config, &hazard_ids)).unwrap();
    let mut forced = identity(&tenant, &config, &hazard_ids);
    forced.forced_at = Some(Timestamp::from_unix_millis(1_700_000_000_000));
    let forced = score_request_fingerprint(&forced).unwrap();
    assert_ne!(plain, forced);
}

/// Tests an explicit policy version differs from the default fallback.
#[test]
fn test_policy_version_distinguishes_fingerprint() {
    let tenant = TenantId::new("t1");
    let config = ScoringConfig::default();
    let hazard_ids = [HazardDatasetVersionId::new(1)];
    let default_policy =
        score_request_fingerprint(&identity(&tenant, &config, &hazard_ids)).unwrap();
    let mut pinned = identity(&tenant, &config, &hazard_ids);
    pinned.policy_pack_version_id = Some(PolicyPackVersionId::new(3));
    let pinned = score_request_fingerprint(&pinned).unwrap();
    assert_ne!(default_policy, pinned);
}
