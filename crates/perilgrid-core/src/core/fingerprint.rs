// perilgrid-core/src/core/fingerprint.rs
// ============================================================================
// Module: Perilgrid Request Fingerprints
// Description: Deterministic identity hashes for idempotent result reuse.
// Purpose: Key scoring results and enrichment runs by their inputs.
// Dependencies: crate::core::{hashing, identifiers, resilience}, serde
// ============================================================================

//! ## Overview
//! A request fingerprint is the SHA-256 of the canonical JSON of a request's
//! identity-bearing inputs. Equal fingerprints must not produce two terminal
//! SUCCEEDED results within the reuse window, so hazard version ids are
//! sorted and the policy pack version falls back to the literal `default`
//! before hashing. Fingerprints are therefore invariant under hazard-id
//! order and config key order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ExposureVersionId;
use crate::core::identifiers::HazardDatasetVersionId;
use crate::core::identifiers::PolicyPackVersionId;
use crate::core::identifiers::TenantId;
use crate::core::resilience::ScoringConfig;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Fingerprint Payload
// ============================================================================

/// Canonical payload hashed into a batch-scoring request fingerprint.
#[derive(Debug, Clone, Serialize)]
struct ScoreRequestPayload<'a> {
    /// Tenant identifier.
    tenant_id: &'a TenantId,
    /// Scored exposure version.
    exposure_version_id: ExposureVersionId,
    /// Hazard dataset versions, sorted ascending.
    hazard_dataset_version_ids: Vec<HazardDatasetVersionId>,
    /// Effective scoring configuration.
    config: &'a ScoringConfig,
    /// Scoring algorithm version.
    scoring_version: &'a str,
    /// Engine code version.
    code_version: Option<&'a str>,
    /// Policy pack version id, or the literal `default`.
    policy_pack_version_id: String,
    /// Force marker perturbing the fingerprint, when a rerun was forced.
    #[serde(skip_serializing_if = "Option::is_none")]
    forced_at: Option<Timestamp>,
}

/// Inputs identifying one batch-scoring request.
#[derive(Debug, Clone)]
pub struct ScoreRequestIdentity<'a> {
    /// Tenant identifier.
    pub tenant_id: &'a TenantId,
    /// Scored exposure version.
    pub exposure_version_id: ExposureVersionId,
    /// Hazard dataset versions in caller order.
    pub hazard_dataset_version_ids: &'a [HazardDatasetVersionId],
    /// Effective scoring configuration.
    pub config: &'a ScoringConfig,
    /// Scoring algorithm version.
    pub scoring_version: &'a str,
    /// Engine code version.
    pub code_version: Option<&'a str>,
    /// Resolved policy pack version, when any.
    pub policy_pack_version_id: Option<PolicyPackVersionId>,
    /// Force marker; present only when the caller forced a rerun.
    pub forced_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Fingerprint Computation
// ============================================================================

/// Computes the batch-scoring request fingerprint as lowercase hex.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn score_request_fingerprint(
    identity: &ScoreRequestIdentity<'_>,
) -> Result<String, HashError> {
    let mut version_ids = identity.hazard_dataset_version_ids.to_vec();
    version_ids.sort_unstable();
    let payload = ScoreRequestPayload {
        tenant_id: identity.tenant_id,
        exposure_version_id: identity.exposure_version_id,
        hazard_dataset_version_ids: version_ids,
        config: identity.config,
        scoring_version: identity.scoring_version,
        code_version: identity.code_version,
        policy_pack_version_id: identity
            .policy_pack_version_id
            .map_or_else(|| "default".to_string(), |id| id.value().to_string()),
        forced_at: identity.forced_at,
    };
    Ok(hash_canonical_json(DEFAULT_HASH_ALGORITHM, &payload)?.value)
}
