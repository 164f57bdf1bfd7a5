// perilgrid-core/src/core/policy.rs
// ============================================================================
// Module: Perilgrid Policy Packs
// Description: Immutable policy pack bundles and override merging.
// Purpose: Provide versioned scoring and underwriting policy resolution.
// Dependencies: crate::core::{identifiers, resilience, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Policy packs bundle a scoring configuration and an underwriting policy
//! into immutable versions. Resolution deep-merges version overrides onto
//! the built-in defaults; the resolved metadata is snapshotted onto score
//! results so reruns are reproducible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::PolicyPackId;
use crate::core::identifiers::PolicyPackVersionId;
use crate::core::identifiers::TenantId;
use crate::core::resilience::ScoringConfig;
use crate::core::time::Timestamp;
use crate::core::underwriting::UnderwritingPolicy;

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Policy pack registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPack {
    /// Pack identifier.
    pub id: PolicyPackId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Pack name, unique within the tenant.
    pub name: String,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Immutable versioned bundle of scoring and underwriting policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPackVersion {
    /// Version identifier.
    pub id: PolicyPackVersionId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Owning pack.
    pub policy_pack_id: PolicyPackId,
    /// Version label, unique within the pack.
    pub version_label: String,
    /// Scoring configuration overrides.
    pub scoring_config: Value,
    /// Underwriting policy overrides.
    pub underwriting_policy: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Metadata describing which policy was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMeta {
    /// Resolved pack, when a pack version was applied.
    pub policy_pack_id: Option<PolicyPackId>,
    /// Resolved pack version, when applied.
    pub policy_pack_version_id: Option<PolicyPackVersionId>,
    /// Version label; `default` for built-in policy.
    pub version_label: String,
    /// Pack name; `default` for built-in policy.
    pub policy_pack_name: String,
}

impl Default for PolicyMeta {
    fn default() -> Self {
        Self {
            policy_pack_id: None,
            policy_pack_version_id: None,
            version_label: "default".to_string(),
            policy_pack_name: "default".to_string(),
        }
    }
}

/// Fully resolved policy for one scoring or underwriting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPolicy {
    /// Effective scoring configuration.
    pub scoring_config: ScoringConfig,
    /// Effective underwriting decision policy.
    pub underwriting_policy: UnderwritingPolicy,
    /// Resolution metadata.
    pub meta: PolicyMeta,
}

/// Deep-merges `overrides` onto `base`; objects merge per key, everything
/// else replaces.
#[must_use]
pub fn merge_policy_overrides(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                let entry = match merged.get(key) {
                    Some(existing) => merge_policy_overrides(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, replacement) => replacement.clone(),
    }
}

/// Applies scoring-config overrides onto the built-in defaults.
///
/// Invalid override shapes fall back to the defaults rather than failing the
/// request; scoring must stay total.
#[must_use]
pub fn scoring_config_with_overrides(overrides: Option<&Value>) -> ScoringConfig {
    let Some(overrides) = overrides else {
        return ScoringConfig::default();
    };
    let base = match serde_json::to_value(ScoringConfig::default()) {
        Ok(value) => value,
        Err(_) => return ScoringConfig::default(),
    };
    let merged = merge_policy_overrides(&base, overrides);
    serde_json::from_value(merged).unwrap_or_default()
}

/// Applies underwriting-policy overrides onto the built-in defaults.
///
/// Invalid override shapes fall back to the defaults; the decision engine
/// must stay total.
#[must_use]
pub fn underwriting_policy_with_overrides(overrides: Option<&Value>) -> UnderwritingPolicy {
    let Some(overrides) = overrides else {
        return UnderwritingPolicy::default();
    };
    let base = match serde_json::to_value(UnderwritingPolicy::default()) {
        Ok(value) => value,
        Err(_) => return UnderwritingPolicy::default(),
    };
    let merged = merge_policy_overrides(&base, overrides);
    serde_json::from_value(merged).unwrap_or_default()
}
