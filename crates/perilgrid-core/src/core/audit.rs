// perilgrid-core/src/core/audit.rs
// ============================================================================
// Module: Perilgrid Audit Events
// Description: Append-only audit records for control-plane mutations.
// Purpose: Provide a structured audit trail without a logging dependency.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are append-only, tenant-scoped action records emitted by the
//! control plane and by enrichment completion. They serialize as plain JSON
//! so deployments can route them from the store to their preferred logging
//! pipeline without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AuditEventId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub id: AuditEventId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Acting user, when known.
    pub user_id: Option<UserId>,
    /// Action label (for example `upload_created`, `run_cancelled`).
    pub action: String,
    /// Free-form event metadata.
    pub metadata: Value,
    /// Correlation request identifier, when present.
    pub request_id: Option<RequestId>,
    /// Creation time.
    pub created_at: Timestamp,
}
