// perilgrid-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Conflict translation, queue semantics, and tenancy.
// ============================================================================
//! ## Overview
//! Conformance tests for the SQLite store: unique constraints surface as
//! typed conflicts, the queue delivers FIFO with stale-claim release, the
//! spatial prefilter confirms exact containment, and tenant predicates
//! isolate every read.

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

use perilgrid_core::DEFAULT_HASH_ALGORITHM;
use perilgrid_core::ExposureStore;
use perilgrid_core::ExposureUpload;
use perilgrid_core::ExposureVersion;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::GeoPoint;
use perilgrid_core::HazardDataset;
use perilgrid_core::HazardDatasetId;
use perilgrid_core::HazardFeature;
use perilgrid_core::HazardFeatureId;
use perilgrid_core::HazardStore;
use perilgrid_core::IdempotencyKey;
use perilgrid_core::MultiPolygon;
use perilgrid_core::Polygon;
use perilgrid_core::QueuedTask;
use perilgrid_core::ResilienceScoreResult;
use perilgrid_core::ResilienceStore;
use perilgrid_core::RunId;
use perilgrid_core::RunType;
use perilgrid_core::ScoreResultId;
use perilgrid_core::ScoringConfig;
use perilgrid_core::StoreError;
use perilgrid_core::TaskId;
use perilgrid_core::TaskQueue;
use perilgrid_core::Tenant;
use perilgrid_core::TenantId;
use perilgrid_core::Timestamp;
use perilgrid_core::UploadId;
use perilgrid_core::hashing::hash_bytes;
use perilgrid_store_sqlite::SqliteStore;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn tenant(store: &SqliteStore, id: &str) -> TenantId {
    let tenant_id = TenantId::new(id);
    store
        .insert_tenant(&Tenant {
            id: tenant_id.clone(),
            name: format!("Tenant {id}"),
            default_currency: "USD".to_string(),
            default_policy_pack_version_id: None,
            created_at: Timestamp::from_unix_millis(0),
        })
        .unwrap();
    tenant_id
}

fn upload(tenant_id: &TenantId, id: &str, idempotency_key: Option<&str>) -> ExposureUpload {
    ExposureUpload {
        id: UploadId::new(id),
        tenant_id: tenant_id.clone(),
        filename: "exposure.csv".to_string(),
        content_type: "text/csv".to_string(),
        object_uri: format!("blob://perilgrid/uploads/{tenant_id}/{id}/exposure.csv"),
        checksum: hash_bytes(DEFAULT_HASH_ALGORITHM, id.as_bytes()),
        idempotency_key: idempotency_key.map(IdempotencyKey::new),
        mapping_template_id: None,
        created_by: None,
        created_at: Timestamp::from_unix_millis(0),
    }
}

fn version(tenant_id: &TenantId, upload_id: &str, key: Option<&str>) -> ExposureVersion {
    ExposureVersion {
        id: ExposureVersionId::new(0),
        tenant_id: tenant_id.clone(),
        upload_id: UploadId::new(upload_id),
        mapping_template_id: None,
        name: "Exposure".to_string(),
        idempotency_key: key.map(IdempotencyKey::new),
        created_at: Timestamp::from_unix_millis(0),
    }
}

fn square_feature(tenant_id: &TenantId, version_id: i64) -> HazardFeature {
    HazardFeature {
        id: HazardFeatureId::new(0),
        tenant_id: tenant_id.clone(),
        dataset_version_id: version_id.into(),
        geometry: MultiPolygon {
            polygons: vec![Polygon {
                exterior: vec![
                    GeoPoint::new(-76.0, 39.0),
                    GeoPoint::new(-74.0, 39.0),
                    GeoPoint::new(-74.0, 41.0),
                    GeoPoint::new(-76.0, 41.0),
                ],
                holes: Vec::new(),
            }],
        },
        properties: json!({"hazard_category": "flood", "score": 0.6}),
    }
}

// ============================================================================
// SECTION: Durability & Conflicts
// ============================================================================

/// Tests the store survives reopen from the same file.
#[test]
fn test_reopen_preserves_rows() {
    let temp = TempDir::new().unwrap();
    let config = perilgrid_store_sqlite::SqliteStoreConfig {
        path: temp.path().join("perilgrid.sqlite"),
        busy_timeout_ms: 1_000,
    };
    let tenant_id = {
        let store = SqliteStore::new(&config).unwrap();
        let tenant_id = tenant(&store, "t1");
        store.insert_upload(&upload(&tenant_id, "up-1", None)).unwrap();
        tenant_id
    };
    let store = SqliteStore::new(&config).unwrap();
    let loaded = store.upload(&tenant_id, &UploadId::new("up-1")).unwrap();
    assert!(loaded.is_some());
}

/// Tests user email uniqueness within a tenant.
#[test]
fn test_user_email_uniqueness() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    let user = perilgrid_core::User {
        id: perilgrid_core::UserId::new("u1"),
        tenant_id: tenant_id.clone(),
        email: "ops@example.com".to_string(),
        role: perilgrid_core::UserRole::Ops,
        created_at: Timestamp::from_unix_millis(0),
    };
    store.insert_user(&user).unwrap();
    let duplicate = perilgrid_core::User {
        id: perilgrid_core::UserId::new("u2"),
        ..user.clone()
    };
    assert!(matches!(store.insert_user(&duplicate), Err(StoreError::Conflict(_))));
    let loaded = store
        .user(&tenant_id, &perilgrid_core::UserId::new("u1"))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.role, perilgrid_core::UserRole::Ops);
}

/// Tests duplicate idempotency keys surface as conflicts.
#[test]
fn test_upload_idempotency_conflict() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    store.insert_upload(&upload(&tenant_id, "up-1", Some("idem-1"))).unwrap();
    let duplicate = store.insert_upload(&upload(&tenant_id, "up-2", Some("idem-1")));
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    let found = store
        .upload_by_idempotency_key(&tenant_id, &IdempotencyKey::new("idem-1"))
        .unwrap()
        .unwrap();
    assert_eq!(found.id, UploadId::new("up-1"));
}

/// Tests exposure version uniqueness per upload and mapping.
#[test]
fn test_exposure_version_uniqueness() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    store.insert_upload(&upload(&tenant_id, "up-1", None)).unwrap();
    store.insert_exposure_version(&version(&tenant_id, "up-1", None)).unwrap();
    let duplicate = store.insert_exposure_version(&version(&tenant_id, "up-1", None));
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
}

/// Tests the request-fingerprint uniqueness on score results.
#[test]
fn test_score_result_fingerprint_conflict() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    let result = ResilienceScoreResult {
        id: ScoreResultId::new(0),
        tenant_id: tenant_id.clone(),
        exposure_version_id: ExposureVersionId::new(1),
        run_id: None,
        request_fingerprint: "aa".repeat(32),
        scoring_version: "2".to_string(),
        hazard_dataset_version_ids: Vec::new(),
        config: ScoringConfig::default(),
        policy_pack_version_id: None,
        policy_used: json!({}),
        created_at: Timestamp::from_unix_millis(0),
    };
    store.insert_score_result(&result).unwrap();
    assert!(matches!(
        store.insert_score_result(&result),
        Err(StoreError::Conflict(_))
    ));
    let found = store
        .score_result_by_fingerprint(&tenant_id, &"aa".repeat(32))
        .unwrap();
    assert!(found.is_some());
}

// ============================================================================
// SECTION: Task Queue
// ============================================================================

/// Tests FIFO claim, completion, and stale-claim release.
#[test]
fn test_queue_claim_and_release() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    for run_id in 1..=2 {
        store
            .enqueue(&QueuedTask {
                id: TaskId::new(0),
                tenant_id: tenant_id.clone(),
                run_id: RunId::new(run_id),
                run_type: RunType::Validation,
                request_id: None,
                enqueued_at: Timestamp::from_unix_millis(run_id),
            })
            .unwrap();
    }

    let now = Timestamp::from_unix_millis(10);
    let first = store.claim_next("w1", now).unwrap().unwrap();
    assert_eq!(first.run_id, RunId::new(1));
    let second = store.claim_next("w2", now).unwrap().unwrap();
    assert_eq!(second.run_id, RunId::new(2));
    assert!(store.claim_next("w3", now).unwrap().is_none());

    // Completing removes; releasing stale claims requeues the other.
    store.complete(first.id).unwrap();
    let released = store.release_stale(Timestamp::from_unix_millis(100)).unwrap();
    assert_eq!(released, 1);
    let reclaimed = store.claim_next("w3", Timestamp::from_unix_millis(200)).unwrap().unwrap();
    assert_eq!(reclaimed.run_id, RunId::new(2));
}

// ============================================================================
// SECTION: Spatial Prefilter
// ============================================================================

/// Tests bounding-box candidates are confirmed with exact containment.
#[test]
fn test_features_containing() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_id = tenant(&store, "t1");
    let dataset_id = store
        .insert_hazard_dataset(&HazardDataset {
            id: HazardDatasetId::new(0),
            tenant_id: tenant_id.clone(),
            name: "fema-sfha".to_string(),
            peril: Some("flood".to_string()),
            description: None,
            created_at: Timestamp::from_unix_millis(0),
        })
        .unwrap();
    let version_id = store
        .insert_hazard_dataset_version(&perilgrid_core::HazardDatasetVersion {
            id: perilgrid_core::HazardDatasetVersionId::new(0),
            tenant_id: tenant_id.clone(),
            dataset_id,
            version_label: "2025".to_string(),
            object_uri: "blob://perilgrid/hazards/t1/1/2025.json".to_string(),
            checksum: hash_bytes(DEFAULT_HASH_ALGORITHM, b"payload"),
            effective_date: None,
            created_at: Timestamp::from_unix_millis(0),
        })
        .unwrap();
    store
        .insert_hazard_features(&[square_feature(&tenant_id, version_id.value())])
        .unwrap();

    let inside = store
        .features_containing(&tenant_id, &[version_id], GeoPoint::new(-75.0, 40.0))
        .unwrap();
    assert_eq!(inside.len(), 1);
    let outside = store
        .features_containing(&tenant_id, &[version_id], GeoPoint::new(-60.0, 40.0))
        .unwrap();
    assert!(outside.is_empty());
}

// ============================================================================
// SECTION: Tenant Isolation
// ============================================================================

/// Tests every read carries the tenant predicate.
#[test]
fn test_tenant_isolation() {
    let store = SqliteStore::in_memory().unwrap();
    let tenant_a = tenant(&store, "alpha");
    let tenant_b = tenant(&store, "beta");
    store.insert_upload(&upload(&tenant_a, "up-1", None)).unwrap();

    assert!(store.upload(&tenant_b, &UploadId::new("up-1")).unwrap().is_none());
    assert!(store.upload(&tenant_a, &UploadId::new("up-1")).unwrap().is_some());

    let version_id =
        store.insert_exposure_version(&version(&tenant_a, "up-1", None)).unwrap();
    assert!(store.exposure_version(&tenant_b, version_id).unwrap().is_none());
    assert!(store.locations_for_version(&tenant_b, version_id).unwrap().is_empty());
}
