// perilgrid-worker/tests/pipeline.rs
// ============================================================================
// Module: Pipeline End-To-End Tests
// Description: Control plane + worker pool over real store seams.
// ============================================================================
//! ## Overview
//! Drives the full pipeline through the control plane and a single-threaded
//! worker drain: upload → validate → commit → overlay → rollup → breach
//! lifecycle → drift → batch scoring with fingerprint dedup → cancellation
//! and retry → property profile resolution → lineage.

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

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use perilgrid_broker::MemoryObjectStore;
use perilgrid_config::WorkerConfig;
use perilgrid_core::AddressInput;
use perilgrid_core::BatchScoreStatus;
use perilgrid_core::BreachStore;
use perilgrid_core::CallerIdentity;
use perilgrid_core::Clock;
use perilgrid_core::ComparisonOp;
use perilgrid_core::ControlPlane;
use perilgrid_core::DriftClassification;
use perilgrid_core::DriftStore;
use perilgrid_core::ExposureStore;
use perilgrid_core::GeoPoint;
use perilgrid_core::HazardFeatureCollection;
use perilgrid_core::HazardFeaturePayload;
use perilgrid_core::HazardStore;
use perilgrid_core::LifecycleStatus;
use perilgrid_core::LineageEntityType;
use perilgrid_core::LineageRelation;
use perilgrid_core::MeasureOp;
use perilgrid_core::MeasureSpec;
use perilgrid_core::MultiPolygon;
use perilgrid_core::ObjectStore;
use perilgrid_core::Polygon;
use perilgrid_core::ProfileResolutionStatus;
use perilgrid_core::ProviderSet;
use perilgrid_core::ResilienceStore;
use perilgrid_core::RollupItem;
use perilgrid_core::RollupItemId;
use perilgrid_core::RollupResult;
use perilgrid_core::RollupResultId;
use perilgrid_core::RollupStore;
use perilgrid_core::RunStatus;
use perilgrid_core::ScoreResilienceResponse;
use perilgrid_core::Store;
use perilgrid_core::Tenant;
use perilgrid_core::TenantId;
use perilgrid_core::ThresholdRuleSpec;
use perilgrid_core::Timestamp;
use perilgrid_core::UnderwritingDisposition;
use perilgrid_core::UserId;
use perilgrid_core::UserRole;
use perilgrid_core::hashing::hash_bytes;
use perilgrid_core::runtime::RuntimeOptions;
use perilgrid_core::runtime::control::AttachMappingRequest;
use perilgrid_core::runtime::control::CommitOutcome;
use perilgrid_core::runtime::control::CommitUploadRequest;
use perilgrid_core::runtime::control::CreateHazardDatasetRequest;
use perilgrid_core::runtime::control::CreateRollupConfigRequest;
use perilgrid_core::runtime::control::CreateThresholdRuleRequest;
use perilgrid_core::runtime::control::CreateUploadRequest;
use perilgrid_core::runtime::control::ResolvePropertyProfileRequest;
use perilgrid_core::runtime::control::RunBreachEvalRequest;
use perilgrid_core::runtime::control::ScoreResilienceBatchRequest;
use perilgrid_core::runtime::control::ScoreResilienceRequest;
use perilgrid_core::runtime::control::TriggerDriftRequest;
use perilgrid_core::runtime::control::TriggerOverlayRequest;
use perilgrid_core::runtime::control::TriggerRollupRequest;
use perilgrid_core::runtime::control::UploadHazardVersionRequest;
use perilgrid_providers::StubCharacteristicsProvider;
use perilgrid_providers::StubGeocoder;
use perilgrid_providers::StubParcelProvider;
use perilgrid_store_sqlite::SqliteStore;
use perilgrid_worker::WorkerContext;
use perilgrid_worker::WorkerPool;
use perilgrid_worker::default_handlers;
use serde_json::json;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Advanceable test clock.
struct TestClock {
    /// Current time in unix milliseconds.
    now_millis: AtomicI64,
}

impl TestClock {
    fn new(start: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(start),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.now_millis.load(Ordering::SeqCst))
    }
}

/// Test harness bundling every seam.
struct Harness {
    store: Arc<SqliteStore>,
    objects: Arc<MemoryObjectStore>,
    providers: ProviderSet,
    clock: Arc<TestClock>,
    options: RuntimeOptions,
    identity: CallerIdentity,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        store
            .insert_tenant(&Tenant {
                id: TenantId::new("t1"),
                name: "Tenant One".to_string(),
                default_currency: "USD".to_string(),
                default_policy_pack_version_id: None,
                created_at: clock.now(),
            })
            .unwrap();
        Self {
            store,
            objects: Arc::new(MemoryObjectStore::new("perilgrid")),
            providers: ProviderSet {
                geocoder: Arc::new(StubGeocoder),
                parcel: Arc::new(StubParcelProvider),
                characteristics: Arc::new(StubCharacteristicsProvider),
            },
            clock,
            options: RuntimeOptions {
                code_version: "test".to_string(),
                ..RuntimeOptions::default()
            },
            identity: CallerIdentity {
                tenant_id: TenantId::new("t1"),
                user_id: UserId::new("u1"),
                role: UserRole::Admin,
            },
        }
    }

    fn control(&self) -> ControlPlane<'_> {
        ControlPlane::new(
            self.store.as_ref(),
            self.objects.as_ref(),
            &self.providers,
            self.clock.as_ref(),
            self.options.clone(),
        )
    }

    fn pool(&self) -> WorkerPool {
        let context = WorkerContext {
            store: Arc::clone(&self.store) as Arc<dyn Store>,
            objects: Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
            providers: self.providers.clone(),
            clock: Arc::clone(&self.clock) as Arc<dyn Clock>,
            options: self.options.clone(),
            scorer_batch_size: 1_000,
            overlay_batch_size: 200,
        };
        WorkerPool::new(default_handlers(), context, WorkerConfig::default())
    }

    /// Drains the queue on the calling thread.
    fn drain(&self) {
        let pool = self.pool();
        while pool.run_one("test-worker").unwrap() {}
    }

    fn tenant_id(&self) -> TenantId {
        self.identity.tenant_id.clone()
    }
}

const EXPOSURE_CSV: &str = "\
external_location_id,latitude,longitude,currency,lob,tiv
L1,40.0,-75.0,USD,property,100
L2,40.0,-75.0,USD,property,200
L3,40.0,-75.0,USD,property,50
";

/// Uploads and commits the canonical three-location portfolio.
fn committed_version(harness: &Harness) -> perilgrid_core::ExposureVersionId {
    let control = harness.control();
    let created = control
        .create_upload(
            &harness.identity,
            &CreateUploadRequest {
                file_bytes: EXPOSURE_CSV.as_bytes().to_vec(),
                content_type: "text/csv".to_string(),
                filename: "exposure.csv".to_string(),
                idempotency_key: None,
            },
            None,
        )
        .unwrap();
    let outcome = control
        .commit_upload(&harness.identity, &created.upload_id, &CommitUploadRequest::default(), None)
        .unwrap();
    let CommitOutcome::Queued { run } = outcome else {
        panic!("expected a queued commit run");
    };
    harness.drain();
    let run = control.run_status(&harness.identity, run.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    let version_id = run
        .output_refs
        .get("exposure_version_id")
        .and_then(serde_json::Value::as_i64)
        .unwrap();
    perilgrid_core::ExposureVersionId::new(version_id)
}

/// Square around the shared test coordinate.
fn square(half: f64) -> MultiPolygon {
    MultiPolygon {
        polygons: vec![Polygon {
            exterior: vec![
                GeoPoint::new(-75.0 - half, 40.0 - half),
                GeoPoint::new(-75.0 + half, 40.0 - half),
                GeoPoint::new(-75.0 + half, 40.0 + half),
                GeoPoint::new(-75.0 - half, 40.0 + half),
            ],
            holes: Vec::new(),
        }],
    }
}

/// Registers a hazard dataset version with the given feature properties.
fn hazard_version(
    harness: &Harness,
    name: &str,
    peril: Option<&str>,
    features: &[serde_json::Value],
) -> perilgrid_core::HazardDatasetVersionId {
    let control = harness.control();
    let dataset_id = control
        .create_hazard_dataset(
            &harness.identity,
            &CreateHazardDatasetRequest {
                name: name.to_string(),
                peril: peril.map(ToString::to_string),
                description: None,
            },
            None,
        )
        .unwrap();
    let collection = HazardFeatureCollection {
        features: features
            .iter()
            .map(|properties| HazardFeaturePayload {
                geometry: square(1.0),
                properties: properties.clone(),
            })
            .collect(),
    };
    let uploaded = control
        .upload_hazard_version(
            &harness.identity,
            dataset_id,
            &UploadHazardVersionRequest {
                version_label: Some("2025".to_string()),
                file_bytes: serde_json::to_vec(&collection).unwrap(),
                effective_date: None,
            },
            None,
        )
        .unwrap();
    uploaded.id
}

// ============================================================================
// SECTION: Validation & Commit
// ============================================================================

/// Tests the happy-path upload, validation, and commit scenario.
#[test]
fn test_validate_and_commit_happy_path() {
    let harness = Harness::new();
    let control = harness.control();
    let created = control
        .create_upload(
            &harness.identity,
            &CreateUploadRequest {
                file_bytes: EXPOSURE_CSV.as_bytes().to_vec(),
                content_type: "text/csv".to_string(),
                filename: "exposure.csv".to_string(),
                idempotency_key: Some("idem-1".into()),
            },
            None,
        )
        .unwrap();

    // Identity mapping keeps the canonical column names.
    control
        .attach_mapping(
            &harness.identity,
            &created.upload_id,
            &AttachMappingRequest {
                name: "identity".to_string(),
                mapping: [
                    "external_location_id",
                    "latitude",
                    "longitude",
                    "currency",
                    "lob",
                    "tiv",
                ]
                .iter()
                .map(|column| ((*column).to_string(), (*column).to_string()))
                .collect(),
            },
            None,
        )
        .unwrap();

    let handle = control.validate_upload(&harness.identity, &created.upload_id, None).unwrap();
    assert_eq!(handle.status, RunStatus::Queued);
    harness.drain();
    let run = control.run_status(&harness.identity, handle.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    let summary = run.output_refs.get("summary").unwrap();
    assert_eq!(summary.get("ERROR"), Some(&json!(0)));
    assert_eq!(summary.get("WARN"), Some(&json!(0)));
    assert_eq!(summary.get("total_rows"), Some(&json!(3)));

    // The issue artifact is retrievable and matches its recorded checksum.
    let artifact_checksum = run
        .artifact_checksums
        .get("row_errors")
        .and_then(serde_json::Value::as_str)
        .unwrap()
        .to_string();
    let key = format!("validations/t1/{}/row_errors.json", created.upload_id);
    let bytes = harness.objects.get(&key).unwrap();
    assert_eq!(
        hash_bytes(perilgrid_core::DEFAULT_HASH_ALGORITHM, &bytes).value,
        artifact_checksum
    );

    let outcome = control
        .commit_upload(&harness.identity, &created.upload_id, &CommitUploadRequest::default(), None)
        .unwrap();
    let CommitOutcome::Queued { run } = outcome else {
        panic!("expected a queued commit run");
    };
    harness.drain();
    let run = control.run_status(&harness.identity, run.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    let version_id = perilgrid_core::ExposureVersionId::new(
        run.output_refs
            .get("exposure_version_id")
            .and_then(serde_json::Value::as_i64)
            .unwrap(),
    );
    let locations = harness
        .store
        .locations_for_version(&harness.tenant_id(), version_id)
        .unwrap();
    assert_eq!(locations.len(), 3);
    let tiv_sum: f64 = locations.iter().filter_map(|location| location.tiv).sum();
    assert!((tiv_sum - 350.0).abs() < f64::EPSILON);

    // Re-commit converges on the existing version.
    let again = control
        .commit_upload(&harness.identity, &created.upload_id, &CommitUploadRequest::default(), None)
        .unwrap();
    assert_eq!(
        again,
        CommitOutcome::Existing {
            exposure_version_id: version_id
        }
    );
}

/// Tests createUpload idempotency on the caller key.
#[test]
fn test_upload_idempotency() {
    let harness = Harness::new();
    let control = harness.control();
    let request = CreateUploadRequest {
        file_bytes: EXPOSURE_CSV.as_bytes().to_vec(),
        content_type: "text/csv".to_string(),
        filename: "exposure.csv".to_string(),
        idempotency_key: Some("idem-7".into()),
    };
    let first = control.create_upload(&harness.identity, &request, None).unwrap();
    let second = control.create_upload(&harness.identity, &request, None).unwrap();
    assert_eq!(first.upload_id, second.upload_id);
}

/// Tests read-only roles cannot mutate the control plane.
#[test]
fn test_role_gating() {
    let harness = Harness::new();
    let control = harness.control();
    let reader = CallerIdentity {
        tenant_id: TenantId::new("t1"),
        user_id: UserId::new("u2"),
        role: UserRole::ReadOnly,
    };
    let denied = control.create_upload(
        &reader,
        &CreateUploadRequest {
            file_bytes: Vec::new(),
            content_type: "text/csv".to_string(),
            filename: "x.csv".to_string(),
            idempotency_key: None,
        },
        None,
    );
    assert!(denied.is_err());
}

// ============================================================================
// SECTION: Overlay
// ============================================================================

/// Tests the worst-in-peril overlay end to end.
#[test]
fn test_overlay_worst_in_peril() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let hazard_version = hazard_version(
        &harness,
        "demo-hazards",
        None,
        &[
            json!({"hazard_category": "flood", "score": 0.3}),
            json!({"hazard_category": "flood", "score": 0.6}),
            json!({"hazard_category": "wildfire", "score": 0.4}),
        ],
    );
    let control = harness.control();
    let triggered = control
        .trigger_overlay(
            &harness.identity,
            &TriggerOverlayRequest {
                exposure_version_id: version_id,
                hazard_dataset_version_ids: vec![hazard_version],
                params: json!({}),
            },
            None,
        )
        .unwrap();
    assert_eq!(triggered.len(), 1);
    harness.drain();

    let run = control.run_status(&harness.identity, triggered[0].run.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    let attributes = harness
        .store
        .attributes_for_overlay(&harness.tenant_id(), triggered[0].overlay_result_id)
        .unwrap();
    assert_eq!(attributes.len(), 3);
    for attribute in &attributes {
        assert_eq!(attribute.attributes.hazard_category.as_deref(), Some("flood"));
        assert!((attribute.attributes.score.unwrap() - 0.6).abs() < f64::EPSILON);
        assert_eq!(attribute.attributes.method, "POSTGIS_SPATIAL_JOIN");
    }
}

// ============================================================================
// SECTION: Rollup & Breach Lifecycle
// ============================================================================

/// Inserts a synthetic rollup result with one US bucket at the given TIV.
fn synthetic_rollup(
    harness: &Harness,
    version_id: perilgrid_core::ExposureVersionId,
    tiv_sum: f64,
) -> RollupResultId {
    let key = json!({"country": "US", "hazard_band": "HIGH"});
    let key_hash = perilgrid_core::hashing::hash_canonical_json(
        perilgrid_core::DEFAULT_HASH_ALGORITHM,
        &key,
    )
    .unwrap()
    .value;
    let result_id = harness
        .store
        .insert_rollup_result(&RollupResult {
            id: RollupResultId::new(0),
            tenant_id: harness.tenant_id(),
            exposure_version_id: version_id,
            rollup_config_id: perilgrid_core::RollupConfigId::new(1),
            run_id: None,
            overlay_result_ids: Vec::new(),
            checksum: None,
            created_at: harness.clock.now(),
        })
        .unwrap();
    harness
        .store
        .insert_rollup_items(&[RollupItem {
            id: RollupItemId::new(0),
            tenant_id: harness.tenant_id(),
            rollup_result_id: result_id,
            key,
            key_hash,
            metrics: json!({"tiv_sum": tiv_sum}).as_object().cloned().unwrap(),
        }])
        .unwrap();
    result_id
}

/// Tests rollup execution and the open → resolve → reopen breach lifecycle.
#[test]
fn test_rollup_and_breach_lifecycle() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let control = harness.control();

    // Real rollup over the committed locations.
    let config_id = control
        .create_rollup_config(
            &harness.identity,
            &CreateRollupConfigRequest {
                name: "by-country".to_string(),
                dimensions: vec!["country".to_string()],
                filters: std::collections::BTreeMap::new(),
                measures: vec![
                    MeasureSpec {
                        name: "location_count".to_string(),
                        op: MeasureOp::Count,
                        field: None,
                    },
                    MeasureSpec {
                        name: "tiv_sum".to_string(),
                        op: MeasureOp::Sum,
                        field: Some("tiv".to_string()),
                    },
                ],
            },
        )
        .unwrap();
    let triggered = control
        .trigger_rollup(
            &harness.identity,
            &TriggerRollupRequest {
                exposure_version_id: version_id,
                rollup_config_id: config_id,
                hazard_overlay_result_ids: Vec::new(),
            },
            None,
        )
        .unwrap();
    harness.drain();
    let rollup = harness
        .store
        .rollup_result(&harness.tenant_id(), triggered.rollup_result_id)
        .unwrap()
        .unwrap();
    assert!(rollup.checksum.is_some());
    let items = harness
        .store
        .items_for_rollup_result(&harness.tenant_id(), rollup.id)
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].metrics.get("tiv_sum"), Some(&json!(350.0)));
    assert_eq!(items[0].metrics.get("location_count"), Some(&json!(3)));

    // Breach lifecycle over successive synthetic evaluations.
    let rule_id = control
        .create_threshold_rule(
            &harness.identity,
            &CreateThresholdRuleRequest {
                name: "us-high-tiv".to_string(),
                severity: "HIGH".to_string(),
                rule: ThresholdRuleSpec {
                    metric: "tiv_sum".to_string(),
                    operator: ComparisonOp::Gt,
                    value: json!(100),
                    r#where: [("country".to_string(), json!("US"))].into_iter().collect(),
                },
            },
        )
        .unwrap();

    let first_eval = synthetic_rollup(&harness, version_id, 120.0);
    control
        .run_breach_eval(
            &harness.identity,
            &RunBreachEvalRequest {
                rollup_result_id: first_eval,
                threshold_rule_ids: None,
            },
            None,
        )
        .unwrap();
    harness.drain();
    let breaches = harness
        .store
        .breaches_for_rule_version(&harness.tenant_id(), rule_id, version_id)
        .unwrap();
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].status, LifecycleStatus::Open);
    assert!((breaches[0].metric_value - 120.0).abs() < f64::EPSILON);

    // Metric drops below the bound: the breach resolves exactly once.
    let second_eval = synthetic_rollup(&harness, version_id, 50.0);
    control
        .run_breach_eval(
            &harness.identity,
            &RunBreachEvalRequest {
                rollup_result_id: second_eval,
                threshold_rule_ids: None,
            },
            None,
        )
        .unwrap();
    harness.drain();
    let breaches = harness
        .store
        .breaches_for_rule_version(&harness.tenant_id(), rule_id, version_id)
        .unwrap();
    assert_eq!(breaches[0].status, LifecycleStatus::Resolved);
    assert!(breaches[0].resolved_at.is_some());

    // Metric rises again: the same breach reopens.
    let third_eval = synthetic_rollup(&harness, version_id, 150.0);
    control
        .run_breach_eval(
            &harness.identity,
            &RunBreachEvalRequest {
                rollup_result_id: third_eval,
                threshold_rule_ids: None,
            },
            None,
        )
        .unwrap();
    harness.drain();
    let breaches = harness
        .store
        .breaches_for_rule_version(&harness.tenant_id(), rule_id, version_id)
        .unwrap();
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].status, LifecycleStatus::Open);
    assert!(breaches[0].resolved_at.is_none());
    assert!((breaches[0].metric_value - 150.0).abs() < f64::EPSILON);
}

// ============================================================================
// SECTION: Drift
// ============================================================================

/// Tests drift classification between two committed versions.
#[test]
fn test_drift_between_versions() {
    let harness = Harness::new();
    let version_a = committed_version(&harness);

    let control = harness.control();
    let changed_csv = "\
external_location_id,latitude,longitude,currency,lob,tiv
L2,40.0,-75.0,USD,property,250
L3,40.0,-75.0,USD,property,50
L4,40.0,-75.0,USD,property,75
";
    let created = control
        .create_upload(
            &harness.identity,
            &CreateUploadRequest {
                file_bytes: changed_csv.as_bytes().to_vec(),
                content_type: "text/csv".to_string(),
                filename: "exposure-v2.csv".to_string(),
                idempotency_key: None,
            },
            None,
        )
        .unwrap();
    let CommitOutcome::Queued { .. } = control
        .commit_upload(&harness.identity, &created.upload_id, &CommitUploadRequest::default(), None)
        .unwrap()
    else {
        panic!("expected a queued commit run");
    };
    harness.drain();
    let version_b = harness
        .store
        .exposure_version_by_upload(&harness.tenant_id(), &created.upload_id, None)
        .unwrap()
        .unwrap()
        .id;

    let triggered = control
        .trigger_drift(
            &harness.identity,
            &TriggerDriftRequest {
                exposure_version_a_id: version_a,
                exposure_version_b_id: version_b,
            },
            None,
        )
        .unwrap();
    harness.drain();
    let drift = harness
        .store
        .drift_run(&harness.tenant_id(), triggered.drift_run_id)
        .unwrap()
        .unwrap();
    let checksum = drift.checksum.clone().unwrap();
    let summary_run = harness
        .control()
        .run_status(&harness.identity, triggered.run.run_id)
        .unwrap();
    assert_eq!(summary_run.status, RunStatus::Succeeded);
    let summary = summary_run.output_refs.get("summary").unwrap();
    assert_eq!(summary.get("NEW"), Some(&json!(1)));
    assert_eq!(summary.get("REMOVED"), Some(&json!(1)));
    assert_eq!(summary.get("MODIFIED"), Some(&json!(1)));

    // The artifact is retrievable and byte-verified.
    let key = harness.objects.key_for_uri(&drift.storage_uri.unwrap()).unwrap();
    let bytes = harness.objects.get(&key).unwrap();
    assert_eq!(
        hash_bytes(perilgrid_core::DEFAULT_HASH_ALGORITHM, &bytes).value,
        checksum.value
    );
    let details: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(details.len(), 3);
    assert_eq!(
        details[0].get("classification"),
        Some(&json!(DriftClassification::New.as_str()))
    );
}

// ============================================================================
// SECTION: Batch Scoring & Dedup
// ============================================================================

/// Tests fingerprint dedup across queued and succeeded states.
#[test]
fn test_batch_scoring_fingerprint_dedup() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let hazard_version = hazard_version(
        &harness,
        "flood-zones",
        Some("flood"),
        &[json!({"score": 0.6, "band": "HIGH"})],
    );
    let control = harness.control();
    let request = ScoreResilienceBatchRequest {
        exposure_version_id: version_id,
        hazard_dataset_version_ids: vec![hazard_version],
        config: None,
        force: false,
        policy_pack_version_id: None,
    };

    let first = control.score_resilience_batch(&harness.identity, &request, None).unwrap();
    assert_eq!(first.status, BatchScoreStatus::Queued);
    // An equal request before completion reuses the in-flight run.
    let second = control.score_resilience_batch(&harness.identity, &request, None).unwrap();
    assert_eq!(second.status, BatchScoreStatus::ExistingInProgress);
    assert_eq!(
        second.resilience_score_result_id,
        first.resilience_score_result_id
    );

    harness.drain();
    let third = control.score_resilience_batch(&harness.identity, &request, None).unwrap();
    assert_eq!(third.status, BatchScoreStatus::ExistingSucceeded);
    assert_eq!(
        third.resilience_score_result_id,
        first.resilience_score_result_id
    );

    let items = harness
        .store
        .score_items_for_result(&harness.tenant_id(), first.resilience_score_result_id)
        .unwrap();
    assert_eq!(items.len(), 3);
    for item in &items {
        assert!((0..=100).contains(&item.resilience_score));
        assert!((0.0..=1.0).contains(&item.risk_score));
        assert!(item.hazards.contains_key("flood"));
        // Mid-range scores with three unknown perils refer for review.
        assert_eq!(item.decision.decision, UnderwritingDisposition::Refer);
        assert!(item.explainability.drivers.iter().any(|driver| driver.peril == "flood"));
        assert!(!item.explainability.narrative.is_empty());
    }

    // Hazard order in the request must not defeat the dedup.
    let reordered = ScoreResilienceBatchRequest {
        hazard_dataset_version_ids: vec![hazard_version],
        ..request
    };
    let fourth = control.score_resilience_batch(&harness.identity, &reordered, None).unwrap();
    assert_eq!(fourth.status, BatchScoreStatus::ExistingSucceeded);

    // A forced rerun perturbs the fingerprint and queues fresh work.
    let forced = ScoreResilienceBatchRequest {
        force: true,
        ..reordered
    };
    let fifth = control.score_resilience_batch(&harness.identity, &forced, None).unwrap();
    assert_eq!(fifth.status, BatchScoreStatus::Queued);
    assert_ne!(
        fifth.resilience_score_result_id,
        first.resilience_score_result_id
    );
}

/// Tests the CSV export and disclosure summary of a scored result.
#[test]
fn test_export_and_summary() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let control = harness.control();
    let outcome = control
        .score_resilience_batch(
            &harness.identity,
            &ScoreResilienceBatchRequest {
                exposure_version_id: version_id,
                hazard_dataset_version_ids: Vec::new(),
                config: None,
                force: false,
                policy_pack_version_id: None,
            },
            None,
        )
        .unwrap();
    harness.drain();

    let csv = control
        .export_resilience_csv(&harness.identity, outcome.resilience_score_result_id)
        .unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("location_id,external_location_id,latitude,longitude"));
    assert_eq!(lines.count(), 3);

    let summary = control
        .resilience_summary(&harness.identity, outcome.resilience_score_result_id)
        .unwrap();
    assert_eq!(summary.total_locations, 3);
    let bucket_total: u64 = summary.bucket_counts.values().sum();
    assert_eq!(bucket_total, summary.total_locations);
    let bucket_tiv: f64 = summary.bucket_tiv.values().sum();
    assert!(bucket_tiv <= summary.total_tiv + 1e-6);
}

// ============================================================================
// SECTION: Cancellation & Retry
// ============================================================================

/// Tests cancelling a queued run before the worker claims it.
#[test]
fn test_cancel_queued_run_and_retry() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let control = harness.control();
    let outcome = control
        .score_resilience_batch(
            &harness.identity,
            &ScoreResilienceBatchRequest {
                exposure_version_id: version_id,
                hazard_dataset_version_ids: Vec::new(),
                config: None,
                force: false,
                policy_pack_version_id: None,
            },
            None,
        )
        .unwrap();
    let run_id = outcome.run_id.unwrap();

    let cancelled = control.cancel_run(&harness.identity, run_id, None).unwrap();
    assert_eq!(cancelled.status, RunStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    // The worker observes the cancelled run and writes nothing.
    harness.drain();
    let run = control.run_status(&harness.identity, run_id).unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    let items = harness
        .store
        .score_items_for_result(&harness.tenant_id(), outcome.resilience_score_result_id)
        .unwrap();
    assert!(items.is_empty());

    // Retry creates a new run with the same references and succeeds.
    let retried = control.retry_run(&harness.identity, run_id, None).unwrap();
    assert_ne!(retried.id, run_id);
    assert_eq!(retried.status, RunStatus::Queued);
    assert_eq!(retried.input_refs, run.input_refs);
    harness.drain();
    let finished = control.run_status(&harness.identity, retried.id).unwrap();
    assert_eq!(finished.status, RunStatus::Succeeded);
    let items = harness
        .store
        .score_items_for_result(&harness.tenant_id(), outcome.resilience_score_result_id)
        .unwrap();
    assert_eq!(items.len(), 3);
}

/// Tests terminal runs cannot be cancelled.
#[test]
fn test_cancel_terminal_run_conflicts() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let control = harness.control();
    let outcome = control
        .score_resilience_batch(
            &harness.identity,
            &ScoreResilienceBatchRequest {
                exposure_version_id: version_id,
                hazard_dataset_version_ids: Vec::new(),
                config: None,
                force: false,
                policy_pack_version_id: None,
            },
            None,
        )
        .unwrap();
    harness.drain();
    assert!(control.cancel_run(&harness.identity, outcome.run_id.unwrap(), None).is_err());
}

// ============================================================================
// SECTION: Property Profiles & Single Scoring
// ============================================================================

/// Tests profile resolution: queued, enriched, then cached.
#[test]
fn test_property_profile_resolution() {
    let harness = Harness::new();
    let control = harness.control();
    let request = ResolvePropertyProfileRequest {
        address: AddressInput {
            address_line1: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state_region: Some("PA".to_string()),
            postal_code: Some("19064".to_string()),
            country: Some("US".to_string()),
        },
        prefer_cached: true,
        force_refresh: false,
    };

    let first = control.resolve_property_profile(&harness.identity, &request, None).unwrap();
    assert_eq!(first.status, ProfileResolutionStatus::Queued);
    // Repeated resolution reuses the in-flight run instead of a new one.
    let second = control.resolve_property_profile(&harness.identity, &request, None).unwrap();
    assert_eq!(second.status, ProfileResolutionStatus::ExistingInProgress);
    assert_eq!(second.run_id, first.run_id);

    harness.drain();
    let third = control.resolve_property_profile(&harness.identity, &request, None).unwrap();
    assert_eq!(third.status, ProfileResolutionStatus::Cached);
    assert!(third.property_profile_id.is_some());

    // Past the freshness window the profile re-queues.
    harness
        .clock
        .now_millis
        .fetch_add(31 * perilgrid_core::MILLIS_PER_DAY, Ordering::SeqCst);
    let stale = control.resolve_property_profile(&harness.identity, &request, None).unwrap();
    assert_eq!(stale.status, ProfileResolutionStatus::Queued);
}

/// Tests single-property scoring runs synchronously on stub providers.
#[test]
fn test_score_resilience_sync_with_stubs() {
    let harness = Harness::new();
    let control = harness.control();
    let response = control
        .score_resilience(
            &harness.identity,
            &ScoreResilienceRequest {
                address: AddressInput {
                    address_line1: Some("1 Main St".to_string()),
                    city: Some("Springfield".to_string()),
                    state_region: Some("PA".to_string()),
                    postal_code: Some("19064".to_string()),
                    country: Some("US".to_string()),
                },
                ..ScoreResilienceRequest::default()
            },
            None,
        )
        .unwrap();
    let ScoreResilienceResponse::Scored {
        breakdown,
        decision,
        explainability,
        enrichment_status,
        property_profile_id,
        policy,
    } = response
    else {
        panic!("expected a scored response");
    };
    assert_eq!(enrichment_status, "ready");
    assert!(property_profile_id.is_some());
    assert_eq!(policy.version_label, "default");
    assert!((0..=100).contains(&breakdown.resilience_score));
    assert!((0.0..=1.0).contains(&breakdown.risk_score));
    // All four perils fall back to the unknown score and warn.
    assert_eq!(breakdown.warnings.len(), 4);
    // All-unknown hazards land mid-score, which refers before the
    // missing-data check is reached.
    assert_eq!(decision.decision, UnderwritingDisposition::Refer);
    assert!(decision.reason_codes.iter().any(|code| code == "SCORE_MEDIUM_REFER"));
    assert!((0.0..=1.0).contains(&decision.confidence));
    assert_eq!(explainability.drivers.len(), 4);
    assert!(explainability.narrative.starts_with(&format!(
        "Resilience {} (REFER).",
        breakdown.resilience_score
    )));
}

// ============================================================================
// SECTION: Lineage
// ============================================================================

/// Tests lineage over a rollup result reaches its inputs and run.
#[test]
fn test_lineage_graph() {
    let harness = Harness::new();
    let version_id = committed_version(&harness);
    let control = harness.control();
    let config_id = control
        .create_rollup_config(
            &harness.identity,
            &CreateRollupConfigRequest {
                name: "by-country".to_string(),
                dimensions: vec!["country".to_string()],
                filters: std::collections::BTreeMap::new(),
                measures: vec![MeasureSpec {
                    name: "location_count".to_string(),
                    op: MeasureOp::Count,
                    field: None,
                }],
            },
        )
        .unwrap();
    let triggered = control
        .trigger_rollup(
            &harness.identity,
            &TriggerRollupRequest {
                exposure_version_id: version_id,
                rollup_config_id: config_id,
                hazard_overlay_result_ids: Vec::new(),
            },
            None,
        )
        .unwrap();
    harness.drain();

    let graph = control
        .lineage(
            &harness.identity,
            LineageEntityType::RollupResult,
            triggered.rollup_result_id.value(),
        )
        .unwrap();
    assert!(graph.root.starts_with("rollup_result:"));
    assert!(graph.nodes.iter().any(|node| node.key.starts_with("exposure_version:")));
    assert!(graph.nodes.iter().any(|node| node.key.starts_with("rollup_config:")));
    assert!(graph.nodes.iter().any(|node| node.key.starts_with("run:")));
    assert!(graph
        .edges
        .iter()
        .any(|edge| edge.relation == LineageRelation::ProducedBy));
    assert!(graph
        .edges
        .iter()
        .any(|edge| edge.relation == LineageRelation::DependsOn));

    // Missing roots surface as not-found, never as empty graphs.
    assert!(control
        .lineage(&harness.identity, LineageEntityType::DriftRun, 999)
        .is_err());
}
