// perilgrid-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Tenant Store
// Description: Durable store implementing every Perilgrid store seam.
// Purpose: Persist entities, the task queue, and spatial features in WAL.
// Dependencies: perilgrid-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One SQLite database holds every Perilgrid table. Each statement carries
//! the tenant predicate; unique-index violations surface as
//! [`StoreError::Conflict`] so control-plane races resolve to friendly
//! responses. Hazard features persist their geometry as JSON next to
//! bounding-box columns used as the spatial prefilter; exact containment is
//! confirmed in memory with the multipolygon test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use perilgrid_core::AuditEvent;
use perilgrid_core::AuditEventId;
use perilgrid_core::AuditStore;
use perilgrid_core::Breach;
use perilgrid_core::BreachId;
use perilgrid_core::BreachStore;
use perilgrid_core::DriftDetail;
use perilgrid_core::DriftRun;
use perilgrid_core::DriftRunId;
use perilgrid_core::DriftStore;
use perilgrid_core::ExposureStore;
use perilgrid_core::ExposureUpload;
use perilgrid_core::ExposureVersion;
use perilgrid_core::ExposureVersionId;
use perilgrid_core::GeoPoint;
use perilgrid_core::HashAlgorithm;
use perilgrid_core::HashDigest;
use perilgrid_core::HazardDataset;
use perilgrid_core::HazardDatasetId;
use perilgrid_core::HazardDatasetVersion;
use perilgrid_core::HazardDatasetVersionId;
use perilgrid_core::HazardFeature;
use perilgrid_core::HazardOverlayResult;
use perilgrid_core::HazardStore;
use perilgrid_core::IdempotencyKey;
use perilgrid_core::LifecycleStatus;
use perilgrid_core::Location;
use perilgrid_core::LocationHazardAttribute;
use perilgrid_core::LocationId;
use perilgrid_core::MappingTemplate;
use perilgrid_core::MappingTemplateId;
use perilgrid_core::OverlayResultId;
use perilgrid_core::PolicyPack;
use perilgrid_core::PolicyPackId;
use perilgrid_core::PolicyPackVersion;
use perilgrid_core::PolicyPackVersionId;
use perilgrid_core::PolicyStore;
use perilgrid_core::ProfileStore;
use perilgrid_core::PropertyProfile;
use perilgrid_core::PropertyProfileId;
use perilgrid_core::QualityTier;
use perilgrid_core::QueuedTask;
use perilgrid_core::RequestId;
use perilgrid_core::ResilienceScoreItem;
use perilgrid_core::ResilienceScoreResult;
use perilgrid_core::ResilienceStore;
use perilgrid_core::RollupConfig;
use perilgrid_core::RollupConfigId;
use perilgrid_core::RollupItem;
use perilgrid_core::RollupResult;
use perilgrid_core::RollupResultId;
use perilgrid_core::RollupStore;
use perilgrid_core::Run;
use perilgrid_core::RunId;
use perilgrid_core::RunStatus;
use perilgrid_core::RunStore;
use perilgrid_core::RunType;
use perilgrid_core::ScoreItemId;
use perilgrid_core::ScoreResultId;
use perilgrid_core::StoreError;
use perilgrid_core::TaskId;
use perilgrid_core::TaskQueue;
use perilgrid_core::Tenant;
use perilgrid_core::TenantId;
use perilgrid_core::ThresholdRule;
use perilgrid_core::ThresholdRuleId;
use perilgrid_core::Timestamp;
use perilgrid_core::UploadId;
use perilgrid_core::User;
use perilgrid_core::UserId;
use perilgrid_core::UwFinding;
use perilgrid_core::UwFindingId;
use perilgrid_core::UwRule;
use perilgrid_core::UwRuleId;
use perilgrid_core::UwStore;
use perilgrid_core::UwTarget;
use perilgrid_core::ValidationResult;
use perilgrid_core::ValidationResultId;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version recorded in `user_version`.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::VersionMismatch(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error onto the store taxonomy.
fn map_sql(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, ref message) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            return StoreError::Conflict(
                message.clone().unwrap_or_else(|| failure.to_string()),
            );
        }
    }
    StoreError::Store(err.to_string())
}

// ============================================================================
// SECTION: JSON Helpers
// ============================================================================

/// Serializes a value into a JSON column.
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Reads a JSON column into a typed value.
fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

/// Reads a nullable JSON column into a typed value.
fn opt_json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text).map(Some).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        }),
    }
}

/// Reads a stable enum string column through its parser.
fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(format!("unknown enum value: {text}"))),
        )
    })
}

/// Reads a nullable timestamp column.
fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.map(Timestamp::from_unix_millis))
}

/// Wraps a digest column as a SHA-256 digest value.
fn digest_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<HashDigest> {
    let value: String = row.get(idx)?;
    Ok(HashDigest::from_hex(HashAlgorithm::Sha256, value))
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed store implementing every Perilgrid seam.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (and migrates) the store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
            }
        }
        let connection = Connection::open(&config.path)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "journal_mode", "wal")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "foreign_keys", "on")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens an in-memory store for tests and sync pipelines.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when initialization fails.
    pub fn in_memory() -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Io("sqlite connection poisoned".to_string()))
    }
}

/// Creates tables and records the schema version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    let current: i64 = connection
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if current > SCHEMA_VERSION {
        return Err(SqliteStoreError::VersionMismatch(format!(
            "database schema {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    connection
        .execute_batch(SCHEMA_SQL)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Schema DDL; append-mostly, enums stored as stable strings.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tenant (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    default_currency TEXT NOT NULL,
    default_policy_pack_version_id INTEGER,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS app_user (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, email)
);
CREATE TABLE IF NOT EXISTS run (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    run_type TEXT NOT NULL,
    status TEXT NOT NULL,
    input_refs_json TEXT NOT NULL,
    config_refs_json TEXT NOT NULL,
    output_refs_json TEXT NOT NULL,
    artifact_checksums_json TEXT NOT NULL,
    code_version TEXT,
    created_by TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    cancelled_at INTEGER,
    request_id TEXT,
    task_id INTEGER,
    fingerprint TEXT
);
CREATE INDEX IF NOT EXISTS ix_run_tenant_fingerprint
    ON run (tenant_id, run_type, fingerprint, status);
CREATE TABLE IF NOT EXISTS task_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    run_id INTEGER NOT NULL,
    run_type TEXT NOT NULL,
    request_id TEXT,
    enqueued_at INTEGER NOT NULL,
    claimed_by TEXT,
    claimed_at INTEGER
);
CREATE TABLE IF NOT EXISTS exposure_upload (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    content_type TEXT NOT NULL,
    object_uri TEXT NOT NULL,
    checksum TEXT NOT NULL,
    idempotency_key TEXT,
    mapping_template_id INTEGER,
    created_by TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, idempotency_key)
);
CREATE TABLE IF NOT EXISTS mapping_template (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    template_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name, version)
);
CREATE TABLE IF NOT EXISTS validation_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    upload_id TEXT NOT NULL,
    mapping_template_id INTEGER,
    summary_json TEXT NOT NULL,
    row_errors_uri TEXT NOT NULL,
    checksum TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS exposure_version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    upload_id TEXT NOT NULL,
    mapping_template_id INTEGER,
    name TEXT NOT NULL,
    idempotency_key TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, upload_id, mapping_template_id),
    UNIQUE (tenant_id, upload_id, idempotency_key)
);
CREATE TABLE IF NOT EXISTS location (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    external_location_id TEXT NOT NULL,
    address_line1 TEXT,
    city TEXT,
    state_region TEXT,
    postal_code TEXT,
    country TEXT,
    latitude REAL,
    longitude REAL,
    geocode_method TEXT,
    geocode_confidence REAL,
    quality_tier TEXT,
    quality_reasons_json TEXT NOT NULL,
    currency TEXT,
    lob TEXT,
    product_code TEXT,
    tiv REAL,
    \"limit\" REAL,
    premium REAL,
    structural_json TEXT NOT NULL,
    updated_at INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, exposure_version_id, external_location_id)
);
CREATE TABLE IF NOT EXISTS hazard_dataset (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    peril TEXT,
    description TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name)
);
CREATE TABLE IF NOT EXISTS hazard_dataset_version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    dataset_id INTEGER NOT NULL,
    version_label TEXT NOT NULL,
    object_uri TEXT NOT NULL,
    checksum TEXT NOT NULL,
    effective_date INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, dataset_id, version_label)
);
CREATE TABLE IF NOT EXISTS hazard_feature (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    dataset_version_id INTEGER NOT NULL,
    geometry_json TEXT NOT NULL,
    properties_json TEXT NOT NULL,
    min_lon REAL NOT NULL,
    min_lat REAL NOT NULL,
    max_lon REAL NOT NULL,
    max_lat REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_hazard_feature_bbox
    ON hazard_feature (tenant_id, dataset_version_id, min_lon, max_lon, min_lat, max_lat);
CREATE TABLE IF NOT EXISTS hazard_overlay_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    dataset_version_id INTEGER NOT NULL,
    run_id INTEGER,
    method TEXT NOT NULL,
    params_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS location_hazard_attribute (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    location_id INTEGER NOT NULL,
    overlay_result_id INTEGER NOT NULL,
    attributes_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_lha_overlay
    ON location_hazard_attribute (tenant_id, overlay_result_id);
CREATE TABLE IF NOT EXISTS rollup_config (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    dimensions_json TEXT NOT NULL,
    filters_json TEXT NOT NULL,
    measures_json TEXT NOT NULL,
    created_by TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name, version)
);
CREATE TABLE IF NOT EXISTS rollup_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    rollup_config_id INTEGER NOT NULL,
    run_id INTEGER,
    overlay_result_ids_json TEXT NOT NULL,
    checksum TEXT,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS rollup_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    rollup_result_id INTEGER NOT NULL,
    key_json TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    metrics_json TEXT NOT NULL,
    UNIQUE (rollup_result_id, key_hash)
);
CREATE TABLE IF NOT EXISTS threshold_rule (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    severity TEXT NOT NULL,
    active INTEGER NOT NULL,
    rule_json TEXT NOT NULL,
    created_by TEXT,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS breach (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    threshold_rule_id INTEGER NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    rollup_result_id INTEGER NOT NULL,
    rollup_key_json TEXT NOT NULL,
    rollup_key_hash TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    threshold_value REAL NOT NULL,
    status TEXT NOT NULL,
    first_seen_at INTEGER NOT NULL,
    last_seen_at INTEGER NOT NULL,
    resolved_at INTEGER,
    last_eval_run_id INTEGER,
    UNIQUE (tenant_id, threshold_rule_id, exposure_version_id, rollup_key_hash)
);
CREATE TABLE IF NOT EXISTS drift_run (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    exposure_version_a_id INTEGER NOT NULL,
    exposure_version_b_id INTEGER NOT NULL,
    run_id INTEGER,
    storage_uri TEXT,
    checksum TEXT,
    config_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS drift_detail (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    drift_run_id INTEGER NOT NULL,
    external_location_id TEXT NOT NULL,
    classification TEXT NOT NULL,
    delta_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS resilience_score_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    run_id INTEGER,
    request_fingerprint TEXT NOT NULL,
    scoring_version TEXT NOT NULL,
    hazard_version_ids_json TEXT NOT NULL,
    config_json TEXT NOT NULL,
    policy_pack_version_id INTEGER,
    policy_used_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, request_fingerprint)
);
CREATE TABLE IF NOT EXISTS resilience_score_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    score_result_id INTEGER NOT NULL,
    location_id INTEGER NOT NULL,
    resilience_score INTEGER NOT NULL,
    risk_score REAL NOT NULL,
    hazards_json TEXT NOT NULL,
    breakdown_json TEXT NOT NULL,
    decision_json TEXT NOT NULL,
    explainability_json TEXT NOT NULL,
    input_structural_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_score_item_result
    ON resilience_score_item (tenant_id, score_result_id, id);
CREATE TABLE IF NOT EXISTS property_profile (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    location_id INTEGER,
    address_fingerprint TEXT NOT NULL,
    standardized_address_json TEXT NOT NULL,
    geocode_json TEXT,
    parcel_json TEXT,
    characteristics_json TEXT,
    structural_json TEXT NOT NULL,
    provenance_json TEXT NOT NULL,
    code_version TEXT,
    updated_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, address_fingerprint)
);
CREATE TABLE IF NOT EXISTS policy_pack (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name)
);
CREATE TABLE IF NOT EXISTS policy_pack_version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    policy_pack_id INTEGER NOT NULL,
    version_label TEXT NOT NULL,
    scoring_config_json TEXT NOT NULL,
    underwriting_policy_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, policy_pack_id, version_label)
);
CREATE TABLE IF NOT EXISTS uw_rule (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    target TEXT NOT NULL,
    active INTEGER NOT NULL,
    rule_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS uw_finding (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    uw_rule_id INTEGER NOT NULL,
    exposure_version_id INTEGER NOT NULL,
    location_id INTEGER,
    rollup_result_id INTEGER,
    rollup_key_hash TEXT,
    status TEXT NOT NULL,
    disposition TEXT NOT NULL,
    explanation_json TEXT NOT NULL,
    first_seen_at INTEGER NOT NULL,
    last_seen_at INTEGER NOT NULL,
    resolved_at INTEGER,
    last_eval_run_id INTEGER,
    UNIQUE (tenant_id, uw_rule_id, exposure_version_id, location_id),
    UNIQUE (tenant_id, uw_rule_id, exposure_version_id, rollup_key_hash)
);
CREATE TABLE IF NOT EXISTS audit_event (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    user_id TEXT,
    action TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    request_id TEXT,
    created_at INTEGER NOT NULL
);
";

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Shared SELECT column list for run rows.
const RUN_COLUMNS: &str = "id, tenant_id, run_type, status, input_refs_json, \
    config_refs_json, output_refs_json, artifact_checksums_json, code_version, \
    created_by, created_at, started_at, completed_at, cancelled_at, request_id, task_id";

/// Maps one run row.
fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: RunId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        run_type: enum_col(row, 2, RunType::parse)?,
        status: enum_col(row, 3, RunStatus::parse)?,
        input_refs: json_col(row, 4)?,
        config_refs: json_col(row, 5)?,
        output_refs: json_col(row, 6)?,
        artifact_checksums: json_col(row, 7)?,
        code_version: row.get(8)?,
        created_by: row.get::<_, Option<String>>(9)?.map(perilgrid_core::UserId::new),
        created_at: Timestamp::from_unix_millis(row.get(10)?),
        started_at: opt_ts(row, 11)?,
        completed_at: opt_ts(row, 12)?,
        cancelled_at: opt_ts(row, 13)?,
        request_id: row.get::<_, Option<String>>(14)?.map(RequestId::new),
        task_id: row.get::<_, Option<i64>>(15)?.map(TaskId::new),
    })
}

/// Shared SELECT column list for location rows.
const LOCATION_COLUMNS: &str = "id, tenant_id, exposure_version_id, \
    external_location_id, address_line1, city, state_region, postal_code, country, \
    latitude, longitude, geocode_method, geocode_confidence, quality_tier, \
    quality_reasons_json, currency, lob, product_code, tiv, \"limit\", premium, \
    structural_json, updated_at, created_at";

/// Maps one location row.
fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    let tier: Option<String> = row.get(13)?;
    Ok(Location {
        id: LocationId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        exposure_version_id: ExposureVersionId::new(row.get(2)?),
        external_location_id: row.get(3)?,
        address_line1: row.get(4)?,
        city: row.get(5)?,
        state_region: row.get(6)?,
        postal_code: row.get(7)?,
        country: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        geocode_method: row.get(11)?,
        geocode_confidence: row.get(12)?,
        quality_tier: tier.as_deref().and_then(QualityTier::parse),
        quality_reasons: json_col(row, 14)?,
        currency: row.get(15)?,
        lob: row.get(16)?,
        product_code: row.get(17)?,
        tiv: row.get(18)?,
        limit: row.get(19)?,
        premium: row.get(20)?,
        structural: json_col(row, 21)?,
        updated_at: opt_ts(row, 22)?,
        created_at: Timestamp::from_unix_millis(row.get(23)?),
    })
}

/// Shared SELECT column list for upload rows.
const UPLOAD_COLUMNS: &str = "id, tenant_id, filename, content_type, object_uri, \
    checksum, idempotency_key, mapping_template_id, created_by, created_at";

/// Maps one upload row.
fn upload_from_row(row: &Row<'_>) -> rusqlite::Result<ExposureUpload> {
    Ok(ExposureUpload {
        id: UploadId::new(row.get::<_, String>(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        filename: row.get(2)?,
        content_type: row.get(3)?,
        object_uri: row.get(4)?,
        checksum: digest_col(row, 5)?,
        idempotency_key: row.get::<_, Option<String>>(6)?.map(IdempotencyKey::new),
        mapping_template_id: row.get::<_, Option<i64>>(7)?.map(MappingTemplateId::new),
        created_by: row.get::<_, Option<String>>(8)?.map(perilgrid_core::UserId::new),
        created_at: Timestamp::from_unix_millis(row.get(9)?),
    })
}

/// Maps one exposure version row.
fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ExposureVersion> {
    Ok(ExposureVersion {
        id: ExposureVersionId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        upload_id: UploadId::new(row.get::<_, String>(2)?),
        mapping_template_id: row.get::<_, Option<i64>>(3)?.map(MappingTemplateId::new),
        name: row.get(4)?,
        idempotency_key: row.get::<_, Option<String>>(5)?.map(IdempotencyKey::new),
        created_at: Timestamp::from_unix_millis(row.get(6)?),
    })
}

/// Maps one overlay result row.
fn overlay_from_row(row: &Row<'_>) -> rusqlite::Result<HazardOverlayResult> {
    Ok(HazardOverlayResult {
        id: OverlayResultId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        exposure_version_id: ExposureVersionId::new(row.get(2)?),
        dataset_version_id: HazardDatasetVersionId::new(row.get(3)?),
        run_id: row.get::<_, Option<i64>>(4)?.map(RunId::new),
        method: row.get(5)?,
        params: json_col(row, 6)?,
        created_at: Timestamp::from_unix_millis(row.get(7)?),
    })
}

/// Shared SELECT column list for overlay result rows.
const OVERLAY_COLUMNS: &str = "id, tenant_id, exposure_version_id, \
    dataset_version_id, run_id, method, params_json, created_at";

/// Maps one rollup result row.
fn rollup_result_from_row(row: &Row<'_>) -> rusqlite::Result<RollupResult> {
    let checksum: Option<String> = row.get(6)?;
    Ok(RollupResult {
        id: RollupResultId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        exposure_version_id: ExposureVersionId::new(row.get(2)?),
        rollup_config_id: RollupConfigId::new(row.get(3)?),
        run_id: row.get::<_, Option<i64>>(4)?.map(RunId::new),
        overlay_result_ids: json_col(row, 5)?,
        checksum: checksum.map(|value| HashDigest::from_hex(HashAlgorithm::Sha256, value)),
        created_at: Timestamp::from_unix_millis(row.get(7)?),
    })
}

/// Shared SELECT column list for rollup result rows.
const ROLLUP_RESULT_COLUMNS: &str = "id, tenant_id, exposure_version_id, \
    rollup_config_id, run_id, overlay_result_ids_json, checksum, created_at";

/// Maps one breach row.
fn breach_from_row(row: &Row<'_>) -> rusqlite::Result<Breach> {
    Ok(Breach {
        id: BreachId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        threshold_rule_id: ThresholdRuleId::new(row.get(2)?),
        exposure_version_id: ExposureVersionId::new(row.get(3)?),
        rollup_result_id: RollupResultId::new(row.get(4)?),
        rollup_key: json_col(row, 5)?,
        rollup_key_hash: row.get(6)?,
        metric_name: row.get(7)?,
        metric_value: row.get(8)?,
        threshold_value: row.get(9)?,
        status: enum_col(row, 10, LifecycleStatus::parse)?,
        first_seen_at: Timestamp::from_unix_millis(row.get(11)?),
        last_seen_at: Timestamp::from_unix_millis(row.get(12)?),
        resolved_at: opt_ts(row, 13)?,
        last_eval_run_id: row.get::<_, Option<i64>>(14)?.map(RunId::new),
    })
}

/// Shared SELECT column list for breach rows.
const BREACH_COLUMNS: &str = "id, tenant_id, threshold_rule_id, exposure_version_id, \
    rollup_result_id, rollup_key_json, rollup_key_hash, metric_name, metric_value, \
    threshold_value, status, first_seen_at, last_seen_at, resolved_at, last_eval_run_id";

/// Maps one drift run row.
fn drift_from_row(row: &Row<'_>) -> rusqlite::Result<DriftRun> {
    let checksum: Option<String> = row.get(6)?;
    Ok(DriftRun {
        id: DriftRunId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        exposure_version_a_id: ExposureVersionId::new(row.get(2)?),
        exposure_version_b_id: ExposureVersionId::new(row.get(3)?),
        run_id: row.get::<_, Option<i64>>(4)?.map(RunId::new),
        storage_uri: row.get(5)?,
        checksum: checksum.map(|value| HashDigest::from_hex(HashAlgorithm::Sha256, value)),
        config: json_col(row, 7)?,
        created_at: Timestamp::from_unix_millis(row.get(8)?),
    })
}

/// Shared SELECT column list for drift run rows.
const DRIFT_COLUMNS: &str = "id, tenant_id, exposure_version_a_id, \
    exposure_version_b_id, run_id, storage_uri, checksum, config_json, created_at";

/// Maps one score result row.
fn score_result_from_row(row: &Row<'_>) -> rusqlite::Result<ResilienceScoreResult> {
    Ok(ResilienceScoreResult {
        id: ScoreResultId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        exposure_version_id: ExposureVersionId::new(row.get(2)?),
        run_id: row.get::<_, Option<i64>>(3)?.map(RunId::new),
        request_fingerprint: row.get(4)?,
        scoring_version: row.get(5)?,
        hazard_dataset_version_ids: json_col(row, 6)?,
        config: json_col(row, 7)?,
        policy_pack_version_id: row.get::<_, Option<i64>>(8)?.map(PolicyPackVersionId::new),
        policy_used: json_col(row, 9)?,
        created_at: Timestamp::from_unix_millis(row.get(10)?),
    })
}

/// Shared SELECT column list for score result rows.
const SCORE_RESULT_COLUMNS: &str = "id, tenant_id, exposure_version_id, run_id, \
    request_fingerprint, scoring_version, hazard_version_ids_json, config_json, \
    policy_pack_version_id, policy_used_json, created_at";

/// Maps one score item row.
fn score_item_from_row(row: &Row<'_>) -> rusqlite::Result<ResilienceScoreItem> {
    Ok(ResilienceScoreItem {
        id: ScoreItemId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        score_result_id: ScoreResultId::new(row.get(2)?),
        location_id: LocationId::new(row.get(3)?),
        resilience_score: row.get(4)?,
        risk_score: row.get(5)?,
        hazards: json_col(row, 6)?,
        breakdown: json_col(row, 7)?,
        decision: json_col(row, 8)?,
        explainability: json_col(row, 9)?,
        input_structural: json_col(row, 10)?,
    })
}

/// Shared SELECT column list for score item rows.
const SCORE_ITEM_COLUMNS: &str = "id, tenant_id, score_result_id, location_id, \
    resilience_score, risk_score, hazards_json, breakdown_json, decision_json, \
    explainability_json, input_structural_json";

/// Maps one property profile row.
fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyProfile> {
    Ok(PropertyProfile {
        id: PropertyProfileId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        location_id: row.get::<_, Option<i64>>(2)?.map(LocationId::new),
        address_fingerprint: row.get(3)?,
        standardized_address: json_col(row, 4)?,
        geocode: opt_json_col(row, 5)?,
        parcel: opt_json_col(row, 6)?,
        characteristics: opt_json_col(row, 7)?,
        structural: json_col(row, 8)?,
        provenance: json_col(row, 9)?,
        code_version: row.get(10)?,
        updated_at: Timestamp::from_unix_millis(row.get(11)?),
        created_at: Timestamp::from_unix_millis(row.get(12)?),
    })
}

/// Shared SELECT column list for property profile rows.
const PROFILE_COLUMNS: &str = "id, tenant_id, location_id, address_fingerprint, \
    standardized_address_json, geocode_json, parcel_json, characteristics_json, \
    structural_json, provenance_json, code_version, updated_at, created_at";

/// Maps one underwriting finding row.
fn uw_finding_from_row(row: &Row<'_>) -> rusqlite::Result<UwFinding> {
    Ok(UwFinding {
        id: UwFindingId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        uw_rule_id: UwRuleId::new(row.get(2)?),
        exposure_version_id: ExposureVersionId::new(row.get(3)?),
        location_id: row.get::<_, Option<i64>>(4)?.map(LocationId::new),
        rollup_result_id: row.get::<_, Option<i64>>(5)?.map(RollupResultId::new),
        rollup_key_hash: row.get(6)?,
        status: enum_col(row, 7, LifecycleStatus::parse)?,
        disposition: row.get(8)?,
        explanation: json_col(row, 9)?,
        first_seen_at: Timestamp::from_unix_millis(row.get(10)?),
        last_seen_at: Timestamp::from_unix_millis(row.get(11)?),
        resolved_at: opt_ts(row, 12)?,
        last_eval_run_id: row.get::<_, Option<i64>>(13)?.map(RunId::new),
    })
}

/// Shared SELECT column list for underwriting finding rows.
const UW_FINDING_COLUMNS: &str = "id, tenant_id, uw_rule_id, exposure_version_id, \
    location_id, rollup_result_id, rollup_key_hash, status, disposition, \
    explanation_json, first_seen_at, last_seen_at, resolved_at, last_eval_run_id";

// ============================================================================
// SECTION: Run Store
// ============================================================================

impl RunStore for SqliteStore {
    fn insert_run(&self, run: &Run) -> Result<RunId, StoreError> {
        let fingerprint = run
            .input_refs
            .get("request_fingerprint")
            .or_else(|| run.input_refs.get("address_fingerprint"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run (tenant_id, run_type, status, input_refs_json, \
             config_refs_json, output_refs_json, artifact_checksums_json, code_version, \
             created_by, created_at, started_at, completed_at, cancelled_at, request_id, \
             task_id, fingerprint) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                run.tenant_id.as_str(),
                run.run_type.as_str(),
                run.status.as_str(),
                to_json(&run.input_refs)?,
                to_json(&run.config_refs)?,
                to_json(&run.output_refs)?,
                to_json(&run.artifact_checksums)?,
                run.code_version,
                run.created_by.as_ref().map(|id| id.as_str().to_string()),
                run.created_at.as_unix_millis(),
                run.started_at.map(Timestamp::as_unix_millis),
                run.completed_at.map(Timestamp::as_unix_millis),
                run.cancelled_at.map(Timestamp::as_unix_millis),
                run.request_id.as_ref().map(|id| id.as_str().to_string()),
                run.task_id.map(TaskId::value),
                fingerprint,
            ],
        )
        .map_err(map_sql)?;
        Ok(RunId::new(conn.last_insert_rowid()))
    }

    fn run(&self, tenant_id: &TenantId, run_id: RunId) -> Result<Option<Run>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM run WHERE tenant_id = ?1 AND id = ?2"),
            params![tenant_id.as_str(), run_id.value()],
            run_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_run(&self, run: &Run) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE run SET status = ?3, input_refs_json = ?4, config_refs_json = ?5, \
                 output_refs_json = ?6, artifact_checksums_json = ?7, code_version = ?8, \
                 started_at = ?9, completed_at = ?10, cancelled_at = ?11, request_id = ?12, \
                 task_id = ?13 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    run.tenant_id.as_str(),
                    run.id.value(),
                    run.status.as_str(),
                    to_json(&run.input_refs)?,
                    to_json(&run.config_refs)?,
                    to_json(&run.output_refs)?,
                    to_json(&run.artifact_checksums)?,
                    run.code_version,
                    run.started_at.map(Timestamp::as_unix_millis),
                    run.completed_at.map(Timestamp::as_unix_millis),
                    run.cancelled_at.map(Timestamp::as_unix_millis),
                    run.request_id.as_ref().map(|id| id.as_str().to_string()),
                    run.task_id.map(TaskId::value),
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }

    fn find_active_run_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        run_type: RunType,
        fingerprint: &str,
    ) -> Result<Option<Run>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {RUN_COLUMNS} FROM run WHERE tenant_id = ?1 AND run_type = ?2 \
                 AND fingerprint = ?3 AND status IN ('QUEUED', 'RUNNING') \
                 ORDER BY id DESC LIMIT 1"
            ),
            params![tenant_id.as_str(), run_type.as_str(), fingerprint],
            run_from_row,
        )
        .optional()
        .map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Task Queue
// ============================================================================

impl TaskQueue for SqliteStore {
    fn enqueue(&self, task: &QueuedTask) -> Result<TaskId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO task_queue (tenant_id, run_id, run_type, request_id, enqueued_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task.tenant_id.as_str(),
                task.run_id.value(),
                task.run_type.as_str(),
                task.request_id.as_ref().map(|id| id.as_str().to_string()),
                task.enqueued_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(TaskId::new(conn.last_insert_rowid()))
    }

    fn claim_next(
        &self,
        worker: &str,
        now: Timestamp,
    ) -> Result<Option<QueuedTask>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let task = tx
            .query_row(
                "SELECT id, tenant_id, run_id, run_type, request_id, enqueued_at \
                 FROM task_queue WHERE claimed_by IS NULL ORDER BY id LIMIT 1",
                [],
                |row| {
                    Ok(QueuedTask {
                        id: TaskId::new(row.get(0)?),
                        tenant_id: TenantId::new(row.get::<_, String>(1)?),
                        run_id: RunId::new(row.get(2)?),
                        run_type: enum_col(row, 3, RunType::parse)?,
                        request_id: row.get::<_, Option<String>>(4)?.map(RequestId::new),
                        enqueued_at: Timestamp::from_unix_millis(row.get(5)?),
                    })
                },
            )
            .optional()
            .map_err(map_sql)?;
        if let Some(task) = &task {
            tx.execute(
                "UPDATE task_queue SET claimed_by = ?2, claimed_at = ?3 WHERE id = ?1",
                params![task.id.value(), worker, now.as_unix_millis()],
            )
            .map_err(map_sql)?;
        }
        tx.commit().map_err(map_sql)?;
        Ok(task)
    }

    fn complete(&self, task_id: TaskId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM task_queue WHERE id = ?1", params![task_id.value()])
            .map_err(map_sql)?;
        Ok(())
    }

    fn release_stale(&self, claimed_before: Timestamp) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let released = conn
            .execute(
                "UPDATE task_queue SET claimed_by = NULL, claimed_at = NULL \
                 WHERE claimed_by IS NOT NULL AND claimed_at < ?1",
                params![claimed_before.as_unix_millis()],
            )
            .map_err(map_sql)?;
        u64::try_from(released).map_err(|err| StoreError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Exposure Store
// ============================================================================

impl ExposureStore for SqliteStore {
    fn insert_tenant(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tenant (id, name, default_currency, \
             default_policy_pack_version_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tenant.id.as_str(),
                tenant.name,
                tenant.default_currency,
                tenant.default_policy_pack_version_id.map(PolicyPackVersionId::value),
                tenant.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(())
    }

    fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, default_currency, default_policy_pack_version_id, \
             created_at FROM tenant WHERE id = ?1",
            params![tenant_id.as_str()],
            |row| {
                Ok(Tenant {
                    id: TenantId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    default_currency: row.get(2)?,
                    default_policy_pack_version_id: row
                        .get::<_, Option<i64>>(3)?
                        .map(PolicyPackVersionId::new),
                    created_at: Timestamp::from_unix_millis(row.get(4)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let role = serde_json::to_value(user.role)
            .ok()
            .and_then(|value| value.as_str().map(ToString::to_string))
            .ok_or_else(|| StoreError::Invalid("unserializable user role".to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_user (id, tenant_id, email, role, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.as_str(),
                user.tenant_id.as_str(),
                user.email,
                role,
                user.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(())
    }

    fn user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, email, role, created_at FROM app_user \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), user_id.as_str()],
            |row| {
                let role: String = row.get(3)?;
                let role = serde_json::from_value(serde_json::Value::String(role))
                    .map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(err),
                        )
                    })?;
                Ok(User {
                    id: UserId::new(row.get::<_, String>(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    email: row.get(2)?,
                    role,
                    created_at: Timestamp::from_unix_millis(row.get(4)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_upload(&self, upload: &ExposureUpload) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO exposure_upload (id, tenant_id, filename, content_type, \
             object_uri, checksum, idempotency_key, mapping_template_id, created_by, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                upload.id.as_str(),
                upload.tenant_id.as_str(),
                upload.filename,
                upload.content_type,
                upload.object_uri,
                upload.checksum.value,
                upload.idempotency_key.as_ref().map(|key| key.as_str().to_string()),
                upload.mapping_template_id.map(MappingTemplateId::value),
                upload.created_by.as_ref().map(|id| id.as_str().to_string()),
                upload.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(())
    }

    fn upload(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
    ) -> Result<Option<ExposureUpload>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {UPLOAD_COLUMNS} FROM exposure_upload \
                 WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), upload_id.as_str()],
            upload_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn upload_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &IdempotencyKey,
    ) -> Result<Option<ExposureUpload>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {UPLOAD_COLUMNS} FROM exposure_upload \
                 WHERE tenant_id = ?1 AND idempotency_key = ?2"
            ),
            params![tenant_id.as_str(), key.as_str()],
            upload_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn set_upload_mapping(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        mapping_template_id: MappingTemplateId,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE exposure_upload SET mapping_template_id = ?3 \
                 WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id.as_str(), upload_id.as_str(), mapping_template_id.value()],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("upload {upload_id}")));
        }
        Ok(())
    }

    fn insert_mapping_template(
        &self,
        template: &MappingTemplate,
    ) -> Result<MappingTemplateId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO mapping_template (tenant_id, name, version, template_json, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                template.tenant_id.as_str(),
                template.name,
                template.version,
                to_json(&template.template)?,
                template.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(MappingTemplateId::new(conn.last_insert_rowid()))
    }

    fn mapping_template(
        &self,
        tenant_id: &TenantId,
        template_id: MappingTemplateId,
    ) -> Result<Option<MappingTemplate>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, name, version, template_json, created_at \
             FROM mapping_template WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), template_id.value()],
            |row| {
                Ok(MappingTemplate {
                    id: MappingTemplateId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    version: row.get(3)?,
                    template: json_col(row, 4)?,
                    created_at: Timestamp::from_unix_millis(row.get(5)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn latest_mapping_version(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT MAX(version) FROM mapping_template WHERE tenant_id = ?1 AND name = ?2",
            params![tenant_id.as_str(), name],
            |row| row.get::<_, Option<i64>>(0),
        )
        .map_err(map_sql)
    }

    fn insert_validation_result(
        &self,
        result: &ValidationResult,
    ) -> Result<ValidationResultId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO validation_result (tenant_id, upload_id, mapping_template_id, \
             summary_json, row_errors_uri, checksum, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.tenant_id.as_str(),
                result.upload_id.as_str(),
                result.mapping_template_id.map(MappingTemplateId::value),
                to_json(&result.summary)?,
                result.row_errors_uri,
                result.checksum.value,
                result.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(ValidationResultId::new(conn.last_insert_rowid()))
    }

    fn insert_exposure_version(
        &self,
        version: &ExposureVersion,
    ) -> Result<ExposureVersionId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO exposure_version (tenant_id, upload_id, mapping_template_id, \
             name, idempotency_key, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                version.tenant_id.as_str(),
                version.upload_id.as_str(),
                version.mapping_template_id.map(MappingTemplateId::value),
                version.name,
                version.idempotency_key.as_ref().map(|key| key.as_str().to_string()),
                version.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(ExposureVersionId::new(conn.last_insert_rowid()))
    }

    fn exposure_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Option<ExposureVersion>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, upload_id, mapping_template_id, name, \
             idempotency_key, created_at FROM exposure_version \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), version_id.value()],
            version_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn exposure_version_by_upload(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        mapping_template_id: Option<MappingTemplateId>,
    ) -> Result<Option<ExposureVersion>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, upload_id, mapping_template_id, name, \
             idempotency_key, created_at FROM exposure_version \
             WHERE tenant_id = ?1 AND upload_id = ?2 \
             AND mapping_template_id IS ?3 ORDER BY id LIMIT 1",
            params![
                tenant_id.as_str(),
                upload_id.as_str(),
                mapping_template_id.map(MappingTemplateId::value),
            ],
            version_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn exposure_version_by_idempotency(
        &self,
        tenant_id: &TenantId,
        upload_id: &UploadId,
        key: &IdempotencyKey,
    ) -> Result<Option<ExposureVersion>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, upload_id, mapping_template_id, name, \
             idempotency_key, created_at FROM exposure_version \
             WHERE tenant_id = ?1 AND upload_id = ?2 AND idempotency_key = ?3 \
             ORDER BY id LIMIT 1",
            params![tenant_id.as_str(), upload_id.as_str(), key.as_str()],
            version_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_locations(&self, locations: &[Location]) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for location in locations {
            tx.execute(
                "INSERT INTO location (tenant_id, exposure_version_id, \
                 external_location_id, address_line1, city, state_region, postal_code, \
                 country, latitude, longitude, geocode_method, geocode_confidence, \
                 quality_tier, quality_reasons_json, currency, lob, product_code, tiv, \
                 \"limit\", premium, structural_json, updated_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                 ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    location.tenant_id.as_str(),
                    location.exposure_version_id.value(),
                    location.external_location_id,
                    location.address_line1,
                    location.city,
                    location.state_region,
                    location.postal_code,
                    location.country,
                    location.latitude,
                    location.longitude,
                    location.geocode_method,
                    location.geocode_confidence,
                    location.quality_tier.map(QualityTier::as_str),
                    to_json(&location.quality_reasons)?,
                    location.currency,
                    location.lob,
                    location.product_code,
                    location.tiv,
                    location.limit,
                    location.premium,
                    to_json(&location.structural)?,
                    location.updated_at.map(Timestamp::as_unix_millis),
                    location.created_at.as_unix_millis(),
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn locations_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<Location>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {LOCATION_COLUMNS} FROM location \
                 WHERE tenant_id = ?1 AND exposure_version_id = ?2 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), version_id.value()], location_from_row)
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn location(
        &self,
        tenant_id: &TenantId,
        location_id: LocationId,
    ) -> Result<Option<Location>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {LOCATION_COLUMNS} FROM location WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), location_id.value()],
            location_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_location(&self, location: &Location) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE location SET address_line1 = ?3, city = ?4, state_region = ?5, \
                 postal_code = ?6, country = ?7, latitude = ?8, longitude = ?9, \
                 geocode_method = ?10, geocode_confidence = ?11, quality_tier = ?12, \
                 quality_reasons_json = ?13, currency = ?14, lob = ?15, \
                 product_code = ?16, tiv = ?17, \"limit\" = ?18, premium = ?19, \
                 structural_json = ?20, updated_at = ?21 \
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    location.tenant_id.as_str(),
                    location.id.value(),
                    location.address_line1,
                    location.city,
                    location.state_region,
                    location.postal_code,
                    location.country,
                    location.latitude,
                    location.longitude,
                    location.geocode_method,
                    location.geocode_confidence,
                    location.quality_tier.map(QualityTier::as_str),
                    to_json(&location.quality_reasons)?,
                    location.currency,
                    location.lob,
                    location.product_code,
                    location.tiv,
                    location.limit,
                    location.premium,
                    to_json(&location.structural)?,
                    location.updated_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("location {}", location.id)));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Hazard Store
// ============================================================================

impl HazardStore for SqliteStore {
    fn insert_hazard_dataset(
        &self,
        dataset: &HazardDataset,
    ) -> Result<HazardDatasetId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO hazard_dataset (tenant_id, name, peril, description, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                dataset.tenant_id.as_str(),
                dataset.name,
                dataset.peril,
                dataset.description,
                dataset.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(HazardDatasetId::new(conn.last_insert_rowid()))
    }

    fn hazard_dataset(
        &self,
        tenant_id: &TenantId,
        dataset_id: HazardDatasetId,
    ) -> Result<Option<HazardDataset>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, name, peril, description, created_at \
             FROM hazard_dataset WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), dataset_id.value()],
            |row| {
                Ok(HazardDataset {
                    id: HazardDatasetId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    peril: row.get(3)?,
                    description: row.get(4)?,
                    created_at: Timestamp::from_unix_millis(row.get(5)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_hazard_dataset_version(
        &self,
        version: &HazardDatasetVersion,
    ) -> Result<HazardDatasetVersionId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO hazard_dataset_version (tenant_id, dataset_id, version_label, \
             object_uri, checksum, effective_date, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                version.tenant_id.as_str(),
                version.dataset_id.value(),
                version.version_label,
                version.object_uri,
                version.checksum.value,
                version.effective_date.map(Timestamp::as_unix_millis),
                version.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(HazardDatasetVersionId::new(conn.last_insert_rowid()))
    }

    fn hazard_dataset_version(
        &self,
        tenant_id: &TenantId,
        version_id: HazardDatasetVersionId,
    ) -> Result<Option<HazardDatasetVersion>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, dataset_id, version_label, object_uri, checksum, \
             effective_date, created_at FROM hazard_dataset_version \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), version_id.value()],
            |row| {
                Ok(HazardDatasetVersion {
                    id: HazardDatasetVersionId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    dataset_id: HazardDatasetId::new(row.get(2)?),
                    version_label: row.get(3)?,
                    object_uri: row.get(4)?,
                    checksum: digest_col(row, 5)?,
                    effective_date: opt_ts(row, 6)?,
                    created_at: Timestamp::from_unix_millis(row.get(7)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_hazard_features(&self, features: &[HazardFeature]) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for feature in features {
            let bbox = feature.geometry.bounding_box().ok_or_else(|| {
                StoreError::Invalid("hazard feature has empty geometry".to_string())
            })?;
            tx.execute(
                "INSERT INTO hazard_feature (tenant_id, dataset_version_id, \
                 geometry_json, properties_json, min_lon, min_lat, max_lon, max_lat) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    feature.tenant_id.as_str(),
                    feature.dataset_version_id.value(),
                    to_json(&feature.geometry)?,
                    to_json(&feature.properties)?,
                    bbox.min_lon,
                    bbox.min_lat,
                    bbox.max_lon,
                    bbox.max_lat,
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn features_containing(
        &self,
        tenant_id: &TenantId,
        version_ids: &[HazardDatasetVersionId],
        point: GeoPoint,
    ) -> Result<Vec<HazardFeature>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, tenant_id, dataset_version_id, geometry_json, properties_json \
                 FROM hazard_feature WHERE tenant_id = ?1 AND dataset_version_id = ?2 \
                 AND min_lon <= ?3 AND max_lon >= ?3 AND min_lat <= ?4 AND max_lat >= ?4 \
                 ORDER BY id",
            )
            .map_err(map_sql)?;
        let mut contained = Vec::new();
        for version_id in version_ids {
            let rows = statement
                .query_map(
                    params![
                        tenant_id.as_str(),
                        version_id.value(),
                        point.longitude,
                        point.latitude,
                    ],
                    |row| {
                        Ok(HazardFeature {
                            id: perilgrid_core::HazardFeatureId::new(row.get(0)?),
                            tenant_id: TenantId::new(row.get::<_, String>(1)?),
                            dataset_version_id: HazardDatasetVersionId::new(row.get(2)?),
                            geometry: json_col(row, 3)?,
                            properties: json_col(row, 4)?,
                        })
                    },
                )
                .map_err(map_sql)?;
            for feature in rows {
                let feature = feature.map_err(map_sql)?;
                // Bounding boxes prefilter; containment is the contract.
                if feature.geometry.contains(point) {
                    contained.push(feature);
                }
            }
        }
        Ok(contained)
    }

    fn insert_overlay_result(
        &self,
        result: &HazardOverlayResult,
    ) -> Result<OverlayResultId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO hazard_overlay_result (tenant_id, exposure_version_id, \
             dataset_version_id, run_id, method, params_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.tenant_id.as_str(),
                result.exposure_version_id.value(),
                result.dataset_version_id.value(),
                result.run_id.map(RunId::value),
                result.method,
                to_json(&result.params)?,
                result.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(OverlayResultId::new(conn.last_insert_rowid()))
    }

    fn overlay_result(
        &self,
        tenant_id: &TenantId,
        result_id: OverlayResultId,
    ) -> Result<Option<HazardOverlayResult>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {OVERLAY_COLUMNS} FROM hazard_overlay_result \
                 WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), result_id.value()],
            overlay_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_overlay_result(&self, result: &HazardOverlayResult) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE hazard_overlay_result SET run_id = ?3, method = ?4, \
                 params_json = ?5 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    result.tenant_id.as_str(),
                    result.id.value(),
                    result.run_id.map(RunId::value),
                    result.method,
                    to_json(&result.params)?,
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("overlay result {}", result.id)));
        }
        Ok(())
    }

    fn insert_location_hazard_attributes(
        &self,
        attributes: &[LocationHazardAttribute],
    ) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for attribute in attributes {
            tx.execute(
                "INSERT INTO location_hazard_attribute (tenant_id, location_id, \
                 overlay_result_id, attributes_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    attribute.tenant_id.as_str(),
                    attribute.location_id.value(),
                    attribute.overlay_result_id.value(),
                    to_json(&attribute.attributes)?,
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn attributes_for_overlay(
        &self,
        tenant_id: &TenantId,
        overlay_result_id: OverlayResultId,
    ) -> Result<Vec<LocationHazardAttribute>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, tenant_id, location_id, overlay_result_id, attributes_json \
                 FROM location_hazard_attribute \
                 WHERE tenant_id = ?1 AND overlay_result_id = ?2 ORDER BY id",
            )
            .map_err(map_sql)?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), overlay_result_id.value()],
                attribute_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn attributes_for_exposure(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<LocationHazardAttribute>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT a.id, a.tenant_id, a.location_id, a.overlay_result_id, \
                 a.attributes_json FROM location_hazard_attribute a \
                 JOIN location l ON l.id = a.location_id AND l.tenant_id = a.tenant_id \
                 WHERE a.tenant_id = ?1 AND l.exposure_version_id = ?2 ORDER BY a.id",
            )
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), version_id.value()], attribute_from_row)
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn delete_attributes_for_overlay(
        &self,
        tenant_id: &TenantId,
        overlay_result_id: OverlayResultId,
    ) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM location_hazard_attribute \
                 WHERE tenant_id = ?1 AND overlay_result_id = ?2",
                params![tenant_id.as_str(), overlay_result_id.value()],
            )
            .map_err(map_sql)?;
        u64::try_from(deleted).map_err(|err| StoreError::Invalid(err.to_string()))
    }

    fn overlay_results_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<HazardOverlayResult>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {OVERLAY_COLUMNS} FROM hazard_overlay_result \
                 WHERE tenant_id = ?1 AND exposure_version_id = ?2 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), version_id.value()], overlay_from_row)
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }
}

/// Maps one location hazard attribute row.
fn attribute_from_row(row: &Row<'_>) -> rusqlite::Result<LocationHazardAttribute> {
    Ok(LocationHazardAttribute {
        id: perilgrid_core::LocationHazardAttributeId::new(row.get(0)?),
        tenant_id: TenantId::new(row.get::<_, String>(1)?),
        location_id: LocationId::new(row.get(2)?),
        overlay_result_id: OverlayResultId::new(row.get(3)?),
        attributes: json_col(row, 4)?,
    })
}

// ============================================================================
// SECTION: Rollup Store
// ============================================================================

impl RollupStore for SqliteStore {
    fn insert_rollup_config(
        &self,
        config: &RollupConfig,
    ) -> Result<RollupConfigId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO rollup_config (tenant_id, name, version, dimensions_json, \
             filters_json, measures_json, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                config.tenant_id.as_str(),
                config.name,
                config.version,
                to_json(&config.dimensions)?,
                to_json(&config.filters)?,
                to_json(&config.measures)?,
                config.created_by.as_ref().map(|id| id.as_str().to_string()),
                config.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(RollupConfigId::new(conn.last_insert_rowid()))
    }

    fn rollup_config(
        &self,
        tenant_id: &TenantId,
        config_id: RollupConfigId,
    ) -> Result<Option<RollupConfig>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, name, version, dimensions_json, filters_json, \
             measures_json, created_by, created_at FROM rollup_config \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), config_id.value()],
            |row| {
                Ok(RollupConfig {
                    id: RollupConfigId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    version: row.get(3)?,
                    dimensions: json_col(row, 4)?,
                    filters: json_col(row, 5)?,
                    measures: json_col(row, 6)?,
                    created_by: row
                        .get::<_, Option<String>>(7)?
                        .map(perilgrid_core::UserId::new),
                    created_at: Timestamp::from_unix_millis(row.get(8)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn latest_rollup_config_version(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT MAX(version) FROM rollup_config WHERE tenant_id = ?1 AND name = ?2",
            params![tenant_id.as_str(), name],
            |row| row.get::<_, Option<i64>>(0),
        )
        .map_err(map_sql)
    }

    fn insert_rollup_result(
        &self,
        result: &RollupResult,
    ) -> Result<RollupResultId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO rollup_result (tenant_id, exposure_version_id, \
             rollup_config_id, run_id, overlay_result_ids_json, checksum, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.tenant_id.as_str(),
                result.exposure_version_id.value(),
                result.rollup_config_id.value(),
                result.run_id.map(RunId::value),
                to_json(&result.overlay_result_ids)?,
                result.checksum.as_ref().map(|digest| digest.value.clone()),
                result.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(RollupResultId::new(conn.last_insert_rowid()))
    }

    fn rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<Option<RollupResult>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {ROLLUP_RESULT_COLUMNS} FROM rollup_result \
                 WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), result_id.value()],
            rollup_result_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_rollup_result(&self, result: &RollupResult) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE rollup_result SET run_id = ?3, overlay_result_ids_json = ?4, \
                 checksum = ?5 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    result.tenant_id.as_str(),
                    result.id.value(),
                    result.run_id.map(RunId::value),
                    to_json(&result.overlay_result_ids)?,
                    result.checksum.as_ref().map(|digest| digest.value.clone()),
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("rollup result {}", result.id)));
        }
        Ok(())
    }

    fn insert_rollup_items(&self, items: &[RollupItem]) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for item in items {
            tx.execute(
                "INSERT INTO rollup_item (tenant_id, rollup_result_id, key_json, \
                 key_hash, metrics_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item.tenant_id.as_str(),
                    item.rollup_result_id.value(),
                    to_json(&item.key)?,
                    item.key_hash,
                    to_json(&item.metrics)?,
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn items_for_rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<Vec<RollupItem>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, tenant_id, rollup_result_id, key_json, key_hash, metrics_json \
                 FROM rollup_item WHERE tenant_id = ?1 AND rollup_result_id = ?2 \
                 ORDER BY id",
            )
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), result_id.value()], |row| {
                Ok(RollupItem {
                    id: perilgrid_core::RollupItemId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    rollup_result_id: RollupResultId::new(row.get(2)?),
                    key: json_col(row, 3)?,
                    key_hash: row.get(4)?,
                    metrics: json_col(row, 5)?,
                })
            })
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn delete_items_for_rollup_result(
        &self,
        tenant_id: &TenantId,
        result_id: RollupResultId,
    ) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM rollup_item WHERE tenant_id = ?1 AND rollup_result_id = ?2",
                params![tenant_id.as_str(), result_id.value()],
            )
            .map_err(map_sql)?;
        u64::try_from(deleted).map_err(|err| StoreError::Invalid(err.to_string()))
    }

    fn rollup_results_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<RollupResult>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {ROLLUP_RESULT_COLUMNS} FROM rollup_result \
                 WHERE tenant_id = ?1 AND exposure_version_id = ?2 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), version_id.value()],
                rollup_result_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Breach Store
// ============================================================================

impl BreachStore for SqliteStore {
    fn insert_threshold_rule(
        &self,
        rule: &ThresholdRule,
    ) -> Result<ThresholdRuleId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO threshold_rule (tenant_id, name, severity, active, rule_json, \
             created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rule.tenant_id.as_str(),
                rule.name,
                rule.severity,
                i64::from(rule.active),
                to_json(&rule.rule)?,
                rule.created_by.as_ref().map(|id| id.as_str().to_string()),
                rule.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(ThresholdRuleId::new(conn.last_insert_rowid()))
    }

    fn active_threshold_rules(
        &self,
        tenant_id: &TenantId,
        rule_ids: Option<&[ThresholdRuleId]>,
    ) -> Result<Vec<ThresholdRule>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, tenant_id, name, severity, active, rule_json, created_by, \
                 created_at FROM threshold_rule WHERE tenant_id = ?1 AND active = 1 \
                 ORDER BY id",
            )
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str()], |row| {
                Ok(ThresholdRule {
                    id: ThresholdRuleId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    severity: row.get(3)?,
                    active: row.get::<_, i64>(4)? != 0,
                    rule: json_col(row, 5)?,
                    created_by: row
                        .get::<_, Option<String>>(6)?
                        .map(perilgrid_core::UserId::new),
                    created_at: Timestamp::from_unix_millis(row.get(7)?),
                })
            })
            .map_err(map_sql)?;
        let mut rules = rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)?;
        if let Some(filter) = rule_ids {
            rules.retain(|rule| filter.contains(&rule.id));
        }
        Ok(rules)
    }

    fn breach_by_key(
        &self,
        tenant_id: &TenantId,
        rule_id: ThresholdRuleId,
        version_id: ExposureVersionId,
        rollup_key_hash: &str,
    ) -> Result<Option<Breach>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {BREACH_COLUMNS} FROM breach WHERE tenant_id = ?1 \
                 AND threshold_rule_id = ?2 AND exposure_version_id = ?3 \
                 AND rollup_key_hash = ?4"
            ),
            params![
                tenant_id.as_str(),
                rule_id.value(),
                version_id.value(),
                rollup_key_hash,
            ],
            breach_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn breach(
        &self,
        tenant_id: &TenantId,
        breach_id: BreachId,
    ) -> Result<Option<Breach>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {BREACH_COLUMNS} FROM breach WHERE tenant_id = ?1 AND id = ?2"),
            params![tenant_id.as_str(), breach_id.value()],
            breach_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_breach(&self, breach: &Breach) -> Result<BreachId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO breach (tenant_id, threshold_rule_id, exposure_version_id, \
             rollup_result_id, rollup_key_json, rollup_key_hash, metric_name, \
             metric_value, threshold_value, status, first_seen_at, last_seen_at, \
             resolved_at, last_eval_run_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                breach.tenant_id.as_str(),
                breach.threshold_rule_id.value(),
                breach.exposure_version_id.value(),
                breach.rollup_result_id.value(),
                to_json(&breach.rollup_key)?,
                breach.rollup_key_hash,
                breach.metric_name,
                breach.metric_value,
                breach.threshold_value,
                breach.status.as_str(),
                breach.first_seen_at.as_unix_millis(),
                breach.last_seen_at.as_unix_millis(),
                breach.resolved_at.map(Timestamp::as_unix_millis),
                breach.last_eval_run_id.map(RunId::value),
            ],
        )
        .map_err(map_sql)?;
        Ok(BreachId::new(conn.last_insert_rowid()))
    }

    fn update_breach(&self, breach: &Breach) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE breach SET rollup_result_id = ?3, rollup_key_json = ?4, \
                 metric_name = ?5, metric_value = ?6, threshold_value = ?7, status = ?8, \
                 last_seen_at = ?9, resolved_at = ?10, last_eval_run_id = ?11 \
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    breach.tenant_id.as_str(),
                    breach.id.value(),
                    breach.rollup_result_id.value(),
                    to_json(&breach.rollup_key)?,
                    breach.metric_name,
                    breach.metric_value,
                    breach.threshold_value,
                    breach.status.as_str(),
                    breach.last_seen_at.as_unix_millis(),
                    breach.resolved_at.map(Timestamp::as_unix_millis),
                    breach.last_eval_run_id.map(RunId::value),
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("breach {}", breach.id)));
        }
        Ok(())
    }

    fn breaches_for_rule_version(
        &self,
        tenant_id: &TenantId,
        rule_id: ThresholdRuleId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<Breach>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {BREACH_COLUMNS} FROM breach WHERE tenant_id = ?1 \
                 AND threshold_rule_id = ?2 AND exposure_version_id = ?3 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), rule_id.value(), version_id.value()],
                breach_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Drift Store
// ============================================================================

impl DriftStore for SqliteStore {
    fn insert_drift_run(&self, run: &DriftRun) -> Result<DriftRunId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO drift_run (tenant_id, exposure_version_a_id, \
             exposure_version_b_id, run_id, storage_uri, checksum, config_json, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.tenant_id.as_str(),
                run.exposure_version_a_id.value(),
                run.exposure_version_b_id.value(),
                run.run_id.map(RunId::value),
                run.storage_uri,
                run.checksum.as_ref().map(|digest| digest.value.clone()),
                to_json(&run.config)?,
                run.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(DriftRunId::new(conn.last_insert_rowid()))
    }

    fn drift_run(
        &self,
        tenant_id: &TenantId,
        drift_run_id: DriftRunId,
    ) -> Result<Option<DriftRun>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {DRIFT_COLUMNS} FROM drift_run WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), drift_run_id.value()],
            drift_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_drift_run(&self, run: &DriftRun) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE drift_run SET run_id = ?3, storage_uri = ?4, checksum = ?5, \
                 config_json = ?6 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    run.tenant_id.as_str(),
                    run.id.value(),
                    run.run_id.map(RunId::value),
                    run.storage_uri,
                    run.checksum.as_ref().map(|digest| digest.value.clone()),
                    to_json(&run.config)?,
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("drift run {}", run.id)));
        }
        Ok(())
    }

    fn insert_drift_details(&self, details: &[DriftDetail]) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for detail in details {
            tx.execute(
                "INSERT INTO drift_detail (tenant_id, drift_run_id, \
                 external_location_id, classification, delta_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    detail.tenant_id.as_str(),
                    detail.drift_run_id.value(),
                    detail.external_location_id,
                    detail.classification.as_str(),
                    to_json(&detail.delta)?,
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn delete_details_for_drift_run(
        &self,
        tenant_id: &TenantId,
        drift_run_id: DriftRunId,
    ) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM drift_detail WHERE tenant_id = ?1 AND drift_run_id = ?2",
                params![tenant_id.as_str(), drift_run_id.value()],
            )
            .map_err(map_sql)?;
        u64::try_from(deleted).map_err(|err| StoreError::Invalid(err.to_string()))
    }

    fn drift_runs_for_version(
        &self,
        tenant_id: &TenantId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<DriftRun>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {DRIFT_COLUMNS} FROM drift_run WHERE tenant_id = ?1 \
                 AND (exposure_version_a_id = ?2 OR exposure_version_b_id = ?2) \
                 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), version_id.value()], drift_from_row)
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Resilience Store
// ============================================================================

impl ResilienceStore for SqliteStore {
    fn insert_score_result(
        &self,
        result: &ResilienceScoreResult,
    ) -> Result<ScoreResultId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO resilience_score_result (tenant_id, exposure_version_id, \
             run_id, request_fingerprint, scoring_version, hazard_version_ids_json, \
             config_json, policy_pack_version_id, policy_used_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.tenant_id.as_str(),
                result.exposure_version_id.value(),
                result.run_id.map(RunId::value),
                result.request_fingerprint,
                result.scoring_version,
                to_json(&result.hazard_dataset_version_ids)?,
                to_json(&result.config)?,
                result.policy_pack_version_id.map(PolicyPackVersionId::value),
                to_json(&result.policy_used)?,
                result.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(ScoreResultId::new(conn.last_insert_rowid()))
    }

    fn score_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<Option<ResilienceScoreResult>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {SCORE_RESULT_COLUMNS} FROM resilience_score_result \
                 WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), result_id.value()],
            score_result_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn score_result_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
    ) -> Result<Option<ResilienceScoreResult>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {SCORE_RESULT_COLUMNS} FROM resilience_score_result \
                 WHERE tenant_id = ?1 AND request_fingerprint = ?2"
            ),
            params![tenant_id.as_str(), fingerprint],
            score_result_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn update_score_result(&self, result: &ResilienceScoreResult) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE resilience_score_result SET run_id = ?3, config_json = ?4, \
                 policy_pack_version_id = ?5, policy_used_json = ?6 \
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    result.tenant_id.as_str(),
                    result.id.value(),
                    result.run_id.map(RunId::value),
                    to_json(&result.config)?,
                    result.policy_pack_version_id.map(PolicyPackVersionId::value),
                    to_json(&result.policy_used)?,
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("score result {}", result.id)));
        }
        Ok(())
    }

    fn insert_score_items(&self, items: &[ResilienceScoreItem]) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sql)?;
        let mut inserted = 0_u64;
        for item in items {
            tx.execute(
                "INSERT INTO resilience_score_item (tenant_id, score_result_id, \
                 location_id, resilience_score, risk_score, hazards_json, \
                 breakdown_json, decision_json, explainability_json, \
                 input_structural_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    item.tenant_id.as_str(),
                    item.score_result_id.value(),
                    item.location_id.value(),
                    item.resilience_score,
                    item.risk_score,
                    to_json(&item.hazards)?,
                    to_json(&item.breakdown)?,
                    to_json(&item.decision)?,
                    to_json(&item.explainability)?,
                    to_json(&item.input_structural)?,
                ],
            )
            .map_err(map_sql)?;
            inserted += 1;
        }
        tx.commit().map_err(map_sql)?;
        Ok(inserted)
    }

    fn score_items_for_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<Vec<ResilienceScoreItem>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {SCORE_ITEM_COLUMNS} FROM resilience_score_item \
                 WHERE tenant_id = ?1 AND score_result_id = ?2 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), result_id.value()],
                score_item_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn score_items_page(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
        after: ScoreItemId,
        limit: u64,
    ) -> Result<Vec<ResilienceScoreItem>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {SCORE_ITEM_COLUMNS} FROM resilience_score_item \
                 WHERE tenant_id = ?1 AND score_result_id = ?2 AND id > ?3 \
                 ORDER BY id LIMIT ?4"
            ))
            .map_err(map_sql)?;
        let limit = i64::try_from(limit)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), result_id.value(), after.value(), limit],
                score_item_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }

    fn delete_items_for_score_result(
        &self,
        tenant_id: &TenantId,
        result_id: ScoreResultId,
    ) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM resilience_score_item \
                 WHERE tenant_id = ?1 AND score_result_id = ?2",
                params![tenant_id.as_str(), result_id.value()],
            )
            .map_err(map_sql)?;
        u64::try_from(deleted).map_err(|err| StoreError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Profile Store
// ============================================================================

impl ProfileStore for SqliteStore {
    fn profile_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
    ) -> Result<Option<PropertyProfile>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM property_profile \
                 WHERE tenant_id = ?1 AND address_fingerprint = ?2"
            ),
            params![tenant_id.as_str(), fingerprint],
            profile_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn profile(
        &self,
        tenant_id: &TenantId,
        profile_id: PropertyProfileId,
    ) -> Result<Option<PropertyProfile>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM property_profile \
                 WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant_id.as_str(), profile_id.value()],
            profile_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn upsert_profile(
        &self,
        profile: &PropertyProfile,
    ) -> Result<PropertyProfileId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO property_profile (tenant_id, location_id, address_fingerprint, \
             standardized_address_json, geocode_json, parcel_json, characteristics_json, \
             structural_json, provenance_json, code_version, updated_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT (tenant_id, address_fingerprint) DO UPDATE SET \
             location_id = excluded.location_id, \
             standardized_address_json = excluded.standardized_address_json, \
             geocode_json = excluded.geocode_json, parcel_json = excluded.parcel_json, \
             characteristics_json = excluded.characteristics_json, \
             structural_json = excluded.structural_json, \
             provenance_json = excluded.provenance_json, \
             code_version = excluded.code_version, updated_at = excluded.updated_at",
            params![
                profile.tenant_id.as_str(),
                profile.location_id.map(LocationId::value),
                profile.address_fingerprint,
                to_json(&profile.standardized_address)?,
                profile.geocode.as_ref().map(to_json).transpose()?,
                profile.parcel.as_ref().map(to_json).transpose()?,
                profile.characteristics.as_ref().map(to_json).transpose()?,
                to_json(&profile.structural)?,
                to_json(&profile.provenance)?,
                profile.code_version,
                profile.updated_at.as_unix_millis(),
                profile.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        let id: i64 = conn
            .query_row(
                "SELECT id FROM property_profile \
                 WHERE tenant_id = ?1 AND address_fingerprint = ?2",
                params![profile.tenant_id.as_str(), profile.address_fingerprint],
                |row| row.get(0),
            )
            .map_err(map_sql)?;
        Ok(PropertyProfileId::new(id))
    }
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

impl PolicyStore for SqliteStore {
    fn insert_policy_pack(&self, pack: &PolicyPack) -> Result<PolicyPackId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO policy_pack (tenant_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                pack.tenant_id.as_str(),
                pack.name,
                pack.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(PolicyPackId::new(conn.last_insert_rowid()))
    }

    fn policy_pack(
        &self,
        tenant_id: &TenantId,
        pack_id: PolicyPackId,
    ) -> Result<Option<PolicyPack>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, name, created_at FROM policy_pack \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), pack_id.value()],
            |row| {
                Ok(PolicyPack {
                    id: PolicyPackId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    created_at: Timestamp::from_unix_millis(row.get(3)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_policy_pack_version(
        &self,
        version: &PolicyPackVersion,
    ) -> Result<PolicyPackVersionId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO policy_pack_version (tenant_id, policy_pack_id, version_label, \
             scoring_config_json, underwriting_policy_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                version.tenant_id.as_str(),
                version.policy_pack_id.value(),
                version.version_label,
                to_json(&version.scoring_config)?,
                to_json(&version.underwriting_policy)?,
                version.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(PolicyPackVersionId::new(conn.last_insert_rowid()))
    }

    fn policy_pack_version(
        &self,
        tenant_id: &TenantId,
        version_id: PolicyPackVersionId,
    ) -> Result<Option<PolicyPackVersion>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, policy_pack_id, version_label, scoring_config_json, \
             underwriting_policy_json, created_at FROM policy_pack_version \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), version_id.value()],
            |row| {
                Ok(PolicyPackVersion {
                    id: PolicyPackVersionId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    policy_pack_id: PolicyPackId::new(row.get(2)?),
                    version_label: row.get(3)?,
                    scoring_config: json_col(row, 4)?,
                    underwriting_policy: json_col(row, 5)?,
                    created_at: Timestamp::from_unix_millis(row.get(6)?),
                })
            },
        )
        .optional()
        .map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Underwriting Store
// ============================================================================

impl UwStore for SqliteStore {
    fn insert_uw_rule(&self, rule: &UwRule) -> Result<UwRuleId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO uw_rule (tenant_id, name, category, severity, target, active, \
             rule_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.tenant_id.as_str(),
                rule.name,
                rule.category,
                rule.severity,
                rule.target.as_str(),
                i64::from(rule.active),
                to_json(&rule.rule)?,
                rule.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(UwRuleId::new(conn.last_insert_rowid()))
    }

    fn active_uw_rules(
        &self,
        tenant_id: &TenantId,
        rule_ids: Option<&[UwRuleId]>,
    ) -> Result<Vec<UwRule>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, tenant_id, name, category, severity, target, active, \
                 rule_json, created_at FROM uw_rule WHERE tenant_id = ?1 AND active = 1 \
                 ORDER BY id",
            )
            .map_err(map_sql)?;
        let rows = statement
            .query_map(params![tenant_id.as_str()], |row| {
                Ok(UwRule {
                    id: UwRuleId::new(row.get(0)?),
                    tenant_id: TenantId::new(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    category: row.get(3)?,
                    severity: row.get(4)?,
                    target: enum_col(row, 5, UwTarget::parse)?,
                    active: row.get::<_, i64>(6)? != 0,
                    rule: json_col(row, 7)?,
                    created_at: Timestamp::from_unix_millis(row.get(8)?),
                })
            })
            .map_err(map_sql)?;
        let mut rules = rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)?;
        if let Some(filter) = rule_ids {
            rules.retain(|rule| filter.contains(&rule.id));
        }
        Ok(rules)
    }

    fn uw_finding_by_location(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
        location_id: LocationId,
    ) -> Result<Option<UwFinding>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {UW_FINDING_COLUMNS} FROM uw_finding WHERE tenant_id = ?1 \
                 AND uw_rule_id = ?2 AND exposure_version_id = ?3 AND location_id = ?4"
            ),
            params![
                tenant_id.as_str(),
                rule_id.value(),
                version_id.value(),
                location_id.value(),
            ],
            uw_finding_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn uw_finding_by_rollup_key(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
        rollup_key_hash: &str,
    ) -> Result<Option<UwFinding>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {UW_FINDING_COLUMNS} FROM uw_finding WHERE tenant_id = ?1 \
                 AND uw_rule_id = ?2 AND exposure_version_id = ?3 \
                 AND rollup_key_hash = ?4"
            ),
            params![
                tenant_id.as_str(),
                rule_id.value(),
                version_id.value(),
                rollup_key_hash,
            ],
            uw_finding_from_row,
        )
        .optional()
        .map_err(map_sql)
    }

    fn insert_uw_finding(&self, finding: &UwFinding) -> Result<UwFindingId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO uw_finding (tenant_id, uw_rule_id, exposure_version_id, \
             location_id, rollup_result_id, rollup_key_hash, status, disposition, \
             explanation_json, first_seen_at, last_seen_at, resolved_at, \
             last_eval_run_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                finding.tenant_id.as_str(),
                finding.uw_rule_id.value(),
                finding.exposure_version_id.value(),
                finding.location_id.map(LocationId::value),
                finding.rollup_result_id.map(RollupResultId::value),
                finding.rollup_key_hash,
                finding.status.as_str(),
                finding.disposition,
                to_json(&finding.explanation)?,
                finding.first_seen_at.as_unix_millis(),
                finding.last_seen_at.as_unix_millis(),
                finding.resolved_at.map(Timestamp::as_unix_millis),
                finding.last_eval_run_id.map(RunId::value),
            ],
        )
        .map_err(map_sql)?;
        Ok(UwFindingId::new(conn.last_insert_rowid()))
    }

    fn update_uw_finding(&self, finding: &UwFinding) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE uw_finding SET rollup_result_id = ?3, status = ?4, \
                 disposition = ?5, explanation_json = ?6, last_seen_at = ?7, \
                 resolved_at = ?8, last_eval_run_id = ?9 \
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    finding.tenant_id.as_str(),
                    finding.id.value(),
                    finding.rollup_result_id.map(RollupResultId::value),
                    finding.status.as_str(),
                    finding.disposition,
                    to_json(&finding.explanation)?,
                    finding.last_seen_at.as_unix_millis(),
                    finding.resolved_at.map(Timestamp::as_unix_millis),
                    finding.last_eval_run_id.map(RunId::value),
                ],
            )
            .map_err(map_sql)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("uw finding {}", finding.id)));
        }
        Ok(())
    }

    fn uw_findings_for_rule_version(
        &self,
        tenant_id: &TenantId,
        rule_id: UwRuleId,
        version_id: ExposureVersionId,
    ) -> Result<Vec<UwFinding>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {UW_FINDING_COLUMNS} FROM uw_finding WHERE tenant_id = ?1 \
                 AND uw_rule_id = ?2 AND exposure_version_id = ?3 ORDER BY id"
            ))
            .map_err(map_sql)?;
        let rows = statement
            .query_map(
                params![tenant_id.as_str(), rule_id.value(), version_id.value()],
                uw_finding_from_row,
            )
            .map_err(map_sql)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql)
    }
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

impl AuditStore for SqliteStore {
    fn append_audit_event(&self, event: &AuditEvent) -> Result<AuditEventId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_event (tenant_id, user_id, action, metadata_json, \
             request_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.tenant_id.as_str(),
                event.user_id.as_ref().map(|id| id.as_str().to_string()),
                event.action,
                to_json(&event.metadata)?,
                event.request_id.as_ref().map(|id| id.as_str().to_string()),
                event.created_at.as_unix_millis(),
            ],
        )
        .map_err(map_sql)?;
        Ok(AuditEventId::new(conn.last_insert_rowid()))
    }
}
