// perilgrid-core/src/lib.rs
// ============================================================================
// Module: Perilgrid Core Library
// Description: Public API surface for the Perilgrid pipeline core.
// Purpose: Expose core types, interfaces, stage engines, and the runtime.
// Dependencies: crate::{core, interfaces, runtime, stages}
// ============================================================================

//! ## Overview
//! Perilgrid core provides the deterministic job-execution and data-pipeline
//! engine for property-exposure analytics: canonical hashing, tenant-scoped
//! entities, a run state machine with cancel/retry, pure stage engines, and
//! the control plane. It is backend-agnostic and integrates through explicit
//! interfaces rather than embedding a storage or transport stack.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod stages;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::AuditStore;
pub use interfaces::BreachStore;
pub use interfaces::CharacteristicsProvider;
pub use interfaces::Clock;
pub use interfaces::DriftStore;
pub use interfaces::ExposureStore;
pub use interfaces::Geocoder;
pub use interfaces::HazardStore;
pub use interfaces::ObjectStore;
pub use interfaces::ObjectStoreError;
pub use interfaces::ParcelProvider;
pub use interfaces::PolicyStore;
pub use interfaces::ProfileStore;
pub use interfaces::ProviderSet;
pub use interfaces::ResilienceStore;
pub use interfaces::RollupStore;
pub use interfaces::RunStore;
pub use interfaces::Store;
pub use interfaces::StoreError;
pub use interfaces::StoredObject;
pub use interfaces::TaskQueue;
pub use interfaces::UwStore;
pub use runtime::BatchScoreOutcome;
pub use runtime::BatchScoreStatus;
pub use runtime::CommitOutcome;
pub use runtime::ControlPlane;
pub use runtime::ControlPlaneError;
pub use runtime::LineageEntityType;
pub use runtime::LineageGraph;
pub use runtime::LineageRelation;
pub use runtime::ProfileResolution;
pub use runtime::ProfileResolutionStatus;
pub use runtime::RegistryError;
pub use runtime::RunHandle;
pub use runtime::RunRegistry;
pub use runtime::RuntimeOptions;
pub use runtime::ScoreResilienceResponse;
pub use runtime::build_lineage;
