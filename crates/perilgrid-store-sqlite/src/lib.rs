// perilgrid-store-sqlite/src/lib.rs
// ============================================================================
// Module: Perilgrid SQLite Store Library
// Description: Durable tenant-scoped store backed by SQLite WAL.
// Purpose: Persist entities, the task queue, and spatial features.
// Dependencies: perilgrid-core, rusqlite, serde, serde_json
// ============================================================================

//! ## Overview
//! This crate implements every Perilgrid store seam over a single SQLite
//! database: entity CRUD with tenant predicates on every statement, unique
//! constraints surfaced as typed conflicts, the durable FIFO task queue, and
//! hazard feature storage with a bounding-box prefilter confirmed by the
//! exact multipolygon containment test.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
