//! Sync ledger: the local record of what the ingestion service has acknowledged.
//!
//! This module is split into two submodules:
//! - `model`: the `SyncRecord` entity.
//! - `repo`: SQL-only functions over the `sync_status` table.
//!
//! Callers import from `catalog_mirror::db`; the repository API is re-exported.

pub mod model;
pub mod repo;

pub use model::SyncRecord;
pub use repo::*;
