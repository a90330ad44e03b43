//! Ledger entity returned by repositories.
//!
//! Keep this struct focused on the stored row. Comparison and merge logic
//! lives in the reconciliation engine.

use chrono::{DateTime, Utc};

/// Last state of a product acknowledged by the ingestion service.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    pub code: String,
    pub last_synced: DateTime<Utc>,
    pub photo_size: i64,
    pub asset_id: Option<i64>,
    pub name: String,
    pub price: f64,
}

impl SyncRecord {
    /// Asset reference list in the shape the ingestion service expects.
    pub fn asset_refs(&self) -> Vec<String> {
        self.asset_id.map(|id| id.to_string()).into_iter().collect()
    }
}
