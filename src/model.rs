use serde::{Deserialize, Serialize};
use tracing::debug;

/// A catalog entry as read from the authoritative source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub owner: String,
    /// Remote asset references; zero or one entry.
    pub assets: Vec<String>,
    pub photo_length: i64,
}

impl Product {
    /// Listing row with no asset resolved yet.
    pub fn listed(
        code: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            price,
            owner: owner.into(),
            assets: Vec::new(),
            photo_length: 0,
        }
    }
}

/// Result of the targeted per-product read.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetail {
    /// Raw photo bytes; empty when the source has none.
    pub photo: Vec<u8>,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    Listing,
    Fetch,
    Stage,
    Upload,
    Publish,
    Ledger,
}

impl PendingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingReason::Listing => "listing",
            PendingReason::Fetch => "fetch",
            PendingReason::Stage => "stage",
            PendingReason::Upload => "upload",
            PendingReason::Publish => "publish",
            PendingReason::Ledger => "ledger",
        }
    }
}

/// A product whose sync did not complete this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub code: String,
    pub reason: PendingReason,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub products: usize,
    pub uploaded: usize,
    pub published: usize,
    pub unchanged: usize,
    pub unsynced: usize,
    pub pending: Vec<PendingAction>,
}

impl CycleReport {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn mark_pending(&mut self, code: &str, reason: PendingReason) {
        debug!(code, reason = reason.as_str(), "marked pending");
        self.pending.push(PendingAction {
            code: code.to_string(),
            reason,
        });
    }

    /// One-line summary handed to the notifier.
    pub fn status_line(&self) -> String {
        match self.pending_count() {
            0 => "Up to date, waiting for changes".to_string(),
            n => format!("Pending actions: {}", n),
        }
    }
}
