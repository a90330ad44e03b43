#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use catalog_mirror::db;
use catalog_mirror::ingest::{AssetUploader, CatalogPublisher};
use catalog_mirror::model::{ActionKind, Product, ProductDetail};
use catalog_mirror::notify::Notifier;
use catalog_mirror::source::CatalogSource;

pub async fn setup_ledger() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(PathBuf),
    Publish { kind: ActionKind, product: Product },
}

/// Ingestion service double that records every call in order.
#[derive(Clone, Default)]
pub struct RecordingIngest {
    upload_responses: Arc<Mutex<VecDeque<Result<i64>>>>,
    publish_responses: Arc<Mutex<VecDeque<Result<()>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingIngest {
    pub fn with_uploads(responses: Vec<Result<i64>>) -> Self {
        Self {
            upload_responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub async fn push_publish_response(&self, response: Result<()>) {
        self.publish_responses.lock().await.push_back(response);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn uploads(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, Call::Upload(_)))
            .count()
    }

    pub async fn publishes(&self) -> Vec<(ActionKind, Product)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::Publish { kind, product } => Some((*kind, product.clone())),
                Call::Upload(_) => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl AssetUploader for RecordingIngest {
    async fn upload_asset(&self, path: &Path) -> Result<i64> {
        self.calls.lock().await.push(Call::Upload(path.to_path_buf()));
        let mut guard = self.upload_responses.lock().await;
        guard.pop_front().unwrap_or(Ok(1))
    }
}

#[async_trait::async_trait]
impl CatalogPublisher for RecordingIngest {
    async fn publish(&self, product: &Product, kind: ActionKind) -> Result<()> {
        self.calls.lock().await.push(Call::Publish {
            kind,
            product: product.clone(),
        });
        let mut guard = self.publish_responses.lock().await;
        guard.pop_front().unwrap_or(Ok(()))
    }
}

#[derive(Debug, Clone)]
struct Row {
    code: String,
    name: String,
    price: f64,
    owner: String,
    photo: Vec<u8>,
}

/// In-memory catalog whose listing and detail reads can fail independently.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    rows: Arc<Mutex<Vec<Row>>>,
    failing_details: Arc<Mutex<HashSet<String>>>,
    listing_fails: Arc<Mutex<bool>>,
}

impl FakeCatalog {
    pub async fn set(&self, code: &str, name: &str, price: f64, photo: Vec<u8>) {
        let mut rows = self.rows.lock().await;
        let row = Row {
            code: code.into(),
            name: name.into(),
            price,
            owner: "shop".into(),
            photo,
        };
        match rows.iter_mut().find(|r| r.code == code) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    pub async fn fail_detail_for(&self, code: &str) {
        self.failing_details.lock().await.insert(code.to_string());
    }

    pub async fn fail_listing(&self) {
        *self.listing_fails.lock().await = true;
    }
}

#[async_trait::async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_products(&self) -> Result<Vec<Product>> {
        if *self.listing_fails.lock().await {
            return Err(anyhow!("catalog unreachable"));
        }
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .map(|r| Product::listed(r.code.clone(), r.name.clone(), r.price, r.owner.clone()))
            .collect())
    }

    async fn fetch_detail(&self, code: &str) -> Result<ProductDetail> {
        if self.failing_details.lock().await.contains(code) {
            return Err(anyhow!("product {} vanished", code));
        }
        let rows = self.rows.lock().await;
        let row = rows
            .iter()
            .find(|r| r.code == code)
            .ok_or_else(|| anyhow!("product {} not found", code))?;
        Ok(ProductDetail {
            photo: row.photo.clone(),
            name: row.name.clone(),
            price: row.price,
        })
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl RecordingNotifier {
    pub async fn messages(&self) -> Vec<(String, String, String)> {
        self.messages.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, subtitle: &str, body: &str) {
        self.messages
            .lock()
            .await
            .push((title.to_string(), subtitle.to_string(), body.to_string()));
    }
}

/// `n` bytes starting with a JPEG marker.
pub fn jpeg_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    bytes[0] = 0xFF;
    bytes[1] = 0xD8;
    bytes
}
