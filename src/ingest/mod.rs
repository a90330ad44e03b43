//! Client for the remote ingestion service: catalog publishes and asset uploads.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::ingest::model::{parse_asset_id, ProductPayload};
use crate::model::{ActionKind, Product};

pub mod model;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to upload asset")]
    UploadFailed,
    #[error("ingestion service rejected {kind} for {code}: {status}: {body}")]
    Rejected {
        kind: &'static str,
        code: String,
        status: StatusCode,
        body: String,
    },
}

/// Sends a staged file and returns the remote asset id.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload_asset(&self, path: &Path) -> Result<i64>;
}

/// Creates, updates or deletes a catalog entry remotely.
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    async fn publish(&self, product: &Product, kind: ActionKind) -> Result<()>;
}

#[derive(Clone)]
pub struct IngestClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for IngestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl IngestClient {
    pub fn new(base_url: Url, timeout: std::time::Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("catalog-mirror/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.ingest.base_url)
            .with_context(|| format!("invalid ingest base URL: {}", cfg.ingest.base_url))?;
        Self::new(base_url, cfg.ingest.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn build_publish_request(
        &self,
        product: &Product,
        kind: ActionKind,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("products")
            .context("invalid ingest base URL")?;
        let method = match kind {
            ActionKind::Create => Method::POST,
            ActionKind::Update => Method::PUT,
            ActionKind::Delete => Method::DELETE,
        };
        self.http
            .request(method, endpoint)
            .header("Content-Type", "application/json")
            .json(&ProductPayload::from(product))
            .build()
            .context("failed to build publish request")
    }

    /// Multipart request streaming the file at `path` as field `file`.
    pub async fn build_upload_request(&self, path: &Path) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("products/uploadAsset")
            .context("invalid ingest base URL")?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid file name: {}", path.display()))?
            .to_string();
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open staged file: {}", path.display()))?;
        let len = file.metadata().await?.len();
        let part = Part::stream_with_length(Body::from(file), len)
            .file_name(file_name)
            .mime_str(content_type_for(path))?;
        let form = Form::new().part("file", part);
        self.http
            .post(endpoint)
            .multipart(form)
            .build()
            .context("failed to build upload request")
    }

    async fn try_upload(&self, path: &Path) -> Result<i64> {
        let request = self.build_upload_request(path).await?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach ingestion service")?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("upload returned {}: {}", status, body));
        }
        let body: Value = res.json().await.context("invalid upload response JSON")?;
        parse_asset_id(&body).ok_or_else(|| anyhow!("upload response has no numeric id: {}", body))
    }
}

#[async_trait]
impl AssetUploader for IngestClient {
    #[instrument(skip_all, fields(path = %path.display()))]
    async fn upload_asset(&self, path: &Path) -> Result<i64> {
        match self.try_upload(path).await {
            Ok(id) => {
                info!(asset_id = id, "asset uploaded");
                Ok(id)
            }
            Err(err) => {
                warn!(?err, "asset upload failed");
                Err(IngestError::UploadFailed.into())
            }
        }
    }
}

#[async_trait]
impl CatalogPublisher for IngestClient {
    #[instrument(skip_all, fields(code = %product.code, kind = kind.as_str()))]
    async fn publish(&self, product: &Product, kind: ActionKind) -> Result<()> {
        let request = self.build_publish_request(product, kind)?;
        debug!(url = %request.url(), method = %request.method(), "publishing product");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach ingestion service")?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(IngestError::Rejected {
                kind: kind.as_str(),
                code: product.code.clone(),
                status,
                body,
            }
            .into());
        }
        info!(%status, "product published");
        Ok(())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
