//! Read side of the authoritative catalog.
//!
//! Two logically separate reads: the bulk listing and a per-code detail fetch.
//! They share no transaction, so a row may change or vanish between them.
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config;
use crate::model::{Product, ProductDetail};

pub const DEFAULT_LIST_QUERY: &str = "SELECT code, name, price, owner FROM products";
pub const DEFAULT_DETAIL_QUERY: &str = "SELECT photo, name, price FROM products WHERE code = ?";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("catalog query timed out after {0:?}")]
    Timeout(Duration),
    #[error("product {0} not found in catalog")]
    NotFound(String),
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every product with code, name, price and owner. Assets are left empty.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Photo bytes, name and price for one code.
    async fn fetch_detail(&self, code: &str) -> Result<ProductDetail>;
}

/// Catalog backed by a SQL database reachable through sqlx.
#[derive(Debug, Clone)]
pub struct SqlCatalog {
    pool: SqlitePool,
    list_query: String,
    detail_query: String,
    timeout: Duration,
}

impl SqlCatalog {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self {
            pool,
            list_query: DEFAULT_LIST_QUERY.to_string(),
            detail_query: DEFAULT_DETAIL_QUERY.to_string(),
            timeout,
        }
    }

    /// Override the listing and detail queries for a legacy schema.
    pub fn with_queries(mut self, list_query: Option<&str>, detail_query: Option<&str>) -> Self {
        if let Some(q) = list_query {
            self.list_query = q.to_string();
        }
        if let Some(q) = detail_query {
            self.detail_query = q.to_string();
        }
        self
    }

    /// Open the catalog read-only. Fails when the source is unreachable.
    pub async fn connect(cfg: &config::Source) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&cfg.url)
            .with_context(|| format!("invalid catalog URL: {}", cfg.url))?
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(cfg.query_timeout())
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to catalog at {}", cfg.url))?;
        info!(url = %cfg.url, "connected to catalog source");
        Ok(Self::new(pool, cfg.query_timeout())
            .with_queries(cfg.list_query.as_deref(), cfg.detail_query.as_deref()))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(SourceError::Timeout(self.timeout).into()),
        }
    }
}

#[async_trait]
impl CatalogSource for SqlCatalog {
    #[instrument(skip_all)]
    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = self
            .bounded(sqlx::query(&self.list_query).fetch_all(&self.pool))
            .await
            .context("failed to list products")?;
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let owner: Option<String> = row.try_get(3)?;
            products.push(Product::listed(
                row.try_get::<String, _>(0)?,
                row.try_get::<String, _>(1)?,
                row.try_get::<f64, _>(2)?,
                owner.unwrap_or_default(),
            ));
        }
        info!(count = products.len(), "listed catalog products");
        Ok(products)
    }

    #[instrument(skip_all, fields(code = %code))]
    async fn fetch_detail(&self, code: &str) -> Result<ProductDetail> {
        let row = self
            .bounded(sqlx::query(&self.detail_query).bind(code).fetch_optional(&self.pool))
            .await
            .with_context(|| format!("failed to fetch detail for {}", code))?
            .ok_or_else(|| SourceError::NotFound(code.to_string()))?;
        let photo: Option<Vec<u8>> = row.try_get(0)?;
        Ok(ProductDetail {
            photo: photo.unwrap_or_default(),
            name: row.try_get(1)?,
            price: row.try_get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn catalog() -> SqlCatalog {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE products (code TEXT PRIMARY KEY, name TEXT NOT NULL, price REAL NOT NULL, owner TEXT, photo BLOB)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO products VALUES ('A1', 'Anvil', 12.5, 'acme', x'FFD8FF'), ('B2', 'Bolt', 0.25, NULL, NULL)")
            .execute(&pool)
            .await
            .unwrap();
        SqlCatalog::new(pool, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn lists_all_rows() {
        let cat = catalog().await;
        let mut products = cat.list_products().await.unwrap();
        products.sort_by(|a, b| a.code.cmp(&b.code));
        assert_eq!(products.len(), 2);
        assert_eq!(products[0], Product::listed("A1", "Anvil", 12.5, "acme"));
        assert_eq!(products[1].owner, "");
        assert!(products[1].assets.is_empty());
    }

    #[tokio::test]
    async fn detail_reads_photo_or_empty() {
        let cat = catalog().await;
        let a = cat.fetch_detail("A1").await.unwrap();
        assert_eq!(a.photo, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(a.name, "Anvil");

        let b = cat.fetch_detail("B2").await.unwrap();
        assert!(b.photo.is_empty());
        assert_eq!(b.price, 0.25);
    }

    #[tokio::test]
    async fn detail_for_missing_code_is_not_found() {
        let cat = catalog().await;
        let err = cat.fetch_detail("ZZ").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::NotFound(code)) if code == "ZZ"
        ));
    }

    #[tokio::test]
    async fn custom_queries_map_legacy_columns() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE items (sku TEXT, title TEXT, cost REAL, author TEXT, img BLOB)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO items VALUES ('X', 'Thing', 3.0, 'me', NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let cat = SqlCatalog::new(pool, Duration::from_secs(5)).with_queries(
            Some("SELECT sku, title, cost, author FROM items"),
            Some("SELECT img, title, cost FROM items WHERE sku = ?"),
        );
        let listed = cat.list_products().await.unwrap();
        assert_eq!(listed, vec![Product::listed("X", "Thing", 3.0, "me")]);
        let detail = cat.fetch_detail("X").await.unwrap();
        assert!(detail.photo.is_empty());
    }
}
