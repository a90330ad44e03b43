use super::model::SyncRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid ledger URL: {}", normalized))?
        .create_if_missing(true)
        // WAL and stricter durability on every pooled connection.
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open ledger at {}", normalized))?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

/// Create the `sync_status` table when absent.
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all, fields(code = %code))]
pub async fn exists(pool: &Pool, code: &str) -> Result<bool> {
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sync_status WHERE code = ?)")
            .bind(code)
            .fetch_one(pool)
            .await?;
    Ok(found)
}

/// Insert or replace the ledger row for `code`.
///
/// A row whose stored values already match is left untouched, `last_synced`
/// included, so replaying the same acknowledgement is a no-op. Returns whether
/// the row was inserted or changed.
#[instrument(skip_all, fields(code = %code))]
pub async fn upsert(
    pool: &Pool,
    code: &str,
    photo_size: i64,
    asset_id: Option<i64>,
    name: &str,
    price: f64,
) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO sync_status (code, last_synced, photo_size, asset_id, name, price)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET
             last_synced = excluded.last_synced,
             photo_size = excluded.photo_size,
             asset_id = excluded.asset_id,
             name = excluded.name,
             price = excluded.price
         WHERE sync_status.photo_size IS NOT excluded.photo_size
            OR sync_status.asset_id IS NOT excluded.asset_id
            OR sync_status.name IS NOT excluded.name
            OR sync_status.price IS NOT excluded.price",
    )
    .bind(code)
    .bind(Utc::now())
    .bind(photo_size)
    .bind(asset_id)
    .bind(name)
    .bind(price)
    .execute(pool)
    .await?;
    let changed = res.rows_affected() > 0;
    debug!(changed, photo_size, ?asset_id, "ledger upsert");
    Ok(changed)
}

#[instrument(skip_all, fields(code = %code))]
pub async fn lookup(pool: &Pool, code: &str) -> Result<Option<SyncRecord>> {
    let row = sqlx::query(
        "SELECT code, last_synced, photo_size, asset_id, name, price FROM sync_status WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;
    row.map(|r| map_record(&r)).transpose()
}

#[instrument(skip_all)]
pub async fn list_records(pool: &Pool) -> Result<Vec<SyncRecord>> {
    let rows = sqlx::query(
        "SELECT code, last_synced, photo_size, asset_id, name, price FROM sync_status ORDER BY code",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_record).collect()
}

fn map_record(row: &SqliteRow) -> Result<SyncRecord> {
    let last_synced: DateTime<Utc> = row.try_get("last_synced")?;
    Ok(SyncRecord {
        code: row.try_get("code")?,
        last_synced,
        photo_size: row.try_get("photo_size")?,
        asset_id: row.try_get("asset_id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn exists_tracks_upserts() {
        let pool = setup_pool().await;
        assert!(!exists(&pool, "P001").await.unwrap());
        assert!(lookup(&pool, "P001").await.unwrap().is_none());

        assert!(upsert(&pool, "P001", 100, Some(42), "Widget", 10.0).await.unwrap());
        assert!(exists(&pool, "P001").await.unwrap());

        let rec = lookup(&pool, "P001").await.unwrap().unwrap();
        assert_eq!(rec.photo_size, 100);
        assert_eq!(rec.asset_id, Some(42));
        assert_eq!(rec.name, "Widget");
        assert_eq!(rec.price, 10.0);
        assert_eq!(rec.asset_refs(), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn upsert_replaces_with_latest_values() {
        let pool = setup_pool().await;
        upsert(&pool, "P002", 10, Some(1), "Widget", 5.0).await.unwrap();
        upsert(&pool, "P002", 0, None, "Widget Pro", 7.5).await.unwrap();

        let all = list_records(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        let rec = &all[0];
        assert_eq!(rec.name, "Widget Pro");
        assert_eq!(rec.price, 7.5);
        assert_eq!(rec.photo_size, 0);
        assert_eq!(rec.asset_id, None);
        assert!(rec.asset_refs().is_empty());
    }

    #[tokio::test]
    async fn identical_replay_leaves_row_untouched() {
        let pool = setup_pool().await;
        assert!(upsert(&pool, "P003", 7, None, "Gadget", 1.5).await.unwrap());
        let before = lookup(&pool, "P003").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(!upsert(&pool, "P003", 7, None, "Gadget", 1.5).await.unwrap());
        let after = lookup(&pool, "P003").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn prepare_url_passes_memory_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/db"),
            "postgres://localhost/db"
        );
    }

    #[test]
    fn prepare_url_creates_parent_dir() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("ledger.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let rebuilt = prepare_sqlite_url(&url);
        assert_eq!(rebuilt, url);
        assert!(td.path().join("nested").exists());
    }
}
