use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid file-name regex"));

/// A photo written to scratch space, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub path: PathBuf,
    pub size: i64,
}

/// Writes product photos to `{dir}/{code}.jpeg`, one file per product code.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic staging path for a product code.
    pub fn path_for(&self, code: &str) -> PathBuf {
        let safe = UNSAFE_FILE_CHARS.replace_all(code, "_");
        self.dir.join(format!("{}.jpeg", safe))
    }

    /// Write `bytes` for `code`, replacing any earlier staged file.
    #[instrument(skip_all, fields(code = %code))]
    pub async fn stage(&self, code: &str, bytes: &[u8]) -> Result<StagedAsset> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create staging dir: {}", self.dir.display()))?;
        let path = self.path_for(code);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write staged photo: {}", path.display()))?;
        let size = fs::metadata(&path)
            .await
            .with_context(|| format!("failed to stat staged photo: {}", path.display()))?
            .len() as i64;
        debug!(path = %path.display(), size, "photo staged");
        Ok(StagedAsset { path, size })
    }

    /// Remove files left behind by an interrupted run. Returns how many were removed.
    pub async fn purge(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read staging dir: {}", self.dir.display())
                })
            }
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, dir = %self.dir.display(), "purged staged photos");
        }
        Ok(removed)
    }
}
