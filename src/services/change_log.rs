use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::errors::AppError;
use crate::models::PriceChangeRecord;

/// Append-only destination for price change records.
#[async_trait]
pub trait ChangeLogSink: Send + Sync {
    async fn append(&self, records: &[PriceChangeRecord]) -> Result<(), AppError>;
}

/// Writes one human-readable line per record, rotating to `<path>.1` once the
/// file grows past `max_bytes`.
pub struct FileChangeLog {
    path: PathBuf,
    max_bytes: u64,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileChangeLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotated_path(&self) -> PathBuf {
        let mut rotated = self.path.clone().into_os_string();
        rotated.push(".1");
        PathBuf::from(rotated)
    }

    async fn rotate_if_needed(&self) -> Result<(), AppError> {
        let size = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if size >= self.max_bytes {
            let rotated = self.rotated_path();
            tokio::fs::rename(&self.path, &rotated).await?;
            info!("🔁 Rotated change log to {}", rotated.display());
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeLogSink for FileChangeLog {
    async fn append(&self, records: &[PriceChangeRecord]) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.rotate_if_needed().await?;

        let mut body = String::new();
        for record in records {
            body.push_str(&record.to_log_line());
            body.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Keeps records in memory; used by tests and dry runs.
#[derive(Default)]
pub struct MemoryChangeLog {
    records: Mutex<Vec<PriceChangeRecord>>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PriceChangeRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl ChangeLogSink for MemoryChangeLog {
    async fn append(&self, records: &[PriceChangeRecord]) -> Result<(), AppError> {
        self.records.lock().extend(records.iter().cloned());
        Ok(())
    }
}
