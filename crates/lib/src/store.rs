//! Survey record store: finalized answers appended to durable storage.
//!
//! [`JsonlStore`] writes one JSON object per line under an exclusive file lock,
//! so several processes can share one records file.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One submitted survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub record_id: Uuid,
    pub chat_id: String,
    pub submitted_at: DateTime<Utc>,
    pub name: String,
    pub age: String,
    pub city: String,
    pub request: String,
    pub health: String,
    pub contact: String,
}

/// Destination for finalized survey records.
pub trait RecordStore: Send + Sync {
    fn append(&self, record: &SurveyRecord) -> Result<(), StoreError>;
}

/// Appends records as JSON Lines.
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back (for inspection and tests). Missing file => empty.
    pub fn read_all(&self) -> Result<Vec<SurveyRecord>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(StoreError::from))
            .collect()
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for JsonlStore {
    fn append(&self, record: &SurveyRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.lock_exclusive().map_err(|e| self.io_err(e))?;
        let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
        let unlocked = file.unlock();
        written.map_err(|e| self.io_err(e))?;
        unlocked.map_err(|e| self.io_err(e))?;
        log::debug!("store: appended record {} to {}", record.record_id, self.path.display());
        Ok(())
    }
}
