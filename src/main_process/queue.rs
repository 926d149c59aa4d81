//! File-backed event queue.
//!
//! Each queued event lives in its own file inside the queue directory:
//!
//! ```text
//! <queue dir>/
//!   1718000000123-000000.json   # oldest
//!   1718000000456-000001.json
//!   1718000000456-000002.json   # newest
//! ```
//!
//! Names sort in insertion order. A file is written under a `.tmp` name and
//! renamed into place, so readers never see a partial entry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::envelope::{decode_entry, encode_entry};
use crate::error::SdkError;
use crate::event::CrashEvent;
use crate::fs::{self, FsError, FsErrorKind};

const ENTRY_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_entry_name() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1_000_000;
    format!("{:013}-{:06}{}", millis, seq, ENTRY_SUFFIX)
}

/// Directory of pending events, oldest first.
#[derive(Debug, Clone)]
pub struct EventQueue {
    dir: PathBuf,
    /// Zero disables the cap
    max_size: usize,
    compression_threshold: usize,
}

impl EventQueue {
    /// Opens the queue at `dir`, creating the directory if needed.
    pub fn create(
        dir: impl AsRef<Path>,
        max_size: usize,
        compression_threshold: usize,
    ) -> Result<Self, SdkError> {
        let dir = fs::resolve(dir.as_ref())?;
        fs::mkdirp_sync(&dir)?;
        Ok(Self {
            dir,
            max_size,
            compression_threshold,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn encode(&self, event: &CrashEvent) -> Result<Vec<u8>, SdkError> {
        let json = serde_json::to_vec(event)?;
        Ok(encode_entry(&json, self.compression_threshold)?)
    }

    /// Appends an event and returns its entry name.
    ///
    /// Drops the oldest entries if the queue grows past its cap.
    pub async fn push(&self, event: &CrashEvent) -> Result<String, SdkError> {
        let bytes = self.encode(event)?;
        let name = next_entry_name();
        let final_path = self.dir.join(&name);
        let temp_path = self.dir.join(format!("{}{}", name, TEMP_SUFFIX));

        fs::write_file(&temp_path, &bytes).await?;
        fs::rename(&temp_path, &final_path).await?;
        debug!(entry = %name, "event queued");

        self.enforce_cap().await?;
        Ok(name)
    }

    /// Blocking [`push`](Self::push) that skips the cap, for contexts without
    /// a runtime. Recreates the queue directory if it has gone missing.
    pub fn push_sync(&self, event: &CrashEvent) -> Result<String, SdkError> {
        let bytes = self.encode(event)?;
        let name = next_entry_name();
        let final_path = self.dir.join(&name);
        let temp_path = self.dir.join(format!("{}{}", name, TEMP_SUFFIX));

        fs::mkdirp_sync(&self.dir)?;
        std::fs::write(&temp_path, &bytes).map_err(|e| FsError::new("write", &temp_path, e))?;
        std::fs::rename(&temp_path, &final_path)
            .map_err(|e| FsError::new("rename", &temp_path, e))?;
        Ok(name)
    }

    /// Entry names, oldest first.
    pub async fn entries(&self) -> Result<Vec<String>, SdkError> {
        let names = fs::read_dir(&self.dir).await?;
        Ok(names
            .into_iter()
            .filter(|name| name.ends_with(ENTRY_SUFFIX))
            .collect())
    }

    pub async fn len(&self) -> Result<usize, SdkError> {
        Ok(self.entries().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, SdkError> {
        Ok(self.len().await? == 0)
    }

    pub async fn load(&self, name: &str) -> Result<CrashEvent, SdkError> {
        let bytes = fs::read_file(self.dir.join(name)).await?;
        let json = decode_entry(&bytes)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Deletes an entry. Returns `false` if it was already gone, which
    /// happens when cap eviction or another process removed it first.
    pub async fn remove(&self, name: &str) -> Result<bool, SdkError> {
        match fs::unlink(self.dir.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == FsErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every entry and returns how many this call removed.
    pub async fn purge(&self) -> Result<usize, SdkError> {
        let mut removed = 0;
        for name in self.entries().await? {
            if self.remove(&name).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn enforce_cap(&self) -> Result<(), SdkError> {
        if self.max_size == 0 {
            return Ok(());
        }

        let entries = self.entries().await?;
        let excess = entries.len().saturating_sub(self.max_size);
        for name in entries.iter().take(excess) {
            debug!(entry = %name, "queue full, dropping oldest event");
            self.remove(name).await?;
        }
        Ok(())
    }
}
