use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Durability of an append.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Data is flushed and synced to disk before `write` returns.
    Sync,
    /// Data is handed to the OS before `write` returns.
    Buffered,
}

impl Default for FlushMode {
    fn default() -> Self {
        FlushMode::Sync
    }
}

/// When upload attempts are triggered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadTrigger {
    /// An attempt is requested after every successful write.
    Immediate,
    /// An attempt is made every period. Writes do not trigger uploads.
    Periodic(Duration),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueOptions {
    pub directory: PathBuf,
    /// Prefix distinguishing this queue's files from other files in `directory`.
    pub file_prefix: String,
    /// Size in bytes after which appends go to a new file.
    pub total_size_threshold: u64,
    #[serde(default)]
    pub upload_period: Option<Duration>,
    #[serde(default)]
    pub flush_mode: FlushMode,
}

pub const DEFAULT_TOTAL_SIZE_THRESHOLD: u64 = 1 << 20;

impl QueueOptions {
    pub fn new(directory: impl AsRef<Path>, file_prefix: impl Into<String>) -> QueueOptions {
        QueueOptions {
            directory: directory.as_ref().to_path_buf(),
            file_prefix: file_prefix.into(),
            total_size_threshold: DEFAULT_TOTAL_SIZE_THRESHOLD,
            upload_period: None,
            flush_mode: FlushMode::default(),
        }
    }

    pub fn total_size_threshold(mut self, total_size_threshold: u64) -> Self {
        self.total_size_threshold = total_size_threshold;
        self
    }

    pub fn upload_period(mut self, upload_period: Duration) -> Self {
        self.upload_period = Some(upload_period);
        self
    }

    pub fn flush_mode(mut self, flush_mode: FlushMode) -> Self {
        self.flush_mode = flush_mode;
        self
    }

    /// A missing or zero period means immediate mode.
    pub fn upload_trigger(&self) -> UploadTrigger {
        match self.upload_period {
            Some(period) if !period.is_zero() => UploadTrigger::Periodic(period),
            _ => UploadTrigger::Immediate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.is_empty() {
            return Err(QueueError::InvalidConfig(
                "file_prefix must not be empty".to_string(),
            ));
        }
        if self.file_prefix.contains(std::path::is_separator) {
            return Err(QueueError::InvalidConfig(format!(
                "file_prefix `{}` must not contain a path separator",
                self.file_prefix
            )));
        }
        if self.total_size_threshold == 0 {
            return Err(QueueError::InvalidConfig(
                "total_size_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
