use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Queue marks persisted next to the backing files.
///
/// Backing files are enough to recover the queue, except once all of them
/// have been reclaimed: the metadata file then keeps sequence numbers and
/// generations from being reused.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct QueueMeta {
    pub next_sequence_number: u64,
    pub low_water_mark: u64,
    pub next_generation: u64,
}

pub(crate) struct MetaFile {
    dir: PathBuf,
    path: PathBuf,
    tmp_path: PathBuf,
}

impl MetaFile {
    pub fn new(dir: &Path, prefix: &str) -> MetaFile {
        MetaFile {
            dir: dir.to_path_buf(),
            path: dir.join(format!("{prefix}meta")),
            tmp_path: dir.join(format!("{prefix}meta.tmp")),
        }
    }

    pub async fn load(&self) -> io::Result<Option<QueueMeta>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(io_err) if io_err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(io_err) => return Err(io_err),
        };
        let meta: QueueMeta = serde_json::from_slice(&content)
            .map_err(|json_err| io::Error::new(io::ErrorKind::InvalidData, json_err))?;
        Ok(Some(meta))
    }

    /// Atomically replaces the metadata file.
    ///
    /// The directory is synced after the rename, so the new file survives a crash.
    pub async fn store(&self, meta: &QueueMeta) -> io::Result<()> {
        let content = serde_json::to_vec(meta)
            .map_err(|json_err| io::Error::new(io::ErrorKind::InvalidData, json_err))?;
        let mut tmp_file = tokio::fs::File::create(&self.tmp_path).await?;
        tmp_file.write_all(&content).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);
        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        tokio::fs::File::open(&self.dir).await?.sync_all().await?;
        Ok(())
    }
}
