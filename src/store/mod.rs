//! Durable storage of the queue records.
//!
//! Records are appended to backing files named `{file_prefix}{generation:020}`.
//! Each file starts with a `FileHeader` record followed by `Blob` records.
//! Once appending a record would make the active file exceed
//! `total_size_threshold`, a new file is started.
//!
//! Files are deleted once all of their records have been confirmed.

mod directory;
mod index;
mod meta;
mod reader;
mod record;
mod writer;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{FlushMode, QueueOptions};
use crate::error::{QueueError, Result};

use self::directory::Directory;
use self::index::FileIndex;
pub use self::index::FileRange;
use self::meta::MetaFile;
pub use self::meta::QueueMeta;
pub use self::reader::StoreReader;
pub use self::record::StoreRecord;
use self::writer::ActiveFile;

/// Queue state recovered when opening a store.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Recovered {
    pub next_sequence_number: u64,
    pub low_water_mark: u64,
}

pub struct RecordStore {
    directory: Directory,
    index: FileIndex,
    meta_file: MetaFile,
    // `None` until the first append, and after the active file has been
    // abandoned or reclaimed.
    active_file: Option<ActiveFile>,
    total_size_threshold: u64,
    flush_mode: FlushMode,
}

impl RecordStore {
    /// Opens the store, recovering the state of the queue from the directory.
    ///
    /// The directory is created if it does not exist.
    /// Appends never go to a file that existed before opening the store.
    pub async fn open(options: &QueueOptions) -> Result<(RecordStore, Recovered)> {
        options.validate()?;
        tokio::fs::create_dir_all(&options.directory).await?;
        let mut directory = Directory::open(&options.directory, &options.file_prefix).await?;
        let meta_file = MetaFile::new(&options.directory, &options.file_prefix);
        let meta_opt = meta_file.load().await?;
        let index = scan_files(&directory).await?;

        if let Some(meta) = meta_opt {
            directory.ensure_next_generation_at_least(meta.next_generation);
        }
        let next_sequence_number = meta_opt
            .map(|meta| meta.next_sequence_number)
            .into_iter()
            .chain(index.next_seq_floor())
            .max()
            .unwrap_or(0u64);
        let low_water_mark = match meta_opt {
            Some(meta) => meta.low_water_mark,
            None => index.lowest_seq().unwrap_or(next_sequence_number),
        }
        .min(next_sequence_number);
        let recovered = Recovered {
            next_sequence_number,
            low_water_mark,
        };
        info!(
            directory = %options.directory.display(),
            file_prefix = %options.file_prefix,
            num_files = index.num_files(),
            next_sequence_number,
            low_water_mark,
            "opened record store"
        );
        let record_store = RecordStore {
            directory,
            index,
            meta_file,
            active_file: None,
            total_size_threshold: options.total_size_threshold,
            flush_mode: options.flush_mode,
        };
        Ok((record_store, recovered))
    }

    pub fn directory_path(&self) -> &Path {
        self.directory.path()
    }

    pub fn num_files(&self) -> usize {
        self.index.num_files()
    }

    pub fn file_generations(&self) -> Vec<u64> {
        self.index.generations().collect()
    }

    pub fn file_range(&self, generation: u64) -> Option<FileRange> {
        self.index.file_range(generation)
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active_file
            .as_ref()
            .map(|active_file| active_file.generation())
    }

    /// Opens a new backing file, whose first blob will get `first_seq`.
    ///
    /// On error, the current active file stays active, unless the new file could
    /// not be cleaned up.
    async fn roll(&mut self, first_seq: u64) -> Result<()> {
        let (generation, file) = self.directory.new_file().await?;
        self.index.register_file(generation);
        let new_active_file =
            match ActiveFile::create(generation, first_seq, file, self.flush_mode).await {
                Ok(new_active_file) => new_active_file,
                Err(io_err) => {
                    self.discard_new_file(generation).await;
                    return Err(io_err.into());
                }
            };
        self.index.set_header(generation, first_seq);
        if let Some(mut previous_active_file) = self.active_file.take() {
            // Blobs are flushed as they are appended.
            if let Err(io_err) = previous_active_file.flush().await {
                warn!(
                    generation = previous_active_file.generation(),
                    error = %io_err,
                    "failed to flush previous backing file"
                );
            }
            debug!(
                previous_generation = previous_active_file.generation(),
                num_bytes = previous_active_file.num_bytes(),
                generation,
                "rolled to new backing file"
            );
        }
        self.active_file = Some(new_active_file);
        Ok(())
    }

    /// Removes a file whose header could not be written.
    async fn discard_new_file(&mut self, generation: u64) {
        match self.directory.delete_file(generation).await {
            Ok(()) => {
                self.index.remove_file(generation);
            }
            Err(io_err) => {
                // The header may be on disk, in which case it supersedes any blob
                // appended to the current file from `first_seq` on.
                warn!(
                    generation,
                    error = %io_err,
                    "failed to delete backing file, abandoning current backing file"
                );
                self.active_file = None;
            }
        }
    }

    fn needs_roll(&self, payload_len: usize) -> bool {
        match self.active_file.as_ref() {
            None => true,
            Some(active_file) => {
                // A record larger than the threshold still gets a file of its own.
                active_file.num_blobs() > 0
                    && active_file.num_bytes() + active_file.blob_footprint(payload_len)
                        > self.total_size_threshold
            }
        }
    }

    /// Appends a record with the sequence number `seq`.
    ///
    /// If this returns an error, the record should be considered as not written,
    /// and `seq` can be used for the next append.
    pub async fn append(&mut self, seq: u64, payload: &[u8]) -> Result<()> {
        if self.needs_roll(payload.len()) {
            self.roll(seq).await?;
        }
        let active_file = match self.active_file.as_mut() {
            Some(active_file) => active_file,
            None => return Err(QueueError::QueueNotInitialized),
        };
        let generation = active_file.generation();
        let len_before_append = active_file.num_bytes();
        if let Err(io_err) = active_file.append_blob(seq, payload).await {
            warn!(
                generation,
                seq,
                error = %io_err,
                "failed to append record, abandoning backing file"
            );
            self.abandon_active_file(seq, len_before_append).await;
            return Err(io_err.into());
        }
        self.index.record_appended(generation, seq);
        Ok(())
    }

    /// Releases the active file after appending `seq` failed.
    ///
    /// The file is cut back to `len`, its length before the append. Further
    /// appends go to a new file.
    async fn abandon_active_file(&mut self, seq: u64, len: u64) {
        let active_file = match self.active_file.take() {
            Some(active_file) => active_file,
            None => return,
        };
        let generation = active_file.generation();
        let io_err = match active_file.truncate(len).await {
            Ok(()) => return,
            Err(io_err) => io_err,
        };
        warn!(
            generation,
            len,
            error = %io_err,
            "failed to truncate abandoned backing file"
        );
        // The header of the next file supersedes whatever is left of the record.
        if let Err(err) = self.roll(seq).await {
            warn!(seq, error = %err, "failed to open backing file after abandoning one");
        }
    }

    /// Reads the records with a sequence number `>= start`.
    pub fn read_from(&self, start: u64) -> StoreReader {
        self.read_range(start, None)
    }

    /// Reads the records with a sequence number `>= start` and `< end`.
    pub fn read_range(&self, start: u64, end: Option<u64>) -> StoreReader {
        let files: Vec<(u64, Option<u64>)> = self
            .index
            .generations()
            .filter(|&generation| {
                match self.index.file_range(generation).and_then(|file_range| file_range.seqs) {
                    Some((min_seq, max_seq)) => {
                        max_seq >= start && end.map(|end| min_seq < end).unwrap_or(true)
                    }
                    None => false,
                }
            })
            .map(|generation| (generation, self.index.seq_limit(generation)))
            .collect();
        StoreReader::new(
            self.directory.path().to_path_buf(),
            self.directory.prefix().to_string(),
            files,
            start,
            end,
        )
    }

    /// Persists the queue marks, so that they survive the reclaiming of files.
    pub async fn persist_marks(
        &mut self,
        next_sequence_number: u64,
        low_water_mark: u64,
    ) -> Result<()> {
        let meta = QueueMeta {
            next_sequence_number,
            low_water_mark,
            next_generation: self.directory.next_generation(),
        };
        self.meta_file.store(&meta).await?;
        Ok(())
    }

    /// Deletes every backing file whose records are all `< low_water_mark`.
    ///
    /// Returns the number of deleted files.
    pub async fn reclaim(&mut self, low_water_mark: u64) -> Result<usize> {
        let active_generation = self.active_generation();
        let reclaimable = self.index.reclaimable(low_water_mark, active_generation);
        for &generation in &reclaimable {
            if Some(generation) == active_generation {
                self.active_file = None;
            }
            self.directory.delete_file(generation).await?;
            self.index.remove_file(generation);
            debug!(generation, low_water_mark, "reclaimed backing file");
        }
        Ok(reclaimable.len())
    }

    /// Flushes the active file and releases it.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut active_file) = self.active_file.take() {
            active_file.flush().await?;
        }
        Ok(())
    }
}

/// Reads all of the backing files to rebuild the file index.
async fn scan_files(directory: &Directory) -> Result<FileIndex> {
    let mut index = FileIndex::default();
    let mut files = Vec::new();
    for generation in directory.generations() {
        index.register_file(generation);
        files.push((generation, None));
    }
    let mut reader = StoreReader::new(
        directory.path().to_path_buf(),
        directory.prefix().to_string(),
        files,
        0,
        None,
    );
    while let Some((generation, record)) = reader.read_record().await? {
        match record {
            StoreRecord::FileHeader {
                generation: header_generation,
                first_seq,
            } => {
                if header_generation != generation {
                    warn!(generation, header_generation, "file header generation mismatch");
                }
                index.set_header(generation, first_seq);
            }
            StoreRecord::Blob { seq, .. } => {
                index.record_appended(generation, seq);
            }
        }
    }
    index.drop_superseded();
    Ok(index)
}
