use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use tokio::fs::File;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::record::{ReadRecordError, RecordReader};
use crate::store::directory::filepath;
use crate::store::record::StoreRecord;

/// Reads records across backing files, in order.
///
/// The list of files is captured when the reader is created. Reading does not
/// affect the store: two readers created with the same bounds yield the same
/// records.
pub struct StoreReader {
    dir: PathBuf,
    prefix: String,
    // Generation of each file, along with the sequence number from which its
    // blobs are superseded by a later file.
    files: VecDeque<(u64, Option<u64>)>,
    reader_opt: Option<RecordReader<File>>,
    current_generation: u64,
    current_seq_limit: Option<u64>,
    // Bounds on the blobs yielded by `next`: `start` inclusive, `end` exclusive.
    start: u64,
    end: Option<u64>,
    last_seq: Option<u64>,
}

impl StoreReader {
    pub(crate) fn new(
        dir: PathBuf,
        prefix: String,
        files: Vec<(u64, Option<u64>)>,
        start: u64,
        end: Option<u64>,
    ) -> StoreReader {
        StoreReader {
            dir,
            prefix,
            files: files.into(),
            reader_opt: None,
            current_generation: 0,
            current_seq_limit: None,
            start,
            end,
            last_seq: None,
        }
    }

    async fn load_next_file(&mut self) -> io::Result<bool> {
        self.reader_opt = None;
        while let Some((generation, seq_limit)) = self.files.pop_front() {
            let path = filepath(&self.dir, &self.prefix, generation);
            match File::open(&path).await {
                Ok(file) => {
                    self.current_generation = generation;
                    self.current_seq_limit = seq_limit;
                    self.reader_opt = Some(RecordReader::open(file));
                    return Ok(true);
                }
                // Files are only deleted once all their records are confirmed.
                Err(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                    debug!(generation, "backing file reclaimed before being read");
                }
                Err(io_err) => return Err(io_err),
            }
        }
        Ok(false)
    }

    async fn go_next_record(&mut self) -> Result<bool> {
        loop {
            if let Some(record_reader) = self.reader_opt.as_mut() {
                match record_reader.go_next().await {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(ReadRecordError::Corruption) => {
                        warn!(
                            generation = self.current_generation,
                            "skipping corrupted data in backing file"
                        );
                        continue;
                    }
                    Err(ReadRecordError::IoError(io_err)) => return Err(io_err.into()),
                }
            }
            if !self.load_next_file().await? {
                return Ok(false);
            }
        }
    }

    fn current_record(&self) -> Option<StoreRecord<'_>> {
        self.reader_opt.as_ref()?.record()
    }

    /// Returns the next record along with the generation of the file holding it.
    ///
    /// Records that cannot be decoded are skipped.
    pub async fn read_record(&mut self) -> Result<Option<(u64, StoreRecord<'_>)>> {
        loop {
            if !self.go_next_record().await? {
                return Ok(None);
            }
            if self.current_record().is_some() {
                break;
            }
            warn!(
                generation = self.current_generation,
                "skipping undecodable record"
            );
        }
        let record = self.current_record().ok_or(QueueError::Corruption)?;
        Ok(Some((self.current_generation, record)))
    }

    /// Returns the next blob, as `(seq, bytes)`, in ascending sequence number order.
    pub async fn next(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        loop {
            let (seq, payload) = match self.read_record().await? {
                None => return Ok(None),
                Some((_, StoreRecord::FileHeader { .. })) => continue,
                Some((_, StoreRecord::Blob { seq, payload })) => (seq, payload.to_vec()),
            };
            if self.current_seq_limit.map(|limit| seq >= limit).unwrap_or(false) {
                debug!(
                    generation = self.current_generation,
                    seq,
                    "skipping record superseded by a later file"
                );
                continue;
            }
            if self.end.map(|end| seq >= end).unwrap_or(false) {
                self.files.clear();
                self.reader_opt = None;
                return Ok(None);
            }
            if seq < self.start {
                continue;
            }
            if self.last_seq.map(|last_seq| seq <= last_seq).unwrap_or(false) {
                warn!(seq, "skipping out of order record");
                continue;
            }
            self.last_seq = Some(seq);
            return Ok(Some((seq, payload)));
        }
    }

    /// Reads all of the remaining blobs.
    pub async fn collect_all(mut self) -> Result<Vec<(u64, Vec<u8>)>> {
        let mut blobs = Vec::new();
        while let Some(blob) = self.next().await? {
            blobs.push(blob);
        }
        Ok(blobs)
    }
}
