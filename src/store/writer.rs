// Copyright (C) 2022 Quickwit, Inc.
//
// Quickwit is offered under the AGPL v3.0 and as commercial software.
// For commercial licensing, contact us at hello@quickwit.io.
//
// AGPL:
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

use std::io;

use tokio::fs::File;

use crate::config::FlushMode;
use crate::record::{RecordWriter, Serializable};
use crate::store::record::{blob_record_len, StoreRecord};

/// The backing file currently receiving appends.
pub(crate) struct ActiveFile {
    generation: u64,
    record_writer: RecordWriter<File>,
    num_blobs: u64,
    flush_mode: FlushMode,
    buffer: Vec<u8>,
}

impl ActiveFile {
    /// Writes the file header, and flushes it.
    pub async fn create(
        generation: u64,
        first_seq: u64,
        file: File,
        flush_mode: FlushMode,
    ) -> io::Result<ActiveFile> {
        let mut active_file = ActiveFile {
            generation,
            record_writer: RecordWriter::open(file),
            num_blobs: 0,
            flush_mode,
            buffer: Vec::new(),
        };
        active_file
            .write(StoreRecord::FileHeader {
                generation,
                first_seq,
            })
            .await?;
        active_file.flush().await?;
        Ok(active_file)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_bytes(&self) -> u64 {
        self.record_writer.num_bytes_written()
    }

    pub fn num_blobs(&self) -> u64 {
        self.num_blobs
    }

    /// Number of bytes appending a blob of `payload_len` bytes would add to the file.
    pub fn blob_footprint(&self, payload_len: usize) -> u64 {
        self.record_writer
            .record_footprint(blob_record_len(payload_len))
    }

    /// Appends a blob, and flushes it according to the flush mode.
    pub async fn append_blob(&mut self, seq: u64, payload: &[u8]) -> io::Result<()> {
        self.write(StoreRecord::Blob { seq, payload }).await?;
        self.flush().await?;
        self.num_blobs += 1;
        Ok(())
    }

    /// Cuts the file back to `len` bytes and syncs it.
    ///
    /// Bytes still buffered by the writer are discarded along with the file.
    pub async fn truncate(mut self, len: u64) -> io::Result<()> {
        let file = self.record_writer.get_underlying_wrt();
        file.set_len(len).await?;
        file.sync_data().await
    }

    async fn write(&mut self, record: StoreRecord<'_>) -> io::Result<()> {
        record.serialize(&mut self.buffer);
        self.record_writer.write_record(&self.buffer).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.record_writer.flush().await?;
        if self.flush_mode == FlushMode::Sync {
            self.record_writer.get_underlying_wrt().sync_data().await?;
        }
        Ok(())
    }
}
