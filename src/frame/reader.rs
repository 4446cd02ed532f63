use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::frame::{FrameType, Header, BLOCK_LEN, HEADER_LEN};

pub(crate) struct FrameReader<R> {
    reader: R,
    block: Box<[u8; BLOCK_LEN]>,
    // Number of bytes of the current block that have been loaded.
    block_len: usize,
    // Offset of the next frame within the current block.
    cursor: usize,
}

#[derive(Error, Debug)]
pub(crate) enum ReadFrameError {
    #[error("Io error: {0}")]
    IoError(#[from] io::Error),
    #[error("Corruption")]
    Corruption,
    /// The end of the stream was reached, possibly within an incomplete frame.
    #[error("No frame available")]
    NotAvailable,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn open(reader: R) -> Self {
        FrameReader {
            reader,
            block: Box::new([0u8; BLOCK_LEN]),
            block_len: 0,
            cursor: 0,
        }
    }

    /// Attempts to load the rest of the current block.
    ///
    /// The block is not necessarily complete when this returns: if a writer is
    /// appending to the stream, more data may show up later.
    async fn fill_block(&mut self) -> io::Result<()> {
        while self.block_len < BLOCK_LEN {
            let read_len = self.reader.read(&mut self.block[self.block_len..]).await?;
            if read_len == 0 {
                break;
            }
            self.block_len += read_len;
        }
        Ok(())
    }

    /// Ensures the current block holds at least `len` bytes.
    async fn ensure_loaded(&mut self, len: usize) -> Result<(), ReadFrameError> {
        if self.block_len < len {
            self.fill_block().await?;
            if self.block_len < len {
                return Err(ReadFrameError::NotAvailable);
            }
        }
        Ok(())
    }

    // The frame length cannot be trusted anymore, so we skip
    // whatever remains in the block.
    fn drop_block(&mut self) {
        self.cursor = BLOCK_LEN;
    }

    pub async fn read_frame(&mut self) -> Result<(FrameType, &[u8]), ReadFrameError> {
        loop {
            if BLOCK_LEN - self.cursor < HEADER_LEN {
                // The end of the block is padding. We go to the next block,
                // once the current one has been entirely consumed.
                self.ensure_loaded(BLOCK_LEN).await?;
                self.block_len = 0;
                self.cursor = 0;
                continue;
            }
            self.ensure_loaded(self.cursor + HEADER_LEN).await?;
            let header = match Header::deserialize(&self.block[self.cursor..][..HEADER_LEN]) {
                Some(header) => header,
                None => {
                    self.drop_block();
                    return Err(ReadFrameError::Corruption);
                }
            };
            let payload_start = self.cursor + HEADER_LEN;
            let frame_end = payload_start + header.len();
            if frame_end > BLOCK_LEN {
                self.drop_block();
                return Err(ReadFrameError::Corruption);
            }
            self.ensure_loaded(frame_end).await?;
            self.cursor = frame_end;
            let payload = &self.block[payload_start..frame_end];
            if !header.check(payload) {
                // The length was plausible, we only skip this frame.
                return Err(ReadFrameError::Corruption);
            }
            return Ok((header.frame_type(), payload));
        }
    }
}
