use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::frame::{FrameType, Header, BLOCK_LEN, HEADER_LEN};

pub(crate) struct FrameWriter<W> {
    wrt: BufWriter<W>,
    buffer: Box<[u8; BLOCK_LEN]>,
    current_block_len: usize,
    num_bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a frame writer.
    ///
    /// `wrt` is expected to be positioned at the beginning of a block.
    pub(crate) fn create(wrt: W) -> Self {
        FrameWriter {
            wrt: BufWriter::new(wrt),
            buffer: Box::new([0u8; BLOCK_LEN]),
            current_block_len: 0,
            num_bytes_written: 0,
        }
    }

    pub async fn write_frame<B: AsRef<[u8]>>(
        &mut self,
        frame_type: FrameType,
        payload: B,
    ) -> io::Result<()> {
        let payload = payload.as_ref();
        if self.available_num_bytes_in_block() < HEADER_LEN {
            self.pad_block().await?;
        }
        assert!(payload.len() <= self.max_writable_frame_length());
        let frame_len = HEADER_LEN + payload.len();
        assert!(self.current_block_len + frame_len <= BLOCK_LEN);
        Header::for_payload(frame_type, payload).serialize(&mut self.buffer[..HEADER_LEN]);
        self.buffer[HEADER_LEN..frame_len].copy_from_slice(payload);
        self.wrt.write_all(&self.buffer[..frame_len]).await?;
        self.current_block_len = (self.current_block_len + frame_len) % BLOCK_LEN;
        self.num_bytes_written += frame_len as u64;
        Ok(())
    }

    /// Flush the buffered writer used in the FrameWriter.
    ///
    /// When writing to a file, this performs a syscall and
    /// the OS will be in charge of eventually writing the data
    /// to disk, but this is not sufficient to ensure durability.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.wrt.flush().await
    }

    async fn pad_block(&mut self) -> io::Result<()> {
        let remaining_num_bytes_in_block = self.available_num_bytes_in_block();
        let padding = [0u8; HEADER_LEN];
        self.wrt
            .write_all(&padding[..remaining_num_bytes_in_block])
            .await?;
        self.current_block_len = 0;
        self.num_bytes_written += remaining_num_bytes_in_block as u64;
        Ok(())
    }

    fn available_num_bytes_in_block(&self) -> usize {
        BLOCK_LEN - self.current_block_len
    }

    /// Returns the largest payload the next frame can carry.
    pub fn max_writable_frame_length(&self) -> usize {
        let available_num_bytes_in_block = self.available_num_bytes_in_block();
        if available_num_bytes_in_block >= HEADER_LEN {
            available_num_bytes_in_block - HEADER_LEN
        } else {
            // That block is finished. We will have to pad it.
            BLOCK_LEN - HEADER_LEN
        }
    }

    /// Number of bytes required to write a payload of `payload_len` bytes,
    /// split into frames, starting from the current position.
    ///
    /// This includes frame headers and block padding.
    pub fn footprint(&self, payload_len: usize) -> u64 {
        let mut block_len = self.current_block_len;
        let mut remaining = payload_len;
        let mut num_bytes = 0u64;
        loop {
            let available = BLOCK_LEN - block_len;
            if available < HEADER_LEN {
                num_bytes += available as u64;
                block_len = 0;
                continue;
            }
            let frame_payload_len = (available - HEADER_LEN).min(remaining);
            num_bytes += (HEADER_LEN + frame_payload_len) as u64;
            block_len = (block_len + HEADER_LEN + frame_payload_len) % BLOCK_LEN;
            remaining -= frame_payload_len;
            if remaining == 0 {
                return num_bytes;
            }
        }
    }

    pub fn num_bytes_written(&self) -> u64 {
        self.num_bytes_written
    }

    pub fn get_underlying_wrt(&mut self) -> &mut W {
        self.wrt.get_mut()
    }
}
