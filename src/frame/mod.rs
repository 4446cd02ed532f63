mod header;
mod reader;
mod writer;

use self::header::Header;
pub(crate) use self::header::{FrameType, HEADER_LEN};
pub(crate) use self::reader::{FrameReader, ReadFrameError};
pub(crate) use self::writer::FrameWriter;
pub(crate) const BLOCK_LEN: usize = 32_768;
