mod reader;
mod writer;
pub use self::reader::{ReadRecordError, RecordReader};
pub use self::writer::RecordWriter;

pub trait Serializable<'a>: Sized {
    /// Clears the buffer first.
    fn serialize(&self, buffer: &mut Vec<u8>);
    fn deserialize(buffer: &'a [u8]) -> Option<Self>;
}

impl<'a> Serializable<'a> for &'a [u8] {
    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.clear();
        buffer.extend_from_slice(self)
    }

    fn deserialize(buffer: &'a [u8]) -> Option<Self> {
        Some(buffer)
    }
}

#[cfg(test)]
mod tests;
