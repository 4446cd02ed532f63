use std::convert::TryInto;

use crate::record::Serializable;

const BLOB_TAG: u8 = 0u8;
const FILE_HEADER_TAG: u8 = 1u8;

/// Records as they are stored in backing files.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreRecord<'a> {
    /// First record of every backing file.
    ///
    /// `first_seq` is the sequence number the first blob of the file
    /// gets. It makes it possible to recover the next sequence number
    /// from a file that holds no blob.
    FileHeader { generation: u64, first_seq: u64 },
    Blob { seq: u64, payload: &'a [u8] },
}

/// Size of the serialized `Blob` record for a payload of `payload_len` bytes.
pub(crate) fn blob_record_len(payload_len: usize) -> usize {
    1 + 8 + payload_len
}

fn read_u64(buffer: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(buffer.get(..8)?.try_into().ok()?))
}

impl<'a> Serializable<'a> for StoreRecord<'a> {
    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.clear();
        match *self {
            StoreRecord::FileHeader {
                generation,
                first_seq,
            } => {
                buffer.push(FILE_HEADER_TAG);
                buffer.extend_from_slice(&generation.to_le_bytes());
                buffer.extend_from_slice(&first_seq.to_le_bytes());
            }
            StoreRecord::Blob { seq, payload } => {
                buffer.push(BLOB_TAG);
                buffer.extend_from_slice(&seq.to_le_bytes());
                buffer.extend_from_slice(payload);
            }
        }
    }

    fn deserialize(buffer: &'a [u8]) -> Option<StoreRecord<'a>> {
        let (&enum_tag, buffer) = buffer.split_first()?;
        match enum_tag {
            BLOB_TAG => {
                let seq = read_u64(buffer)?;
                Some(StoreRecord::Blob {
                    seq,
                    payload: &buffer[8..],
                })
            }
            FILE_HEADER_TAG => {
                if buffer.len() != 16 {
                    return None;
                }
                Some(StoreRecord::FileHeader {
                    generation: read_u64(&buffer[..8])?,
                    first_seq: read_u64(&buffer[8..])?,
                })
            }
            _ => None,
        }
    }
}
