use std::convert::TryInto;

pub(crate) const HEADER_LEN: usize = 4 + 2 + 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum FrameType {
    First = 1,
    Middle = 2,
    Last = 3,
    Full = 4,
}

impl FrameType {
    fn from_u8(b: u8) -> Option<FrameType> {
        match b {
            1 => Some(FrameType::First),
            2 => Some(FrameType::Middle),
            3 => Some(FrameType::Last),
            4 => Some(FrameType::Full),
            _ => None,
        }
    }

    pub fn is_first_frame_of_record(self) -> bool {
        matches!(self, FrameType::First | FrameType::Full)
    }

    pub fn is_last_frame_of_record(self) -> bool {
        matches!(self, FrameType::Last | FrameType::Full)
    }
}

/// Frame header.
///
/// `[checksum: u32][len: u16][frame_type: u8]`, little endian.
/// The checksum covers the len, the frame type and the payload.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    checksum: u32,
    len: u16,
    frame_type: FrameType,
}

fn compute_checksum(len: u16, frame_type: FrameType, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(&[frame_type as u8]);
    hasher.update(payload);
    hasher.finalize()
}

impl Header {
    pub fn for_payload(frame_type: FrameType, payload: &[u8]) -> Header {
        assert!(payload.len() <= u16::MAX as usize);
        let len = payload.len() as u16;
        Header {
            checksum: compute_checksum(len, frame_type, payload),
            len,
            frame_type,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn check(&self, payload: &[u8]) -> bool {
        payload.len() == self.len()
            && compute_checksum(self.len, self.frame_type, payload) == self.checksum
    }

    pub fn serialize(&self, dest: &mut [u8]) {
        assert_eq!(dest.len(), HEADER_LEN);
        dest[..4].copy_from_slice(&self.checksum.to_le_bytes());
        dest[4..6].copy_from_slice(&self.len.to_le_bytes());
        dest[6] = self.frame_type as u8;
    }

    /// Returns `None` if the frame type is not recognized.
    pub fn deserialize(data: &[u8]) -> Option<Header> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let checksum = u32::from_le_bytes(data[..4].try_into().ok()?);
        let len = u16::from_le_bytes(data[4..6].try_into().ok()?);
        let frame_type = FrameType::from_u8(data[6])?;
        Some(Header {
            checksum,
            len,
            frame_type,
        })
    }
}
