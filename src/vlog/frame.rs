//! Value log framing
//!
//! File header and per-frame encoding shared by the value log.

use crate::error::{EmberError, Result};

/// Magic bytes identifying an EmberKV value log file
pub const MAGIC: &[u8; 4] = b"EMVL";

/// Current value log format version
pub const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2) + Reserved (2) + Cursor (8) + Capacity (8)
pub const HEADER_SIZE: u64 = 24;

/// Frame header size: Len (4) + CRC (4)
pub const FRAME_HEADER_SIZE: u64 = 8;

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub cursor: u64,
    pub capacity: u64,
}

impl FileHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.cursor.to_le_bytes());
        buf[16..24].copy_from_slice(&self.capacity.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if &buf[0..4] != MAGIC {
            return Err(EmberError::CorruptFrame(format!(
                "Invalid value log magic: expected EMVL, got {:?}",
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(EmberError::CorruptFrame(format!(
                "Unsupported value log version: {}",
                version
            )));
        }

        let cursor = read_u64(&buf[8..16]);
        let capacity = read_u64(&buf[16..24]);
        if cursor < HEADER_SIZE {
            return Err(EmberError::CorruptFrame(format!(
                "Value log cursor {} points inside the file header",
                cursor
            )));
        }

        Ok(Self { cursor, capacity })
    }
}

/// Total on-disk size of a frame holding `length` payload bytes
pub fn frame_size(length: u32) -> u64 {
    FRAME_HEADER_SIZE + length as u64
}

/// Encode a payload as `[len][crc][payload]`
pub fn encode_frame(payload: &[u8]) -> Result<(u32, Vec<u8>)> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        EmberError::Range(format!(
            "Payload of {} bytes exceeds the maximum frame size",
            payload.len()
        ))
    })?;

    let crc = crc32fast::hash(payload);

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(payload);

    Ok((length, frame))
}

/// Split a frame header into `(length, crc)`
pub fn decode_frame_header(buf: &[u8; FRAME_HEADER_SIZE as usize]) -> (u32, u32) {
    let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    (length, crc)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}
