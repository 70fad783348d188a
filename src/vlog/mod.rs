//! Value Log Module
//!
//! Durable byte storage for value payloads. Knows nothing about keys or
//! data kinds: callers hand it bytes and get back an `(offset, length)`
//! location they must keep in the index.
//!
//! ## Responsibilities
//! - Append length-prefixed, checksummed frames at a write cursor
//! - Read frames back, rejecting mismatched lengths and bad checksums
//! - Overwrite in place when a new payload fits the old frame, else relocate
//! - Grow the backing file by doubling without moving existing frames
//! - Account for reclaimable space (no physical erase, no compaction)
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (24 bytes)                                       │
//! │   Magic "EMVL" (4) | Version u16 (2) | Reserved (2)     │
//! │   Cursor u64 (8)   | Capacity u64 (8)                   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frame 1                                                 │
//! │ ┌──────────┬──────────┬──────────────────────┐          │
//! │ │ Len (4)  │ CRC (4)  │ Payload              │          │
//! │ └──────────┴──────────┴──────────────────────┘          │
//! │ ... frames up to Cursor, zero-filled up to Capacity ... │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod frame;
mod arena;

pub use frame::{FRAME_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};
pub use arena::{ValueLog, ValueLogStats};
