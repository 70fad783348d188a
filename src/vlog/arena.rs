//! Value Log implementation
//!
//! File-backed frame arena guarded by a single mutex.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::SyncStrategy;
use crate::error::{EmberError, Result};

use super::frame::{
    decode_frame_header, encode_frame, frame_size, FileHeader, FRAME_HEADER_SIZE, HEADER_SIZE,
};

/// Point-in-time accounting of a value log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLogStats {
    /// Next write position
    pub cursor: u64,
    /// Current size of the backing file
    pub capacity: u64,
    /// Frames referenced by the index
    pub live_frames: u64,
    /// Bytes below the cursor no longer referenced by the index
    pub reclaimable: u64,
}

/// Append-only frame store addressed by `(offset, length)`
///
/// ## Concurrency:
/// - All file access goes through `inner` (one mutex), so an append never
///   interleaves with a read of the same region
/// - Offsets handed out stay valid for the life of the file: growth only
///   extends the file, it never moves frames
pub struct ValueLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    cursor: u64,
    capacity: u64,
    live_frames: u64,
    reclaimable: u64,
    sync_strategy: SyncStrategy,
    unsynced: usize,
}

impl ValueLog {
    /// Open or create a value log
    ///
    /// A new file is preallocated to `initial_capacity` bytes. An existing
    /// file resumes at the cursor stored in its header.
    pub fn open(path: &Path, initial_capacity: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_len = file.metadata()?.len();

        let header = if file_len == 0 {
            let capacity = initial_capacity.max(HEADER_SIZE + FRAME_HEADER_SIZE);
            let header = FileHeader {
                cursor: HEADER_SIZE,
                capacity,
            };
            file.set_len(capacity)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header.encode())?;
            file.sync_all()?;
            info!(path = %path.display(), capacity, "created value log");
            header
        } else {
            if file_len < HEADER_SIZE {
                return Err(EmberError::CorruptFrame(format!(
                    "Value log {} is {} bytes, smaller than its header",
                    path.display(),
                    file_len
                )));
            }
            let mut raw = [0u8; HEADER_SIZE as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut raw)?;
            let mut header = FileHeader::decode(&raw)?;
            // The file length is authoritative if a grow completed but the
            // header write did not.
            header.capacity = header.capacity.max(file_len);
            if header.cursor > header.capacity {
                return Err(EmberError::CorruptFrame(format!(
                    "Value log cursor {} beyond capacity {}",
                    header.cursor, header.capacity
                )));
            }
            debug!(path = %path.display(), cursor = header.cursor, "reopened value log");
            header
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                file,
                cursor: header.cursor,
                capacity: header.capacity,
                live_frames: 0,
                reclaimable: 0,
                sync_strategy,
                unsynced: 0,
            }),
        })
    }

    /// Append a payload as a new frame, returning its `(offset, length)`
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u32)> {
        let mut inner = self.inner.lock();
        let location = inner.append_frame(payload)?;
        inner.live_frames += 1;
        inner.after_write()?;
        Ok(location)
    }

    /// Read the payload of the frame at `(offset, length)`
    pub fn read(&self, offset: u64, length: u32) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        inner.check_range(offset, length)?;

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        inner.file.read_exact(&mut header)?;

        let (stored_len, stored_crc) = decode_frame_header(&header);
        if stored_len != length {
            return Err(EmberError::CorruptFrame(format!(
                "Frame at offset {} has length {}, index expects {}",
                offset, stored_len, length
            )));
        }

        let mut payload = vec![0u8; length as usize];
        inner.file.read_exact(&mut payload)?;

        if crc32fast::hash(&payload) != stored_crc {
            return Err(EmberError::CorruptFrame(format!(
                "Checksum mismatch for frame at offset {}",
                offset
            )));
        }

        Ok(payload)
    }

    /// Replace the payload of an existing frame
    ///
    /// Overwrites in place when the new payload fits within `old_length`,
    /// otherwise appends a fresh frame. The old region is only accounted as
    /// reclaimable, never erased.
    pub fn update(&self, old_offset: u64, old_length: u32, payload: &[u8]) -> Result<(u64, u32)> {
        let mut inner = self.inner.lock();
        inner.check_range(old_offset, old_length)?;

        let location = if payload.len() as u64 <= old_length as u64 {
            let (length, frame) = encode_frame(payload)?;
            inner.file.seek(SeekFrom::Start(old_offset))?;
            inner.file.write_all(&frame)?;
            inner.reclaimable += (old_length - length) as u64;
            (old_offset, length)
        } else {
            let location = inner.append_frame(payload)?;
            inner.reclaimable += frame_size(old_length);
            location
        };

        inner.after_write()?;
        Ok(location)
    }

    /// Put back the frame an in-place [`ValueLog::update`] overwrote
    ///
    /// `current_length` is the length the update left at `offset`; `payload`
    /// is the original content, which occupied the region before and so
    /// always fits.
    pub fn restore(&self, offset: u64, current_length: u32, payload: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let (length, frame) = encode_frame(payload)?;
        inner.check_range(offset, length)?;

        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&frame)?;
        inner.reclaimable = inner
            .reclaimable
            .saturating_sub(length.saturating_sub(current_length) as u64);

        debug!(path = %self.path.display(), offset, length, "restored overwritten frame");
        inner.after_write()
    }

    /// Mark a frame's space as reclaimable
    pub fn remove(&self, offset: u64, length: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_range(offset, length)?;
        inner.reclaimable += frame_size(length);
        inner.live_frames = inner.live_frames.saturating_sub(1);
        Ok(())
    }

    /// Rebuild accounting from the frames the recovered index still references
    ///
    /// Raises the cursor past any live frame (the header write may have been
    /// lost in a crash) and recomputes live/reclaimable totals.
    pub fn reconcile<I>(&self, live: I) -> Result<()>
    where
        I: IntoIterator<Item = (u64, u32)>,
    {
        let mut inner = self.inner.lock();

        let mut live_frames = 0u64;
        let mut live_bytes = 0u64;
        let mut high_water = inner.cursor;
        for (offset, length) in live {
            live_frames += 1;
            live_bytes += frame_size(length);
            high_water = high_water.max(offset + frame_size(length));
        }

        if high_water > inner.cursor {
            debug!(
                path = %self.path.display(),
                from = inner.cursor,
                to = high_water,
                "advancing value log cursor past recovered frames"
            );
            inner.ensure_capacity(high_water)?;
            inner.cursor = high_water;
            inner.write_header()?;
        }

        inner.live_frames = live_frames;
        inner.reclaimable = (inner.cursor - HEADER_SIZE).saturating_sub(live_bytes);
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.sync()
    }

    /// Snapshot of cursor and space accounting
    pub fn stats(&self) -> ValueLogStats {
        let inner = self.inner.lock();
        ValueLogStats {
            cursor: inner.cursor,
            capacity: inner.capacity,
            live_frames: inner.live_frames,
            reclaimable: inner.reclaimable,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Inner {
    fn check_range(&self, offset: u64, length: u32) -> Result<()> {
        let end = offset.checked_add(frame_size(length));
        match end {
            Some(end) if offset >= HEADER_SIZE && end <= self.cursor => Ok(()),
            _ => Err(EmberError::OutOfRange {
                offset,
                length,
                cursor: self.cursor,
            }),
        }
    }

    fn append_frame(&mut self, payload: &[u8]) -> Result<(u64, u32)> {
        let (length, frame) = encode_frame(payload)?;
        let offset = self.cursor;
        let end = offset + frame.len() as u64;

        self.ensure_capacity(end)?;

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&frame)?;

        self.cursor = end;
        self.write_header()?;

        Ok((offset, length))
    }

    /// Grow to the next capacity tier until `required` bytes fit
    fn ensure_capacity(&mut self, required: u64) -> Result<()> {
        if required <= self.capacity {
            return Ok(());
        }

        let mut capacity = self.capacity.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(2);
        }

        self.file.set_len(capacity)?;
        debug!(from = self.capacity, to = capacity, "grew value log");
        self.capacity = capacity;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        let header = FileHeader {
            cursor: self.cursor,
            capacity: self.capacity,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        Ok(())
    }

    fn after_write(&mut self) -> Result<()> {
        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }
}
