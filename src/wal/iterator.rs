//! Forward WAL iterator spanning segment files and in-memory buffers.
//!
//! The iterator snapshots the store at construction:
//!
//! - It takes a reference to every in-memory buffer it may need, so a
//!   buffer flushed (and dropped by the store) mid-iteration stays
//!   readable.
//! - It maps every segment file from the one containing `start_id`
//!   through the tail, read-only. A mapping survives an unlink, so
//!   concurrent segment deletion cannot invalidate the cursor.
//!
//! Records with ids at or below the store's `last_log_id` at construction
//! are guaranteed visible; later appends may or may not be. Construction
//! and read failures mark the iterator invalid: it yields nothing, and
//! no error reaches the caller.

use std::collections::VecDeque;
use std::fs::File;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::error;

use super::WalInner;
use super::buffer::WalBuffer;
use super::segment::{RECORD_HEADER, RECORD_OVERHEAD};

/// A read-only view of one mapped segment.
#[derive(Debug)]
struct SegmentReader {
    map: Mmap,
    first_log_id: u64,
    last_log_id: u64,
}

/// Cursor over the range `[start_id, last_id]`.
///
/// Holds a handle on the WAL state, so the mapped files and buffers
/// outlive the user-facing store if need be.
#[derive(Debug)]
pub struct WalIterator {
    inner: Arc<WalInner>,

    curr_id: u64,
    last_id: u64,

    /// First log id resident in the snapshotted buffers; `u64::MAX` when
    /// the snapshot holds no buffers.
    first_id_in_buffer: u64,
    buffers: VecDeque<Arc<WalBuffer>>,
    curr_buffer: usize,

    segments: Vec<SegmentReader>,
    curr_file: usize,
    curr_pos: usize,
    curr_msg_len: u32,
}

impl WalIterator {
    /// Builds an iterator over `[start_id, last_id]`; `None` for the
    /// upper bound means the store's `last_log_id` at construction.
    pub(crate) fn new(inner: Arc<WalInner>, start_id: u64, last_id: Option<u64>) -> Self {
        let last_id = last_id.unwrap_or_else(|| inner.last_log_id());
        let mut iter = Self {
            inner,
            curr_id: start_id,
            last_id,
            first_id_in_buffer: u64::MAX,
            buffers: VecDeque::new(),
            curr_buffer: 0,
            segments: Vec::new(),
            curr_file: 0,
            curr_pos: 0,
            curr_msg_len: 0,
        };

        // An empty range does no I/O at all.
        if start_id > last_id {
            iter.invalidate();
            return iter;
        }
        if start_id < iter.inner.first_log_id() || iter.inner.first_log_id() == 0 {
            error!(
                start_id,
                first_log_id = iter.inner.first_log_id(),
                "iterator start id is below the wal range"
            );
            iter.invalidate();
            return iter;
        }

        iter.snapshot_buffers(start_id);
        if iter.first_id_in_buffer > start_id && !iter.open_segments(start_id) {
            iter.invalidate();
            return iter;
        }
        iter
    }

    /// Whether the cursor rests on a record.
    pub fn valid(&self) -> bool {
        self.curr_id <= self.last_id
    }

    /// Log id of the current record.
    pub fn log_id(&self) -> u64 {
        self.curr_id
    }

    /// Payload of the current record. Empty once the iterator is invalid
    /// or on a torn read.
    pub fn log_msg(&self) -> Vec<u8> {
        if !self.valid() {
            return Vec::new();
        }
        if self.curr_id >= self.first_id_in_buffer {
            let Some(buffer) = self.buffers.get(self.curr_buffer) else {
                return Vec::new();
            };
            if self.curr_id < buffer.first_log_id() {
                return Vec::new();
            }
            let idx = (self.curr_id - buffer.first_log_id()) as usize;
            buffer.log(idx).unwrap_or_default()
        } else {
            let Some(seg) = self.segments.get(self.curr_file) else {
                return Vec::new();
            };
            let start = self.curr_pos + RECORD_HEADER;
            let end = start + self.curr_msg_len as usize;
            seg.map.get(start..end).map(<[u8]>::to_vec).unwrap_or_default()
        }
    }

    /// Advances to the next record.
    pub fn next(&mut self) {
        self.curr_id += 1;
        if !self.valid() {
            return;
        }

        if self.curr_id < self.first_id_in_buffer {
            self.advance_in_files();
        } else {
            self.position_in_buffers();
        }
    }

    fn invalidate(&mut self) {
        self.curr_id = self.last_id.wrapping_add(1);
        // Avoid the degenerate case where last_id == u64::MAX.
        if self.curr_id <= self.last_id {
            self.last_id = 0;
            self.curr_id = 1;
        }
    }

    // --------------------------------------------------------------------------------------------
    // Construction helpers
    // --------------------------------------------------------------------------------------------

    /// Snapshots buffer references back-to-front until one covers
    /// `start_id`, then positions the cursor if the range starts there.
    fn snapshot_buffers(&mut self, start_id: u64) {
        let Ok(queue) = self.inner.buffers.lock() else {
            return;
        };
        for buffer in queue.iter().rev() {
            self.first_id_in_buffer = buffer.first_log_id();
            self.buffers.push_front(Arc::clone(buffer));
            if self.first_id_in_buffer <= start_id {
                break;
            }
        }
        drop(queue);
        if self.first_id_in_buffer <= start_id {
            self.position_in_buffers();
        }
    }

    /// Finds the buffer holding `curr_id`, rolling forward as needed.
    fn position_in_buffers(&mut self) {
        while let Some(buffer) = self.buffers.get(self.curr_buffer) {
            if self.curr_id < buffer.first_log_id() {
                error!(
                    curr_id = self.curr_id,
                    buffer_first = buffer.first_log_id(),
                    "wal buffer sequence is broken"
                );
                break;
            }
            let held = buffer.len() as u64;
            if self.curr_id < buffer.first_log_id() + held {
                return;
            }
            self.curr_buffer += 1;
        }
        // The snapshot no longer covers curr_id: a torn race between the
        // bound taken at construction and the buffer contents. Stop here.
        error!(
            curr_id = self.curr_id,
            "wal iterator ran past its buffer snapshot"
        );
        self.invalidate();
    }

    /// Maps every segment from the one containing `start_id` to the tail
    /// and positions the cursor on `start_id`. Returns `false` on any
    /// open, map, or scan failure.
    fn open_segments(&mut self, start_id: u64) -> bool {
        let Ok(files) = self.inner.files.lock() else {
            return false;
        };

        let idx = files
            .segments
            .partition_point(|info| info.first_log_id <= start_id);
        if idx == 0 {
            error!(start_id, "start id precedes every wal segment");
            return false;
        }

        for info in &files.segments[idx - 1..] {
            if !info.has_records() {
                continue;
            }
            let file = match File::open(&info.fullname) {
                Ok(f) => f,
                Err(err) => {
                    error!(
                        file = %info.fullname.display(),
                        error = %err,
                        "failed to open wal segment for iteration"
                    );
                    return false;
                }
            };
            // Safety: the mapping is read-only; the store only ever
            // appends to this file, so mapped bytes are never rewritten.
            let map = match unsafe { Mmap::map(&file) } {
                Ok(m) => m,
                Err(err) => {
                    error!(
                        file = %info.fullname.display(),
                        error = %err,
                        "failed to map wal segment"
                    );
                    return false;
                }
            };
            self.segments.push(SegmentReader {
                map,
                first_log_id: info.first_log_id,
                last_log_id: info.last_log_id,
            });
        }
        drop(files);

        let Some(first) = self.segments.first() else {
            error!(start_id, "no wal segment covers the requested start id");
            return false;
        };
        if start_id < first.first_log_id || start_id > first.last_log_id {
            error!(start_id, "start id falls outside the covering segment");
            return false;
        }

        // Walk record headers until the cursor lands on start_id.
        self.curr_file = 0;
        self.curr_pos = 0;
        loop {
            let Some((log_id, msg_len)) = self.read_header(self.curr_file, self.curr_pos) else {
                return false;
            };
            self.curr_msg_len = msg_len;
            if log_id == start_id {
                return true;
            }
            self.curr_pos += msg_len as usize + RECORD_OVERHEAD;
        }
    }

    // --------------------------------------------------------------------------------------------
    // File-side advancement
    // --------------------------------------------------------------------------------------------

    fn advance_in_files(&mut self) {
        let rolled = match self.segments.get(self.curr_file) {
            Some(seg) if self.curr_id > seg.last_log_id => {
                self.curr_file += 1;
                self.curr_pos = 0;
                true
            }
            Some(_) => {
                self.curr_pos += self.curr_msg_len as usize + RECORD_OVERHEAD;
                false
            }
            None => {
                self.invalidate();
                return;
            }
        };

        let Some(seg) = self.segments.get(self.curr_file) else {
            // Ran out of files; either the buffers take over or the
            // snapshot is exhausted.
            if self.first_id_in_buffer == u64::MAX {
                self.invalidate();
            } else {
                self.position_in_buffers();
            }
            return;
        };
        if rolled && seg.first_log_id != self.curr_id {
            error!(
                curr_id = self.curr_id,
                segment_first = seg.first_log_id,
                "wal segment sequence is broken"
            );
            self.invalidate();
            return;
        }

        match self.read_header(self.curr_file, self.curr_pos) {
            Some((log_id, msg_len)) if log_id == self.curr_id => {
                self.curr_msg_len = msg_len;
            }
            _ => {
                error!(
                    curr_id = self.curr_id,
                    "unexpected record header in wal segment"
                );
                self.invalidate();
            }
        }
    }

    /// Reads `[log_id, msg_len]` at a byte offset of a mapped segment.
    fn read_header(&self, file_idx: usize, pos: usize) -> Option<(u64, u32)> {
        let seg = self.segments.get(file_idx)?;
        let id_bytes = seg.map.get(pos..pos + 8)?;
        let len_bytes = seg.map.get(pos + 8..pos + RECORD_HEADER)?;
        let log_id = u64::from_le_bytes(id_bytes.try_into().ok()?);
        let msg_len = u32::from_le_bytes(len_bytes.try_into().ok()?);
        Some((log_id, msg_len))
    }
}

/// Records as `(log_id, payload)` pairs, for replication catch-up shapes
/// like `append_many(other.iterator(..))`.
impl Iterator for WalIterator {
    type Item = (u64, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid() {
            return None;
        }
        let item = (self.log_id(), self.log_msg());
        WalIterator::next(self);
        Some(item)
    }
}
