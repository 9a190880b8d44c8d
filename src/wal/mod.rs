//! # Write-Ahead Log Store
//!
//! Durable, ordered log storage for a replicated-log consensus layer:
//! strictly consecutive log ids, segment files on disk, in-memory write
//! buffers drained by one background flush worker, and forward iterators
//! spanning both.
//!
//! ## Design Overview
//!
//! ```text
//! append(id, msg) ──► active buffer ──freeze──► buffer queue ──► flush worker
//!                                                                  │ write + fsync
//!                                                                  ▼
//!                      0000000000000000001.wal   0000000000000000042.wal   ...
//! ```
//!
//! - **Segments** — files named `<019-digit-first-log-id>.wal`, each a
//!   contiguous id run; a segment closes when the next record would push
//!   it past the configured size, and a new one opens at that id.
//! - **Buffers** — appends serialize into an in-memory buffer; a full
//!   buffer is frozen and queued for the flush worker. When the queue is
//!   at its depth limit the appender blocks until a slot frees.
//! - **Recovery** — on open, segment files are validated and the longest
//!   contiguous id suffix is kept; a torn tail record is truncated away.
//!   Missing prefixes are the consumer's problem (a replicator re-fetches
//!   them from peers), so gaps repair by deletion, never by stalling.
//!
//! ## Concurrency model
//!
//! Two locks, always in this order: `buffers` (the in-memory buffer
//! queue) before `files` (segment list + active file). The appender holds
//! `buffers` to serialize id assignment; the flush worker holds `files`
//! while writing; iterators take each briefly to snapshot.
//!
//! ## Guarantees
//!
//! - An `append(id)` is rejected unless `id == last_log_id + 1`.
//! - Once the flush worker has processed (written and fsynced) the buffer
//!   containing a record, that record survives reopen bytewise.
//! - An iterator sees every record with id ≤ the store's `last_log_id` at
//!   construction, flushed or not, and is immune to concurrent flushes
//!   and segment deletion.
//! - A write failure in the flush worker is fatal to the process: no
//!   silent data loss.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod buffer;
mod iterator;
mod segment;

pub use iterator::WalIterator;
pub use segment::SegmentInfo;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::WalConfig;
use buffer::WalBuffer;
use segment::{RECORD_OVERHEAD, scan_dir, segment_file_name};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Append with a log id that does not directly follow the last one.
    #[error("log id gap: expected {expected}, got {got}")]
    IdGap { expected: u64, got: u64 },

    /// The requested id falls outside the live log range.
    #[error("log id {id} is outside the range [{first}, {last}]")]
    OutOfRange { id: u64, first: u64, last: u64 },

    /// The store has been stopped; no further appends are accepted.
    #[error("wal store is stopped")]
    Stopped,

    /// Internal consistency or locking error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Shared state
// ------------------------------------------------------------------------------------------------

/// Segment list plus the file currently open for append.
#[derive(Debug)]
pub(crate) struct WalFiles {
    pub(crate) segments: Vec<SegmentInfo>,
    current: Option<File>,
}

impl WalFiles {
    /// Size of the segment currently receiving writes.
    fn tail_size(&self) -> u64 {
        self.segments.last().map(|info| info.size).unwrap_or(0)
    }
}

/// State shared by the store handle, the flush worker, and iterators.
///
/// Three owners, none of which leaks the others: user code holds one
/// through [`WalStore`], the flush worker holds one for its lifetime and
/// drops it after the stop signal, and every iterator holds one so mapped
/// segments and snapshotted buffers stay alive.
#[derive(Debug)]
pub(crate) struct WalInner {
    dir: PathBuf,
    max_file_size: u64,
    max_buffer_size: usize,
    num_buffers: usize,

    pub(crate) files: Mutex<WalFiles>,
    pub(crate) buffers: Mutex<VecDeque<Arc<WalBuffer>>>,

    /// Signals the flush worker that a frozen buffer is waiting (or that
    /// the store is stopping).
    buffer_ready: Condvar,

    /// Signals blocked appenders that a queue slot freed up.
    slot_ready: Condvar,

    first_log_id: AtomicU64,
    last_log_id: AtomicU64,
    stopped: AtomicBool,
}

impl WalInner {
    pub(crate) fn first_log_id(&self) -> u64 {
        self.first_log_id.load(Ordering::Acquire)
    }

    pub(crate) fn last_log_id(&self) -> u64 {
        self.last_log_id.load(Ordering::Acquire)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

// ------------------------------------------------------------------------------------------------
// WalStore
// ------------------------------------------------------------------------------------------------

/// A directory-backed write-ahead log.
///
/// See the [module-level documentation](self) for format, recovery, and
/// concurrency details.
#[derive(Debug)]
pub struct WalStore {
    inner: Arc<WalInner>,
    flush_worker: Mutex<Option<JoinHandle<()>>>,
}

impl WalStore {
    /// Opens (or creates) the WAL rooted at `dir`, running recovery over
    /// whatever segments are present and starting the flush worker.
    pub fn open(dir: impl AsRef<Path>, config: WalConfig) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let max_file_size = config.file_size_mb * 1024 * 1024;
        let max_buffer_size = (config.buffer_size_mb * 1024 * 1024) as usize;

        let segments = scan_dir(&dir)?;
        let first_log_id = segments.first().map(|s| s.first_log_id).unwrap_or(0);
        let last_log_id = segments.last().map(|s| s.last_log_id).unwrap_or(0);

        let mut files = WalFiles {
            segments,
            current: None,
        };

        // Reuse a tail segment that still has meaningful headroom;
        // otherwise start a fresh one at the next id.
        if let Some(tail) = files.segments.last()
            && tail.size < max_file_size * 15 / 16
        {
            let file = OpenOptions::new().append(true).open(&tail.fullname)?;
            debug!(file = %tail.fullname.display(), size = tail.size, "reusing tail wal segment");
            files.current = Some(file);
        }
        if files.current.is_none() {
            prepare_new_file(&dir, &mut files, last_log_id + 1)?;
        }

        let inner = Arc::new(WalInner {
            dir,
            max_file_size,
            max_buffer_size,
            num_buffers: config.num_buffers,
            files: Mutex::new(files),
            buffers: Mutex::new(VecDeque::new()),
            buffer_ready: Condvar::new(),
            slot_ready: Condvar::new(),
            first_log_id: AtomicU64::new(first_log_id),
            last_log_id: AtomicU64::new(last_log_id),
            stopped: AtomicBool::new(false),
        });

        let worker_state = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("wal-flush".into())
            .spawn(move || flush_loop(worker_state))
            .map_err(WalError::Io)?;

        info!(
            dir = %inner.dir.display(),
            first_log_id,
            last_log_id,
            "wal store opened"
        );

        Ok(Self {
            inner,
            flush_worker: Mutex::new(Some(handle)),
        })
    }

    /// Smallest retrievable log id (0 while the store is empty).
    pub fn first_log_id(&self) -> u64 {
        self.inner.first_log_id()
    }

    /// Largest appended log id (0 while the store is empty).
    pub fn last_log_id(&self) -> u64 {
        self.inner.last_log_id()
    }

    /// Appends one record.
    ///
    /// Rejects ids that do not directly follow `last_log_id`. Blocks when
    /// the buffer queue is at its depth limit until the flush worker
    /// frees a slot.
    pub fn append(&self, id: u64, msg: Vec<u8>) -> Result<(), WalError> {
        if self.inner.is_stopped() {
            return Err(WalError::Stopped);
        }

        let mut queue = lock_buffers(&self.inner)?;

        let last = self.inner.last_log_id();
        if id != last + 1 {
            error!(last_log_id = last, id, "rejecting append with a log id gap");
            return Err(WalError::IdGap {
                expected: last + 1,
                got: id,
            });
        }

        // Seal the active buffer when this record would overflow it.
        let need_new = match queue.back() {
            None => true,
            Some(active) if active.is_frozen() => true,
            Some(active) => {
                if active.size() + msg.len() + RECORD_OVERHEAD > self.inner.max_buffer_size {
                    active.freeze();
                    self.inner.buffer_ready.notify_one();
                    true
                } else {
                    false
                }
            }
        };

        if need_new {
            while queue.len() >= self.inner.num_buffers {
                if self.inner.is_stopped() {
                    return Err(WalError::Stopped);
                }
                warn!("wal buffer queue is exhausted, waiting for a flush slot");
                queue = self
                    .inner
                    .slot_ready
                    .wait(queue)
                    .map_err(|_| WalError::Internal("buffer queue lock poisoned".into()))?;
            }
            queue.push_back(Arc::new(WalBuffer::new(id)));
        }

        let active = queue
            .back()
            .ok_or_else(|| WalError::Internal("buffer queue empty after refill".into()))?;
        debug_assert_eq!(id, active.first_log_id() + active.len() as u64);
        active.push(msg);

        if self.inner.first_log_id() == 0 {
            self.inner.first_log_id.store(id, Ordering::Release);
        }
        self.inner.last_log_id.store(id, Ordering::Release);
        Ok(())
    }

    /// Appends a batch of records, stopping at the first rejection.
    ///
    /// Returns how many records went in; records appended before the
    /// rejection stay appended.
    pub fn append_many<I>(&self, records: I) -> Result<usize, WalError>
    where
        I: IntoIterator<Item = (u64, Vec<u8>)>,
    {
        let mut appended = 0usize;
        for (id, msg) in records {
            self.append(id, msg)?;
            appended += 1;
        }
        Ok(appended)
    }

    /// Builds a forward iterator over `[first_id, last_id]` (the store's
    /// `last_log_id` when the bound is omitted).
    ///
    /// A range outside the live log yields an iterator whose `valid()` is
    /// immediately false; construction never fails loudly.
    pub fn iterator(&self, first_id: u64, last_id: Option<u64>) -> WalIterator {
        WalIterator::new(Arc::clone(&self.inner), first_id, last_id)
    }

    /// Discards every record after `id`: later buffers, later segments,
    /// and the tail of the segment containing `id`.
    ///
    /// A no-op when `id >= last_log_id`; rolling back past
    /// `first_log_id` is refused.
    pub fn truncate_after(&self, id: u64) -> Result<(), WalError> {
        // Held for the whole rollback: blocks appenders (which would race
        // the watermark) and keeps the flush worker from dequeuing more
        // buffers mid-truncation.
        let mut queue = lock_buffers(&self.inner)?;

        let last = self.inner.last_log_id();
        if id >= last {
            return Ok(());
        }
        let first = self.inner.first_log_id();
        if id < first {
            return Err(WalError::OutOfRange { id, first, last });
        }

        Self::truncate_buffers(&mut queue, id);
        self.truncate_files(id)?;
        info!(id, "wal truncated");
        Ok(())
    }

    fn truncate_buffers(queue: &mut VecDeque<Arc<WalBuffer>>, id: u64) {
        while let Some(back) = queue.back() {
            if back.first_log_id() > id {
                queue.pop_back();
            } else {
                back.truncate_to((id - back.first_log_id() + 1) as usize);
                break;
            }
        }
    }

    /// Removes flushed records past `id` and moves the append watermark,
    /// all under the files lock so a concurrent flush cannot interleave.
    fn truncate_files(&self, id: u64) -> Result<(), WalError> {
        let mut files = lock_files(&self.inner)?;

        while let Some(tail) = files.segments.last() {
            if tail.first_log_id > id {
                let fullname = tail.fullname.clone();
                info!(
                    file = %fullname.display(),
                    "removing wal segment past the rollback point"
                );
                // The doomed segment may be the one open for append.
                files.current = None;
                fs::remove_file(&fullname)?;
                files.segments.pop();
            } else {
                break;
            }
        }

        let dir = self.inner.dir.clone();
        let Some(tail) = files.segments.last_mut() else {
            // Everything flushed was rolled back; records up to `id` are
            // still in buffers. Start a fresh segment for them.
            if files.current.is_none() {
                prepare_new_file(&dir, &mut files, self.inner.first_log_id().max(1))?;
            }
            self.inner.last_log_id.store(id, Ordering::Release);
            return Ok(());
        };

        if tail.last_log_id > id {
            let keep = record_prefix_len(&tail.fullname, tail.first_log_id, id)?;
            let file = OpenOptions::new().write(true).open(&tail.fullname)?;
            file.set_len(keep)?;
            file.sync_all()?;
            tail.size = keep;
            tail.last_log_id = id;
        }

        let tail_size = tail.size;
        let tail_fullname = tail.fullname.clone();

        if files.current.is_none() {
            if tail_size < self.inner.max_file_size * 15 / 16 {
                files.current = Some(OpenOptions::new().append(true).open(&tail_fullname)?);
            } else {
                prepare_new_file(&dir, &mut files, id + 1)?;
            }
        }

        // Publish the watermark before the files lock drops: a flush
        // worker that slipped past the queue with a stale buffer clamps
        // against it.
        self.inner.last_log_id.store(id, Ordering::Release);
        Ok(())
    }

    /// Stops the store: freezes the active buffer, drains the flush
    /// worker, and closes the current segment. Idempotent; `Drop` calls
    /// it as well.
    pub fn stop(&self) {
        // Seal the active buffer first: the flush worker treats the stop
        // flag as "everything queued is flushable".
        if let Ok(queue) = self.inner.buffers.lock()
            && let Some(active) = queue.back()
        {
            active.freeze();
        }
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.buffer_ready.notify_one();
        self.inner.slot_ready.notify_all();

        let handle = self
            .flush_worker
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("wal flush worker panicked during shutdown");
        }

        if let Ok(mut files) = self.inner.files.lock()
            && let Some(file) = files.current.take()
            && let Err(err) = file.sync_all()
        {
            error!(error = %err, "failed to sync the tail wal segment on stop");
        }
        info!(dir = %self.inner.dir.display(), "wal store stopped");
    }

    /// Snapshot of the current segment metadata, oldest first.
    pub fn segments(&self) -> Result<Vec<SegmentInfo>, WalError> {
        Ok(lock_files(&self.inner)?.segments.clone())
    }
}

impl Drop for WalStore {
    fn drop(&mut self) {
        self.stop();
    }
}

// ------------------------------------------------------------------------------------------------
// Flush worker
// ------------------------------------------------------------------------------------------------

/// Background loop: waits for frozen buffers, flushes them in order,
/// exits once the store is stopped and the queue has drained.
fn flush_loop(inner: Arc<WalInner>) {
    loop {
        let next = {
            let Ok(mut queue) = inner.buffers.lock() else {
                error!("wal buffer queue lock poisoned, flush worker exiting");
                return;
            };
            loop {
                match queue.front() {
                    Some(front) if front.is_frozen() || inner.is_stopped() => {
                        // stop() freezes the active buffer before raising
                        // the flag, so an unfrozen front cannot linger.
                        break queue.pop_front();
                    }
                    None if inner.is_stopped() => break None,
                    _ => {
                        queue = match inner.buffer_ready.wait(queue) {
                            Ok(guard) => guard,
                            Err(_) => {
                                error!("wal buffer queue lock poisoned, flush worker exiting");
                                return;
                            }
                        };
                    }
                }
            }
        };

        let Some(buffer) = next else {
            return;
        };
        inner.slot_ready.notify_one();
        flush_buffer(&inner, &buffer);
    }
}

/// Writes one buffer into the segment chain, rolling to a new segment
/// whenever the projected size would exceed the cap, then fsyncs.
///
/// Any write error here is fatal: the store cannot guarantee durability
/// past it, so the process aborts for operator intervention.
fn flush_buffer(inner: &WalInner, buffer: &WalBuffer) {
    if buffer.is_empty() {
        return;
    }

    let Ok(mut files) = inner.files.lock() else {
        fatal_flush("wal files lock poisoned");
    };

    // A rollback may have moved the watermark after this buffer left the
    // queue; records past it are dead and must not reach disk.
    let limit = inner.last_log_id();

    let mut chunk: Vec<u8> = Vec::with_capacity(buffer.size());
    let mut log_id = buffer.first_log_id();

    buffer.for_each(|msg| {
        if log_id > limit {
            log_id += 1;
            return;
        }

        let record_size = (msg.len() + RECORD_OVERHEAD) as u64;
        let projected = files.tail_size() + chunk.len() as u64;
        // A segment may exceed the cap only to complete a single record:
        // roll only when the current segment already holds something.
        if projected > 0 && projected + record_size > inner.max_file_size {
            dump_chunk(&mut files, &chunk, log_id);
            chunk.clear();
            close_current(&mut files);
            if let Err(err) = prepare_new_file(&inner.dir, &mut files, log_id) {
                error!(error = %err, "failed to open a new wal segment");
                fatal_flush("cannot create wal segment");
            }
        }

        let msg_len = msg.len() as u32;
        chunk.extend_from_slice(&log_id.to_le_bytes());
        chunk.extend_from_slice(&msg_len.to_le_bytes());
        chunk.extend_from_slice(msg);
        chunk.extend_from_slice(&msg_len.to_le_bytes());
        log_id += 1;
    });

    dump_chunk(&mut files, &chunk, log_id.min(limit + 1));

    let Some(current) = files.current.as_ref() else {
        fatal_flush("no open wal segment after flush");
    };
    if let Err(err) = current.sync_all() {
        error!(error = %err, "wal fsync failed");
        fatal_flush("wal fsync failed");
    }
}

/// Appends accumulated record bytes to the current segment and advances
/// its metadata. `next_id` is the id after the chunk's last record.
fn dump_chunk(files: &mut WalFiles, chunk: &[u8], next_id: u64) {
    if chunk.is_empty() {
        return;
    }
    let Some(current) = files.current.as_mut() else {
        fatal_flush("no open wal segment to write into");
    };
    if let Err(err) = current.write_all(chunk) {
        error!(error = %err, "wal write failed");
        fatal_flush("wal write failed");
    }
    let Some(tail) = files.segments.last_mut() else {
        fatal_flush("wal segment list empty during flush");
    };
    tail.size += chunk.len() as u64;
    tail.last_log_id = next_id - 1;
}

/// Closes the active segment file (fsynced) and stamps its mtime.
fn close_current(files: &mut WalFiles) {
    if let Some(file) = files.current.take()
        && let Err(err) = file.sync_all()
    {
        error!(error = %err, "wal fsync failed while closing a segment");
        fatal_flush("wal fsync failed");
    }
    if let Some(tail) = files.segments.last_mut() {
        tail.mtime = SystemTime::now();
    }
}

/// Creates the next segment file (exclusively) and registers it.
fn prepare_new_file(dir: &Path, files: &mut WalFiles, first_log_id: u64) -> Result<(), WalError> {
    let fullname = dir.join(segment_file_name(first_log_id));
    let file = OpenOptions::new()
        .create_new(true)
        .append(true)
        .open(&fullname)?;
    info!(file = %fullname.display(), first_log_id, "new wal segment");

    files.segments.push(SegmentInfo {
        first_log_id,
        last_log_id: first_log_id - 1,
        size: 0,
        mtime: SystemTime::now(),
        fullname,
    });
    files.current = Some(file);
    Ok(())
}

/// Flush-path failures forfeit durability; abort rather than lose data
/// silently.
fn fatal_flush(reason: &str) -> ! {
    error!(reason, "fatal wal flush failure, aborting");
    std::process::abort();
}

/// Byte length of the record prefix of `path` holding ids
/// `[first_log_id, keep_through]`.
fn record_prefix_len(path: &Path, first_log_id: u64, keep_through: u64) -> Result<u64, WalError> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path)?;
    let mut pos: u64 = 0;
    let mut id = first_log_id;
    let mut header = [0u8; 12];

    while id <= keep_through {
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut header)?;
        let log_id = u64::from_le_bytes(
            header[..8]
                .try_into()
                .map_err(|_| WalError::Internal("short record header".into()))?,
        );
        if log_id != id {
            return Err(WalError::Internal(format!(
                "unexpected log id {log_id} while scanning for {id}"
            )));
        }
        let msg_len = u32::from_le_bytes(
            header[8..12]
                .try_into()
                .map_err(|_| WalError::Internal("short record header".into()))?,
        );
        pos += msg_len as u64 + RECORD_OVERHEAD as u64;
        id += 1;
    }
    Ok(pos)
}

// ------------------------------------------------------------------------------------------------
// Lock helpers
// ------------------------------------------------------------------------------------------------

fn lock_buffers(inner: &WalInner) -> Result<MutexGuard<'_, VecDeque<Arc<WalBuffer>>>, WalError> {
    inner
        .buffers
        .lock()
        .map_err(|_| WalError::Internal("buffer queue lock poisoned".into()))
}

fn lock_files(inner: &WalInner) -> Result<MutexGuard<'_, WalFiles>, WalError> {
    inner
        .files
        .lock()
        .map_err(|_| WalError::Internal("wal files lock poisoned".into()))
}
