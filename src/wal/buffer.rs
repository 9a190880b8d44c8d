//! In-memory WAL write buffer.
//!
//! A buffer is an append-only batch of log payloads covering a contiguous
//! log-id range starting at `first_log_id`. Lifecycle: created on the
//! first append after the previous buffer was sealed, frozen when full or
//! on shutdown, destroyed once the flush worker has made its contents
//! durable.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::segment::RECORD_OVERHEAD;

/// One unflushed batch of log records.
///
/// Appends go through the owning store while the buffer is unfrozen; the
/// flush worker and iterators only read. Readers and the single appender
/// synchronize on the internal `RwLock`; `frozen` flips once and never
/// back.
#[derive(Debug)]
pub(crate) struct WalBuffer {
    /// Log id of the first record in this buffer.
    first_log_id: u64,

    /// Payloads in log-id order.
    logs: RwLock<Vec<Vec<u8>>>,

    /// Serialized size of the buffered records, record framing included.
    size: AtomicUsize,

    /// Sealed: no further appends, eligible for flush.
    frozen: AtomicBool,
}

impl WalBuffer {
    pub(crate) fn new(first_log_id: u64) -> Self {
        Self {
            first_log_id,
            logs: RwLock::new(Vec::new()),
            size: AtomicUsize::new(0),
            frozen: AtomicBool::new(false),
        }
    }

    pub(crate) fn first_log_id(&self) -> u64 {
        self.first_log_id
    }

    /// Number of buffered records.
    pub(crate) fn len(&self) -> usize {
        self.logs.read().map(|logs| logs.len()).unwrap_or(0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized byte size, including per-record framing.
    pub(crate) fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Appends one payload. The caller guarantees the buffer is unfrozen
    /// and that the payload's log id is `first_log_id + len()`.
    pub(crate) fn push(&self, msg: Vec<u8>) {
        let bytes = msg.len() + RECORD_OVERHEAD;
        if let Ok(mut logs) = self.logs.write() {
            logs.push(msg);
            self.size.fetch_add(bytes, Ordering::AcqRel);
        }
    }

    /// Reads the payload at the given in-buffer index.
    pub(crate) fn log(&self, idx: usize) -> Option<Vec<u8>> {
        self.logs.read().ok()?.get(idx).cloned()
    }

    /// Runs `f` over every buffered payload in order.
    pub(crate) fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&[u8]),
    {
        if let Ok(logs) = self.logs.read() {
            for msg in logs.iter() {
                f(msg);
            }
        }
    }

    /// Drops every record beyond the first `keep` entries.
    ///
    /// Used by log rollback; the caller holds the queue lock, so no
    /// append races this.
    pub(crate) fn truncate_to(&self, keep: usize) {
        if let Ok(mut logs) = self.logs.write() {
            while logs.len() > keep {
                if let Some(msg) = logs.pop() {
                    self.size
                        .fetch_sub(msg.len() + RECORD_OVERHEAD, Ordering::AcqRel);
                }
            }
        }
    }
}
