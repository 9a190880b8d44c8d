//! # Executor Dataflow
//!
//! The operator layer of the query engine: a shared worker pool running
//! operators that consume and produce [`RowIter`]s, with per-operator
//! timeouts, a partial-success policy for storage responses, and session
//! accounting.
//!
//! ## Model
//!
//! Operators are plain functions scheduled on the [`OperatorPool`]; each
//! submission returns a [`TaskHandle`] the plan driver waits on. When a
//! plan fans out, the first failure wins and later results are dropped.
//! Iterators are single-owner: an operator receives its input iterator
//! by value and hands a (possibly different) iterator back.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod operators;
mod session;

pub use operators::{filter, get_neighbors, limit, project};
pub use session::{SessionId, SessionManager};

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by operators and the pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The operator's deadline expired.
    #[error("operator timed out")]
    Timeout,

    /// A storage RPC answered for only part of its partitions and the
    /// session does not accept partial success.
    #[error("partial storage result, {} partition(s) failed", failed_parts.len())]
    Partial { failed_parts: Vec<i32> },

    /// Ill-formed operator input (bad iterator, bad plan argument).
    #[error("invalid operator input: {0}")]
    Invalid(String),

    /// Session admission was refused.
    #[error("session rejected: {0}")]
    SessionRejected(String),

    /// Failure from the storage seam.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Internal consistency error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout => ExecutorError::Timeout,
            StorageError::Partial { failed_parts } => ExecutorError::Partial { failed_parts },
            other => ExecutorError::Storage(other),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Task handles
// ------------------------------------------------------------------------------------------------

/// One-shot result handle for a submitted operator.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T, ExecutorError>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the operator finishes.
    pub fn wait(self) -> Result<T, ExecutorError> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(ExecutorError::Internal("operator dropped its result".into())))
    }

    /// Blocks up to `timeout`; expiry surfaces as
    /// [`ExecutorError::Timeout`].
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, ExecutorError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ExecutorError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ExecutorError::Internal("operator dropped its result".into()))
            }
        }
    }
}

/// Waits on a fan-out in submission order; the first failure wins and the
/// remaining results are dropped.
pub fn join_all<T>(handles: Vec<TaskHandle<T>>) -> Result<Vec<T>, ExecutorError> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.wait()?);
    }
    Ok(results)
}

// ------------------------------------------------------------------------------------------------
// Operator pool
// ------------------------------------------------------------------------------------------------

type Job = Box<dyn FnOnce() + Send>;

/// Fixed-size worker pool executing operators.
pub struct OperatorPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for OperatorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorPool")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl OperatorPool {
    /// Spawns `num_operator_threads` workers.
    pub fn new(num_threads: usize) -> Self {
        let (tx, rx) = unbounded::<Job>();
        let workers = (0..num_threads.max(1))
            .map(|i| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("operator-{i}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                    })
                    .expect("spawning an operator worker")
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Schedules an operator body; the handle resolves with its result.
    pub fn submit<T, F>(&self, body: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ExecutorError> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let _ = tx.send(body());
        });

        match self.tx.as_ref() {
            Some(pool_tx) if pool_tx.send(job).is_ok() => {}
            _ => error!("operator pool is shut down, dropping submission"),
        }
        TaskHandle { rx }
    }
}

impl Drop for OperatorPool {
    fn drop(&mut self) {
        self.tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("operator worker panicked");
            }
        }
    }
}
