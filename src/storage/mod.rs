//! # Storage Client Surface
//!
//! The seam between the query executor and the storage tier: the
//! neighbor request/response shapes, a [`StorageClient`] trait whose
//! calls return thread-based [`RpcFuture`]s, an in-process
//! [`LocalStorageClient`] for single-binary deployments, and the
//! [`CachedStorageClient`] read-through wrapper that serves topology-only
//! neighbor requests straight from the edge cache.
//!
//! The executor is handed an `Arc<dyn StorageClient>` and never learns
//! which implementation is behind it.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod local;
mod read_through;

pub use local::LocalStorageClient;
pub use read_through::CachedStorageClient;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use thiserror::Error;

use crate::expr::Expr;
use crate::value::{DataSet, Row};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors crossing the storage seam.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The request shape cannot be served (by the callee or by the cache
    /// short-circuit).
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The addressed space/partition/key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call completed but some partitions failed.
    #[error("partial success, {} partition(s) failed", failed_parts.len())]
    Partial { failed_parts: Vec<i32> },

    /// The caller-imposed deadline expired.
    #[error("storage rpc timed out")]
    Timeout,

    /// The responder went away without answering.
    #[error("storage rpc channel closed")]
    Disconnected,

    /// Internal consistency error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Request / response shapes
// ------------------------------------------------------------------------------------------------

/// Vertex properties requested per tag.
#[derive(Debug, Clone, Default)]
pub struct VertexProp {
    pub tag: String,
    pub props: Vec<String>,
}

/// Edge properties requested per edge type. Positive `etype` selects
/// outgoing edges, negative the reverse view.
#[derive(Debug, Clone, Default)]
pub struct EdgeProp {
    pub etype: i32,
    pub name: String,
    pub props: Vec<String>,
}

/// What a get-neighbors traversal should fetch and how.
#[derive(Debug, Clone, Default)]
pub struct TraverseSpec {
    /// Tag properties to return per vertex; `None` means the caller did
    /// not constrain them (and the cache cannot help).
    pub vertex_props: Option<Vec<VertexProp>>,

    /// Edge properties to return per edge type.
    pub edge_props: Option<Vec<EdgeProp>>,

    /// Server-side filter expression.
    pub filter: Option<Expr>,

    /// Random-sample the neighbors instead of returning all of them.
    pub random: bool,

    /// Cap on returned neighbors per vertex.
    pub limit: Option<i64>,
}

/// A get-neighbors request: per-partition vertex rows (first value of
/// each row is the vertex id) plus the traverse spec.
#[derive(Debug, Clone, Default)]
pub struct GetNeighborsRequest {
    pub parts: BTreeMap<i32, Vec<Row>>,
    pub spec: TraverseSpec,
}

/// A get-neighbors response: one dataset following the neighbor-response
/// column convention, plus the partitions that failed.
#[derive(Debug, Clone, Default)]
pub struct GetNeighborsResponse {
    pub vertices: Option<DataSet>,
    pub failed_parts: Vec<i32>,
}

impl GetNeighborsResponse {
    /// Whether some partitions failed to answer.
    pub fn is_partial(&self) -> bool {
        !self.failed_parts.is_empty()
    }
}

// ------------------------------------------------------------------------------------------------
// Thread-based futures
// ------------------------------------------------------------------------------------------------

/// Fulfilling side of an [`RpcFuture`].
#[derive(Debug)]
pub struct RpcPromise<T> {
    tx: Sender<Result<T, StorageError>>,
}

impl<T> RpcPromise<T> {
    /// Delivers the result; the paired future wakes. A dropped waiter is
    /// not an error.
    pub fn fulfill(self, result: Result<T, StorageError>) {
        let _ = self.tx.send(result);
    }
}

/// A one-shot result handle backed by a bounded crossbeam channel.
///
/// The carrying worker blocks in [`RpcFuture::wait`] (or bounds the wait
/// with a deadline); there is no reactor. An optional inspection hook
/// runs on the waiter right before the result is returned; the
/// read-through cache uses it to repopulate from fresh responses.
pub struct RpcFuture<T> {
    rx: Receiver<Result<T, StorageError>>,
    hook: Option<Box<dyn FnOnce(&Result<T, StorageError>) + Send>>,
}

impl<T> std::fmt::Debug for RpcFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcFuture")
            .field("has_hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> RpcFuture<T> {
    /// A connected promise/future pair.
    pub fn channel() -> (RpcPromise<T>, RpcFuture<T>) {
        let (tx, rx) = bounded(1);
        (RpcPromise { tx }, RpcFuture { rx, hook: None })
    }

    /// A future that is already resolved.
    pub fn ready(result: Result<T, StorageError>) -> RpcFuture<T> {
        let (promise, future) = Self::channel();
        promise.fulfill(result);
        future
    }

    /// Attaches an observer invoked with the result on the waiting
    /// thread. Later hooks replace earlier ones.
    pub fn inspect<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Result<T, StorageError>) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Blocks until the result arrives.
    pub fn wait(mut self) -> Result<T, StorageError> {
        let result = self
            .rx
            .recv()
            .unwrap_or_else(|_| Err(StorageError::Disconnected));
        if let Some(hook) = self.hook.take() {
            hook(&result);
        }
        result
    }

    /// Blocks up to `timeout`; expiry surfaces as
    /// [`StorageError::Timeout`].
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<T, StorageError> {
        let result = match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(StorageError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(StorageError::Disconnected),
        };
        if let Some(hook) = self.hook.take() {
            hook(&result);
        }
        result
    }
}

// ------------------------------------------------------------------------------------------------
// Client trait
// ------------------------------------------------------------------------------------------------

/// The storage RPC surface the executor depends on.
///
/// Implementations: a network client (out of scope here), the in-process
/// [`LocalStorageClient`], and the [`CachedStorageClient`] decorator.
pub trait StorageClient: Send + Sync {
    /// Fetches neighbors (and requested properties) for a batch of
    /// vertices.
    fn get_neighbors(&self, req: GetNeighborsRequest) -> RpcFuture<GetNeighborsResponse>;
}
