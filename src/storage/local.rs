//! In-process storage client for single-binary deployments.
//!
//! Routes every call to a host-supplied handler on a private worker
//! pool, behind the same [`StorageClient`] trait a network client
//! implements; callers cannot tell the difference, which is the point.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{Sender, unbounded};
use tracing::{debug, error};

use super::{
    GetNeighborsRequest, GetNeighborsResponse, RpcFuture, StorageClient, StorageError,
};

/// Handler signature for the local storage tier.
pub type NeighborsHandler =
    dyn Fn(GetNeighborsRequest) -> Result<GetNeighborsResponse, StorageError> + Send + Sync;

type Job = Box<dyn FnOnce() + Send>;

/// A [`StorageClient`] that executes requests in-process.
pub struct LocalStorageClient {
    handler: Arc<NeighborsHandler>,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for LocalStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorageClient")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl LocalStorageClient {
    /// Spawns `num_threads` workers draining a shared job queue.
    pub fn new<H>(num_threads: usize, handler: H) -> Self
    where
        H: Fn(GetNeighborsRequest) -> Result<GetNeighborsResponse, StorageError>
            + Send
            + Sync
            + 'static,
    {
        let (tx, rx) = unbounded::<Job>();
        let workers = (0..num_threads.max(1))
            .map(|i| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("local-storage-{i}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                    })
                    .expect("spawning a local storage worker")
            })
            .collect();

        Self {
            handler: Arc::new(handler),
            tx: Some(tx),
            workers,
        }
    }
}

impl StorageClient for LocalStorageClient {
    fn get_neighbors(&self, req: GetNeighborsRequest) -> RpcFuture<GetNeighborsResponse> {
        let (promise, future) = RpcFuture::channel();
        let handler = Arc::clone(&self.handler);

        let Some(tx) = self.tx.as_ref() else {
            promise.fulfill(Err(StorageError::Disconnected));
            return future;
        };
        let job: Job = Box::new(move || {
            debug!(parts = req.parts.len(), "serving get_neighbors locally");
            promise.fulfill(handler(req));
        });
        if tx.send(job).is_err() {
            // Workers are gone; the dropped promise resolves the future
            // to Disconnected.
            error!("local storage pool is shut down");
        }
        future
    }
}

impl Drop for LocalStorageClient {
    fn drop(&mut self) {
        // Closing the channel drains and stops the workers.
        self.tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("local storage worker panicked");
            }
        }
    }
}
