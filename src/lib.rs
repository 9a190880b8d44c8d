//! # PlexusDB
//!
//! The storage and query core of a distributed graph database: the
//! write-ahead log underpinning a replicated-log consensus layer, the
//! edge-topology cache that short-circuits neighbor lookups, and the
//! iterator model the query executor streams results through.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Executor                            │
//! │   ┌──────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │   │ Operator │──►│ RowIter  │──►│ Operator (filter,     │  │
//! │   │ pool     │   │ variants │   │ project, limit, ...)  │  │
//! │   └────┬─────┘   └──────────┘   └───────────┬───────────┘  │
//! │        │ get_neighbors                      │              │
//! │        ▼                                    ▼              │
//! │   ┌──────────────────┐              ┌──────────────┐       │
//! │   │ CachedStorage    │── miss ────► │ StorageClient│       │
//! │   │ Client           │              │ (local/remote)│      │
//! │   │   │ hit          │              └──────┬───────┘       │
//! │   │   ▼              │                     │ writes        │
//! │   │ GraphCache (LRU) │                     ▼               │
//! │   └──────────────────┘              ┌──────────────┐       │
//! │                                     │   WalStore   │       │
//! │                                     │ (segments +  │       │
//! │                                     │  buffers)    │       │
//! │                                     └──────────────┘       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`wal`] | Segment-file write-ahead log: ordered appends, buffered flush, crash recovery, forward iterators |
//! | [`cache`] | Pooled, TTL'd LRU plus the graph-facing vertex/edge pool wrapper |
//! | [`iterator`] | Default / sequential / neighbors / property / join row iterators |
//! | [`executor`] | Operator worker pool, filter/project/limit/get-neighbors, sessions |
//! | [`storage`] | Storage client seam: request shapes, thread-based futures, local variant, cache read-through |
//! | [`value`] | The graph value union, datasets, vertices, edges |
//! | [`expr`] | Expression trees with three-valued null/empty logic |
//! | [`config`] | Per-subsystem configuration structs |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plexusdb::config::WalConfig;
//! use plexusdb::wal::WalStore;
//!
//! let wal = WalStore::open("/var/lib/plexus/wal", WalConfig::default()).unwrap();
//! wal.append(1, b"vertex insert".to_vec()).unwrap();
//! wal.append(2, b"edge insert".to_vec()).unwrap();
//!
//! let mut iter = wal.iterator(1, None);
//! while iter.valid() {
//!     println!("{} -> {} bytes", iter.log_id(), iter.log_msg().len());
//!     iter.next();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod executor;
pub mod expr;
pub mod iterator;
pub mod storage;
pub mod value;
pub mod wal;
