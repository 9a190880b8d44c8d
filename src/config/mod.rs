//! # Configuration
//!
//! Typed configuration structs, one per subsystem, passed in at
//! construction. The core has no global flags: the host binary parses
//! whatever external source it likes (file, environment, command line)
//! and hands the populated structs over.
//!
//! Defaults follow the production deployments this engine descends from;
//! `validate()` enforces the documented ranges before a subsystem will
//! accept the struct.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

/// Inclusive bounds for `session_idle_timeout_sec`.
pub const SESSION_IDLE_TIMEOUT_RANGE: (u64, u64) = (1, 604_800);

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// A configuration value fell outside its documented range.
#[derive(Debug, Error)]
#[error("invalid config: {field} = {value} ({reason})")]
pub struct ConfigError {
    /// Dotted field path, e.g. `executor.session_idle_timeout_sec`.
    pub field: &'static str,
    /// The offending value, rendered.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ConfigError {
    fn new(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// WAL
// ------------------------------------------------------------------------------------------------

/// Write-ahead log sizing.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Segment size cap in MiB; a segment closes once the next record
    /// would push it past this (a single record may complete over it).
    pub file_size_mb: u64,

    /// Per in-memory write buffer cap in MiB.
    pub buffer_size_mb: u64,

    /// Depth of the frozen-buffer queue; appenders block when it is full.
    pub num_buffers: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            file_size_mb: 16,
            buffer_size_mb: 8,
            num_buffers: 4,
        }
    }
}

impl WalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_size_mb == 0 {
            return Err(ConfigError::new(
                "wal.file_size_mb",
                self.file_size_mb,
                "must be positive",
            ));
        }
        if self.buffer_size_mb == 0 {
            return Err(ConfigError::new(
                "wal.buffer_size_mb",
                self.buffer_size_mb,
                "must be positive",
            ));
        }
        if self.num_buffers < 2 {
            return Err(ConfigError::new(
                "wal.num_buffers",
                self.num_buffers,
                "need at least an active and an in-flight buffer",
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Cache
// ------------------------------------------------------------------------------------------------

/// Graph cache shape and budgets.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Total capacity reserved for the in-memory cache, in MiB.
    pub capacity_mb: u64,

    /// Hash-table buckets in base-2 logarithm (sizes the initial
    /// per-shard capacity).
    pub buckets_power: u32,

    /// Lock shards in base-2 logarithm; reads take a shard's shared
    /// lock, mutations its exclusive lock.
    pub locks_power: u32,

    /// Byte budget of the vertex-property pool, in MiB.
    pub vertex_pool_mb: u64,

    /// Byte budget of the edge-topology pool, in MiB.
    pub edge_pool_mb: u64,

    /// TTL for vertex-property items, in seconds.
    pub vertex_item_ttl_sec: u64,

    /// TTL for edge-topology items, in seconds.
    pub edge_item_ttl_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_mb: 100,
            buckets_power: 10,
            locks_power: 5,
            vertex_pool_mb: 50,
            edge_pool_mb: 50,
            vertex_item_ttl_sec: 300,
            edge_item_ttl_sec: 300,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_mb == 0 {
            return Err(ConfigError::new(
                "cache.capacity_mb",
                self.capacity_mb,
                "must be positive",
            ));
        }
        if self.locks_power > 16 {
            return Err(ConfigError::new(
                "cache.locks_power",
                self.locks_power,
                "more than 2^16 shards is never useful",
            ));
        }
        if self.buckets_power < self.locks_power {
            return Err(ConfigError::new(
                "cache.buckets_power",
                self.buckets_power,
                "must be at least locks_power",
            ));
        }
        if self.vertex_pool_mb + self.edge_pool_mb > self.capacity_mb {
            return Err(ConfigError::new(
                "cache.capacity_mb",
                self.capacity_mb,
                "pool budgets exceed the total capacity",
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Executor
// ------------------------------------------------------------------------------------------------

/// Query executor dataflow knobs.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Worker threads executing a single operator.
    pub num_operator_threads: usize,

    /// Concurrent session cap per (client ip, user) pair.
    pub max_sessions_per_ip_per_user: usize,

    /// Seconds before an idle session expires. Bounded by
    /// [`SESSION_IDLE_TIMEOUT_RANGE`].
    pub session_idle_timeout_sec: u64,

    /// Whether a storage RPC that succeeded for only part of its
    /// partitions counts as success (`true`) or surfaces a partial-result
    /// error (`false`).
    pub accept_partial_success: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_operator_threads: 2,
            max_sessions_per_ip_per_user: 300,
            session_idle_timeout_sec: 28_800,
            accept_partial_success: false,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_operator_threads == 0 {
            return Err(ConfigError::new(
                "executor.num_operator_threads",
                self.num_operator_threads,
                "must be positive",
            ));
        }
        let (lo, hi) = SESSION_IDLE_TIMEOUT_RANGE;
        if !(lo..=hi).contains(&self.session_idle_timeout_sec) {
            return Err(ConfigError::new(
                "executor.session_idle_timeout_sec",
                self.session_idle_timeout_sec,
                "must be within 1..=604800",
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Aggregate
// ------------------------------------------------------------------------------------------------

/// Configuration for the whole core, one sub-struct per subsystem.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub wal: WalConfig,
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
}

impl CoreConfig {
    /// Validates every subsystem section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wal.validate()?;
        self.cache.validate()?;
        self.executor.validate()?;
        Ok(())
    }
}
