//! Async object pool used as the per-shard resource.
//!
//! The router never borrows from a pool itself; it only hands out the pool
//! that owns a key. Borrowing, returning and invalidating happen in the
//! caller's task and may wait, lookups never do.

pub mod config;
#[allow(clippy::module_inception)]
pub mod pool;

pub use config::PoolConfig;
pub use pool::{ObjectPool, PoolGuard, PoolStats, PoolableFactory};
