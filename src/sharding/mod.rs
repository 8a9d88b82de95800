//! Consistent-hash shard routing.
//!
//! A [`ShardRouter`] is built once from an ordered list of [`ShardInfo`]
//! descriptors. Each descriptor contributes weighted virtual nodes to a
//! [`HashRing`] and one resource handle (typically a connection pool) to the
//! resource table. Keys are reduced to their tag by a [`KeyTagResolver`],
//! hashed, and owned by the first virtual node clockwise from the hash.

pub mod config;
pub mod info;
pub mod ring;
pub mod router;
pub mod tag;

pub use config::RouterConfig;
pub use info::{DEFAULT_WEIGHT, ShardInfo};
pub use ring::{HashRing, VIRTUAL_NODES_PER_WEIGHT};
pub use router::{FnShard, ShardRouter};
pub use tag::{DEFAULT_KEY_TAG_PATTERN, KeyTagResolver};
