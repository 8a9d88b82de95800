use crate::core::Result;

/// Weight given to a shard that does not ask for more.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Describes one logical shard and how to build its resource handle.
///
/// A descriptor is identified by its position in the list handed to the
/// router, not by value: two descriptors with the same weight and name are
/// still distinct shards.
pub trait ShardInfo<R> {
    /// Relative capacity. Each unit of weight places
    /// [`VIRTUAL_NODES_PER_WEIGHT`](super::ring::VIRTUAL_NODES_PER_WEIGHT)
    /// virtual nodes on the ring. Must be positive.
    fn weight(&self) -> u32 {
        DEFAULT_WEIGHT
    }

    /// Stable name. Named shards keep their ring positions when the
    /// descriptor list is reordered; unnamed shards are placed by index.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Builds the resource handle for this shard. Called exactly once, while
    /// the router is being constructed.
    fn create_resource(&self) -> Result<R>;
}
