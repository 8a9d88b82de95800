//! Consistent hash ring.
//!
//! Every shard is spread over `160 × weight` virtual nodes. A key is owned by
//! the first virtual node clockwise from the key's hash; past the largest
//! point the walk wraps to the smallest.

use crate::core::{Result, ShardError};
use crate::hashing::HashAlgorithm;
use std::collections::{BTreeMap, HashSet};

/// Virtual nodes placed per unit of shard weight.
pub const VIRTUAL_NODES_PER_WEIGHT: u32 = 160;

/// Sorted map of ring positions to shard indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashRing {
    /// Ring position -> index of the owning shard in the descriptor list.
    points: BTreeMap<u64, usize>,
    /// Virtual nodes that landed on an already occupied position.
    collisions: usize,
}

impl HashRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual nodes a shard of `weight` occupies, `None` past `u32::MAX`.
    pub fn virtual_node_count(weight: u32) -> Option<u32> {
        VIRTUAL_NODES_PER_WEIGHT.checked_mul(weight)
    }

    /// Name hashed to place virtual node `vnode` of the shard at `index`.
    ///
    /// Unnamed shards are keyed by list position, named shards by
    /// `name*weight` so their points do not depend on list order.
    pub fn virtual_node_key(index: usize, weight: u32, name: Option<&str>, vnode: u32) -> String {
        match name {
            Some(name) => format!("{}*{}{}", name, weight, vnode),
            None => format!("SHARD-{}-NODE-{}", index, vnode),
        }
    }

    /// Places all virtual nodes of one shard.
    ///
    /// Returns how many of them overwrote an existing point. The later
    /// placement always wins a collision.
    pub fn place_shard(
        &mut self,
        algo: &dyn HashAlgorithm,
        index: usize,
        weight: u32,
        name: Option<&str>,
    ) -> Result<usize> {
        let count = Self::virtual_node_count(weight).ok_or_else(|| {
            ShardError::ConstructionFailure(format!(
                "weight {} needs more than {} virtual nodes",
                weight,
                u32::MAX
            ))
        })?;
        let mut collisions = 0;
        for vnode in 0..count {
            let key = Self::virtual_node_key(index, weight, name, vnode);
            let hash = algo.hash(key.as_bytes())?;
            if self.insert(hash, index).is_some() {
                collisions += 1;
            }
        }
        Ok(collisions)
    }

    /// Inserts a single point, returning the shard it displaced.
    pub fn insert(&mut self, hash: u64, index: usize) -> Option<usize> {
        let previous = self.points.insert(hash, index);
        if previous.is_some() {
            self.collisions += 1;
        }
        previous
    }

    /// Owner of `hash`: the first point `>= hash`, wrapping to the smallest.
    #[inline]
    pub fn locate(&self, hash: u64) -> Option<usize> {
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, index)| *index)
    }

    /// Number of points on the ring.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Distinct shard indices in ring order (first appearance).
    pub fn owners(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.points
            .values()
            .filter(|index| seen.insert(**index))
            .copied()
            .collect()
    }

    /// Iterates `(position, shard index)` in ascending position order.
    pub fn points(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.points.iter().map(|(hash, index)| (*hash, *index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::Hashing;

    #[test]
    fn test_virtual_node_keys() {
        assert_eq!(HashRing::virtual_node_key(2, 1, None, 7), "SHARD-2-NODE-7");
        assert_eq!(
            HashRing::virtual_node_key(2, 3, Some("cache-a"), 7),
            "cache-a*37"
        );
    }

    #[test]
    fn test_place_shard_fan_out() {
        let mut ring = HashRing::new();
        let collisions = ring.place_shard(&Hashing::Murmur, 0, 2, None).unwrap();
        assert_eq!(collisions, 0);
        assert_eq!(ring.len(), 320);
        assert_eq!(ring.owners(), vec![0]);
    }

    #[test]
    fn test_oversized_weight_rejected() {
        let largest = u32::MAX / VIRTUAL_NODES_PER_WEIGHT;
        assert_eq!(HashRing::virtual_node_count(largest), Some(largest * 160));
        assert_eq!(HashRing::virtual_node_count(largest + 1), None);

        let mut ring = HashRing::new();
        for weight in [largest + 1, u32::MAX] {
            assert!(matches!(
                ring.place_shard(&Hashing::Murmur, 0, weight, Some("huge")),
                Err(ShardError::ConstructionFailure(_))
            ));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_single_point_wraps_around() {
        let mut ring = HashRing::new();
        ring.insert(500, 0);

        assert_eq!(ring.locate(0), Some(0));
        assert_eq!(ring.locate(500), Some(0));
        assert_eq!(ring.locate(501), Some(0));
        assert_eq!(ring.locate(u64::MAX), Some(0));
    }

    #[test]
    fn test_successor_lookup() {
        let mut ring = HashRing::new();
        ring.insert(100, 0);
        ring.insert(200, 1);
        ring.insert(300, 2);

        assert_eq!(ring.locate(50), Some(0));
        assert_eq!(ring.locate(100), Some(0));
        assert_eq!(ring.locate(101), Some(1));
        assert_eq!(ring.locate(250), Some(2));
        assert_eq!(ring.locate(301), Some(0));
    }

    #[test]
    fn test_collision_overwrites_and_counts() {
        let mut ring = HashRing::new();
        assert_eq!(ring.insert(42, 0), None);
        assert_eq!(ring.insert(42, 1), Some(0));

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.collisions(), 1);
        assert_eq!(ring.locate(0), Some(1));
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.locate(12345), None);
        assert!(ring.owners().is_empty());
    }

    #[test]
    fn test_owners_in_ring_order() {
        let mut ring = HashRing::new();
        ring.insert(10, 2);
        ring.insert(20, 0);
        ring.insert(30, 2);
        ring.insert(40, 1);

        assert_eq!(ring.owners(), vec![2, 0, 1]);
        let points: Vec<_> = ring.points().collect();
        assert_eq!(points, vec![(10, 2), (20, 0), (30, 2), (40, 1)]);
    }
}
