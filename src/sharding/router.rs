use super::config::RouterConfig;
use super::info::ShardInfo;
use super::ring::HashRing;
use super::tag::KeyTagResolver;
use crate::core::{Result, ShardError};
use crate::hashing::HashAlgorithm;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Routes keys to shards over a consistent hash ring.
///
/// The ring, the tag resolver and the resource table are built in
/// [`with_config`](Self::with_config) and never change afterwards, so a
/// router can be shared behind an `Arc` and queried from any number of
/// threads without locking. Resharding means building a new router.
pub struct ShardRouter<R, S> {
    /// Descriptors in construction order; the position is the identity.
    shards: Vec<S>,
    /// `resources[i]` was created by `shards[i]`.
    resources: Vec<R>,
    ring: HashRing,
    tags: KeyTagResolver,
    algo: Arc<dyn HashAlgorithm>,
}

impl<R, S: ShardInfo<R>> ShardRouter<R, S> {
    /// Builds a router with the default configuration.
    pub fn new(shards: Vec<S>) -> Result<Self> {
        Self::with_config(shards, RouterConfig::default())
    }

    /// Builds the ring and creates one resource per descriptor, in order.
    ///
    /// Any failure aborts construction. Resources created before the
    /// failure are dropped together with the partially built router.
    pub fn with_config(shards: Vec<S>, config: RouterConfig) -> Result<Self> {
        let span = info_span!(
            "router.build",
            shards = shards.len(),
            algorithm = %config.hash_algorithm.name()
        );
        let _enter = span.enter();

        let tags = KeyTagResolver::new(config.tag_pattern.as_deref())?;
        if shards.is_empty() && config.require_shards {
            return Err(ShardError::ConstructionFailure(
                "at least one shard is required".to_string(),
            ));
        }

        let algo = config.hash_algorithm;
        let mut ring = HashRing::new();
        let mut resources = Vec::with_capacity(shards.len());

        for (index, shard) in shards.iter().enumerate() {
            let label = shard_label(index, shard.name());
            let weight = shard.weight();
            if weight == 0 {
                return Err(ShardError::ConstructionFailure(format!(
                    "shard {} has weight 0; weight must be positive",
                    label
                )));
            }
            if HashRing::virtual_node_count(weight).is_none() {
                return Err(ShardError::ConstructionFailure(format!(
                    "shard {} has weight {}; too many virtual nodes for the ring",
                    label, weight
                )));
            }

            let collisions = ring.place_shard(algo.as_ref(), index, weight, shard.name())?;
            if collisions > 0 {
                event!(
                    Level::WARN,
                    shard = %label,
                    collisions,
                    "virtual node positions overwritten"
                );
                if config.strict_collisions {
                    return Err(ShardError::ConstructionFailure(format!(
                        "shard {} collided with {} existing virtual node(s)",
                        label, collisions
                    )));
                }
            }

            let resource = shard.create_resource().map_err(|err| {
                event!(Level::ERROR, shard = %label, error = %err, "resource creation failed");
                ShardError::ConstructionFailure(format!(
                    "shard {} failed to create its resource: {}",
                    label, err
                ))
            })?;
            resources.push(resource);
        }

        event!(
            Level::INFO,
            virtual_nodes = ring.len(),
            collisions = ring.collisions(),
            "hash ring built"
        );

        Ok(Self {
            shards,
            resources,
            ring,
            tags,
            algo,
        })
    }

    /// Position of the descriptor that owns `key`.
    pub fn shard_index(&self, key: &str) -> Result<usize> {
        self.shard_index_for_bytes(key.as_bytes())
    }

    pub fn shard_index_for_bytes(&self, key: &[u8]) -> Result<usize> {
        if self.ring.is_empty() {
            return Err(ShardError::EmptyRingLookup);
        }
        let hash = self.algo.hash(self.tags.resolve(key))?;
        self.ring.locate(hash).ok_or(ShardError::EmptyRingLookup)
    }

    /// Descriptor that owns `key`.
    pub fn shard_info(&self, key: &str) -> Result<&S> {
        Ok(&self.shards[self.shard_index(key)?])
    }

    pub fn shard_info_for_bytes(&self, key: &[u8]) -> Result<&S> {
        Ok(&self.shards[self.shard_index_for_bytes(key)?])
    }

    /// Resource of the shard that owns `key`. The same handle is returned
    /// for every key owned by that shard.
    pub fn shard(&self, key: &str) -> Result<&R> {
        Ok(&self.resources[self.shard_index(key)?])
    }

    pub fn shard_for_bytes(&self, key: &[u8]) -> Result<&R> {
        Ok(&self.resources[self.shard_index_for_bytes(key)?])
    }

    /// Distinct descriptors present on the ring, in ring order.
    pub fn all_shard_info(&self) -> Vec<&S> {
        self.ring
            .owners()
            .into_iter()
            .map(|index| &self.shards[index])
            .collect()
    }

    /// All resources, in construction order.
    pub fn all_shards(&self) -> &[R] {
        &self.resources
    }
}

impl<R, S> ShardRouter<R, S> {
    /// Descriptors in construction order.
    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    /// The part of `key` that is hashed.
    pub fn key_tag<'k>(&self, key: &'k str) -> &'k str {
        self.tags.key_tag(key)
    }

    pub fn tag_pattern(&self) -> Option<&str> {
        self.tags.pattern()
    }

    pub fn hash_algorithm(&self) -> &dyn HashAlgorithm {
        self.algo.as_ref()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn virtual_node_count(&self) -> usize {
        self.ring.len()
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}

impl<R, S> fmt::Debug for ShardRouter<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardRouter")
            .field("shards", &self.shards.len())
            .field("virtual_nodes", &self.ring.len())
            .field("algorithm", &self.algo.name())
            .field("tag_pattern", &self.tags.pattern())
            .finish()
    }
}

fn shard_label(index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("'{}'", name),
        None => format!("#{}", index),
    }
}

/// Descriptor built from a closure, handy when the resource needs no
/// configuration beyond what the closure captures.
pub struct FnShard<R, F> {
    weight: u32,
    name: Option<String>,
    factory: F,
    _resource: PhantomData<fn() -> R>,
}

impl<R, F> FnShard<R, F>
where
    F: Fn() -> Result<R>,
{
    pub fn new(factory: F) -> Self {
        Self {
            weight: super::info::DEFAULT_WEIGHT,
            name: None,
            factory,
            _resource: PhantomData,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl<R, F> ShardInfo<R> for FnShard<R, F>
where
    F: Fn() -> Result<R>,
{
    fn weight(&self) -> u32 {
        self.weight
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn create_resource(&self) -> Result<R> {
        (self.factory)()
    }
}
