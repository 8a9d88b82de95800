// ============================================================================
// memshard Library
// ============================================================================

pub mod connection;
pub mod core;
pub mod hashing;
pub mod pool;
pub mod sharding;

// Re-export main types for convenience
pub use core::{Result, ShardError};
pub use hashing::{HashAlgorithm, Hashing, MURMUR_SEED, md5_fold_64, murmur_hash_64a};
pub use sharding::{
    DEFAULT_KEY_TAG_PATTERN, DEFAULT_WEIGHT, FnShard, HashRing, KeyTagResolver, RouterConfig,
    ShardInfo, ShardRouter, VIRTUAL_NODES_PER_WEIGHT,
};

// Re-export pool and node API
pub use connection::{
    NodeConnection,
    config::{NodePool, NodeShardInfo},
    factory::NodeConnectionFactory,
    node::{MemoryNode, NodeRegistry},
    topology::TopologyConfig,
};
pub use pool::{ObjectPool, PoolConfig, PoolGuard, PoolStats, PoolableFactory};

use futures::future::join_all;

// ============================================================================
// High-level Client API
// ============================================================================

/// Key-value client over a sharded set of nodes
///
/// Every command is routed to the node owning its key, and runs on a
/// connection borrowed from that node's pool. Keys sharing a tag
/// (`{user:42}:name`, `{user:42}:email`) always land on the same node.
///
/// # Examples
///
/// ```
/// use memshard::{NodeRegistry, ShardedClient};
///
/// # tokio_test::block_on(async {
/// NodeRegistry::global().start_node("127.0.0.1", 7801, None).unwrap();
/// NodeRegistry::global().start_node("127.0.0.1", 7802, None).unwrap();
///
/// let client = ShardedClient::from_urls(&[
///     "memshard://127.0.0.1:7801?name=a",
///     "memshard://127.0.0.1:7802?name=b",
/// ]).unwrap();
///
/// client.set("{user:42}:name", "Alice").await.unwrap();
/// let name = client.get("{user:42}:name").await.unwrap();
/// assert_eq!(name.as_deref(), Some("Alice"));
/// # });
/// ```
#[derive(Debug)]
pub struct ShardedClient {
    router: ShardRouter<NodePool, NodeShardInfo>,
}

impl ShardedClient {
    /// Build a client with the default hash and tag pattern
    ///
    /// No connection is opened until the first command.
    pub fn new(shards: Vec<NodeShardInfo>) -> Result<Self> {
        Self::with_config(shards, RouterConfig::new())
    }

    /// Build a client with custom routing settings
    pub fn with_config(shards: Vec<NodeShardInfo>, config: RouterConfig) -> Result<Self> {
        let router = ShardRouter::with_config(shards, config.require_shards(true))?;
        Ok(Self { router })
    }

    /// Build a client from a topology file's contents
    ///
    /// # Examples
    ///
    /// ```
    /// # use memshard::{ShardedClient, TopologyConfig};
    /// # fn main() -> memshard::Result<()> {
    /// let topology = TopologyConfig::from_json(r#"{
    ///     "shards": [{"host": "10.0.0.1", "name": "a"}, {"host": "10.0.0.2", "name": "b"}]
    /// }"#)?;
    /// let client = ShardedClient::from_topology(&topology)?;
    /// assert_eq!(client.key_tag("{user:42}:name"), "user:42");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_topology(topology: &TopologyConfig) -> Result<Self> {
        topology.validate()?;
        Self::with_config(topology.shards.clone(), topology.router_config())
    }

    /// Build a client from shard URLs
    ///
    /// Format: `memshard://[:password@]host:port[/db][?weight=N&name=X]`
    pub fn from_urls(urls: &[&str]) -> Result<Self> {
        let shards = urls
            .iter()
            .map(|url| NodeShardInfo::from_url(url))
            .collect::<Result<Vec<_>>>()?;
        Self::new(shards)
    }

    /// Borrow a connection to the node owning `key`
    ///
    /// Use this for several commands on keys sharing a tag. Return the
    /// connection with `close().await`.
    ///
    /// ```no_run
    /// # use memshard::ShardedClient;
    /// # tokio_test::block_on(async {
    /// # let client = ShardedClient::from_urls(&["memshard://cache-1:6379"]).unwrap();
    /// let conn = client.get_connection("{cart:9}").await.unwrap();
    /// conn.set("{cart:9}:total", "42").await.unwrap();
    /// conn.set("{cart:9}:items", "3").await.unwrap();
    /// conn.close().await.unwrap();
    /// # });
    /// ```
    pub async fn get_connection(&self, key: &str) -> Result<PoolGuard<NodeConnectionFactory>> {
        self.router.shard(key)?.get_resource().await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_connection(key).await?;
        let result = conn.get(key).await;
        release(conn, result).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_connection(key).await?;
        let result = conn.set(key, value).await;
        release(conn, result).await
    }

    /// Delete a key, returning whether it existed
    pub async fn del(&self, key: &str) -> Result<bool> {
        let conn = self.get_connection(key).await?;
        let result = conn.del(key).await;
        release(conn, result).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let conn = self.get_connection(key).await?;
        let result = conn.exists(key).await;
        release(conn, result).await
    }

    /// Node owning `key`
    pub fn shard_info(&self, key: &str) -> Result<&NodeShardInfo> {
        self.router.shard_info(key)
    }

    pub fn key_tag<'k>(&self, key: &'k str) -> &'k str {
        self.router.key_tag(key)
    }

    /// Nodes present on the ring, in ring order
    pub fn all_shard_info(&self) -> Vec<&NodeShardInfo> {
        self.router.all_shard_info()
    }

    pub fn router(&self) -> &ShardRouter<NodePool, NodeShardInfo> {
        &self.router
    }

    /// Open `min_idle` connections on every node
    pub async fn prefill(&self) -> Result<()> {
        join_all(self.router.all_shards().iter().map(|pool| pool.prefill()))
            .await
            .into_iter()
            .collect()
    }

    /// Pool statistics per node address, in descriptor order
    pub async fn stats(&self) -> Vec<(String, PoolStats)> {
        let stats = join_all(self.router.all_shards().iter().map(|pool| pool.stats())).await;
        self.router
            .shards()
            .iter()
            .map(NodeShardInfo::address)
            .zip(stats)
            .collect()
    }

    /// Close every pool
    pub async fn destroy(&self) {
        join_all(self.router.all_shards().iter().map(|pool| pool.destroy())).await;
    }
}

/// Hand a connection back after a command, dropping it if the command broke it
async fn release<T>(conn: PoolGuard<NodeConnectionFactory>, result: Result<T>) -> Result<T> {
    match &result {
        Err(err) if err.is_connection_fault() => {
            log::warn!("Dropping connection {}: {}", conn.id(), err);
            conn.invalidate().await;
        }
        _ => conn.close().await?,
    }
    result
}
