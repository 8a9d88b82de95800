use crate::core::{Result, ShardError};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::RwLock;

/// Logical databases per node, selected with `SELECT`.
pub const DATABASE_COUNT: usize = 16;

/// bcrypt cost for node passwords. Nodes are started often in tests, so the
/// cost stays at the library minimum.
const PASSWORD_COST: u32 = 4;

pub(crate) type Database = RwLock<HashMap<String, String>>;

/// An in-process key-value node standing in for one shard server.
pub struct MemoryNode {
    address: String,
    password_hash: Option<String>,
    databases: Vec<Database>,
    online: AtomicBool,
    connections: AtomicUsize,
    latency_ms: AtomicU64,
}

impl MemoryNode {
    /// Creates a node. A password makes every connection authenticate first.
    pub fn new(address: &str, password: Option<&str>) -> Result<Self> {
        let password_hash = match password {
            Some(password) => Some(
                bcrypt::hash(password, PASSWORD_COST)
                    .map_err(|e| ShardError::AuthError(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            address: address.to_string(),
            password_hash,
            databases: (0..DATABASE_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            online: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn requires_auth(&self) -> bool {
        self.password_hash.is_some()
    }

    pub(crate) fn verify_password(&self, password: &str) -> bool {
        match &self.password_hash {
            Some(hash) => bcrypt::verify(password, hash).unwrap_or(false),
            None => true,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Takes the node down or brings it back. Open connections fail every
    /// command while the node is offline.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Delay applied when a connection is opened, kept in whole
    /// milliseconds and saturating at `u64::MAX`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    pub(crate) fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.load(Ordering::SeqCst))
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn database(&self, index: usize) -> Result<&Database> {
        self.databases
            .get(index)
            .ok_or_else(|| ShardError::CommandError(format!("DB index {} is out of range", index)))
    }

    /// Number of keys stored in database `index`.
    pub async fn key_count(&self, index: usize) -> Result<usize> {
        Ok(self.database(index)?.read().await.len())
    }
}

/// Registry of running nodes, keyed by `host:port`.
pub struct NodeRegistry {
    nodes: StdRwLock<HashMap<String, Arc<MemoryNode>>>,
}

// Global registry shared by every connection in the process
lazy_static! {
    static ref GLOBAL_REGISTRY: NodeRegistry = NodeRegistry::new();
}

impl NodeRegistry {
    /// Get the global registry instance
    pub fn global() -> &'static NodeRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn new() -> Self {
        Self {
            nodes: StdRwLock::new(HashMap::new()),
        }
    }

    /// Starts a node listening on `host:port`.
    pub fn start_node(
        &self,
        host: &str,
        port: u16,
        password: Option<&str>,
    ) -> Result<Arc<MemoryNode>> {
        let address = node_address(host, port);
        let mut nodes = self.nodes.write()?;
        if nodes.contains_key(&address) {
            return Err(ShardError::ConfigError(format!(
                "node {} is already running",
                address
            )));
        }

        let node = Arc::new(MemoryNode::new(&address, password)?);
        nodes.insert(address.clone(), Arc::clone(&node));
        log::info!("Node {} started", address);
        Ok(node)
    }

    /// Stops a node. Open connections see it as offline.
    pub fn stop_node(&self, host: &str, port: u16) -> Result<bool> {
        let address = node_address(host, port);
        let removed = self.nodes.write()?.remove(&address);
        match removed {
            Some(node) => {
                node.set_online(false);
                log::info!("Node {} stopped", address);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, host: &str, port: u16) -> Result<Option<Arc<MemoryNode>>> {
        Ok(self.nodes.read()?.get(&node_address(host, port)).cloned())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn node_address(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
