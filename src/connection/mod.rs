pub mod config;
pub mod factory;
pub mod node;
pub mod topology;

use crate::core::{Result, ShardError};
use node::{Database, MemoryNode, NodeRegistry, node_address};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Connection to a single shard node
///
/// Holds the selected database and authentication state. Every command
/// fails with [`ShardError::ConnectionError`] once the connection is closed
/// or the node goes offline; such connections should be invalidated rather
/// than returned to their pool.
pub struct NodeConnection {
    /// Unique connection ID
    id: u64,
    /// Connected node, `None` after `quit`
    node: Option<Arc<MemoryNode>>,
    authenticated: bool,
    /// Selected database index
    db: usize,
}

impl NodeConnection {
    /// Open a connection to the node at `host:port`
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let address = node_address(host, port);
        let node = NodeRegistry::global()
            .get(host, port)?
            .filter(|node| node.is_online())
            .ok_or_else(|| ShardError::ConnectionError(format!("connection refused: {}", address)))?;

        let latency = node.latency();
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(ShardError::ConnectionError(format!(
                "connect to {} timed out after {:?}",
                address, timeout
            )));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        node.connection_opened();
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        log::debug!("Connection {} opened to {}", id, address);

        Ok(Self {
            id,
            authenticated: !node.requires_auth(),
            node: Some(node),
            db: 0,
        })
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the selected database index
    pub fn db(&self) -> usize {
        self.db
    }

    /// Check if the connection is open and the node reachable
    pub fn is_connected(&self) -> bool {
        self.node.as_ref().is_some_and(|node| node.is_online())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn node(&self) -> Result<&Arc<MemoryNode>> {
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| ShardError::ConnectionError("connection is closed".into()))?;
        if !node.is_online() {
            return Err(ShardError::ConnectionError(format!(
                "connection reset by {}",
                node.address()
            )));
        }
        Ok(node)
    }

    /// Node with authentication enforced
    fn ready(&self) -> Result<&Arc<MemoryNode>> {
        let node = self.node()?;
        if !self.authenticated {
            return Err(ShardError::AuthError("NOAUTH authentication required".into()));
        }
        Ok(node)
    }

    fn database(&self) -> Result<&Database> {
        self.ready()?.database(self.db)
    }

    /// Authenticate with the node password
    pub fn auth(&mut self, password: &str) -> Result<()> {
        let node = self.node()?;
        if !node.verify_password(password) {
            return Err(ShardError::AuthError("invalid password".into()));
        }
        self.authenticated = true;
        Ok(())
    }

    /// Switch to another logical database
    pub fn select(&mut self, db: usize) -> Result<()> {
        self.ready()?.database(db)?;
        self.db = db;
        Ok(())
    }

    /// Liveness check, answers `PONG`
    pub fn ping(&self) -> Result<String> {
        self.ready()?;
        Ok("PONG".to_string())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.database()?.read().await.get(key).cloned())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.database()?
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Delete a key, returning whether it existed
    pub async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.database()?.write().await.remove(key).is_some())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.database()?.read().await.contains_key(key))
    }

    /// Number of keys in the selected database
    pub async fn dbsize(&self) -> Result<usize> {
        Ok(self.database()?.read().await.len())
    }

    /// Close the connection
    pub fn quit(&mut self) {
        if let Some(node) = self.node.take() {
            node.connection_closed();
            log::debug!("Connection {} to {} closed", self.id, node.address());
        }
    }
}

impl Drop for NodeConnection {
    fn drop(&mut self) {
        self.quit();
    }
}
