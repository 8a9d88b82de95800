use super::NodeConnection;
use crate::core::Result;
use crate::pool::PoolableFactory;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// Opens authenticated connections to one shard node for its pool.
#[derive(Debug, Clone)]
pub struct NodeConnectionFactory {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub password: Option<String>,
    pub database: usize,
}

impl NodeConnectionFactory {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_millis(2000),
            password: None,
            database: 0,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: usize) -> Self {
        self.database = database;
        self
    }
}

#[async_trait]
impl PoolableFactory for NodeConnectionFactory {
    type Object = NodeConnection;

    async fn make_object(&self) -> Result<NodeConnection> {
        let mut conn = NodeConnection::connect(&self.host, self.port, self.timeout).await?;
        if let Some(password) = &self.password {
            conn.auth(password)?;
        }
        if self.database != 0 {
            conn.select(self.database)?;
        }
        debug!(
            "Opened pooled connection {} to {}:{}",
            conn.id(),
            self.host,
            self.port
        );
        Ok(conn)
    }

    async fn activate_object(&self, conn: &mut NodeConnection) -> Result<()> {
        if conn.db() != self.database {
            conn.select(self.database)?;
        }
        Ok(())
    }

    async fn validate_object(&self, conn: &mut NodeConnection) -> bool {
        conn.is_connected() && conn.ping().map(|reply| reply == "PONG").unwrap_or(false)
    }

    async fn destroy_object(&self, mut conn: NodeConnection) {
        debug!("Closing pooled connection {}", conn.id());
        conn.quit();
    }
}
