use super::factory::NodeConnectionFactory;
use super::node::{DATABASE_COUNT, node_address};
use crate::core::{Result, ShardError};
use crate::pool::{ObjectPool, PoolConfig};
use crate::sharding::{DEFAULT_WEIGHT, HashRing, ShardInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pool of connections to one shard node
pub type NodePool = ObjectPool<NodeConnectionFactory>;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
const URL_SCHEME: &str = "memshard://";

/// Shard node description
///
/// Identifies one node of a sharded deployment and how to reach it. Used as
/// the router's shard descriptor; its resource is a connection pool that is
/// filled lazily on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeShardInfo {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Logical database selected on every pooled connection
    #[serde(default)]
    pub database: usize,

    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Stable name; named shards keep their ring points when the list order changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connections opened by `prefill`
    #[serde(default)]
    pub min_idle: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_weight() -> u32 {
    DEFAULT_WEIGHT
}

fn default_max_connections() -> usize {
    PoolConfig::default().max_total
}

impl NodeShardInfo {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            password: None,
            database: 0,
            weight: DEFAULT_WEIGHT,
            name: None,
            max_connections: default_max_connections(),
            min_idle: 0,
        }
    }

    /// Connect timeout, saturating at `u64::MAX` milliseconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn database(mut self, database: usize) -> Self {
        self.database = database;
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_idle(mut self, min: usize) -> Self {
        self.min_idle = min;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        node_address(&self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse from a shard URL
    ///
    /// Format: `memshard://[:password@]host[:port][/database][?weight=N&name=X&timeout_ms=T]`
    ///
    /// ```ignore
    /// let shard = NodeShardInfo::from_url("memshard://:secret@cache-1:6380/2?weight=2&name=cache-1")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(URL_SCHEME).ok_or_else(|| {
            ShardError::ConfigError(format!("URL must start with '{}': {}", URL_SCHEME, url))
        })?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let (password, location) = match location.rsplit_once('@') {
            Some((auth, location)) => {
                // user part is accepted but ignored, nodes only know a password
                let password = auth.split_once(':').map_or(auth, |(_, password)| password);
                (Some(password), location)
            }
            None => (None, location),
        };

        let (host_port, database) = match location.split_once('/') {
            Some((host_port, db)) if !db.is_empty() => {
                let db = db
                    .parse::<usize>()
                    .map_err(|_| ShardError::ConfigError(format!("Invalid database: {}", db)))?;
                (host_port, db)
            }
            Some((host_port, _)) => (host_port, 0),
            None => (location, 0),
        };

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ShardError::ConfigError(format!("Invalid port: {}", port)))?;
                (host, port)
            }
            None => (host_port, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ShardError::ConfigError(format!("Missing host: {}", url)));
        }

        let mut info = Self::new(host, port).database(database);
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            info.password = Some(password.to_string());
        }

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ShardError::ConfigError(format!("Invalid URL parameter: {}", pair)))?;
            let invalid = || ShardError::ConfigError(format!("Invalid value for {}: {}", key, value));
            match key {
                "weight" => info.weight = value.parse().map_err(|_| invalid())?,
                "name" => info.name = Some(value.to_string()),
                "timeout_ms" => info.timeout_ms = value.parse().map_err(|_| invalid())?,
                "max_connections" => info.max_connections = value.parse().map_err(|_| invalid())?,
                "min_idle" => info.min_idle = value.parse().map_err(|_| invalid())?,
                other => {
                    return Err(ShardError::ConfigError(format!(
                        "Unknown URL parameter: {}",
                        other
                    )));
                }
            }
        }

        Ok(info)
    }

    /// Convert to a shard URL
    pub fn to_url(&self) -> String {
        let auth = if self.password.is_some() {
            ":***@" // Don't expose password
        } else {
            ""
        };

        let mut url = format!(
            "{}{}{}:{}/{}?weight={}",
            URL_SCHEME, auth, self.host, self.port, self.database, self.weight
        );
        if let Some(name) = &self.name {
            url.push_str("&name=");
            url.push_str(name);
        }
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ShardError::ConfigError("host cannot be empty".to_string()));
        }

        if self.weight == 0 {
            return Err(ShardError::ConfigError(format!(
                "weight of shard {} must be > 0",
                self.address()
            )));
        }

        if HashRing::virtual_node_count(self.weight).is_none() {
            return Err(ShardError::ConfigError(format!(
                "weight {} of shard {} is too large for the ring",
                self.weight,
                self.address()
            )));
        }

        if self.database >= DATABASE_COUNT {
            return Err(ShardError::ConfigError(format!(
                "database must be < {}",
                DATABASE_COUNT
            )));
        }

        self.pool_config().validate()
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new()
            .max_total(self.max_connections)
            .min_idle(self.min_idle)
    }

    pub fn factory(&self) -> NodeConnectionFactory {
        let factory = NodeConnectionFactory::new(self.host.clone(), self.port)
            .timeout(self.connect_timeout())
            .database(self.database);
        match &self.password {
            Some(password) => factory.password(password.clone()),
            None => factory,
        }
    }
}

impl ShardInfo<NodePool> for NodeShardInfo {
    fn weight(&self) -> u32 {
        self.weight
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn create_resource(&self) -> Result<NodePool> {
        self.validate()?;
        ObjectPool::new(self.factory(), self.pool_config())
    }
}
