use super::config::NodeShardInfo;
use crate::core::{Result, ShardError};
use crate::hashing::Hashing;
use crate::sharding::{DEFAULT_KEY_TAG_PATTERN, RouterConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Sharded deployment described as JSON
///
/// ```json
/// {
///   "hashing": "murmur",
///   "tag_pattern": "\\{(.+?)\\}",
///   "shards": [
///     {"host": "10.0.0.1", "port": 6379, "name": "a"},
///     {"host": "10.0.0.2", "port": 6379, "name": "b", "weight": 2}
///   ]
/// }
/// ```
///
/// `tag_pattern` set to `null` disables key tags; leaving it out keeps the
/// default `{...}` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub hashing: Hashing,

    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: Option<String>,

    pub shards: Vec<NodeShardInfo>,
}

fn default_tag_pattern() -> Option<String> {
    Some(DEFAULT_KEY_TAG_PATTERN.to_string())
}

impl TopologyConfig {
    pub fn new(shards: Vec<NodeShardInfo>) -> Self {
        Self {
            hashing: Hashing::default(),
            tag_pattern: default_tag_pattern(),
            shards,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let topology: Self = serde_json::from_str(json)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Router settings for this deployment
    pub fn router_config(&self) -> RouterConfig {
        let config = RouterConfig::new().hash_algorithm(self.hashing);
        match &self.tag_pattern {
            Some(pattern) => config.tag_pattern(pattern),
            None => config.no_tag_pattern(),
        }
    }

    /// Validate every shard, the tag pattern and name uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.shards.is_empty() {
            return Err(ShardError::ConfigError(
                "topology has no shards".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for shard in &self.shards {
            shard.validate()?;
            if let Some(name) = &shard.name {
                if !names.insert(name.as_str()) {
                    return Err(ShardError::ConfigError(format!(
                        "duplicate shard name '{}'",
                        name
                    )));
                }
            }
        }

        self.router_config().validate()
    }
}
