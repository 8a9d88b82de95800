use super::tag::{DEFAULT_KEY_TAG_PATTERN, KeyTagResolver};
use crate::core::Result;
use crate::hashing::{HashAlgorithm, Hashing};
use std::sync::Arc;

/// Router configuration
///
/// Built once and consumed by [`ShardRouter::with_config`](super::ShardRouter::with_config).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Algorithm used both to place virtual nodes and to hash keys
    pub hash_algorithm: Arc<dyn HashAlgorithm>,

    /// Key tag pattern with one capturing group; `None` hashes whole keys
    pub tag_pattern: Option<String>,

    /// Reject rings where two virtual nodes hash to the same position
    pub strict_collisions: bool,

    /// Reject an empty descriptor list at construction
    pub require_shards: bool,
}

impl RouterConfig {
    /// Create a configuration with the default hash and tag pattern
    pub fn new() -> Self {
        Self {
            hash_algorithm: Arc::new(Hashing::Murmur),
            tag_pattern: Some(DEFAULT_KEY_TAG_PATTERN.to_string()),
            strict_collisions: false,
            require_shards: false,
        }
    }

    /// Set the hash algorithm
    pub fn hash_algorithm(mut self, algo: impl HashAlgorithm + 'static) -> Self {
        self.hash_algorithm = Arc::new(algo);
        self
    }

    /// Set the key tag pattern
    pub fn tag_pattern(mut self, pattern: &str) -> Self {
        self.tag_pattern = Some(pattern.to_string());
        self
    }

    /// Disable key tags
    pub fn no_tag_pattern(mut self) -> Self {
        self.tag_pattern = None;
        self
    }

    /// Fail construction on virtual node collisions
    pub fn strict_collisions(mut self, strict: bool) -> Self {
        self.strict_collisions = strict;
        self
    }

    /// Fail construction when no shards are given
    pub fn require_shards(mut self, required: bool) -> Self {
        self.require_shards = required;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        KeyTagResolver::new(self.tag_pattern.as_deref()).map(|_| ())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}
