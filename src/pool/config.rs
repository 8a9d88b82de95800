use crate::core::{Result, ShardError};
use std::time::Duration;

/// Object pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of objects, idle and borrowed together
    pub max_total: usize,

    /// Objects created up front by `prefill`
    pub min_idle: usize,

    /// How long a borrow waits for a free object
    pub max_wait: Duration,

    /// Idle objects older than this are evicted on the next borrow
    pub idle_timeout: Option<Duration>,

    /// Objects older than this are evicted regardless of use
    pub max_lifetime: Option<Duration>,

    /// Validate objects before handing them out
    pub test_on_borrow: bool,

    /// Validate objects before putting them back
    pub test_on_return: bool,
}

impl PoolConfig {
    /// Create a pool configuration with default limits
    pub fn new() -> Self {
        Self {
            max_total: 8,
            min_idle: 0,
            max_wait: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
            test_on_borrow: true,
            test_on_return: false,
        }
    }

    /// Set maximum objects
    pub fn max_total(mut self, max: usize) -> Self {
        self.max_total = max;
        self
    }

    /// Set minimum idle objects
    pub fn min_idle(mut self, min: usize) -> Self {
        self.min_idle = min;
        self
    }

    /// Set borrow wait limit
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set maximum lifetime
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_total == 0 {
            return Err(ShardError::ConfigError("max_total must be > 0".to_string()));
        }

        if self.min_idle > self.max_total {
            return Err(ShardError::ConfigError(
                "min_idle cannot exceed max_total".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}
