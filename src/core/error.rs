use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {
    // Routing core
    #[error("Construction failure: {0}")]
    ConstructionFailure(String),

    #[error("Hash failure: {0}")]
    HashFailure(String),

    #[error("Lookup on an empty hash ring")]
    EmptyRingLookup,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid key tag pattern: {0}")]
    PatternError(String),

    // Pool and node collaborators
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Pool timeout: {0}")]
    PoolTimeout(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ShardError {
    /// Returns true for errors that leave a pooled connection unusable.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

pub type Result<T> = std::result::Result<T, ShardError>;

impl<T> From<std::sync::PoisonError<T>> for ShardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<regex::Error> for ShardError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError(err.to_string())
    }
}

impl From<std::io::Error> for ShardError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ShardError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
