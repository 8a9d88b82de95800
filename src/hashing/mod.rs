//! Hash functions used to place virtual nodes and keys on the ring.
//!
//! Every algorithm maps a byte slice to a `u64` and must be deterministic
//! across processes: ring topology is rebuilt from scratch on every start, so
//! the same descriptor list has to land on the same points each time.

mod md5_fold;
mod murmur;

pub use md5_fold::md5_fold_64;
pub use murmur::{MURMUR_SEED, murmur_hash_64a};

use crate::core::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A pure mapping from bytes to a 64-bit ring position.
///
/// Implementations may reject input they cannot process by returning
/// [`ShardError::HashFailure`]; the router propagates that error instead of
/// treating it as a routing miss.
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    fn hash(&self, key: &[u8]) -> Result<u64>;

    /// Short name used in log output.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Built-in hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hashing {
    /// MurmurHash64A with the fixed ring seed. Fast, well distributed.
    #[default]
    Murmur,
    /// MD5 digest folded to 64 bits.
    Md5,
}

impl HashAlgorithm for Hashing {
    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64> {
        Ok(match self {
            Hashing::Murmur => murmur_hash_64a(key, MURMUR_SEED),
            Hashing::Md5 => md5_fold_64(key),
        })
    }

    fn name(&self) -> &str {
        match self {
            Hashing::Murmur => "murmur",
            Hashing::Md5 => "md5",
        }
    }
}

impl fmt::Display for Hashing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HashAlgorithm::name(self))
    }
}

impl FromStr for Hashing {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "murmur" | "murmur64a" => Ok(Hashing::Murmur),
            "md5" => Ok(Hashing::Md5),
            other => Err(ShardError::ConfigError(format!(
                "Unknown hash algorithm '{}'",
                other
            ))),
        }
    }
}
