use crate::core::{Result, ShardError};
use lazy_static::lazy_static;
use regex::bytes::Regex;

/// Default key tag: the content of the first `{...}` pair.
pub const DEFAULT_KEY_TAG_PATTERN: &str = r"\{(.+?)\}";

lazy_static! {
    static ref DEFAULT_KEY_TAG_REGEX: Regex =
        Regex::new(DEFAULT_KEY_TAG_PATTERN).expect("default key tag pattern compiles");
}

/// Extracts the part of a key that is hashed.
///
/// When the pattern matches, only its first capturing group is hashed, so
/// `user:{42}:name` and `user:{42}:email` land on the same shard. Keys that
/// do not match, or any key when no pattern is set, are hashed whole.
#[derive(Debug, Clone)]
pub struct KeyTagResolver {
    pattern: Option<Regex>,
}

impl KeyTagResolver {
    /// Compiles `pattern`. `None` disables tag extraction.
    ///
    /// The pattern must contain exactly one capturing group.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let Some(pattern) = pattern else {
            return Ok(Self::disabled());
        };

        if pattern == DEFAULT_KEY_TAG_PATTERN {
            return Ok(Self::default());
        }

        let regex = Regex::new(pattern)?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() != 2 {
            return Err(ShardError::PatternError(format!(
                "pattern '{}' must have exactly one capturing group, found {}",
                pattern,
                regex.captures_len() - 1
            )));
        }

        Ok(Self {
            pattern: Some(regex),
        })
    }

    /// A resolver that always hashes the whole key.
    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.pattern.is_some()
    }

    /// Source text of the configured pattern.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|regex| regex.as_str())
    }

    /// Returns the bytes to hash for `key`.
    pub fn resolve<'k>(&self, key: &'k [u8]) -> &'k [u8] {
        let Some(regex) = &self.pattern else {
            return key;
        };

        match regex.captures(key).and_then(|caps| caps.get(1)) {
            Some(tag) => &key[tag.start()..tag.end()],
            None => key,
        }
    }

    /// String form of [`resolve`](Self::resolve).
    pub fn key_tag<'k>(&self, key: &'k str) -> &'k str {
        std::str::from_utf8(self.resolve(key.as_bytes())).unwrap_or(key)
    }
}

impl Default for KeyTagResolver {
    fn default() -> Self {
        Self {
            pattern: Some(DEFAULT_KEY_TAG_REGEX.clone()),
        }
    }
}
