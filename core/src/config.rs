//! Client configuration.

use serde::Deserialize;

use crate::chunked::DEFAULT_CHUNK_SIZE;
use crate::codec::DEFAULT_MAX_HEAD_SIZE;
use crate::error::ConfigError;

/// Tunables for `ChunkedClient`. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum size of each request body chunk.
    pub chunk_size: usize,
    /// Largest response head (status line plus headers) accepted.
    pub max_head_size: usize,
    /// Initial capacity of the connection's read buffer.
    pub read_buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            read_buffer_capacity: 8192,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CHUNK_SIZE` and `MAX_HEAD_SIZE` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup("CHUNK_SIZE") {
            config.chunk_size = parse_usize("CHUNK_SIZE", value)?;
        }
        if let Some(value) = lookup("MAX_HEAD_SIZE") {
            config.max_head_size = parse_usize("MAX_HEAD_SIZE", value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Zero("chunk_size"));
        }
        if self.max_head_size == 0 {
            return Err(ConfigError::Zero("max_head_size"));
        }
        Ok(())
    }
}

fn parse_usize(key: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
