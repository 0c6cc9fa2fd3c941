//! Library Configuration
//!
//! This module provides configuration for the three primitives in this
//! crate. Configuration is programmatic only: construct a config struct
//! (all of them implement `Default` with the documented defaults), adjust
//! fields or use the builder, and validate before handing it to a
//! constructor.
//!
//! # Example
//!
//! ```rust,ignore
//! use keystone::config::PoolConfig;
//!
//! let config = PoolConfig::builder()
//!     .chunk_block_count(256)
//!     .max_chunks(8)
//!     .build()
//!     .unwrap();
//! ```

use thiserror::Error;

/// Error returned when a configuration value is out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `chunk_block_count` must be at least 1.
    #[error("pool chunk_block_count must be at least 1")]
    ZeroChunkBlockCount,

    /// `capacity` must be at least 1.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    /// The ring representation keeps one slot free, so a ring smaller
    /// than 2 bytes can never store anything.
    #[error("framer initial_capacity must be at least 2, got {0}")]
    RingTooSmall(usize),
}

/// Configuration for [`Pool`](crate::pool::Pool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of blocks carved out of each chunk.
    /// Default: 1024.
    pub chunk_block_count: usize,

    /// Maximum number of chunks the pool may own. 0 means unbounded.
    /// Default: 0.
    pub max_chunks: usize,

    /// Route allocation through per-thread caches, taking the global lock
    /// only on refill and flush.
    /// Default: true.
    pub thread_local_cache: bool,

    /// When chunk growth hits an out-of-memory condition, release up to a
    /// quarter of the existing chunks and retry before reporting failure.
    /// Only chunks whose blocks are all on the global free list are
    /// eligible for release.
    /// Default: false.
    pub release_on_pressure: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_block_count: 1024,
            max_chunks: 0,
            thread_local_cache: true,
            release_on_pressure: false,
        }
    }
}

impl PoolConfig {
    /// Create a builder initialized with the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the configuration for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_block_count == 0 {
            return Err(ConfigError::ZeroChunkBlockCount);
        }
        Ok(())
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the number of blocks per chunk.
    pub fn chunk_block_count(mut self, count: usize) -> Self {
        self.config.chunk_block_count = count;
        self
    }

    /// Set the maximum number of chunks (0 = unbounded).
    pub fn max_chunks(mut self, max: usize) -> Self {
        self.config.max_chunks = max;
        self
    }

    /// Enable or disable per-thread caching.
    pub fn thread_local_cache(mut self, enabled: bool) -> Self {
        self.config.thread_local_cache = enabled;
        self
    }

    /// Enable or disable the release-and-retry policy on OOM.
    pub fn release_on_pressure(mut self, enabled: bool) -> Self {
        self.config.release_on_pressure = enabled;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for [`BoundedQueue`](crate::queue::BoundedQueue).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of elements the queue holds before writers block.
    /// Default: 100.
    pub capacity: usize,

    /// Name used in diagnostics and `print` output.
    /// Default: empty.
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            name: String::new(),
        }
    }
}

impl QueueConfig {
    /// Check the configuration for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Configuration for the ring-buffer framer.
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Initial ring capacity in bytes. The ring doubles whenever it fills.
    /// Default: 8192.
    pub initial_capacity: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 8192,
        }
    }
}

impl FramerConfig {
    /// Check the configuration for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity < 2 {
            return Err(ConfigError::RingTooSmall(self.initial_capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.chunk_block_count, 1024);
        assert_eq!(config.max_chunks, 0);
        assert!(config.thread_local_cache);
        assert!(!config.release_on_pressure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::builder()
            .chunk_block_count(64)
            .max_chunks(4)
            .thread_local_cache(false)
            .build()
            .unwrap();
        assert_eq!(config.chunk_block_count, 64);
        assert_eq!(config.max_chunks, 4);
        assert!(!config.thread_local_cache);
    }

    #[test]
    fn test_pool_config_rejects_zero_blocks() {
        let result = PoolConfig::builder().chunk_block_count(0).build();
        assert_eq!(result.unwrap_err(), ConfigError::ZeroChunkBlockCount);
    }

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.capacity, 100);
        assert!(config.name.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_config_rejects_zero_capacity() {
        let config = QueueConfig {
            capacity: 0,
            name: "bad".into(),
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroQueueCapacity);
    }

    #[test]
    fn test_framer_config_defaults() {
        let config = FramerConfig::default();
        assert_eq!(config.initial_capacity, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_framer_config_rejects_tiny_ring() {
        let config = FramerConfig {
            initial_capacity: 1,
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::RingTooSmall(1));
    }
}
