//! Configuration for the lock service
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{LockError, Result};
use crate::protocol::MAX_LEASE_SECS;

/// Main configuration for a [`LockService`](crate::LockService)
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Connection
    // -------------------------------------------------------------------------
    /// How to reach the store. Retained for the lifetime of the service so a
    /// dropped connection can be rebuilt identically.
    pub connection: ConnectionOptions,

    /// Max idle connections kept for reuse
    pub pool_size: usize,

    /// Connect timeout (milliseconds, 0 = none)
    pub connect_timeout_ms: u64,

    /// Read/write timeout per round trip (milliseconds, 0 = none)
    pub io_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Lock Protocol
    // -------------------------------------------------------------------------
    /// Lease applied when a caller passes a non-positive lease (seconds)
    pub default_lease_secs: i64,

    /// Lower bound of the randomized retry sleep (milliseconds)
    pub backoff_min_ms: u64,

    /// Upper bound of the randomized retry sleep (milliseconds, inclusive)
    pub backoff_max_ms: u64,

    /// Attempts made by release operations before giving up
    pub release_attempts: u32,
}

/// Store topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOptions {
    /// One Redis node, e.g. `redis://127.0.0.1:6379/0`
    Single { url: String },

    /// Master discovered through Sentinel
    Failover {
        /// Sentinel addresses
        sentinels: Vec<String>,
        /// Monitored master name
        master_name: String,
        password: Option<String>,
        db: i64,
    },

    /// Redis Cluster seed nodes
    ///
    /// The procedure takes the operation name as its second key, and the four
    /// names hash to different slots. A resource key can share a slot with at
    /// most one of them (`{LOCK}orders` for LOCK), so the other operations
    /// fail with CROSSSLOT and are retried as unclassified faults.
    Cluster { nodes: Vec<String> },
}

impl ConnectionOptions {
    pub fn single(url: impl Into<String>) -> Self {
        Self::Single { url: url.into() }
    }

    pub fn failover(sentinels: Vec<String>, master_name: impl Into<String>) -> Self {
        Self::Failover {
            sentinels,
            master_name: master_name.into(),
            password: None,
            db: 0,
        }
    }

    pub fn cluster(nodes: Vec<String>) -> Self {
        Self::Cluster { nodes }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ConnectionOptions::Single { url } if url.is_empty() => {
                Err(LockError::Config("single-node url is empty".to_string()))
            }
            ConnectionOptions::Failover { sentinels, .. } if sentinels.is_empty() => {
                Err(LockError::Config("no sentinel addresses given".to_string()))
            }
            ConnectionOptions::Failover { master_name, .. } if master_name.is_empty() => {
                Err(LockError::Config("sentinel master name is empty".to_string()))
            }
            ConnectionOptions::Cluster { nodes } if nodes.is_empty() => {
                Err(LockError::Config("no cluster nodes given".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::single("redis://127.0.0.1:6379"),
            pool_size: 8,
            connect_timeout_ms: 5000,
            io_timeout_ms: 5000,
            default_lease_secs: 5,
            backoff_min_ms: 10,
            backoff_max_ms: 20,
            release_attempts: 10,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        if self.pool_size == 0 {
            return Err(LockError::Config("pool_size must be at least 1".to_string()));
        }
        if self.release_attempts == 0 {
            return Err(LockError::Config(
                "release_attempts must be at least 1".to_string(),
            ));
        }
        if self.default_lease_secs <= 0 || self.default_lease_secs > MAX_LEASE_SECS {
            return Err(LockError::Config(format!(
                "default_lease_secs must be in 1..={}, got {}",
                MAX_LEASE_SECS, self.default_lease_secs
            )));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(LockError::Config(format!(
                "backoff range inverted: {}ms > {}ms",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Connect timeout, `None` when disabled
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    /// Per round trip I/O timeout, `None` when disabled
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store connection options
    pub fn connection(mut self, connection: ConnectionOptions) -> Self {
        self.config.connection = connection;
        self
    }

    /// Shorthand for a single-node connection
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.connection = ConnectionOptions::single(url);
        self
    }

    /// Set the number of idle connections kept for reuse
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per round trip I/O timeout (in milliseconds)
    pub fn io_timeout_ms(mut self, ms: u64) -> Self {
        self.config.io_timeout_ms = ms;
        self
    }

    /// Set the lease used when callers pass a non-positive one (in seconds)
    pub fn default_lease_secs(mut self, secs: i64) -> Self {
        self.config.default_lease_secs = secs;
        self
    }

    /// Set the randomized retry sleep range (in milliseconds, inclusive)
    pub fn backoff_ms(mut self, min: u64, max: u64) -> Self {
        self.config.backoff_min_ms = min;
        self.config.backoff_max_ms = max;
        self
    }

    /// Set how many attempts release operations make
    pub fn release_attempts(mut self, attempts: u32) -> Self {
        self.config.release_attempts = attempts;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
