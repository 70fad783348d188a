//! Configuration for EmberKV
//!
//! Centralized configuration with sensible defaults. Loaded once at startup
//! and never mutated while the engine is running.

use std::path::PathBuf;

use crate::error::{EmberError, Result};

/// Main configuration for an EmberKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── scalar.vlog / scalar.idx
    ///     ├── list.vlog   / list.idx
    ///     └── hash.vlog   / hash.idx
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync value logs and index journals
    pub sync_strategy: SyncStrategy,

    /// Initial capacity of each value log file (in bytes)
    pub value_log_capacity: u64,

    /// Initial number of slots reserved in each in-memory index
    pub index_capacity: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Number of connection worker threads
    pub worker_threads: usize,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Durability strategy shared by value logs and index journals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced writes (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./emberkv_data"),
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            value_log_capacity: 1024 * 1024, // 1 MB
            index_capacity: 1024,
            listen_addr: "127.0.0.1:6379".to_string(),
            worker_threads: 4,
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.value_log_capacity == 0 {
            return Err(EmberError::Config(
                "value_log_capacity must be greater than zero".to_string(),
            ));
        }
        if self.index_capacity == 0 {
            return Err(EmberError::Config(
                "index_capacity must be greater than zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(EmberError::Config(
                "worker_threads must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(EmberError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(EmberError::Config(
                "sync strategy batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the initial value log capacity (in bytes)
    pub fn value_log_capacity(mut self, bytes: u64) -> Self {
        self.config.value_log_capacity = bytes;
        self
    }

    /// Set the initial in-memory index capacity (in keys)
    pub fn index_capacity(mut self, slots: usize) -> Self {
        self.config.index_capacity = slots;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the number of connection worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
