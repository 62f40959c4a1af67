//! Configuration for portdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{PortError, Result};

/// Page size used by `list` when the caller asks for zero items
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// SSTable count above which a flush triggers compaction
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 8;

/// Largest single catalog entry the decoder will buffer
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration for a portdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Merge all SSTables once a flush leaves more than this many
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Read / Ingest Configuration
    // -------------------------------------------------------------------------
    /// Page size applied when a list request asks for zero items
    pub default_page_size: usize,

    /// Max bytes of a single entry value accepted by the feed decoder
    pub max_record_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./portdb_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
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
        if self.memtable_size_limit == 0 {
            return Err(PortError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if self.compaction_threshold == 0 {
            return Err(PortError::Config(
                "compaction_threshold must be greater than zero".to_string(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(PortError::Config(
                "default_page_size must be greater than zero".to_string(),
            ));
        }
        if self.max_record_size == 0 {
            return Err(PortError::Config(
                "max_record_size must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(PortError::Config(
                "WAL sync interval must be at least one entry".to_string(),
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

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set how many SSTables may accumulate before they are compacted
    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.config.compaction_threshold = count;
        self
    }

    /// Set the page size used when a list asks for zero items
    pub fn default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    /// Set the largest entry the feed decoder will accept (in bytes)
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.config.max_record_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
