//! Engine Module
//!
//! The storage engine that coordinates WAL, MemTable and SSTables and exposes
//! the port-level operations: upsert by id and cursor-paginated listing.
//!
//! ## Responsibilities
//! - Serialize port details and route writes through the WAL
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{PortError, Result};
use crate::memtable::MemTable;
use crate::model::{Port, PortDetails};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (upsert/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → storage (flush)
///   - A write becomes visible only once it is logged and fully inserted
///
/// - **Reads** (list): Concurrent with each other and with writes
///   - Shared lock on the SSTable list, short read lock on the MemTable
///   - Each page is a consistent snapshot; pages of one listing are not
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all SSTables
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations (upsert/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush recovered writes
    /// 4. Compact SSTables into one
    /// 5. Truncate WAL, ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                let Operation::Put { key, value } = entry.operation;
                memtable.put(key, value);
            }

            // Make recovered data durable in an SSTable before the WAL goes
            if !memtable.is_empty() {
                tracing::info!("Flushing {} recovered entries to SSTable", memtable.entry_count());
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        // Tables left by earlier runs are merged so each run starts from one
        if let Some(table) = storage.compact()? {
            tracing::info!(
                "Compacted SSTables on open into {} ({} entries)",
                table.path.display(),
                table.entry_count()
            );
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        tracing::info!(
            "Engine opened at {} ({} SSTables)",
            config.data_dir.display(),
            storage.sstable_count()
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Store `details` under `id`, replacing any previous value
    ///
    /// Steps:
    /// 1. Serialize details
    /// 2. Acquire write lock (cancellation is honoured up to here)
    /// 3. Write to WAL (durability)
    /// 4. Write to MemTable
    /// 5. Check if flush needed
    ///
    /// Once step 3 succeeds the write is applied, so `Err` means nothing was
    /// stored. Flush and compaction failures are only logged.
    pub fn upsert(&self, cancel: &CancelToken, id: &str, details: &PortDetails) -> Result<()> {
        if id.is_empty() {
            return Err(PortError::Storage("port id must not be empty".to_string()));
        }
        cancel.check()?;

        let value = serde_json::to_vec(details)?;

        let _write_guard = self.write_lock.lock();
        cancel.check()?;

        let operation = Operation::Put {
            key: id.as_bytes().to_vec(),
            value,
        };
        self.wal.lock().append(operation.clone())?;

        let Operation::Put { key, value } = operation;
        let new_size = self.memtable.put(key, value);

        // The write is logged and visible from here on; a failed flush leaves
        // it in the memtable and is retried by the next write
        if new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.flush_internal() {
                tracing::warn!("Flush after upsert of {:?} failed: {}", id, e);
            }
        }

        Ok(())
    }

    /// One page of ports with ids strictly after `after_id`, ascending
    ///
    /// `max_items == 0` uses the configured default page size. A failed or
    /// cancelled scan returns no partial page.
    pub fn list(&self, cancel: &CancelToken, after_id: &str, max_items: usize) -> Result<Vec<Port>> {
        let limit = if max_items == 0 {
            self.config.default_page_size
        } else {
            max_items
        };
        cancel.check()?;

        let entries = self
            .storage
            .scan(after_id.as_bytes(), limit, &self.memtable, cancel)?;

        entries
            .into_iter()
            .map(|(key, value)| {
                let id = String::from_utf8(key).map_err(|e| {
                    PortError::Storage(format!("stored key is not UTF-8: {}", e))
                })?;
                let details: PortDetails = serde_json::from_slice(&value)?;
                Ok(Port { id, details })
            })
            .collect()
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let table = self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        tracing::debug!(
            "Flushed {} entries to {} ({} bytes)",
            table.entry_count(),
            table.path.display(),
            table.file_size
        );

        if self.storage.sstable_count() > self.config.compaction_threshold {
            self.storage.compact()?;
        }

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;

        tracing::info!("Engine at {} closed", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
