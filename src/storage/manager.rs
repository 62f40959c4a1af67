//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Create new SSTables from MemTable flushes
//! - Compact all SSTables into one, newest value per key
//! - Serve merged range scans across MemTable and SSTables
//!
//! Tables are written to `sstable_NNNNNN.sst.tmp` and renamed into place once
//! complete, so a crash never leaves a half-written `.sst` behind.

use std::cmp::Reverse;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BinaryHeap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::cancel::CancelToken;
use crate::error::{PortError, Result};
use crate::memtable::MemTable;

use super::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};

const TEMP_EXTENSION: &str = "sst.tmp";

/// Where a scanned key's newest value lives
enum Source {
    Memory(Vec<u8>),
    Table { table: usize, offset: u64 },
}

/// Next unmerged entry of one table; a lower `age` is a newer table
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct MergeHead {
    key: Vec<u8>,
    age: usize,
    value: Vec<u8>,
}

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,

    /// Serializes compactions
    compaction_lock: Mutex<()>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Open readers for each (verifies checksums, loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            } else if Self::is_unfinished_table(&file_path) {
                tracing::warn!("Removing unfinished SSTable {}", file_path.display());
                fs::remove_file(&file_path)?;
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let reader = SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?;
            sstables.push(reader);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            "Opened storage at {} with {} SSTables",
            path.display(),
            sstables.len()
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
            compaction_lock: Mutex::new(()),
        })
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(PortError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);

        // Entries come out of the BTreeMap already sorted
        let (metadata, reader) = self.write_table(id, |builder| {
            for (key, value) in memtable.iter() {
                builder.add(&key, &value)?;
            }
            Ok(())
        })?;

        self.sstables.write().insert(0, reader);

        Ok(metadata)
    }

    /// Merge every SSTable into one, keeping the newest value of each key
    ///
    /// Returns `None` when there are fewer than two tables. The table list
    /// stays readable while the merge runs; tables flushed meanwhile are
    /// newer than the result and are left in place. Memory use is one entry
    /// per merged table.
    pub fn compact(&self) -> Result<Option<SSTable>> {
        let _compaction_guard = self.compaction_lock.lock();

        let sstables = self.sstables.read();
        let merged = sstables.len();
        if merged < 2 {
            return Ok(None);
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let (metadata, reader) = self.write_table(id, |builder| {
            let mut sources = sstables
                .iter()
                .map(|table| table.iter())
                .collect::<Result<Vec<_>>>()?;

            let mut heap = BinaryHeap::with_capacity(sources.len());
            for age in 0..sources.len() {
                pull_next(&mut sources, age, &mut heap)?;
            }

            while let Some(Reverse(head)) = heap.pop() {
                // Same key in older tables: superseded
                while heap.peek().is_some_and(|Reverse(next)| next.key == head.key) {
                    if let Some(Reverse(stale)) = heap.pop() {
                        pull_next(&mut sources, stale.age, &mut heap)?;
                    }
                }
                builder.add(&head.key, &head.value)?;
                pull_next(&mut sources, head.age, &mut heap)?;
            }
            Ok(())
        })?;
        drop(sstables);

        // The merged tables are the oldest `merged` entries of the list
        let retired = {
            let mut sstables = self.sstables.write();
            let keep = sstables.len() - merged;
            let retired = sstables.split_off(keep);
            sstables.push(reader);
            retired
        };

        for table in retired {
            let path = table.path().to_path_buf();
            drop(table);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Failed to remove compacted SSTable {}: {}", path.display(), e);
            }
        }

        tracing::debug!(
            "Compacted {} SSTables into {} ({} entries)",
            merged,
            metadata.path.display(),
            metadata.entry_count()
        );

        Ok(Some(metadata))
    }

    /// Up to `limit` entries with keys strictly after `after`, ascending.
    ///
    /// The table list stays read-locked for the whole scan and the memtable
    /// is read while it is held. A flush publishes its table before clearing
    /// the memtable, so every page sees each key at least once.
    pub fn scan(
        &self,
        after: &[u8],
        limit: usize,
        memtable: &MemTable,
        cancel: &CancelToken,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let sstables = self.sstables.read();

        // Each source contributes its first `limit` keys past the cursor;
        // the first `limit` keys of the union are then exactly the page.
        let mut merged: BTreeMap<Vec<u8>, Source> = BTreeMap::new();
        for (key, value) in memtable.range_after(after, limit) {
            merged.insert(key, Source::Memory(value));
        }
        for (table, reader) in sstables.iter().enumerate() {
            cancel.check()?;
            for (key, offset) in reader.keys_after(after, limit) {
                if let Entry::Vacant(slot) = merged.entry(key) {
                    slot.insert(Source::Table { table, offset });
                }
            }
        }

        let mut page = Vec::with_capacity(limit.min(merged.len()));
        for (key, source) in merged.into_iter().take(limit) {
            cancel.check()?;
            let value = match source {
                Source::Memory(value) => value,
                Source::Table { table, offset } => sstables[table].read_value_at(offset)?,
            };
            page.push((key, value));
        }

        Ok(page)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Build table `id` under a temporary name, then publish it
    fn write_table<F>(&self, id: u64, fill: F) -> Result<(SSTable, SSTableReader)>
    where
        F: FnOnce(&mut SSTableBuilder) -> Result<()>,
    {
        let path = self.sstable_path(id);
        let temp_path = path.with_extension(TEMP_EXTENSION);

        let built = SSTableBuilder::new(&temp_path).and_then(|mut builder| {
            fill(&mut builder)?;
            builder.finish()
        });
        let mut metadata = match built {
            Ok(metadata) => metadata,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        fs::rename(&temp_path, &path)?;
        metadata.path = path;
        let reader = SSTableReader::open(&metadata.path)?;
        Ok((metadata, reader))
    }

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }

    /// Leftover of a flush or compaction that never finished
    fn is_unfinished_table(path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy())
            .is_some_and(|name| name.starts_with("sstable_") && name.ends_with(".sst.tmp"))
    }
}

/// Push the next entry of table `age` onto the merge heap, if any
fn pull_next(
    sources: &mut [SSTableIterator<'_>],
    age: usize,
    heap: &mut BinaryHeap<Reverse<MergeHead>>,
) -> Result<()> {
    if let Some(entry) = sources[age].next() {
        let (key, value) = entry?;
        heap.push(Reverse(MergeHead { key, age, value }));
    }
    Ok(())
}
