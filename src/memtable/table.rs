//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert or overwrite a key, returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        let key_len = key.len();
        let value_len = value.len();

        let new_size = match data.insert(key, value) {
            // Key bytes were already counted
            Some(old) => self.size.load(Ordering::SeqCst) - old.len() + value_len,
            None => self.size.load(Ordering::SeqCst) + key_len + value_len,
        };
        self.size.store(new_size, Ordering::SeqCst);
        new_size
    }

    /// Up to `limit` entries with keys strictly after `after`, in key order.
    ///
    /// An empty `after` starts from the first key.
    pub fn range_after(&self, after: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.range::<[u8], _>((lower_bound(after), Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> std::vec::IntoIter<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive lower bound for a page cursor; empty means "from the start"
pub(crate) fn lower_bound(after: &[u8]) -> Bound<&[u8]> {
    if after.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(after)
    }
}
