//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Resumable, ordered range scans from a page cursor
//! - Checksum verification of table files on open
//!
//! A scan merges the memtable and every SSTable. Sources are consulted newest
//! first (memtable, then tables by descending id) and the first source to
//! supply a key owns it, so a later upsert always shadows older copies.

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
