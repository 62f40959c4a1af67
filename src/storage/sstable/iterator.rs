//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use parking_lot::MutexGuard;

use crate::error::Result;

use super::{le_u32, ENTRY_HEADER_SIZE, HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order.
///
/// Holds the reader's file lock for its whole lifetime.
pub struct SSTableIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(mut file: MutexGuard<'a, BufReader<File>>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]) as usize;
        let val_len = le_u32(&header[4..8]) as usize;

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        self.current_offset += (ENTRY_HEADER_SIZE + key_len + val_len) as u64;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                // Don't keep reading from an unknown position
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
