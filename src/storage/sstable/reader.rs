//! SSTable Reader
//!
//! Opens SSTable files and serves ordered key seeks from an in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{PortError, Result};
use crate::memtable::lower_bound;

use super::iterator::SSTableIterator;
use super::{le_u16, le_u32, le_u64, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with an in-memory key index.
///
/// The file handle sits behind a mutex so lookups only need `&self`, which
/// lets the storage manager serve scans under a shared lock.
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data checksum, then loads the index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(PortError::Storage(format!(
                "SSTable {} too short: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(PortError::Storage(format!(
                "Invalid SSTable magic: expected PTDB, got {:?}",
                &header[0..4]
            )));
        }

        let version = le_u16(&header[4..6]);
        if version != VERSION {
            return Err(PortError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(PortError::Storage(format!(
                "SSTable {} has index offset {} outside the file",
                path.display(),
                index_offset
            )));
        }

        // Verify data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut hasher = crc32fast::Hasher::new();
        let mut data_block = (&mut file).take(index_offset - HEADER_SIZE);
        let mut chunk = [0u8; 8192];
        loop {
            let n = data_block.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
        }
        let actual_crc = hasher.finalize();
        if actual_crc != data_crc {
            return Err(PortError::Storage(format!(
                "SSTable {} data checksum mismatch: expected {:#010x}, got {:#010x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }

        // Load index: [key_len(4)][offset(8)][key]
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(PortError::Storage(format!(
                    "SSTable {} has a truncated index entry at {}",
                    path.display(),
                    pos
                )));
            }
            let key_len = le_u32(&index_data[pos..pos + 4]) as usize;
            let offset = le_u64(&index_data[pos + 4..pos + 12]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(PortError::Storage(format!(
                    "SSTable {} has a truncated index key at {}",
                    path.display(),
                    pos
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(PortError::Storage(format!(
                "SSTable {} index holds {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Up to `limit` keys strictly after `after` with their entry offsets
    pub fn keys_after(&self, after: &[u8], limit: usize) -> Vec<(Vec<u8>, u64)> {
        self.index
            .range::<[u8], _>((lower_bound(after), Bound::Unbounded))
            .take(limit)
            .map(|(k, &offset)| (k.clone(), offset))
            .collect()
    }

    /// Read the value of the entry starting at `offset`
    pub fn read_value_at(&self, offset: u64) -> Result<Vec<u8>> {
        if offset < HEADER_SIZE || offset >= self.index_offset {
            return Err(PortError::Storage(format!(
                "offset {} outside data block of {}",
                offset,
                self.path.display()
            )));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]);
        let val_len = le_u32(&header[4..8]) as usize;

        // Skip the key (the index already told us which one it is)
        file.seek_relative(key_len as i64)?;

        let mut value = vec![0u8; val_len];
        file.read_exact(&mut value)?;
        Ok(value)
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(self.file.lock(), self.index_offset)
    }
}
