//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{PortError, Result};

/// Header size: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Upsert a port: key is the id, value the serialized details
    Put { key: Vec<u8>, value: Vec<u8> },
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as `[LSN][CRC][Len][Data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len()).map_err(|_| {
            PortError::Serialization(format!("WAL entry too large: {} bytes", data.len()))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&Self::compute_crc(&data).to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Decode the `Data` section and check it against its header
    pub fn deserialize(header_lsn: u64, header_crc: u32, data: &[u8]) -> Result<Self> {
        let actual_crc = Self::compute_crc(data);
        if actual_crc != header_crc {
            return Err(PortError::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:#010x}, got {:#010x}",
                header_lsn, header_crc, actual_crc
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| PortError::WalCorruption(format!("undecodable entry: {}", e)))?;

        if entry.lsn != header_lsn {
            return Err(PortError::WalCorruption(format!(
                "LSN mismatch: header {}, entry {}",
                header_lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}
