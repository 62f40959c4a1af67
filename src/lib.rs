//! # portdb
//!
//! Streaming ingest and durable storage for a catalog of ports:
//! - Incremental decoding of one large JSON object into `Port` records
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Cursor-based, byte-ordered pagination over the stored set
//!
//! ## Architecture Overview
//!
//! ```text
//!   byte stream                          page request
//!        │                                    │
//! ┌──────▼──────────────┐                     │
//! │   EntryDecoder      │ (worker thread)     │
//! └──────┬──────────────┘                     │
//!        │ capacity-1 channel (PortFeed)      │
//! ┌──────▼────────────────────────────────────▼────────────────┐
//! │                   CatalogService                            │
//! └─────────────────────┬──────────────────────────────────────┘
//!                       │ PortStore
//! ┌─────────────────────▼──────────────────────────────────────┐
//! │                       Engine                                │
//! │            (Single Writer / Multi Reader)                   │
//! └─────────────────────┬──────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod cancel;
pub mod model;

pub mod decoder;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cancel::CancelToken;
pub use config::Config;
pub use decoder::PortFeed;
pub use engine::Engine;
pub use error::{PortError, Result};
pub use model::{Port, PortDetails};
pub use service::{CatalogService, PortStore, PortsFilter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of portdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
