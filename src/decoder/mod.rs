//! Streaming Decoder
//!
//! Turns a catalog feed (one JSON object mapping port ids to details) into a
//! sequence of `Port` records without ever holding more than one entry.
//!
//! ## Layers
//! - `Scanner`: buffered bytes with lookahead and offsets for errors
//! - `EntryDecoder`: depth-driven state machine, one entry per call
//! - `PortFeed`: runs an `EntryDecoder` on a worker thread behind a
//!   capacity-1 channel, so decoding overlaps with storage writes while the
//!   worker blocks as soon as one record is waiting

mod scanner;
mod state;
mod feed;

pub use state::EntryDecoder;
pub use feed::PortFeed;
