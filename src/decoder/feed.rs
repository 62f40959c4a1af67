//! Threaded feed
//!
//! `PortFeed` owns a worker thread running an `EntryDecoder`. Records cross a
//! `crossbeam` channel of capacity one; the terminal error (if any) is parked
//! in a shared slot before the worker drops its sender, so the consumer sees
//! every record first and then exactly one error or the end of the sequence.

use std::io::Read;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::config::DEFAULT_MAX_RECORD_SIZE;
use crate::error::{PortError, Result};
use crate::model::Port;

use super::EntryDecoder;

/// Capacity of the handoff between decoder thread and consumer
const HANDOFF_CAPACITY: usize = 1;

/// Lazily decoded sequence of ports.
///
/// Yields `Ok(port)` per entry in document order, then `None`. On malformed
/// input or cancellation it yields a single `Err` and is then exhausted.
pub struct PortFeed {
    records: Receiver<Port>,
    failure: Arc<Mutex<Option<PortError>>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl PortFeed {
    /// Start decoding `reader` on a worker thread
    pub fn spawn<R>(reader: R, cancel: CancelToken) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::spawn_with_limit(reader, cancel, DEFAULT_MAX_RECORD_SIZE)
    }

    /// Like `spawn`, rejecting entries larger than `max_record_size` bytes
    pub fn spawn_with_limit<R>(reader: R, cancel: CancelToken, max_record_size: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = channel::bounded(HANDOFF_CAPACITY);
        let failure = Arc::new(Mutex::new(None));

        let worker = {
            let failure = Arc::clone(&failure);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("port-feed".to_string())
                .spawn(move || {
                    let decoder = EntryDecoder::new(reader, max_record_size);
                    if let Err(e) = run_decoder(decoder, &tx, &cancel) {
                        // A failure racing a cancel request is reported as the cancel
                        let e = if cancel.is_cancelled() { PortError::Cancelled } else { e };
                        *failure.lock() = Some(e);
                    }
                    // `tx` drops here, after the failure slot is written
                })
        };

        match worker {
            Ok(handle) => Self {
                records: rx,
                failure,
                cancel,
                worker: Some(handle),
                finished: false,
            },
            Err(e) => {
                // No thread means no sender: the first `next` reports this
                *failure.lock() = Some(PortError::Io(e));
                Self {
                    records: rx,
                    failure,
                    cancel,
                    worker: None,
                    finished: false,
                }
            }
        }
    }

    fn finish(&mut self, join: bool) {
        self.finished = true;
        if let Some(worker) = self.worker.take() {
            if join && worker.join().is_err() {
                tracing::error!("port feed worker panicked");
            }
            // Otherwise detached; a worker blocked on input exits once it sees
            // the closed channel or the cancel
        }
    }
}

enum Step {
    Record(Port),
    Closed,
    Cancelled,
}

/// Worker loop: decode, hand off, repeat until the object closes
fn run_decoder<R: Read>(
    mut decoder: EntryDecoder<R>,
    tx: &Sender<Port>,
    cancel: &CancelToken,
) -> Result<()> {
    let mut sent = 0u64;
    loop {
        let port = match decoder.next_entry(cancel)? {
            Some(port) => port,
            None => {
                tracing::debug!("port feed complete: {} records, {} bytes", sent, decoder.offset());
                return Ok(());
            }
        };

        select! {
            send(tx, port) -> res => {
                if res.is_err() {
                    // Consumer dropped the feed
                    tracing::debug!("port feed abandoned after {} records", sent);
                    return Ok(());
                }
                sent += 1;
            }
            recv(cancel.signal()) -> _ => return Err(PortError::Cancelled),
        }
    }
}

impl Iterator for PortFeed {
    type Item = Result<Port>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finish(false);
            return Some(Err(PortError::Cancelled));
        }

        let step = select! {
            recv(self.records) -> msg => match msg {
                Ok(port) => Step::Record(port),
                // Sender gone: the worker has finished
                Err(_) => Step::Closed,
            },
            recv(self.cancel.signal()) -> _ => Step::Cancelled,
        };

        match step {
            Step::Record(port) => Some(Ok(port)),
            Step::Closed => {
                self.finish(true);
                self.failure.lock().take().map(Err)
            }
            Step::Cancelled => {
                self.finish(false);
                Some(Err(PortError::Cancelled))
            }
        }
    }
}

impl FusedIterator for PortFeed {}
