//! Entry state machine
//!
//! Walks the wrapping object one entry at a time. The nesting depth decides
//! what a token means: the opening brace puts the decoder at depth 1, where a
//! string can only be an entry key. The value after the key is captured until
//! depth falls back to 1 and is then decoded on its own, so at most one entry
//! is ever held in memory.

use std::io::Read;

use bytes::{BufMut, BytesMut};

use crate::cancel::CancelToken;
use crate::error::{PortError, Result};
use crate::model::{Port, PortDetails};

use super::scanner::Scanner;

#[derive(Debug)]
enum State {
    /// Before the wrapping object's opening brace
    Outside,
    /// Depth 1, expecting an entry key (or `}`; `first` allows an empty object)
    AtKeyLevel { first: bool },
    /// Key read, its value comes next
    InsideValue { id: String },
    /// Depth 1 after a value, expecting `,` or `}`
    AfterValue,
    /// Wrapping object closed or input was empty
    Done,
}

/// Synchronous, pull-based decoder for the catalog feed
pub struct EntryDecoder<R> {
    scanner: Scanner<R>,
    state: State,
    depth: usize,
    max_record_size: usize,
    key_buf: BytesMut,
    value_buf: BytesMut,
}

impl<R: Read> EntryDecoder<R> {
    pub fn new(reader: R, max_record_size: usize) -> Self {
        Self {
            scanner: Scanner::new(reader),
            state: State::Outside,
            depth: 0,
            max_record_size,
            key_buf: BytesMut::new(),
            value_buf: BytesMut::new(),
        }
    }

    /// Decode the next entry.
    ///
    /// `Ok(None)` once the wrapping object is closed (or the input was
    /// empty). The token is checked before every step.
    pub fn next_entry(&mut self, cancel: &CancelToken) -> Result<Option<Port>> {
        loop {
            cancel.check()?;

            match std::mem::replace(&mut self.state, State::Done) {
                State::Outside => {
                    self.scanner.skip_whitespace()?;
                    match self.scanner.next_byte()? {
                        None => return Ok(None),
                        Some(b'{') => {
                            self.depth = 1;
                            self.state = State::AtKeyLevel { first: true };
                        }
                        Some(other) => {
                            return Err(self.unexpected(other, "expected '{' to open the catalog"))
                        }
                    }
                }
                State::AtKeyLevel { first } => {
                    self.scanner.skip_whitespace()?;
                    match self.scanner.expect_byte("while expecting an entry key")? {
                        b'"' => {
                            let id = self.read_key()?;
                            self.scanner.skip_whitespace()?;
                            match self.scanner.expect_byte("after an entry key")? {
                                b':' => self.state = State::InsideValue { id },
                                other => return Err(self.unexpected(other, "expected ':'")),
                            }
                        }
                        b'}' if first => self.close_catalog()?,
                        b'}' => {
                            return Err(self.scanner.error("trailing comma before '}'"));
                        }
                        other => return Err(self.unexpected(other, "expected an entry key")),
                    }
                }
                State::InsideValue { id } => {
                    let start = self.scanner.offset();
                    self.capture_value(cancel)?;
                    // A `null` value is an entry without details
                    let details: Option<PortDetails> = serde_json::from_slice(&self.value_buf)
                        .map_err(|e| {
                            PortError::decode(
                                start,
                                format!("invalid details for port {:?}: {}", id, e),
                            )
                        })?;
                    let details = details.unwrap_or_default();
                    self.state = State::AfterValue;
                    return Ok(Some(Port { id, details }));
                }
                State::AfterValue => {
                    self.scanner.skip_whitespace()?;
                    match self.scanner.expect_byte("after an entry value")? {
                        b',' => self.state = State::AtKeyLevel { first: false },
                        b'}' => self.close_catalog()?,
                        other => return Err(self.unexpected(other, "expected ',' or '}'")),
                    }
                }
                State::Done => return Ok(None),
            }
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.scanner.offset()
    }

    /// Read and unescape a key; the opening quote is already consumed
    fn read_key(&mut self) -> Result<String> {
        let start = self.scanner.offset() - 1;
        self.key_buf.clear();
        self.key_buf.put_u8(b'"');
        self.scanner
            .copy_string_body(&mut self.key_buf, self.max_record_size)?;

        let id: String = serde_json::from_slice(&self.key_buf).map_err(|e| {
            PortError::decode(start, format!("invalid entry key: {}", e))
        })?;
        if id.is_empty() {
            return Err(PortError::decode(start, "empty port id"));
        }
        Ok(id)
    }

    /// Copy one JSON value into `value_buf`, tracking depth through nested
    /// objects and arrays until it returns to the key level.
    fn capture_value(&mut self, cancel: &CancelToken) -> Result<()> {
        self.value_buf.clear();
        let key_level = self.depth;

        self.scanner.skip_whitespace()?;
        match self.scanner.peek()? {
            None => return Err(self.scanner.error("unexpected end of input, expected a value")),
            Some(b'{') | Some(b'[') => {}
            Some(b'"') => {
                self.scanner.next_byte()?;
                self.value_buf.put_u8(b'"');
                return self
                    .scanner
                    .copy_string_body(&mut self.value_buf, self.max_record_size);
            }
            Some(_) => return self.capture_scalar(),
        }

        loop {
            let byte = self.scanner.expect_byte("inside an entry value")?;
            self.value_buf.put_u8(byte);
            match byte {
                b'{' | b'[' => {
                    cancel.check()?;
                    self.depth += 1;
                }
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == key_level {
                        return Ok(());
                    }
                }
                // Strings never change depth, whatever they contain
                b'"' => self
                    .scanner
                    .copy_string_body(&mut self.value_buf, self.max_record_size)?,
                _ => {}
            }
            if self.value_buf.len() > self.max_record_size {
                return Err(self
                    .scanner
                    .error(format!("record exceeds {} bytes", self.max_record_size)));
            }
        }
    }

    /// Numbers and literals run until the next delimiter
    fn capture_scalar(&mut self) -> Result<()> {
        while let Some(byte) = self.scanner.peek()? {
            if matches!(byte, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.scanner.next_byte()?;
            self.value_buf.put_u8(byte);
            if self.value_buf.len() > self.max_record_size {
                return Err(self
                    .scanner
                    .error(format!("record exceeds {} bytes", self.max_record_size)));
            }
        }
        Ok(())
    }

    /// The wrapping `}` was consumed: back to depth 0, only whitespace may follow
    fn close_catalog(&mut self) -> Result<()> {
        self.depth = 0;
        self.scanner.skip_whitespace()?;
        if let Some(byte) = self.scanner.peek()? {
            return Err(self.unexpected(byte, "trailing data after the catalog object"));
        }
        self.state = State::Done;
        Ok(())
    }

    fn unexpected(&self, byte: u8, expectation: &str) -> PortError {
        self.scanner.error(format!(
            "unexpected {:?}, {}",
            char::from(byte),
            expectation
        ))
    }
}
