//! Byte scanner
//!
//! Buffered byte-at-a-time access to the feed with one byte of lookahead and
//! a running offset for error messages.

use std::io::{BufReader, ErrorKind, Read};

use bytes::{BufMut, BytesMut};

use crate::error::{PortError, Result};

const READ_BUFFER_SIZE: usize = 8 * 1024;

pub(crate) struct Scanner<R> {
    reader: BufReader<R>,
    peeked: Option<u8>,
    /// Bytes consumed so far
    offset: u64,
}

impl<R: Read> Scanner<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, reader),
            peeked: None,
            offset: 0,
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> PortError {
        PortError::decode(self.offset, message)
    }

    pub(crate) fn peek(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.read_byte()?;
        }
        Ok(self.peeked)
    }

    pub(crate) fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = match self.peeked.take() {
            Some(byte) => Some(byte),
            None => self.read_byte()?,
        };
        if byte.is_some() {
            self.offset += 1;
        }
        Ok(byte)
    }

    /// Next byte, treating end of input as an error
    pub(crate) fn expect_byte(&mut self, context: &str) -> Result<u8> {
        self.next_byte()?
            .ok_or_else(|| self.error(format!("unexpected end of input {}", context)))
    }

    pub(crate) fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(byte) = self.peek()? {
            if !matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.next_byte()?;
        }
        Ok(())
    }

    /// Copy the rest of a string token, up to and including the closing
    /// quote, into `out`. The opening quote must already be consumed.
    ///
    /// Escapes are copied verbatim; validation is left to serde_json.
    pub(crate) fn copy_string_body(&mut self, out: &mut BytesMut, limit: usize) -> Result<()> {
        loop {
            let byte = self.expect_byte("inside a string")?;
            out.put_u8(byte);
            match byte {
                b'"' => return Ok(()),
                b'\\' => {
                    let escaped = self.expect_byte("inside a string escape")?;
                    out.put_u8(escaped);
                }
                _ => {}
            }
            if out.len() > limit {
                return Err(self.error(format!("record exceeds {} bytes", limit)));
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
