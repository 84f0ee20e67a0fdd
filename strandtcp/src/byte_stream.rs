//! Flow-controlled in-memory byte stream.
//!
//! A bounded queue of bytes with a writer side and a reader side. Writes
//! accept as much as fits and report how much that was; nothing blocks.
//! The end-of-input and error flags are sticky.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, StrandTcpError};

/// Bounded byte queue shared between a writer and a reader.
#[derive(Debug)]
pub struct ByteStream {
    buffer: BytesMut,
    capacity: usize,
    bytes_written: u64,
    bytes_read: u64,
    input_ended: bool,
    error: bool,
}

impl ByteStream {
    /// Create a stream holding at most `capacity` unread bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            bytes_written: 0,
            bytes_read: 0,
            input_ended: false,
            error: false,
        }
    }

    /// Append as much of `data` as fits. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.error {
            return Err(StrandTcpError::StreamErrored);
        }
        if self.input_ended {
            return Err(StrandTcpError::WriteAfterEnd);
        }
        let n = data.len().min(self.remaining_capacity());
        self.buffer.extend_from_slice(&data[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    /// Copy of the next `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Result<Bytes> {
        self.check_readable(len)?;
        Ok(Bytes::copy_from_slice(&self.buffer[..len]))
    }

    /// Remove and return the next `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<Bytes> {
        self.check_readable(len)?;
        Ok(self.pop(len))
    }

    /// Remove and return up to `max` bytes; empty if errored or nothing is
    /// buffered.
    pub fn read_up_to(&mut self, max: usize) -> Bytes {
        if self.error {
            return Bytes::new();
        }
        let len = max.min(self.buffer.len());
        self.pop(len)
    }

    fn pop(&mut self, len: usize) -> Bytes {
        self.bytes_read += len as u64;
        self.buffer.split_to(len).freeze()
    }

    fn check_readable(&self, len: usize) -> Result<()> {
        if self.error {
            return Err(StrandTcpError::StreamErrored);
        }
        if len > self.buffer.len() {
            return Err(StrandTcpError::ReadBeyondBuffered {
                requested: len,
                buffered: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Signal that the writer has nothing more to write.
    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    /// Put the stream into the error state.
    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    pub fn error(&self) -> bool {
        self.error
    }

    /// Number of bytes currently buffered.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Input has ended and every byte has been read.
    pub fn eof(&self) -> bool {
        self.input_ended && self.buffer_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
