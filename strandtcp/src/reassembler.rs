//! Out-of-order stream reassembly.
//!
//! Byte ranges tagged with their absolute stream index arrive in any order,
//! possibly overlapping or duplicated. They are held in a `BTreeMap` keyed by
//! start index and written to the output `ByteStream` once contiguous with
//! everything delivered so far. Bytes that would not fit in the output's
//! free space are dropped on arrival.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::byte_stream::ByteStream;

/// A range of bytes waiting for the gap in front of it to fill.
#[derive(Debug, Clone)]
struct PendingRange {
    data: Bytes,
    eof: bool,
}

impl PendingRange {
    fn end(&self, start: u64) -> u64 {
        start + self.data.len() as u64
    }
}

/// Reassembles a byte stream from unordered ranges.
#[derive(Debug)]
pub struct Reassembler {
    output: ByteStream,
    pending: BTreeMap<u64, PendingRange>,
    first_unassembled: u64,
}

impl Reassembler {
    /// Create a reassembler whose output stream holds `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            output: ByteStream::new(capacity),
            pending: BTreeMap::new(),
            first_unassembled: 0,
        }
    }

    /// Accept `data` starting at absolute stream position `index`. `eof`
    /// marks the last byte of `data` as the last byte of the stream.
    pub fn submit(&mut self, data: Bytes, index: u64, eof: bool) {
        if self.output.input_ended() || self.output.error() {
            return;
        }

        let mut data = data;
        let mut eof = eof;
        let limit = self.first_unassembled + self.output.remaining_capacity() as u64;
        let end = index + data.len() as u64;
        if end > limit {
            let keep = limit.saturating_sub(index).min(data.len() as u64) as usize;
            data.truncate(keep);
            eof = false;
        }

        if data.is_empty() && !eof {
            return;
        }
        if index + (data.len() as u64) < self.first_unassembled {
            return;
        }

        let range = PendingRange { data, eof };
        match self.pending.get(&index) {
            Some(existing) if existing.end(index) >= range.end(index) && !range.eof => {}
            _ => {
                self.pending.insert(index, range);
            }
        }

        self.reassemble();
    }

    fn reassemble(&mut self) {
        while let Some(entry) = self.pending.first_entry() {
            let start = *entry.key();
            if start > self.first_unassembled {
                break;
            }
            let range = entry.remove();
            let end = range.end(start);
            if end < self.first_unassembled {
                continue;
            }

            let skip = (self.first_unassembled - start) as usize;
            let fresh = range.data.slice(skip..);
            // Space was reserved on submit, so the whole slice fits.
            let written = self.output.write(&fresh).unwrap_or(0);
            self.first_unassembled += written as u64;
            if range.eof {
                tracing::trace!(index = self.first_unassembled, "reassembler reached end of stream");
                self.output.end_input();
                self.pending.clear();
                break;
            }
        }
    }

    /// Bytes held in pending ranges, counting overlaps once.
    pub fn unassembled_byte_count(&self) -> usize {
        let mut covered_to = self.first_unassembled;
        let mut count = 0u64;
        for (&start, range) in &self.pending {
            let end = range.end(start);
            if end > covered_to {
                count += end - start.max(covered_to);
                covered_to = end;
            }
        }
        count as usize
    }

    /// No pending ranges and nothing left unread in the output.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.output.buffer_empty()
    }

    /// Index of the next byte the output is waiting for.
    pub fn first_unassembled_index(&self) -> u64 {
        self.first_unassembled
    }

    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}
