//! Network boundary and scoped teardown.
//!
//! `SegmentSink` is where finished segments leave the transport. A `Session`
//! pairs a `Connection` with a sink, forwards every produced segment after
//! each operation, and resets the connection when it goes out of scope while
//! still active, whether the owner returned early, bailed out with an error,
//! or finished normally.

use std::collections::VecDeque;
use std::ops::Deref;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::error::Result;
use crate::segment::Segment;

/// Accepts completed segments for transmission.
pub trait SegmentSink {
    fn send_segment(&mut self, segment: Segment);
}

impl SegmentSink for Vec<Segment> {
    fn send_segment(&mut self, segment: Segment) {
        self.push(segment);
    }
}

impl SegmentSink for VecDeque<Segment> {
    fn send_segment(&mut self, segment: Segment) {
        self.push_back(segment);
    }
}

impl SegmentSink for mpsc::UnboundedSender<Segment> {
    fn send_segment(&mut self, segment: Segment) {
        if let Err(err) = self.send(segment) {
            tracing::debug!(segment = %err.0, "network channel closed, segment dropped");
        }
    }
}

/// A connection bound to the sink its segments go to.
///
/// Read-only access goes through `Deref`; every mutating operation is
/// wrapped so produced segments reach the sink immediately.
pub struct Session<S: SegmentSink> {
    connection: Connection,
    sink: S,
}

impl<S: SegmentSink> Session<S> {
    pub fn new(connection: Connection, sink: S) -> Self {
        Self { connection, sink }
    }

    pub fn open(&mut self) {
        self.connection.open();
        self.flush();
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let result = self.connection.write(data);
        self.flush();
        result
    }

    pub fn read(&mut self, max: usize) -> Result<Bytes> {
        self.connection.read(max)
    }

    pub fn end_input_stream(&mut self) {
        self.connection.end_input_stream();
        self.flush();
    }

    pub fn on_segment_received(&mut self, segment: Segment) {
        self.connection.on_segment_received(segment);
        self.flush();
    }

    pub fn on_tick(&mut self, elapsed: Duration) {
        self.connection.on_tick(elapsed);
        self.flush();
    }

    /// Reset the connection if it is still active and push out the RST.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        self.connection.abort();
        self.flush();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn flush(&mut self) {
        for segment in self.connection.drain_segments() {
            self.sink.send_segment(segment);
        }
    }
}

impl<S: SegmentSink> Deref for Session<S> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl<S: SegmentSink> Drop for Session<S> {
    fn drop(&mut self) {
        self.close();
    }
}
