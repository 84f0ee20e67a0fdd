//! Tokio host for a single connection.
//!
//! The transport core never schedules anything itself. `spawn` gives a
//! connection one owning task that feeds it inbound segments from a channel
//! and ticks its clock on a fixed interval, while the application talks to
//! it through a cloneable `ConnectionHandle`. All access is serialized by
//! one mutex per connection.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::connection::{Connection, ConnectionState};
use crate::error::Result;
use crate::segment::Segment;
use crate::session::Session;

type SharedSession = Arc<Mutex<Session<mpsc::UnboundedSender<Segment>>>>;

/// Application-side handle to a driven connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    session: SharedSession,
}

impl ConnectionHandle {
    /// Send a SYN to start the handshake.
    pub fn open(&self) {
        self.session.lock().open();
    }

    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.session.lock().write(data)
    }

    /// Read up to `max` bytes that have arrived in order.
    pub fn read(&self, max: usize) -> Result<Bytes> {
        self.session.lock().read(max)
    }

    pub fn end_input(&self) {
        self.session.lock().end_input_stream();
    }

    /// Whether all inbound data has arrived and been read.
    pub fn inbound_eof(&self) -> bool {
        self.session.lock().inbound().eof()
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.session.lock().remaining_outbound_capacity()
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().is_active()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Reset the connection if it is still active.
    pub fn abort(&self) {
        self.session.lock().close();
    }
}

/// Drive `connection` on a new task.
///
/// Segments arriving on `inbound` are delivered in order; produced segments
/// go to `outbound`. The task ends once the connection is no longer active
/// or `inbound` closes, resetting the connection in the latter case.
pub fn spawn(
    connection: Connection,
    tick: Duration,
    inbound: mpsc::UnboundedReceiver<Segment>,
    outbound: mpsc::UnboundedSender<Segment>,
) -> (ConnectionHandle, JoinHandle<()>) {
    let session = Arc::new(Mutex::new(Session::new(connection, outbound)));
    let task = tokio::spawn(run(Arc::clone(&session), tick, inbound));
    (ConnectionHandle { session }, task)
}

async fn run(session: SharedSession, tick: Duration, mut inbound: mpsc::UnboundedReceiver<Segment>) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            now = interval.tick() => {
                let elapsed = now.saturating_duration_since(last_tick);
                last_tick = now;
                session.lock().on_tick(elapsed);
            }
            segment = inbound.recv() => {
                match segment {
                    Some(segment) => {
                        session.lock().on_segment_received(segment);
                    }
                    None => {
                        tracing::debug!("inbound channel closed, stopping connection task");
                        break;
                    }
                }
            }
        }

        let active = session.lock().is_active();
        if !active {
            let state = session.lock().state();
            tracing::debug!(%state, "connection finished");
            break;
        }
    }

    session.lock().close();
}
