//! Connection state machine.
//!
//! A `Connection` owns one `Sender` and one `Receiver` and is the only part
//! of the stack driven from outside: inbound segments, application reads and
//! writes, and clock ticks. Its lifecycle state is derived from the two
//! halves rather than stored:
//! Listen -> SynSent / SynReceived -> Established -> FinWait1 / CloseWait ->
//! ... -> TimeWait / LastAck -> Closed, with Reset reachable from anywhere.

use std::collections::vec_deque::{Drain, VecDeque};
use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::byte_stream::ByteStream;
use crate::config::TcpConfig;
use crate::error::{Result, StrandTcpError};
use crate::receiver::{Receiver, ReceiverState};
use crate::segment::{Segment, SegmentFlags};
use crate::sender::{Sender, SenderState};
use crate::wrap32::Wrap32;

/// Connection states, derived from the sender and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Listen,
    SynSent,
    SynReceived,
    Established,
    CloseWait,
    LastAck,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    Closed,
    Reset,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Listen => write!(f, "Listen"),
            ConnectionState::SynSent => write!(f, "SynSent"),
            ConnectionState::SynReceived => write!(f, "SynReceived"),
            ConnectionState::Established => write!(f, "Established"),
            ConnectionState::CloseWait => write!(f, "CloseWait"),
            ConnectionState::LastAck => write!(f, "LastAck"),
            ConnectionState::FinWait1 => write!(f, "FinWait1"),
            ConnectionState::FinWait2 => write!(f, "FinWait2"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::TimeWait => write!(f, "TimeWait"),
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Reset => write!(f, "Reset"),
        }
    }
}

/// One end of a bidirectional byte-stream session.
#[derive(Debug)]
pub struct Connection {
    config: TcpConfig,
    sender: Sender,
    receiver: Receiver,
    /// Outbound segments ready for the network layer.
    segments_out: VecDeque<Segment>,
    time_since_last_segment_received: Duration,
    /// Keep answering after both streams finish, in case the peer
    /// retransmits its FIN.
    linger_after_streams_finish: bool,
}

impl Connection {
    /// Create a connection. The ISN is `config.fixed_isn` if set, random
    /// otherwise.
    pub fn new(config: TcpConfig) -> Self {
        Self::with_isn_source(config, || Wrap32::new(rand::random::<u32>()))
    }

    /// Create a connection drawing its ISN from `source` unless the config
    /// fixes one.
    pub fn with_isn_source<F>(config: TcpConfig, source: F) -> Self
    where
        F: FnOnce() -> Wrap32,
    {
        let isn = config.fixed_isn.unwrap_or_else(source);
        let sender = Sender::new(config.send_capacity, config.rt_timeout, isn)
            .with_max_payload_size(config.max_payload_size);
        Self {
            receiver: Receiver::new(config.recv_capacity),
            sender,
            config,
            segments_out: VecDeque::new(),
            time_since_last_segment_received: Duration::ZERO,
            linger_after_streams_finish: true,
        }
    }

    /// Start the opening handshake by sending a SYN.
    pub fn open(&mut self) {
        self.sender.fill_window();
        self.flush();
    }

    /// Write application data. Returns how many bytes the outbound stream
    /// accepted, or `ConnectionClosed` once the connection has shut down
    /// cleanly.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.sender.stream_in().error() {
            return Err(StrandTcpError::ConnectionReset);
        }
        if !self.is_active() {
            return Err(StrandTcpError::ConnectionClosed);
        }
        let n = self.sender.stream_in_mut().write(data)?;
        self.sender.fill_window();
        self.flush();
        Ok(n)
    }

    /// Read up to `max` bytes of in-order inbound data.
    pub fn read(&mut self, max: usize) -> Result<Bytes> {
        let inbound = self.receiver.stream_out_mut();
        if inbound.error() {
            return Err(StrandTcpError::ConnectionReset);
        }
        Ok(inbound.read_up_to(max))
    }

    /// Finish the outbound stream; a FIN follows the remaining data.
    pub fn end_input_stream(&mut self) {
        self.sender.stream_in_mut().end_input();
        self.sender.fill_window();
        self.flush();
    }

    /// Process a segment from the network.
    pub fn on_segment_received(&mut self, segment: Segment) {
        if !self.is_active() {
            tracing::trace!(%segment, "segment for inactive connection ignored");
            return;
        }
        self.time_since_last_segment_received = Duration::ZERO;
        let header = segment.header;

        if header.rst() {
            tracing::warn!(seqno = header.seqno.raw(), "connection reset by peer");
            self.set_error();
            return;
        }

        self.receiver.on_segment(&segment);
        if header.ack() {
            self.sender.on_ack(header.ackno, header.win);
        }

        if self.receiver.stream_out().input_ended() && !self.sender.fin_sent() {
            self.linger_after_streams_finish = false;
        }

        let Some(ackno) = self.receiver.ackno() else {
            return;
        };
        // Answers a SYN with SYN/ACK, and uses any window the ack opened.
        self.sender.fill_window();
        let keep_alive = header.seqno == ackno - 1;
        if (segment.length_in_sequence_space() > 0 || keep_alive)
            && self.sender.queued_segments() == 0
        {
            self.sender.send_empty_segment();
        }
        self.flush();
    }

    /// Advance time by `elapsed`.
    pub fn on_tick(&mut self, elapsed: Duration) {
        if !self.is_active() {
            return;
        }
        self.sender.on_tick(elapsed);
        self.time_since_last_segment_received += elapsed;
        if self.sender.syn_sent() {
            self.sender.fill_window();
        }
        self.flush();

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            tracing::warn!(
                attempts = self.sender.consecutive_retransmissions(),
                "retransmission limit exceeded, resetting connection"
            );
            self.send_reset();
            return;
        }

        if self.streams_finished()
            && self.linger_after_streams_finish
            && self.time_since_last_segment_received >= self.config.rt_timeout * 10
        {
            tracing::debug!("linger period over, connection closed");
            self.linger_after_streams_finish = false;
        }
    }

    /// Whether the connection still has work to do or may still need to
    /// answer the peer.
    pub fn is_active(&self) -> bool {
        if self.receiver.stream_out().error() || self.sender.stream_in().error() {
            return false;
        }
        !(self.streams_finished() && !self.linger_after_streams_finish)
    }

    /// Reset the connection if it is still active. Call before discarding a
    /// connection so the peer is not left waiting.
    pub fn abort(&mut self) {
        if self.is_active() {
            tracing::warn!(state = %self.state(), "unclean shutdown, sending RST");
            self.send_reset();
        }
    }

    /// Drain outbound segments in generation order.
    pub fn drain_segments(&mut self) -> Drain<'_, Segment> {
        self.segments_out.drain(..)
    }

    pub fn state(&self) -> ConnectionState {
        let rx = self.receiver.state();
        let tx = self.sender.state();
        match (rx, tx) {
            (ReceiverState::Error, _) | (_, SenderState::Error) => ConnectionState::Reset,
            (ReceiverState::Listen, SenderState::Closed) => ConnectionState::Listen,
            (ReceiverState::Listen, _) => ConnectionState::SynSent,
            (ReceiverState::SynReceived, SenderState::Closed | SenderState::SynSent) => {
                ConnectionState::SynReceived
            }
            (ReceiverState::SynReceived, SenderState::SynAcked) => ConnectionState::Established,
            (ReceiverState::SynReceived, SenderState::FinSent) => ConnectionState::FinWait1,
            (ReceiverState::SynReceived, SenderState::FinAcked) => ConnectionState::FinWait2,
            (
                ReceiverState::FinReceived,
                SenderState::Closed | SenderState::SynSent | SenderState::SynAcked,
            ) => ConnectionState::CloseWait,
            (ReceiverState::FinReceived, SenderState::FinSent) => {
                if self.linger_after_streams_finish {
                    ConnectionState::Closing
                } else {
                    ConnectionState::LastAck
                }
            }
            (ReceiverState::FinReceived, SenderState::FinAcked) => {
                if self.linger_after_streams_finish {
                    ConnectionState::TimeWait
                } else {
                    ConnectionState::Closed
                }
            }
        }
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_byte_count(&self) -> usize {
        self.receiver.unassembled_byte_count()
    }

    pub fn time_since_last_segment_received(&self) -> Duration {
        self.time_since_last_segment_received
    }

    /// The inbound stream the application reads from.
    pub fn inbound(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    /// The outbound stream the application writes to.
    pub fn outbound(&self) -> &ByteStream {
        self.sender.stream_in()
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Both streams are done: inbound fully read with nothing pending,
    /// outbound fully sent with FIN out and nothing in flight.
    fn streams_finished(&self) -> bool {
        let inbound_done =
            self.receiver.stream_out().eof() && self.receiver.unassembled_byte_count() == 0;
        let outbound_done = self.sender.stream_in().eof()
            && self.sender.fin_sent()
            && self.sender.bytes_in_flight() == 0;
        inbound_done && outbound_done
    }

    fn set_error(&mut self) {
        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();
    }

    fn send_reset(&mut self) {
        self.set_error();
        self.sender.send_reset_segment();
        self.flush();
    }

    /// Move the sender's segments out, stamping ack and window on each.
    fn flush(&mut self) {
        let ackno = self.receiver.ackno();
        let win = self.receiver.window_size();
        for mut segment in self.sender.drain_segments() {
            if !segment.header.rst() {
                if let Some(ackno) = ackno {
                    segment.header.flags.insert(SegmentFlags::ACK);
                    segment.header.ackno = ackno;
                }
                segment.header.win = win;
            }
            self.segments_out.push_back(segment);
        }
    }
}
