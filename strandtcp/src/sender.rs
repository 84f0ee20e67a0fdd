//! Sending half of a connection.
//!
//! Slices the outbound `ByteStream` into segments that fit the peer's
//! advertised window, keeps every unacknowledged segment in a `BTreeMap`
//! keyed by absolute sequence index, and retransmits the oldest one when
//! the retransmission timer fires.
//!
//! ## Zero windows
//!
//! An advertised window of zero is treated as a window of one so that a
//! single probe byte keeps flowing. Timeouts while the peer advertises zero
//! are not congestion, so the timeout is not backed off for them.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use crate::byte_stream::ByteStream;
use crate::config::MAX_PAYLOAD_SIZE;
use crate::segment::{Segment, SegmentFlags, SegmentHeader};
use crate::timer::RetransmissionTimer;
use crate::wrap32::Wrap32;

/// Externally visible sender state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing sent yet.
    Closed,
    /// SYN sent, not yet acknowledged.
    SynSent,
    /// SYN acknowledged, FIN not yet sent.
    SynAcked,
    /// FIN sent, not yet acknowledged.
    FinSent,
    /// FIN sent and acknowledged.
    FinAcked,
    /// The outbound stream was errored.
    Error,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderState::Closed => write!(f, "Closed"),
            SenderState::SynSent => write!(f, "SynSent"),
            SenderState::SynAcked => write!(f, "SynAcked"),
            SenderState::FinSent => write!(f, "FinSent"),
            SenderState::FinAcked => write!(f, "FinAcked"),
            SenderState::Error => write!(f, "Error"),
        }
    }
}

/// Sender side: windowed transmission and retransmission.
#[derive(Debug)]
pub struct Sender {
    isn: Wrap32,
    stream: ByteStream,
    /// Next absolute sequence index to send.
    next_seqno: u64,
    /// Highest absolute index acknowledged by the peer.
    ackno: u64,
    /// Last window advertised by the peer.
    window: u16,
    initial_rto: Duration,
    rto: Duration,
    timer: RetransmissionTimer,
    consecutive_retransmissions: u32,
    max_payload_size: usize,
    fin_sent: bool,
    /// Sent but not fully acknowledged, keyed by absolute start index.
    outstanding: BTreeMap<u64, Segment>,
    bytes_in_flight: u64,
    /// Produced segments waiting to be drained by the owner.
    segments_out: VecDeque<Segment>,
}

impl Sender {
    /// Create a sender with an outbound stream of `capacity` bytes.
    pub fn new(capacity: usize, initial_rto: Duration, isn: Wrap32) -> Self {
        Self {
            isn,
            stream: ByteStream::new(capacity),
            next_seqno: 0,
            ackno: 0,
            window: 1,
            initial_rto,
            rto: initial_rto,
            timer: RetransmissionTimer::new(),
            consecutive_retransmissions: 0,
            max_payload_size: MAX_PAYLOAD_SIZE,
            fin_sent: false,
            outstanding: BTreeMap::new(),
            bytes_in_flight: 0,
            segments_out: VecDeque::new(),
        }
    }

    /// Override the largest payload per segment.
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size.max(1);
        self
    }

    /// Send as many maximally packed segments as the window allows.
    pub fn fill_window(&mut self) {
        if self.stream.error() {
            return;
        }
        while !self.fin_sent {
            let window = u64::from(self.window.max(1));
            let budget = (self.ackno + window).saturating_sub(self.next_seqno);
            if budget == 0 {
                break;
            }

            let syn = self.next_seqno == 0;
            let room = (budget - u64::from(syn)).min(self.max_payload_size as u64) as usize;
            let payload = self.stream.read_up_to(room);
            let fin = self.stream.eof() && u64::from(syn) + (payload.len() as u64) < budget;
            if !syn && !fin && payload.is_empty() {
                break;
            }

            let mut flags = SegmentFlags::NONE;
            flags.set(SegmentFlags::SYN, syn);
            flags.set(SegmentFlags::FIN, fin);
            let segment = Segment::new(
                SegmentHeader {
                    seqno: Wrap32::wrap(self.next_seqno, self.isn),
                    flags,
                    ..Default::default()
                },
                payload,
            );
            let len = segment.length_in_sequence_space();

            if self.outstanding.is_empty() {
                self.timer.start(self.rto);
            }
            self.outstanding.insert(self.next_seqno, segment.clone());
            self.segments_out.push_back(segment);
            self.bytes_in_flight += len;
            self.next_seqno += len;
            if fin {
                tracing::debug!(seqno = self.next_seqno - 1, "FIN sent");
                self.fin_sent = true;
            }
        }
    }

    /// Process an acknowledgment and window advertisement from the peer.
    ///
    /// Returns `true` if the acknowledgment advanced the acked point.
    pub fn on_ack(&mut self, ackno: Wrap32, window: u16) -> bool {
        let abs = ackno.unwrap(self.isn, self.next_seqno);
        self.window = window;
        if abs > self.next_seqno || abs <= self.ackno {
            tracing::trace!(ackno = abs, acked = self.ackno, next = self.next_seqno, "ack ignored");
            return false;
        }

        self.ackno = abs;
        self.rto = self.initial_rto;
        self.consecutive_retransmissions = 0;

        while let Some(entry) = self.outstanding.first_entry() {
            let end = *entry.key() + entry.get().length_in_sequence_space();
            if end > abs {
                break;
            }
            let acked = entry.remove();
            self.bytes_in_flight -= acked.length_in_sequence_space();
        }

        if self.outstanding.is_empty() {
            self.timer.stop();
        } else {
            self.timer.start(self.rto);
        }
        true
    }

    /// Advance the retransmission timer by `elapsed`.
    pub fn on_tick(&mut self, elapsed: Duration) {
        if !self.timer.is_running() {
            return;
        }
        self.timer.elapse(elapsed);
        if !self.timer.has_expired() {
            return;
        }

        let Some((&start, oldest)) = self.outstanding.first_key_value() else {
            self.timer.stop();
            return;
        };
        tracing::debug!(
            seqno = start,
            len = oldest.length_in_sequence_space(),
            attempt = self.consecutive_retransmissions + 1,
            "retransmitting oldest outstanding segment"
        );
        self.segments_out.push_back(oldest.clone());
        if self.window != 0 {
            self.consecutive_retransmissions += 1;
            self.rto = self.rto.saturating_mul(2);
        }
        self.timer.start(self.rto);
    }

    /// Queue a segment carrying no payload and no sequence space, used to
    /// carry a bare acknowledgment.
    pub fn send_empty_segment(&mut self) {
        self.segments_out.push_back(self.empty_segment(SegmentFlags::NONE));
    }

    /// Queue an empty segment with RST set.
    pub fn send_reset_segment(&mut self) {
        self.segments_out.push_back(self.empty_segment(SegmentFlags::RST));
    }

    fn empty_segment(&self, flags: SegmentFlags) -> Segment {
        Segment::new(
            SegmentHeader {
                seqno: self.next_seqno(),
                flags,
                ..Default::default()
            },
            Default::default(),
        )
    }

    /// Drain produced segments in the order they were generated.
    pub fn drain_segments(&mut self) -> std::collections::vec_deque::Drain<'_, Segment> {
        self.segments_out.drain(..)
    }

    /// Number of produced segments not yet drained.
    pub fn queued_segments(&self) -> usize {
        self.segments_out.len()
    }

    /// Sequence numbers sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    pub fn current_rto(&self) -> Duration {
        self.rto
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> Wrap32 {
        Wrap32::wrap(self.next_seqno, self.isn)
    }

    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    pub fn syn_sent(&self) -> bool {
        self.next_seqno > 0
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    pub fn state(&self) -> SenderState {
        if self.stream.error() {
            SenderState::Error
        } else if self.next_seqno == 0 {
            SenderState::Closed
        } else if self.next_seqno == self.bytes_in_flight {
            SenderState::SynSent
        } else if !self.fin_sent {
            SenderState::SynAcked
        } else if self.bytes_in_flight > 0 {
            SenderState::FinSent
        } else {
            SenderState::FinAcked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RTO: Duration = Duration::from_millis(100);

    fn sender(capacity: usize) -> Sender {
        Sender::new(capacity, RTO, Wrap32::new(0))
    }

    fn drain(s: &mut Sender) -> Vec<Segment> {
        s.drain_segments().collect()
    }

    #[test]
    fn first_segment_is_syn() {
        let mut s = sender(100);
        assert_eq!(s.state(), SenderState::Closed);
        s.fill_window();
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert!(out[0].header.syn());
        assert_eq!(out[0].length_in_sequence_space(), 1);
        assert_eq!(s.bytes_in_flight(), 1);
        assert_eq!(s.state(), SenderState::SynSent);

        // Window of one is used up by the SYN.
        s.stream_in_mut().write(b"abc").unwrap();
        s.fill_window();
        assert!(drain(&mut s).is_empty());
    }

    #[test]
    fn syn_carries_isn() {
        let mut s = Sender::new(100, RTO, Wrap32::new(u32::MAX));
        s.fill_window();
        let out = drain(&mut s);
        assert_eq!(out[0].header.seqno, s.isn());
        assert_eq!(s.next_seqno(), Wrap32::new(0));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let mut s = sender(100);
        s.fill_window();
        drain(&mut s);
        for _ in 0..70 {
            s.on_tick(Duration::MAX);
            assert_eq!(drain(&mut s).len(), 1);
        }
        assert_eq!(s.consecutive_retransmissions(), 70);
        assert_eq!(s.current_rto(), Duration::MAX);
    }

    #[test]
    fn ack_of_syn_opens_window() {
        let mut s = sender(100);
        s.fill_window();
        drain(&mut s);
        assert!(s.on_ack(Wrap32::new(1), 10));
        assert_eq!(s.bytes_in_flight(), 0);
        assert_eq!(s.state(), SenderState::SynAcked);

        s.stream_in_mut().write(b"hello world!").unwrap();
        s.fill_window();
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[..], b"hello worl");
        assert_eq!(out[0].header.seqno, Wrap32::new(1));
        assert_eq!(s.bytes_in_flight(), 10);
    }

    #[test]
    fn fin_only_when_it_fits() {
        let mut s = sender(100);
        s.fill_window();
        drain(&mut s);
        s.on_ack(Wrap32::new(1), 3);
        s.stream_in_mut().write(b"abc").unwrap();
        s.stream_in_mut().end_input();
        s.fill_window();
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[..], b"abc");
        assert!(!out[0].header.fin());
        assert!(!s.fin_sent());

        s.on_ack(Wrap32::new(4), 3);
        s.fill_window();
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert!(out[0].header.fin());
        assert!(out[0].payload.is_empty());
        assert_eq!(s.state(), SenderState::FinSent);
        s.on_ack(Wrap32::new(5), 3);
        assert_eq!(s.state(), SenderState::FinAcked);
    }

    #[test]
    fn segments_limited_by_max_payload() {
        let mut s = sender(5000).with_max_payload_size(1000);
        s.fill_window();
        drain(&mut s);
        s.on_ack(Wrap32::new(1), 5000);
        s.stream_in_mut().write(&[7u8; 2500]).unwrap();
        s.fill_window();
        let lens: Vec<usize> = drain(&mut s).iter().map(|seg| seg.payload.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 500]);
    }

    #[test]
    fn partial_ack_keeps_segment() {
        let mut s = sender(100);
        s.fill_window();
        s.on_ack(Wrap32::new(1), 100);
        s.stream_in_mut().write(b"abcdef").unwrap();
        s.fill_window();
        assert_eq!(s.bytes_in_flight(), 6);
        assert!(s.on_ack(Wrap32::new(4), 100));
        assert_eq!(s.bytes_in_flight(), 6);
        assert!(s.on_ack(Wrap32::new(7), 100));
        assert_eq!(s.bytes_in_flight(), 0);
    }

    #[test]
    fn stale_and_future_acks_ignored() {
        let mut s = sender(100);
        s.fill_window();
        assert!(!s.on_ack(Wrap32::new(2), 50));
        assert!(s.on_ack(Wrap32::new(1), 50));
        assert!(!s.on_ack(Wrap32::new(1), 7));
        // The window is still recorded.
        s.stream_in_mut().write(&[0u8; 20]).unwrap();
        s.fill_window();
        assert_eq!(s.bytes_in_flight(), 7);
    }

    #[test]
    fn retransmits_oldest_only() {
        let mut s = sender(100).with_max_payload_size(2);
        s.fill_window();
        drain(&mut s);
        s.on_ack(Wrap32::new(1), 10);
        s.stream_in_mut().write(b"abcdef").unwrap();
        s.fill_window();
        assert_eq!(drain(&mut s).len(), 3);

        s.on_tick(RTO - Duration::from_millis(1));
        assert!(drain(&mut s).is_empty());
        s.on_tick(Duration::from_millis(1));
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[..], b"ab");
        assert_eq!(s.consecutive_retransmissions(), 1);
        assert_eq!(s.current_rto(), RTO * 2);
    }

    #[test]
    fn empty_segment_uses_no_sequence_space() {
        let mut s = sender(100);
        s.fill_window();
        drain(&mut s);
        s.send_empty_segment();
        let out = drain(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].length_in_sequence_space(), 0);
        assert_eq!(out[0].header.seqno, Wrap32::new(1));
        assert_eq!(s.next_seqno_absolute(), 1);
        assert_eq!(s.bytes_in_flight(), 1);
    }

    #[test]
    fn reset_segment_has_rst() {
        let mut s = sender(100);
        s.send_reset_segment();
        let out = drain(&mut s);
        assert!(out[0].header.rst());
        assert_eq!(out[0].length_in_sequence_space(), 0);
    }
}
