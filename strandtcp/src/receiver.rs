//! Receiving half of a connection.
//!
//! Turns inbound segments into stream positions for the reassembler and
//! reports the acknowledgment number and window to advertise back.

use std::fmt;

use crate::byte_stream::ByteStream;
use crate::reassembler::Reassembler;
use crate::segment::Segment;
use crate::wrap32::Wrap32;

/// Externally visible receiver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the peer's SYN.
    Listen,
    /// SYN seen, stream still open.
    SynReceived,
    /// The peer's FIN has been assembled.
    FinReceived,
    /// The inbound stream was errored by a reset.
    Error,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverState::Listen => write!(f, "Listen"),
            ReceiverState::SynReceived => write!(f, "SynReceived"),
            ReceiverState::FinReceived => write!(f, "FinReceived"),
            ReceiverState::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Listen,
    Open { isn: Wrap32, checkpoint: u64 },
}

/// Receiver side: reassembly, ackno and window.
#[derive(Debug)]
pub struct Receiver {
    reassembler: Reassembler,
    phase: Phase,
}

impl Receiver {
    /// Create a receiver whose inbound stream holds `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            reassembler: Reassembler::new(capacity),
            phase: Phase::Listen,
        }
    }

    /// Process one inbound segment.
    pub fn on_segment(&mut self, segment: &Segment) {
        let header = &segment.header;
        let (isn, checkpoint) = match self.phase {
            Phase::Open { isn, checkpoint } => (isn, checkpoint),
            Phase::Listen if header.syn() => {
                tracing::debug!(isn = header.seqno.raw(), "peer SYN received");
                (header.seqno, 0)
            }
            Phase::Listen => {
                tracing::trace!(seqno = header.seqno.raw(), "segment before SYN ignored");
                return;
            }
        };

        let abs = header.seqno.unwrap(isn, checkpoint);
        self.phase = Phase::Open { isn, checkpoint: abs };

        // The SYN holds absolute index 0; stream byte 0 sits at index 1.
        let Some(index) = (abs + u64::from(header.syn())).checked_sub(1) else {
            tracing::trace!(seqno = header.seqno.raw(), "non-SYN segment in the SYN slot dropped");
            return;
        };
        if header.fin() {
            tracing::debug!(index = index + segment.payload.len() as u64, "peer FIN received");
        }
        self.reassembler
            .submit(segment.payload.clone(), index, header.fin());
    }

    /// Acknowledgment number to send, once the peer's SYN has been seen.
    pub fn ackno(&self) -> Option<Wrap32> {
        match self.phase {
            Phase::Listen => None,
            Phase::Open { isn, .. } => {
                let fin = u64::from(self.stream_out().input_ended());
                let next = self.reassembler.first_unassembled_index() + 1 + fin;
                Some(Wrap32::wrap(next, isn))
            }
        }
    }

    /// Free space in the inbound stream, capped to the 16-bit wire field.
    pub fn window_size(&self) -> u16 {
        self.stream_out()
            .remaining_capacity()
            .min(usize::from(u16::MAX)) as u16
    }

    pub fn unassembled_byte_count(&self) -> usize {
        self.reassembler.unassembled_byte_count()
    }

    /// Nothing pending in the reassembler and nothing unread.
    pub fn is_empty(&self) -> bool {
        self.reassembler.is_empty()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.output()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.output_mut()
    }

    pub fn state(&self) -> ReceiverState {
        if self.stream_out().error() {
            ReceiverState::Error
        } else if matches!(self.phase, Phase::Listen) {
            ReceiverState::Listen
        } else if self.stream_out().input_ended() {
            ReceiverState::FinReceived
        } else {
            ReceiverState::SynReceived
        }
    }
}
