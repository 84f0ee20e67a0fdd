//! Parsed segment records exchanged with the datagram layer.
//!
//! Checksums and byte-exact header layout belong to the layer below; this
//! module only models the fields the transport logic reads and writes.

use std::fmt;

use bytes::Bytes;

use crate::wrap32::Wrap32;

/// Header control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SegmentFlags(pub u8);

impl SegmentFlags {
    pub const NONE: Self = Self(0x00);
    pub const FIN: Self = Self(0x01);
    pub const SYN: Self = Self(0x02);
    pub const RST: Self = Self(0x04);
    pub const ACK: Self = Self(0x10);

    pub fn contains(self, flag: SegmentFlags) -> bool {
        (self.0 & flag.0) == flag.0
    }

    pub fn insert(&mut self, flag: SegmentFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: SegmentFlags) {
        self.0 &= !flag.0;
    }

    /// Set or clear `flag` depending on `on`.
    pub fn set(&mut self, flag: SegmentFlags, on: bool) {
        if on {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }
}

impl std::ops::BitOr for SegmentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Transport header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentHeader {
    pub seqno: Wrap32,
    pub flags: SegmentFlags,
    /// Meaningful only when `flags` contains `ACK`.
    pub ackno: Wrap32,
    pub win: u16,
}

impl SegmentHeader {
    pub fn syn(&self) -> bool {
        self.flags.contains(SegmentFlags::SYN)
    }

    pub fn fin(&self) -> bool {
        self.flags.contains(SegmentFlags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags.contains(SegmentFlags::RST)
    }

    pub fn ack(&self) -> bool {
        self.flags.contains(SegmentFlags::ACK)
    }
}

/// A header plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    pub header: SegmentHeader,
    pub payload: Bytes,
}

impl Segment {
    pub fn new(header: SegmentHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Sequence numbers this segment occupies: payload bytes plus one for
    /// each of SYN and FIN.
    pub fn length_in_sequence_space(&self) -> u64 {
        self.payload.len() as u64 + u64::from(self.header.syn()) + u64::from(self.header.fin())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        write!(f, "seqno={}", h.seqno)?;
        for (on, name) in [(h.syn(), "SYN"), (h.fin(), "FIN"), (h.rst(), "RST")] {
            if on {
                write!(f, " {name}")?;
            }
        }
        if h.ack() {
            write!(f, " ACK ackno={}", h.ackno)?;
        }
        write!(f, " win={} len={}", h.win, self.payload.len())
    }
}
