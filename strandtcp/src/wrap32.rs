//! 32-bit wrapping sequence numbers.
//!
//! The wire carries sequence numbers modulo 2^32, offset by the initial
//! sequence number (ISN) of the direction. Internally every position is an
//! absolute `u64` index where the SYN occupies index 0. `unwrap` picks the
//! absolute index closest to a recently seen checkpoint.

use std::fmt;
use std::ops::{Add, Sub};

const SPAN: u64 = 1 << 32;

/// A sequence number as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wrap32(u32);

impl Wrap32 {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Wire representation of absolute index `n` relative to `isn`.
    pub fn wrap(n: u64, isn: Wrap32) -> Self {
        Self(isn.0.wrapping_add(n as u32))
    }

    /// The absolute index that wraps to `self` and lies closest to
    /// `checkpoint`. Ties go to the lower index.
    pub fn unwrap(self, isn: Wrap32, checkpoint: u64) -> u64 {
        let offset = u64::from(self.0.wrapping_sub(isn.0));
        let base = (checkpoint & !(SPAN - 1)) | offset;

        let candidates = [base.checked_sub(SPAN), Some(base), base.checked_add(SPAN)];
        let mut best = base;
        let mut best_dist = u64::MAX;
        for candidate in candidates.into_iter().flatten() {
            let dist = candidate.abs_diff(checkpoint);
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
            }
        }
        best
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, rhs: u32) -> Wrap32 {
        Wrap32(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for Wrap32 {
    type Output = Wrap32;

    fn sub(self, rhs: u32) -> Wrap32 {
        Wrap32(self.0.wrapping_sub(rhs))
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
