//! Countdown timer driving retransmission.
//!
//! The timer never reads a clock; the owner advances it with the time that
//! has passed since the previous call.

use std::time::Duration;

/// Single countdown with start/stop/expire semantics.
#[derive(Debug, Clone, Default)]
pub struct RetransmissionTimer {
    remaining: Duration,
    running: bool,
}

impl RetransmissionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer with a fresh countdown, restarting it if running.
    pub fn start(&mut self, timeout: Duration) {
        self.remaining = timeout;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advance the countdown. No effect while stopped.
    pub fn elapse(&mut self, elapsed: Duration) {
        if self.running {
            self.remaining = self.remaining.saturating_sub(elapsed);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Running with no time left.
    pub fn has_expired(&self) -> bool {
        self.running && self.remaining.is_zero()
    }

    pub fn time_left(&self) -> Duration {
        self.remaining
    }
}
