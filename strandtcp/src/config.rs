//! Connection configuration.

use std::time::Duration;

use crate::wrap32::Wrap32;

/// Default capacity of each direction's byte stream.
pub const DEFAULT_CAPACITY: usize = 64_000;
/// Largest payload carried by a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 1_000;
/// Default initial retransmission timeout.
pub const DEFAULT_RT_TIMEOUT: Duration = Duration::from_millis(1_000);
/// Consecutive retransmissions tolerated before the connection gives up.
pub const MAX_RETX_ATTEMPTS: u32 = 8;

/// Configuration for a connection.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Capacity of the inbound stream (bounds the advertised window).
    pub recv_capacity: usize,
    /// Capacity of the outbound stream.
    pub send_capacity: usize,
    /// Initial retransmission timeout.
    pub rt_timeout: Duration,
    /// Maximum consecutive retransmissions before resetting.
    pub max_retx_attempts: u32,
    /// Maximum payload bytes per segment.
    pub max_payload_size: usize,
    /// Initial sequence number to use instead of a random one.
    pub fixed_isn: Option<Wrap32>,
}

impl TcpConfig {
    pub fn with_capacity(mut self, recv_capacity: usize, send_capacity: usize) -> Self {
        self.recv_capacity = recv_capacity;
        self.send_capacity = send_capacity;
        self
    }

    pub fn with_rt_timeout(mut self, rt_timeout: Duration) -> Self {
        self.rt_timeout = rt_timeout;
        self
    }

    pub fn with_max_retx_attempts(mut self, attempts: u32) -> Self {
        self.max_retx_attempts = attempts;
        self
    }

    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn with_fixed_isn(mut self, isn: Wrap32) -> Self {
        self.fixed_isn = Some(isn);
        self
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            recv_capacity: DEFAULT_CAPACITY,
            send_capacity: DEFAULT_CAPACITY,
            rt_timeout: DEFAULT_RT_TIMEOUT,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            max_payload_size: MAX_PAYLOAD_SIZE,
            fixed_isn: None,
        }
    }
}
