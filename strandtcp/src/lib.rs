//! StrandTCP -- reliable, ordered, flow-controlled byte streams over an
//! unreliable datagram substrate.
//!
//! The stack, leaf first:
//! - **ByteStream**: bounded in-memory byte queue with end-of-input and error flags
//! - **Reassembler**: turns unordered, overlapping byte ranges into an in-order stream
//! - **Wrap32**: 32-bit wire sequence numbers and their absolute positions
//! - **Receiver** / **Sender**: the two halves of a connection
//! - **Connection**: composes both into one self-closing session driven by
//!   inbound segments, application calls, and clock ticks
//!
//! Everything is synchronous and call-driven; `driver` offers a tokio task
//! for hosts that want one.

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod reassembler;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod session;
pub mod timer;
pub mod wrap32;

// Re-export key public types at crate root.
pub use byte_stream::ByteStream;
pub use config::TcpConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{Result, StrandTcpError};
pub use reassembler::Reassembler;
pub use receiver::{Receiver, ReceiverState};
pub use segment::{Segment, SegmentFlags, SegmentHeader};
pub use sender::{Sender, SenderState};
pub use session::{SegmentSink, Session};
pub use wrap32::Wrap32;
