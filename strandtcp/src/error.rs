use thiserror::Error;

/// All errors produced by the StrandTCP transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrandTcpError {
    #[error("read of {requested} bytes exceeds the {buffered} bytes buffered")]
    ReadBeyondBuffered { requested: usize, buffered: usize },

    #[error("byte stream is in the error state")]
    StreamErrored,

    #[error("write after end of input")]
    WriteAfterEnd,

    #[error("connection reset")]
    ConnectionReset,

    #[error("connection is closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, StrandTcpError>;
