//! # THZ Error Handling
//!
//! This module defines the ThzError enum, which represents the different
//! failure classes that can occur in the thz-rs crate. Every error the
//! transport, codec or engine can produce is a distinct, inspectable value;
//! none of the layers retries internally.

use thiserror::Error;

/// Represents the different error types that can occur in the THZ crate.
#[derive(Debug, Error)]
pub enum ThzError {
    /// No byte arrived within the per-read deadline.
    #[error("read timeout")]
    Timeout,

    /// The serial channel reported end-of-stream.
    #[error("end of stream on serial line")]
    Eof,

    /// A lower-level I/O failure on the serial line.
    #[error("i/o error: {0}")]
    Io(String),

    /// Indicates an error opening or configuring the serial port.
    #[error("serial port error: {0}")]
    SerialPortError(String),

    /// The peer did not send its ready acknowledgement in time.
    #[error("acknowledgement timeout")]
    AckTimeout,

    /// The peer sent something other than the DLE/STX ready acknowledgement.
    #[error("bad acknowledgement: {0:02x} {1:02x}")]
    BadAck(u8, u8),

    /// An escape marker was followed by a byte that is neither DLE nor ETX.
    #[error("bad escaped character 0x{0:02x}")]
    BadEscape(u8),

    /// The frame grew past the buffer bound without a terminator.
    #[error("message too long ({0} bytes)")]
    FrameTooLong(usize),

    /// The frame is too short or does not start with SOH.
    #[error("invalid frame header")]
    InvalidHeader,

    /// The frame does not end with the DLE/ETX terminator.
    #[error("missing terminator")]
    MissingTerminator,

    /// Indicates a checksum mismatch in a received frame.
    #[error("reply checksum error: expected {expected:02x}, calculated {calculated:02x}")]
    ChecksumMismatch { expected: u8, calculated: u8 },

    /// The peer reported a checksum error in our request.
    #[error("request checksum error reported by peer")]
    PeerChecksumError,

    /// The peer rejected the request with a generic command error.
    #[error("request error reported by peer (status 0x{0:02x})")]
    PeerCommandError(u8),

    /// A non-blocking lock attempt found the line held elsewhere.
    #[error("serial line locked by another process")]
    LockUnavailable,

    /// Indicates an error in the monitor configuration file.
    #[error("config error: {0}")]
    Config(String),

    /// Indicates an error writing a spool marker file.
    #[error("spool error: {0}")]
    Spool(String),
}
