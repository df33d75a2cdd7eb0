//! Error types for the Latchkey wire format.
//!
//! All errors are structured, testable, and provide actionable information.

use thiserror::Error;

/// Protocol-level errors that can occur during message framing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload reached the decode bound without a terminator.
    ///
    /// The decoder rejects the message rather than writing past the bound;
    /// the remainder of the stream up to the next terminator is garbage and
    /// must be drained by the caller.
    #[error("framing overrun: payload exceeded {limit} bytes without a terminator")]
    FramingOverrun {
        /// The bound that was reached.
        limit: usize,
    },

    /// Payload to encode contains a terminator byte.
    ///
    /// The wire format has no escaping, so such a payload cannot be framed.
    #[error("payload contains terminator byte at position {position}")]
    TerminatorInPayload {
        /// Offset of the offending byte within the payload.
        position: usize,
    },

    /// Payload to encode exceeds the maximum message size.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Octet does not correspond to a known command.
    ///
    /// The dispatcher answers these with [`Command::Unknown`](crate::Command::Unknown)
    /// rather than dropping them.
    #[error("unknown command octet: {0:#04x}")]
    UnknownCommand(u8),
}

/// Convenient Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
