//! Message framing: terminator-delimited payloads with a hard bound.
//!
//! A message is `payload bytes + END_MARKER`. On receive, `\r` is accepted
//! as a secondary terminator so a Terminal wired to a line-buffered test rig
//! still frames correctly. The payload itself must contain neither byte.
//!
//! # Invariants
//!
//! - **Bounded Decode**: [`MessageDecoder::push`] never accumulates more
//!   than [`MAX_PAYLOAD`] bytes. Reaching the bound without a terminator is
//!   a [`ProtocolError::FramingOverrun`] and resets the decoder; a receiver
//!   with no bound here would write past its buffer on a corrupted stream.
//!
//! - **Round Trip**: for any payload within bound and free of terminator
//!   bytes, encode-then-decode reconstructs the payload exactly.

use bytes::BufMut;

use crate::errors::{ProtocolError, Result};

/// End-of-message marker appended to every encoded payload.
pub const END_MARKER: u8 = b'\n';

/// Secondary terminator accepted on receive only.
pub const ALT_TERMINATOR: u8 = b'\r';

/// Maximum payload length in bytes.
///
/// Large enough for a credential (4 digits) or a one-byte config value with
/// generous margin; small enough that a corrupted stream cannot make the
/// receiver buffer unboundedly.
pub const MAX_PAYLOAD: usize = 16;

/// Encode a message into `dst`: payload bytes followed by [`END_MARKER`].
///
/// # Errors
///
/// - [`ProtocolError::PayloadTooLarge`] if the payload exceeds
///   [`MAX_PAYLOAD`].
/// - [`ProtocolError::TerminatorInPayload`] if the payload contains
///   [`END_MARKER`] or [`ALT_TERMINATOR`] - the format has no escaping, so
///   such a payload would be truncated by the receiver.
pub fn encode_message(payload: &[u8], dst: &mut impl BufMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD });
    }

    if let Some(position) = payload.iter().position(|&b| b == END_MARKER || b == ALT_TERMINATOR) {
        return Err(ProtocolError::TerminatorInPayload { position });
    }

    dst.put_slice(payload);
    dst.put_u8(END_MARKER);

    Ok(())
}

/// Bounded push-parser for terminator-delimited messages.
///
/// Feed one byte at a time with [`MessageDecoder::push`]; the decoder yields
/// the completed payload when a terminator arrives. State is internal, so a
/// decoder instance can be reused across messages.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buf: Vec<u8>,
}

impl MessageDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one byte from the stream.
    ///
    /// Returns `Ok(Some(payload))` when a terminator completes the message,
    /// `Ok(None)` while accumulating.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FramingOverrun`] if [`MAX_PAYLOAD`] bytes
    /// have accumulated and the next byte is not a terminator. The decoder
    /// resets; the caller must drain the stream to the next terminator
    /// before resuming, since the remaining bytes belong to the oversized
    /// message.
    pub fn push(&mut self, byte: u8) -> Result<Option<Vec<u8>>> {
        if byte == END_MARKER || byte == ALT_TERMINATOR {
            return Ok(Some(std::mem::take(&mut self.buf)));
        }

        if self.buf.len() == MAX_PAYLOAD {
            self.buf.clear();
            return Err(ProtocolError::FramingOverrun { limit: MAX_PAYLOAD });
        }

        self.buf.push(byte);
        Ok(None)
    }

    /// Discard any partially accumulated payload.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of payload bytes accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if no payload bytes have accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
