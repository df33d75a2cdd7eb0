//! # Latchkey Protocol: Wire Format
//!
//! This crate implements the byte-oriented framing layer for the Latchkey
//! access-control link between the Terminal and Controller nodes.
//!
//! ## Protocol Design
//!
//! The link is a half-duplex, unbuffered serial channel. The wire format is
//! deliberately minimal:
//!
//! - **Command**: a single octet drawn from a closed set ([`Command`])
//! - **Message**: raw payload bytes terminated by an end-of-message marker
//!   (`\n`, with `\r` accepted as a secondary terminator on receive)
//!
//! There is no length prefix, no checksum, and no escaping; a payload must
//! not contain either terminator byte. The Terminal always initiates and the
//! Controller always responds, so framing never has to disambiguate
//! direction.
//!
//! ## Security Properties
//!
//! - **Bounded Decode**: [`MessageDecoder`] enforces a fixed payload bound
//!   ([`MAX_PAYLOAD`]) and fails closed with
//!   [`ProtocolError::FramingOverrun`] instead of accumulating past it.
//!
//! - **Total Classification**: [`Command::from_u8`] is defined for all octet
//!   values and returns `Option`. Unclassifiable octets must be answered
//!   with [`Command::Unknown`] by the dispatcher, never silently dropped.
//!
//! - **No Resync**: no error recovery is attempted below this layer. A
//!   corrupted stream surfaces as `FramingOverrun` or an unrecognized
//!   command octet and is handled by the peers' state machines.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod errors;
pub mod framing;

pub use commands::Command;
pub use errors::{ProtocolError, Result};
pub use framing::{ALT_TERMINATOR, END_MARKER, MAX_PAYLOAD, MessageDecoder, encode_message};
