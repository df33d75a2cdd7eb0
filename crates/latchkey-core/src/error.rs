//! Error types for the Latchkey protocol core.
//!
//! This module provides strongly-typed errors for different layers:
//! - Store errors (validation, non-volatile write faults)
//! - Wire errors (link failures)
//!
//! We avoid using `std::io::Error` for protocol logic to maintain type safety
//! and enable proper error handling and recovery.

use std::fmt;

/// Hardware fault reported by the non-volatile memory after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmFault {
    /// Write attempted against a locked block.
    BlockLocked,
    /// The internal erase cycle failed.
    EraseError,
    /// The device stayed busy past the poll budget.
    BusyTimeout,
}

impl fmt::Display for NvmFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockLocked => write!(f, "block locked"),
            Self::EraseError => write!(f, "erase error"),
            Self::BusyTimeout => write!(f, "busy past poll budget"),
        }
    }
}

/// Errors that can occur during credential/config store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Candidate credential has the wrong length or a non-digit byte.
    ///
    /// Storage is untouched when this is returned.
    InvalidCredential {
        /// Length of the rejected credential.
        len: usize,
    },

    /// Auto-lock timeout outside the legal range.
    ///
    /// Storage is untouched when this is returned.
    InvalidTimeout(u8),

    /// The non-volatile write itself failed.
    ///
    /// There is no automatic retry; the failure is surfaced to the peer as a
    /// protocol-level `Fail` reply.
    WriteFailed(NvmFault),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredential { len } => {
                write!(f, "invalid credential: {} bytes", len)
            },
            Self::InvalidTimeout(secs) => {
                write!(f, "timeout out of range: {} seconds", secs)
            },
            Self::WriteFailed(fault) => write!(f, "storage write failed: {}", fault),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<NvmFault> for StoreError {
    fn from(fault: NvmFault) -> Self {
        Self::WriteFailed(fault)
    }
}

/// Errors reported by the byte-oriented serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The peer end of the link is gone.
    ///
    /// This is the only condition that terminates a driver loop; everything
    /// else is handled inside the state machines.
    Disconnected,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "wire disconnected"),
        }
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_display() {
        assert_eq!(
            StoreError::InvalidCredential { len: 3 }.to_string(),
            "invalid credential: 3 bytes"
        );
        assert_eq!(StoreError::InvalidTimeout(3).to_string(), "timeout out of range: 3 seconds");
        assert_eq!(
            StoreError::from(NvmFault::BlockLocked).to_string(),
            "storage write failed: block locked"
        );
    }

    #[test]
    fn nvm_fault_converts_to_store_error() {
        assert_eq!(StoreError::from(NvmFault::EraseError), StoreError::WriteFailed(NvmFault::EraseError));
        assert_eq!(
            StoreError::from(NvmFault::BusyTimeout),
            StoreError::WriteFailed(NvmFault::BusyTimeout)
        );
    }
}
