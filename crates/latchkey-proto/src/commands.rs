//! Command octets for the Latchkey link.
//!
//! Each command is a single octet on the wire. The set is closed and
//! versioned: the `0x10`-based values below are fixed and must not be
//! reassigned, since the two nodes may be flashed independently and have to
//! stay wire-compatible across firmware revisions.
//!
//! # Direction
//!
//! The Terminal initiates every exchange; the Controller only replies. Some
//! commands are requests (`SendPassword`, `DoorUnlock`, ...), some are
//! replies (`PasswordCorrect`, `Success`, ...), and `Ready`/`Ack` flow in
//! both directions as synchronization barriers.

/// Command octet.
///
/// # Representation
///
/// Commands are serialized as a single `u8`. The `#[repr(u8)]` ensures
/// stable numeric values for wire compatibility.
///
/// # Security
///
/// - **Unknown Octets**: [`Command::from_u8`] returns `None` for unknown
///   values rather than panicking. The dispatcher must answer such octets
///   with [`Command::Unknown`], never silently drop them.
///
/// - **No Implicit Behavior**: each command is explicitly handled by the
///   dispatch loop. There is no "default" behavior for unrecognized octets
///   beyond the `Unknown` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Handshake: peer is alive and listening.
    Ready = 0x10,
    /// Request: a candidate credential follows as a message.
    SendPassword = 0x11,
    /// Reply: candidate matched the stored credential.
    PasswordCorrect = 0x12,
    /// Reply: candidate did not match.
    PasswordWrong = 0x13,
    /// Request: a new credential follows as a message.
    ChangePassword = 0x14,
    /// Request: unlock the door for the configured timeout.
    DoorUnlock = 0x15,
    /// Request: relock the door immediately.
    DoorLock = 0x16,
    /// Request: a one-byte auto-lock timeout follows as a message.
    SetTimeout = 0x17,
    /// Synchronization barrier / generic positive acknowledgment.
    Ack = 0x18,
    /// Notice: the Terminal has entered lockout.
    Alarm = 0x19,
    /// Reply: the octet received could not be classified.
    Unknown = 0x1A,
    /// Reply: operation completed.
    Success = 0x1B,
    /// Reply: operation rejected or storage failed.
    Fail = 0x1C,
}

impl Command {
    /// Convert to the raw wire octet.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from a raw wire octet.
    ///
    /// Returns `None` if the value doesn't correspond to a known command.
    ///
    /// # Security
    ///
    /// This function is **total** (defined for all u8 values) and
    /// **infallible**. It returns `Option<Self>` to distinguish between
    /// known and unknown octets, allowing the dispatcher to answer invalid
    /// octets with an explicit [`Command::Unknown`] reply.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::Ready),
            0x11 => Some(Self::SendPassword),
            0x12 => Some(Self::PasswordCorrect),
            0x13 => Some(Self::PasswordWrong),
            0x14 => Some(Self::ChangePassword),
            0x15 => Some(Self::DoorUnlock),
            0x16 => Some(Self::DoorLock),
            0x17 => Some(Self::SetTimeout),
            0x18 => Some(Self::Ack),
            0x19 => Some(Self::Alarm),
            0x1A => Some(Self::Unknown),
            0x1B => Some(Self::Success),
            0x1C => Some(Self::Fail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trip() {
        let commands = [
            Command::Ready,
            Command::SendPassword,
            Command::PasswordCorrect,
            Command::PasswordWrong,
            Command::ChangePassword,
            Command::DoorUnlock,
            Command::DoorLock,
            Command::SetTimeout,
            Command::Ack,
            Command::Alarm,
            Command::Unknown,
            Command::Success,
            Command::Fail,
        ];

        for command in commands {
            let value = command.to_u8();
            let parsed = Command::from_u8(value);
            assert_eq!(Some(command), parsed);
        }
    }

    #[test]
    fn invalid_octet() {
        assert_eq!(Command::from_u8(0x00), None);
        assert_eq!(Command::from_u8(0x0F), None);
        assert_eq!(Command::from_u8(0x1D), None);
        assert_eq!(Command::from_u8(0xFF), None);
    }

    #[test]
    fn octets_are_contiguous() {
        // Every value in the assigned range classifies; the set is closed.
        for value in 0x10..=0x1C {
            assert!(Command::from_u8(value).is_some(), "octet {value:#04x} should classify");
        }
    }
}
