//! Durable credential and configuration store.
//!
//! The store sits on a small word-granular non-volatile memory behind the
//! [`Nvm`] trait. Writes are slow and fallible: the device reports a busy
//! status that must be polled to completion, plus block-locked and
//! erase-error faults. Word writes are atomic - no torn writes - which is an
//! assumption inherited from the hardware, not re-derived here.
//!
//! # Layout
//!
//! Fixed word offsets, stable across firmware updates on a given device:
//!
//! | Word | Contents |
//! |---|---|
//! | 0 | credential, 4 ASCII digits in the four byte lanes (LE) |
//! | 1 | auto-lock timeout in the low byte; other lanes untouched |
//! | 2 | provisioned flag, bit 0 |
//! | 3 | reserved for an extra credential byte |
//!
//! # Invariants
//!
//! - `write_timeout` is a read-modify-write: the three untouched byte lanes
//!   of word 1 are bit-for-bit unchanged after a successful write.
//! - Validation failures (`InvalidCredential`, `InvalidTimeout`) never touch
//!   storage.
//! - Busy status is never user-visible; the store polls it away internally
//!   with a bounded budget.

use tracing::{debug, warn};

use crate::error::{NvmFault, StoreError};

/// Credential length in bytes (ASCII digits).
///
/// One NVM word holds the whole credential, so a write is atomic by the
/// hardware's word-granularity guarantee.
pub const CREDENTIAL_LEN: usize = 4;

/// Minimum legal auto-lock timeout in seconds.
pub const TIMEOUT_MIN: u8 = 5;

/// Maximum legal auto-lock timeout in seconds.
pub const TIMEOUT_MAX: u8 = 30;

/// Timeout reported for a device whose stored value is out of range
/// (fresh or erased memory).
pub const DEFAULT_TIMEOUT_SECS: u8 = 10;

const CREDENTIAL_WORD: u32 = 0;
const TIMEOUT_WORD: u32 = 1;
const PROVISIONED_WORD: u32 = 2;

/// How many status polls a single write may consume before the store gives
/// up and reports [`NvmFault::BusyTimeout`].
const WRITE_POLL_BUDGET: u32 = 10_000;

/// Status word reported by the non-volatile memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NvmStatus {
    /// A write or erase cycle is still in progress.
    pub busy: bool,
    /// The last write targeted a locked block.
    pub block_locked: bool,
    /// The last internal erase cycle failed.
    pub erase_error: bool,
}

impl NvmStatus {
    /// The fault encoded in this status, if any.
    #[must_use]
    pub fn fault(self) -> Option<NvmFault> {
        if self.block_locked {
            Some(NvmFault::BlockLocked)
        } else if self.erase_error {
            Some(NvmFault::EraseError)
        } else {
            None
        }
    }
}

/// Word-granular non-volatile memory.
///
/// Mirrors the register interface of a small on-chip EEPROM: reads are
/// immediate, writes are started and then polled to completion through the
/// status word. Implementations guarantee word-atomic commits.
pub trait Nvm {
    /// Read one word. Immediate; never fails.
    fn read_word(&self, offset: u32) -> u32;

    /// Begin writing one word. Completion and faults are observed through
    /// [`Nvm::status`].
    fn start_write(&mut self, offset: u32, value: u32);

    /// Current device status. Polling this is how a write is driven to
    /// completion.
    fn status(&self) -> NvmStatus;
}

/// Credential and configuration store over an [`Nvm`] device.
///
/// Owns every durable value in the system: the credential, the auto-lock
/// timeout, and the provisioned flag. The Controller is the only component
/// holding a store; the Terminal reaches these values exclusively through
/// the protocol.
#[derive(Debug)]
pub struct CredentialStore<N: Nvm> {
    nvm: N,
}

impl<N: Nvm> CredentialStore<N> {
    /// Wrap an NVM device.
    pub fn new(nvm: N) -> Self {
        Self { nvm }
    }

    /// Access the underlying device (word-level inspection in tests and
    /// oracles).
    pub fn nvm(&self) -> &N {
        &self.nvm
    }

    /// Unwrap the store, returning the device.
    pub fn into_inner(self) -> N {
        self.nvm
    }

    /// Read the stored credential as its four byte lanes.
    pub fn read_credential(&self) -> [u8; CREDENTIAL_LEN] {
        self.nvm.read_word(CREDENTIAL_WORD).to_le_bytes()
    }

    /// Store a new credential.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidCredential`] if the candidate is not exactly
    /// [`CREDENTIAL_LEN`] ASCII digits - storage is untouched.
    /// [`StoreError::WriteFailed`] if the device reports a fault.
    pub fn write_credential(&mut self, credential: &[u8]) -> Result<(), StoreError> {
        if credential.len() != CREDENTIAL_LEN || !credential.iter().all(u8::is_ascii_digit) {
            return Err(StoreError::InvalidCredential { len: credential.len() });
        }

        let mut lanes = [0u8; CREDENTIAL_LEN];
        lanes.copy_from_slice(credential);
        self.write_word_polled(CREDENTIAL_WORD, u32::from_le_bytes(lanes))?;

        debug!("credential updated");
        Ok(())
    }

    /// Read the auto-lock timeout in seconds.
    ///
    /// A value outside `[TIMEOUT_MIN, TIMEOUT_MAX]` - fresh or erased memory
    /// - reads as [`DEFAULT_TIMEOUT_SECS`].
    pub fn read_timeout(&self) -> u8 {
        let stored = (self.nvm.read_word(TIMEOUT_WORD) & 0xFF) as u8;
        if (TIMEOUT_MIN..=TIMEOUT_MAX).contains(&stored) { stored } else { DEFAULT_TIMEOUT_SECS }
    }

    /// Store a new auto-lock timeout.
    ///
    /// Read-modify-write: only the low byte lane of the timeout word
    /// changes; the other three lanes are preserved bit-for-bit.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidTimeout`] if `secs` is outside
    /// `[TIMEOUT_MIN, TIMEOUT_MAX]` - storage is untouched.
    /// [`StoreError::WriteFailed`] if the device reports a fault.
    pub fn write_timeout(&mut self, secs: u8) -> Result<(), StoreError> {
        if !(TIMEOUT_MIN..=TIMEOUT_MAX).contains(&secs) {
            return Err(StoreError::InvalidTimeout(secs));
        }

        let old = self.nvm.read_word(TIMEOUT_WORD);
        let new = (old & 0xFFFF_FF00) | u32::from(secs);
        self.write_word_polled(TIMEOUT_WORD, new)?;

        debug!(secs, "auto-lock timeout updated");
        Ok(())
    }

    /// True once a credential has been written at least once in the
    /// device's lifetime.
    pub fn is_provisioned(&self) -> bool {
        self.nvm.read_word(PROVISIONED_WORD) & 1 == 1
    }

    /// Latch the provisioned flag.
    ///
    /// # Errors
    ///
    /// [`StoreError::WriteFailed`] if the device reports a fault.
    pub fn mark_provisioned(&mut self) -> Result<(), StoreError> {
        let old = self.nvm.read_word(PROVISIONED_WORD);
        self.write_word_polled(PROVISIONED_WORD, old | 1)
    }

    /// Drive one word write to completion.
    ///
    /// Polls the busy status away (bounded), then checks the fault bits.
    /// Busy never escapes this function; faults do, with no retry.
    fn write_word_polled(&mut self, offset: u32, value: u32) -> Result<(), StoreError> {
        // The device may still be finishing a previous cycle.
        self.wait_ready()?;

        self.nvm.start_write(offset, value);
        self.wait_ready()?;

        if let Some(fault) = self.nvm.status().fault() {
            warn!(%fault, offset, "non-volatile write failed");
            return Err(fault.into());
        }

        Ok(())
    }

    fn wait_ready(&self) -> Result<(), StoreError> {
        for _ in 0..WRITE_POLL_BUDGET {
            if !self.nvm.status().busy {
                return Ok(());
            }
        }
        Err(NvmFault::BusyTimeout.into())
    }
}

/// In-memory NVM implementation for tests and simulation.
///
/// Faults are programmable: words can be locked, the next erase can be made
/// to fail, and writes can report busy for a configurable number of status
/// polls. Failed writes do not commit, matching the hardware's behavior.
#[derive(Debug, Default)]
pub struct MemoryNvm {
    words: [u32; 16],
    locked: [bool; 16],
    fail_next_erase: bool,
    busy_per_write: u32,
    busy_polls: std::cell::Cell<u32>,
    block_locked: bool,
    erase_error: bool,
}

impl MemoryNvm {
    /// A blank device: all words zero, no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report busy for `polls` status reads after each write.
    #[must_use]
    pub fn with_busy(mut self, polls: u32) -> Self {
        self.busy_per_write = polls;
        self
    }

    /// Lock a word: writes to it fault with block-locked and do not commit.
    pub fn lock_word(&mut self, offset: u32) {
        self.locked[offset as usize] = true;
    }

    /// Make the next write fault with erase-error and not commit.
    pub fn fail_next_erase(&mut self) {
        self.fail_next_erase = true;
    }

    /// Inspect a raw word (test setup and oracle checks).
    #[must_use]
    pub fn word(&self, offset: u32) -> u32 {
        self.words[offset as usize]
    }

    /// Set a raw word directly, bypassing the write path (test setup).
    pub fn set_word(&mut self, offset: u32, value: u32) {
        self.words[offset as usize] = value;
    }
}

impl Nvm for MemoryNvm {
    fn read_word(&self, offset: u32) -> u32 {
        self.words[offset as usize]
    }

    fn start_write(&mut self, offset: u32, value: u32) {
        self.block_locked = false;
        self.erase_error = false;
        self.busy_polls.set(self.busy_per_write);

        if self.locked[offset as usize] {
            self.block_locked = true;
            return;
        }

        if self.fail_next_erase {
            self.fail_next_erase = false;
            self.erase_error = true;
            return;
        }

        self.words[offset as usize] = value;
    }

    fn status(&self) -> NvmStatus {
        let remaining = self.busy_polls.get();
        if remaining > 0 {
            self.busy_polls.set(remaining - 1);
            return NvmStatus { busy: true, block_locked: false, erase_error: false };
        }

        NvmStatus { busy: false, block_locked: self.block_locked, erase_error: self.erase_error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_round_trip() {
        let mut store = CredentialStore::new(MemoryNvm::new());

        store.write_credential(b"1234").expect("write failed");
        assert_eq!(store.read_credential(), *b"1234");
    }

    #[test]
    fn invalid_credential_leaves_storage_untouched() {
        let mut store = CredentialStore::new(MemoryNvm::new());
        store.write_credential(b"4321").expect("write failed");

        assert_eq!(
            store.write_credential(b"123"),
            Err(StoreError::InvalidCredential { len: 3 })
        );
        assert_eq!(
            store.write_credential(b"12345"),
            Err(StoreError::InvalidCredential { len: 5 })
        );
        assert_eq!(
            store.write_credential(b"12a4"),
            Err(StoreError::InvalidCredential { len: 4 })
        );

        assert_eq!(store.read_credential(), *b"4321");
    }

    #[test]
    fn write_timeout_validates_range() {
        let mut store = CredentialStore::new(MemoryNvm::new());

        assert_eq!(store.write_timeout(4), Err(StoreError::InvalidTimeout(4)));
        assert_eq!(store.write_timeout(31), Err(StoreError::InvalidTimeout(31)));

        store.write_timeout(5).expect("lower bound is legal");
        assert_eq!(store.read_timeout(), 5);

        store.write_timeout(30).expect("upper bound is legal");
        assert_eq!(store.read_timeout(), 30);
    }

    #[test]
    fn write_timeout_preserves_other_lanes() {
        let mut nvm = MemoryNvm::new();
        nvm.set_word(1, 0xAABB_CC00);
        let mut store = CredentialStore::new(nvm);

        store.write_timeout(20).expect("write failed");

        assert_eq!(store.nvm().word(1), 0xAABB_CC14);
        assert_eq!(store.read_timeout(), 20);
    }

    #[test]
    fn rejected_timeout_leaves_word_untouched() {
        let mut nvm = MemoryNvm::new();
        nvm.set_word(1, 0xAABB_CC0A);
        let mut store = CredentialStore::new(nvm);

        assert_eq!(store.write_timeout(3), Err(StoreError::InvalidTimeout(3)));
        assert_eq!(store.nvm().word(1), 0xAABB_CC0A);
    }

    #[test]
    fn out_of_range_stored_timeout_reads_as_default() {
        let store = CredentialStore::new(MemoryNvm::new());
        assert_eq!(store.read_timeout(), DEFAULT_TIMEOUT_SECS);

        let mut nvm = MemoryNvm::new();
        nvm.set_word(1, 0xFF);
        let store = CredentialStore::new(nvm);
        assert_eq!(store.read_timeout(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn provisioned_flag_lifecycle() {
        let mut store = CredentialStore::new(MemoryNvm::new());
        assert!(!store.is_provisioned());

        store.mark_provisioned().expect("mark failed");
        assert!(store.is_provisioned());

        // Idempotent.
        store.mark_provisioned().expect("mark failed");
        assert!(store.is_provisioned());
    }

    #[test]
    fn busy_device_is_polled_to_completion() {
        let nvm = MemoryNvm::new().with_busy(50);
        let mut store = CredentialStore::new(nvm);

        store.write_credential(b"0000").expect("busy should be polled away");
        assert_eq!(store.read_credential(), *b"0000");
    }

    #[test]
    fn locked_block_surfaces_write_failure() {
        let mut nvm = MemoryNvm::new();
        nvm.set_word(0, u32::from_le_bytes(*b"9999"));
        nvm.lock_word(0);
        let mut store = CredentialStore::new(nvm);

        assert_eq!(
            store.write_credential(b"1234"),
            Err(StoreError::WriteFailed(NvmFault::BlockLocked))
        );
        // The old credential survives the failed write.
        assert_eq!(store.read_credential(), *b"9999");
    }

    #[test]
    fn erase_error_surfaces_write_failure() {
        let mut nvm = MemoryNvm::new();
        nvm.fail_next_erase();
        let mut store = CredentialStore::new(nvm);

        assert_eq!(
            store.write_timeout(10),
            Err(StoreError::WriteFailed(NvmFault::EraseError))
        );

        // The fault was consumed; the next write goes through.
        store.write_timeout(10).expect("second write should succeed");
        assert_eq!(store.read_timeout(), 10);
    }
}
