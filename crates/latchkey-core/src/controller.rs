//! Controller dispatcher state machine.
//!
//! The Controller is the authoritative peer: it owns the credential store
//! and the lockout policy, and it answers every inbound command. It never
//! initiates an exchange.
//!
//! # Architecture: Action-Based State Machine
//!
//! The dispatcher follows the action pattern:
//! - Methods accept bytes and time as parameters (no stored clock, no I/O)
//! - Methods return `Vec<ControllerAction>` for a driver to execute
//!
//! There are no unbounded blocking receives: every wait is a state, and the
//! only wait that could stall the loop (the post-verification Ack barrier)
//! has a deadline checked in [`Controller::tick`].
//!
//! # State Machine
//!
//! ```text
//! ┌────────────────┐ Ready ┌───────┐ cmd with payload ┌────────────────┐
//! │ AwaitHandshake │──────>│ Serve │─────────────────>│ ReceivePayload │
//! └────────────────┘       └───────┘<─────────────────└────────────────┘
//!                            │  ^ ^          │ overrun        │
//!                 SendPasswor│  │ └──────┐   v                │ candidate
//!                    outcome │  │Ack/  ┌───────┐              │ handled
//!                            v  │timeout Drain │              │
//!                          ┌──────────┐└───────┘              │
//!                          │ AwaitAck │<──────────────────────┘
//!                          └──────────┘
//! ```
//!
//! # Liveness
//!
//! The dispatch loop is unconditionally live: no input byte, store fault, or
//! framing error can make it panic, halt, or stop answering. Failures
//! surface to the peer as `Fail`/`Unknown` replies, never as a local error.

use std::time::{Duration, Instant};

use latchkey_proto::{Command, MessageDecoder};
use tracing::{debug, info, warn};

use crate::lockout::{LockoutAction, LockoutPolicy};
use crate::store::{CredentialStore, Nvm};

/// Actions returned by the dispatcher for the driver to execute.
///
/// Ordering matters: the driver executes actions in sequence, and an
/// [`ControllerAction::StartAlarm`] must run the alarm actuator to
/// completion before any further wire traffic is pumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// Write this command octet to the wire.
    Send(Command),

    /// Hand the door actuator the configured open duration; the actuator
    /// relocks on its own timer.
    StartDoor {
        /// Seconds the door stays unlocked.
        open_secs: u8,
    },

    /// Relock the door immediately.
    LockDoor,

    /// Run the alarm sequence to completion (blocking backpressure point).
    StartAlarm,
}

/// Coarse dispatcher state, exposed for tests and oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the peer's `Ready`.
    AwaitHandshake,
    /// Waiting for the next command octet.
    Serve,
    /// Accumulating a message payload.
    ReceivePayload,
    /// Discarding an oversized message up to its terminator.
    Drain,
    /// Waiting for the peer's `Ack` after a verification reply.
    AwaitAck,
}

/// What the pending payload will be interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    /// Candidate credential to verify.
    Candidate,
    /// Replacement credential to store.
    NewCredential,
    /// One-byte auto-lock timeout.
    Timeout,
}

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitHandshake,
    Serve,
    ReceivePayload { kind: PayloadKind },
    Drain,
    AwaitAck { deadline: Instant },
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long to hold the post-verification Ack barrier before giving up
    /// and serving the next command.
    pub ack_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { ack_timeout: Duration::from_millis(100) }
    }
}

/// The Controller dispatcher.
///
/// One instance per device; created once and run forever by the driver
/// loop. Exclusively owns the credential store and the attempt counter;
/// the Terminal reaches both only through the protocol.
#[derive(Debug)]
pub struct Controller<N: Nvm> {
    state: State,
    store: CredentialStore<N>,
    lockout: LockoutPolicy,
    decoder: MessageDecoder,
    config: ControllerConfig,
}

impl<N: Nvm> Controller<N> {
    /// Create a dispatcher in the handshake state.
    pub fn new(store: CredentialStore<N>, config: ControllerConfig) -> Self {
        Self {
            state: State::AwaitHandshake,
            store,
            lockout: LockoutPolicy::new(),
            decoder: MessageDecoder::new(),
            config,
        }
    }

    /// Coarse current state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        match self.state {
            State::AwaitHandshake => ControllerState::AwaitHandshake,
            State::Serve => ControllerState::Serve,
            State::ReceivePayload { .. } => ControllerState::ReceivePayload,
            State::Drain => ControllerState::Drain,
            State::AwaitAck { .. } => ControllerState::AwaitAck,
        }
    }

    /// The credential store (inspection in tests and oracles).
    pub fn store(&self) -> &CredentialStore<N> {
        &self.store
    }

    /// Announce readiness on the wire.
    ///
    /// Call once at startup, before pumping bytes. The peer's `Ready` is
    /// answered in [`Controller::on_byte`].
    pub fn start(&mut self) -> Vec<ControllerAction> {
        debug!("announcing ready");
        vec![ControllerAction::Send(Command::Ready)]
    }

    /// Consume one byte from the wire.
    pub fn on_byte(&mut self, byte: u8, now: Instant) -> Vec<ControllerAction> {
        match self.state {
            State::AwaitHandshake => self.handle_handshake_byte(byte),
            State::Serve => self.dispatch_command(byte, now),
            State::ReceivePayload { kind } => self.accumulate_payload(kind, byte, now),
            State::Drain => self.drain_byte(byte),
            State::AwaitAck { deadline } => self.await_ack_byte(byte, deadline, now),
        }
    }

    /// Observe the clock.
    ///
    /// The only timed wait is the post-verification Ack barrier; past its
    /// deadline the dispatcher abandons the wait and serves the next
    /// command. Everything else is event-driven.
    pub fn tick(&mut self, now: Instant) -> Vec<ControllerAction> {
        if let State::AwaitAck { deadline } = self.state
            && now >= deadline
        {
            warn!("ack barrier timed out; resuming dispatch");
            self.state = State::Serve;
        }
        Vec::new()
    }

    fn handle_handshake_byte(&mut self, byte: u8) -> Vec<ControllerAction> {
        if Command::from_u8(byte) != Some(Command::Ready) {
            // Noise while the peer boots; keep waiting.
            debug!(byte, "ignoring pre-handshake octet");
            return Vec::new();
        }

        let provisioned = self.store.is_provisioned();
        info!(provisioned, "handshake complete");
        self.state = State::Serve;

        // Ready confirms the link; the status octet routes the Terminal
        // into first-time setup (Fail) or normal operation (Success).
        let status = if provisioned { Command::Success } else { Command::Fail };
        vec![ControllerAction::Send(Command::Ready), ControllerAction::Send(status)]
    }

    fn dispatch_command(&mut self, byte: u8, _now: Instant) -> Vec<ControllerAction> {
        let Some(command) = Command::from_u8(byte) else {
            debug!(byte, "unclassifiable octet");
            return vec![ControllerAction::Send(Command::Unknown)];
        };

        match command {
            Command::SendPassword => {
                self.decoder.reset();
                self.state = State::ReceivePayload { kind: PayloadKind::Candidate };
                Vec::new()
            },
            Command::ChangePassword => {
                self.decoder.reset();
                self.state = State::ReceivePayload { kind: PayloadKind::NewCredential };
                Vec::new()
            },
            Command::SetTimeout => {
                self.decoder.reset();
                self.state = State::ReceivePayload { kind: PayloadKind::Timeout };
                Vec::new()
            },
            Command::DoorUnlock => {
                // Read fresh: a SetTimeout since the last unlock must take
                // effect without a restart.
                let open_secs = self.store.read_timeout();
                info!(open_secs, "door unlock");
                vec![
                    ControllerAction::Send(Command::Ack),
                    ControllerAction::StartDoor { open_secs },
                ]
            },
            Command::DoorLock => {
                info!("door relock requested");
                vec![ControllerAction::Send(Command::Ack), ControllerAction::LockDoor]
            },
            Command::Alarm => {
                // The lockout policy already ran the buzzer on the third
                // wrong attempt; the Terminal's notice mirrors that event
                // and only needs acknowledging.
                warn!("terminal reported lockout");
                vec![ControllerAction::Send(Command::Ack)]
            },
            // A reply or barrier octet is out of place here; answer Unknown
            // and keep serving rather than stalling the loop.
            Command::Ready
            | Command::PasswordCorrect
            | Command::PasswordWrong
            | Command::Ack
            | Command::Unknown
            | Command::Success
            | Command::Fail => {
                debug!(?command, "unexpected command while serving");
                vec![ControllerAction::Send(Command::Unknown)]
            },
        }
    }

    fn accumulate_payload(
        &mut self,
        kind: PayloadKind,
        byte: u8,
        now: Instant,
    ) -> Vec<ControllerAction> {
        match self.decoder.push(byte) {
            Ok(None) => Vec::new(),
            Ok(Some(payload)) => self.finish_payload(kind, &payload, now),
            Err(err) => {
                // Fail closed: the rest of the oversized message is garbage.
                // Discard it up to its terminator, then answer Fail.
                warn!(%err, "message overrun; draining");
                self.state = State::Drain;
                Vec::new()
            },
        }
    }

    fn drain_byte(&mut self, byte: u8) -> Vec<ControllerAction> {
        if let Ok(Some(_)) = self.decoder.push(byte) {
            self.state = State::Serve;
            return vec![ControllerAction::Send(Command::Fail)];
        }
        // Still inside the oversized message; repeated overruns while
        // draining are expected and ignored.
        self.decoder.reset();
        Vec::new()
    }

    fn await_ack_byte(
        &mut self,
        byte: u8,
        deadline: Instant,
        now: Instant,
    ) -> Vec<ControllerAction> {
        if Command::from_u8(byte) == Some(Command::Ack) {
            self.state = State::Serve;
            return Vec::new();
        }

        if now >= deadline {
            warn!("ack barrier timed out; resuming dispatch");
            self.state = State::Serve;
            // Re-dispatch the byte that broke the barrier.
            return self.dispatch_command(byte, now);
        }

        // Anything else before the deadline is discarded; the barrier
        // exists so the Terminal finishes its local feedback first.
        debug!(byte, "discarding non-ack during barrier");
        Vec::new()
    }

    fn finish_payload(
        &mut self,
        kind: PayloadKind,
        payload: &[u8],
        now: Instant,
    ) -> Vec<ControllerAction> {
        match kind {
            PayloadKind::Candidate => self.verify_candidate(payload, now),
            PayloadKind::NewCredential => {
                self.state = State::Serve;
                self.store_credential(payload)
            },
            PayloadKind::Timeout => {
                self.state = State::Serve;
                self.store_timeout(payload)
            },
        }
    }

    fn verify_candidate(&mut self, candidate: &[u8], now: Instant) -> Vec<ControllerAction> {
        let correct = candidate == self.store.read_credential().as_slice();
        info!(correct, "credential verification");

        let reply =
            if correct { Command::PasswordCorrect } else { Command::PasswordWrong };
        let mut actions = vec![ControllerAction::Send(reply)];

        if self.lockout.on_result(correct) == LockoutAction::TriggerAlarm {
            actions.push(ControllerAction::StartAlarm);
        }

        // Barrier: the Terminal acknowledges the verdict before the next
        // command, so it cannot race ahead of Controller-side feedback.
        self.state = State::AwaitAck { deadline: now + self.config.ack_timeout };
        actions
    }

    fn store_credential(&mut self, credential: &[u8]) -> Vec<ControllerAction> {
        let result = self
            .store
            .write_credential(credential)
            .and_then(|()| self.store.mark_provisioned());

        match result {
            Ok(()) => {
                info!("credential change stored");
                vec![ControllerAction::Send(Command::Ack)]
            },
            Err(err) => {
                warn!(%err, "credential change rejected");
                vec![ControllerAction::Send(Command::Fail)]
            },
        }
    }

    fn store_timeout(&mut self, payload: &[u8]) -> Vec<ControllerAction> {
        // ASCII decimal on the wire: the legal range contains the raw
        // terminator octets (10, 13), so the value cannot travel as one
        // binary byte.
        let parsed =
            std::str::from_utf8(payload).ok().and_then(|s| s.parse::<u8>().ok());
        let Some(secs) = parsed else {
            warn!(len = payload.len(), "malformed timeout payload");
            return vec![ControllerAction::Send(Command::Fail)];
        };

        match self.store.write_timeout(secs) {
            Ok(()) => vec![ControllerAction::Send(Command::Success)],
            Err(err) => {
                warn!(%err, "timeout rejected");
                vec![ControllerAction::Send(Command::Fail)]
            },
        }
    }
}
