//! # Latchkey Core: Protocol Logic
//!
//! This crate implements the coordination core of the Latchkey two-node
//! access-control device: the Controller's authoritative dispatch loop, the
//! Terminal's interaction state machine, the consecutive-failure lockout
//! policy, and the persisted credential/config store.
//!
//! # Design Philosophy: Pure State Machines
//!
//! Protocol logic in this crate is pure. The state machines:
//!
//! - MUST NOT call `std::time::Instant::now()` or sleep
//! - MUST NOT touch a peripheral or the wire directly
//! - MUST accept time as a parameter and return actions for a driver
//!
//! The [`driver`] module holds the only code that reads the clock and
//! executes actions against the [`peripherals`] traits. The simulation
//! harness drives the same machines against fakes, byte-for-byte identical
//! to production behavior.
//!
//! # Liveness
//!
//! Neither state machine can be halted by input: framing overruns, storage
//! faults, unknown octets, and stalled peers all surface as protocol
//! replies or bounded-wait resets. Workspace lints deny `unwrap`/`expect`/
//! `panic` in this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod driver;
pub mod error;
pub mod lockout;
pub mod peripherals;
pub mod store;
pub mod terminal;

pub use controller::{Controller, ControllerAction, ControllerConfig, ControllerState};
pub use error::{NvmFault, StoreError, WireError};
pub use lockout::{LockoutAction, LockoutPolicy, MAX_ATTEMPTS};
pub use peripherals::{
    AlarmActuator, AnalogInput, Display, DoorActuator, Indicator, InputDevice, Key, Led, WireLink,
};
pub use store::{
    CREDENTIAL_LEN, CredentialStore, DEFAULT_TIMEOUT_SECS, MemoryNvm, Nvm, NvmStatus, TIMEOUT_MAX,
    TIMEOUT_MIN,
};
pub use terminal::{Terminal, TerminalAction, TerminalConfig, TerminalPhase};
