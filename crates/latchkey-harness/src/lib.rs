//! Deterministic simulation harness for Latchkey protocol testing.
//!
//! In-memory implementations of the wire and peripheral traits, plus a
//! scenario framework that runs a complete Terminal/Controller pair through
//! scripted interactions and enforces oracle verification.
//!
//! Both nodes run the exact state machines shipped in `latchkey-core`; only
//! the edges (wire, keypad, display, actuators, clock) are simulated, so a
//! scenario failure reproduces byte-for-byte.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fakes;
pub mod scenario;
pub mod wire;

pub use scenario::{RunnableScenario, Scenario, Step, World, oracle};
pub use wire::SimWire;
