//! Scenario testing framework for deterministic simulation tests.
//!
//! This module provides a declarative API for writing scenario-based tests
//! that follow the Oracle Pattern. A scenario seeds the Controller's
//! non-volatile memory, scripts the user's interactions (keys, pot
//! movements, waiting), runs both nodes to quiescence after every step, and
//! enforces oracle verification at the end.

mod builder;
mod world;

pub mod oracle;

pub use builder::{RunnableScenario, Scenario, Step};
pub use oracle::OracleFn;
pub use world::World;
