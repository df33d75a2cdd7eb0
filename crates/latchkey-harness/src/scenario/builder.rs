//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern: a scenario cannot run without a verification
//! function.

use std::time::Duration;

use latchkey_core::peripherals::Key;
use latchkey_core::store::{CredentialStore, MemoryNvm};
use tracing::info;

use crate::scenario::{OracleFn, World};

/// One scripted interaction.
#[derive(Debug, Clone)]
pub enum Step {
    /// Press one key.
    Press(Key),
    /// Enter a digit string one key at a time.
    Digits(String),
    /// Move the potentiometer wiper.
    SetPot(u8),
    /// Advance virtual time.
    Advance(Duration),
    /// Inject raw bytes on the Terminal-to-Controller direction.
    Raw(Vec<u8>),
}

/// Scenario builder.
///
/// Seeds the Controller's non-volatile memory, scripts interactions, and
/// attaches the mandatory oracle.
pub struct Scenario {
    name: String,
    nvm: MemoryNvm,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario against a factory-fresh device.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), nvm: MemoryNvm::new(), steps: Vec::new() }
    }

    /// Seed a stored credential and set the provisioned flag, as on a
    /// device that completed first-time setup in an earlier life.
    ///
    /// # Panics
    ///
    /// Panics if `credential` is not four ASCII digits.
    #[must_use]
    pub fn provisioned(mut self, credential: &str) -> Self {
        let mut store = CredentialStore::new(std::mem::take(&mut self.nvm));
        store.write_credential(credential.as_bytes()).expect("seed credential");
        store.mark_provisioned().expect("seed provisioned flag");
        self.nvm = store.into_inner();
        self
    }

    /// Seed a stored auto-lock timeout.
    ///
    /// # Panics
    ///
    /// Panics if `secs` is outside the legal range.
    #[must_use]
    pub fn with_stored_timeout(mut self, secs: u8) -> Self {
        let mut store = CredentialStore::new(std::mem::take(&mut self.nvm));
        store.write_timeout(secs).expect("seed timeout");
        self.nvm = store.into_inner();
        self
    }

    /// Mutate the seeded device directly (fault injection, raw words).
    #[must_use]
    pub fn with_nvm(mut self, f: impl FnOnce(&mut MemoryNvm)) -> Self {
        f(&mut self.nvm);
        self
    }

    /// Append an arbitrary step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a key press.
    #[must_use]
    pub fn press(self, key: Key) -> Self {
        self.step(Step::Press(key))
    }

    /// Append a digit-string entry.
    #[must_use]
    pub fn digits(self, digits: &str) -> Self {
        self.step(Step::Digits(digits.to_string()))
    }

    /// Append a virtual-time advance.
    #[must_use]
    pub fn advance(self, duration: Duration) -> Self {
        self.step(Step::Advance(duration))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    #[must_use]
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Boots both nodes, runs the handshake, applies every scripted step
    /// (pumping the wire to quiescence after each), then invokes the
    /// oracle against the final world state.
    ///
    /// # Errors
    ///
    /// Returns the oracle's message if verification fails.
    pub fn run(self) -> Result<(), String> {
        info!(name = %self.scenario.name, "running scenario");

        let mut world = World::new(self.scenario.nvm);
        world.start();

        for step in self.scenario.steps {
            match step {
                Step::Press(key) => world.press(key),
                Step::Digits(digits) => world.digits(&digits),
                Step::SetPot(value) => world.set_pot(value),
                Step::Advance(duration) => world.advance(duration),
                Step::Raw(bytes) => world.send_raw(&bytes),
            }
        }

        (self.oracle)(&world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("compile check").oracle(Box::new(|_world| Ok(())));
    }

    #[test]
    fn scenario_runs_handshake() {
        Scenario::new("fresh handshake")
            .oracle(Box::new(|world| {
                if world.controller_commands() == 0 {
                    return Err("controller never replied".to_string());
                }
                Ok(())
            }))
            .run()
            .expect("scenario should succeed");
    }
}
