//! Oracle functions for scenario verification.
//!
//! Oracle functions run at the end of scenarios to verify global
//! consistency. They receive a snapshot of the entire world state and
//! assert invariants.

use latchkey_core::terminal::TerminalPhase;

use crate::scenario::World;

/// Oracle function type.
///
/// Receives immutable reference to world state and returns:
/// - `Ok(())` if all invariants hold
/// - `Err(message)` if verification fails
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Oracle: the Terminal ended the scenario at the main menu.
pub fn at_main_menu() -> OracleFn {
    Box::new(|world| {
        let phase = world.terminal().phase();
        if phase == TerminalPhase::MainMenu {
            Ok(())
        } else {
            Err(format!("terminal should be at MainMenu, got {phase:?}"))
        }
    })
}

/// Oracle: the Controller's store carries the provisioned flag.
pub fn provisioned() -> OracleFn {
    Box::new(|world| {
        if world.controller().store().is_provisioned() {
            Ok(())
        } else {
            Err("controller should be provisioned".to_string())
        }
    })
}

/// Oracle: the stored credential equals `expected`.
pub fn stored_credential(expected: &str) -> OracleFn {
    let expected = expected.to_string();
    Box::new(move |world| {
        let stored = world.controller().store().read_credential();
        if stored == expected.as_bytes() {
            Ok(())
        } else {
            Err(format!("stored credential should be {expected:?}, got {stored:?}"))
        }
    })
}

/// Oracle: exactly `expected` alarm sequences ran on the Controller.
pub fn alarm_count(expected: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world.alarm_count();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected {expected} alarms, got {actual}"))
        }
    })
}

/// Oracle: the door actuator received exactly these open durations.
pub fn door_opens(expected: Vec<u8>) -> OracleFn {
    Box::new(move |world| {
        let actual = world.door().opens();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected door opens {expected:?}, got {actual:?}"))
        }
    })
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
