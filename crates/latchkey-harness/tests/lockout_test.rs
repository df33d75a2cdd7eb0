//! Lockout coordination between the two nodes.
//!
//! The Controller's policy runs the alarm on the third consecutive wrong
//! candidate; the Terminal's mirror counter independently enters the
//! lockout countdown and notifies the Controller.

use std::time::Duration;

use latchkey_core::peripherals::Key;
use latchkey_core::terminal::TerminalPhase;
use latchkey_harness::scenario::{Scenario, oracle};

fn wrong_attempt(scenario: Scenario) -> Scenario {
    scenario.press(Key::OpenDoor).digits("0000")
}

#[test]
fn three_wrong_attempts_alarm_exactly_once_and_lock_out() {
    let mut scenario = Scenario::new("three wrong attempts").provisioned("1234");
    for _ in 0..3 {
        scenario = wrong_attempt(scenario);
    }

    let result = scenario
        .oracle(oracle::all_of(vec![
            oracle::alarm_count(1),
            Box::new(|world| {
                if world.terminal().phase() != TerminalPhase::Lockout {
                    return Err(format!(
                        "terminal should be locked out, got {:?}",
                        world.terminal().phase()
                    ));
                }
                if !world.door().opens().is_empty() {
                    return Err("door must not move during failed attempts".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn intervening_correct_attempt_resets_both_counters() {
    let mut scenario = Scenario::new("reset between streaks").provisioned("1234");
    scenario = wrong_attempt(scenario);
    scenario = wrong_attempt(scenario);
    scenario = scenario.press(Key::OpenDoor).digits("1234");
    scenario = wrong_attempt(scenario);
    scenario = wrong_attempt(scenario);

    let result = scenario
        .oracle(oracle::all_of(vec![
            oracle::alarm_count(0),
            oracle::at_main_menu(),
            Box::new(|world| {
                // Only the correct attempt moved the door.
                if world.door().opens().len() != 1 {
                    return Err(format!(
                        "expected 1 door open, got {:?}",
                        world.door().opens()
                    ));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn lockout_counts_down_and_ignores_input() {
    let mut scenario = Scenario::new("lockout countdown").provisioned("1234");
    for _ in 0..3 {
        scenario = wrong_attempt(scenario);
    }

    let result = scenario
        .advance(Duration::from_secs(1))
        // Keys pressed during the cooldown must be dead.
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(Box::new(|world| {
            if world.terminal().phase() != TerminalPhase::Lockout {
                return Err("terminal should still be locked out".to_string());
            }

            let countdown_shown = world
                .display()
                .screens()
                .iter()
                .any(|(l1, l2)| l1 == "LOCKED OUT!" && l2 == "59 seconds");
            if !countdown_shown {
                return Err("countdown was never rendered".to_string());
            }

            if !world.door().opens().is_empty() {
                return Err("door must not move during lockout".to_string());
            }
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn lockout_expires_back_to_main_menu() {
    let mut scenario = Scenario::new("lockout expiry").provisioned("1234");
    for _ in 0..3 {
        scenario = wrong_attempt(scenario);
    }

    let result = scenario
        .advance(Duration::from_secs(61))
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::at_main_menu(),
            Box::new(|world| {
                if !world.ever_displayed("Lockout Ended") {
                    return Err("lockout end was never displayed".to_string());
                }
                // Normal operation resumed after the cooldown.
                if world.door().opens().len() != 1 {
                    return Err("door should open after the cooldown".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
