//! End-to-end provisioning: a factory-fresh device is set up through the
//! Terminal, and the stored credential immediately authenticates.

use latchkey_core::peripherals::Key;
use latchkey_core::store::DEFAULT_TIMEOUT_SECS;
use latchkey_harness::scenario::{Scenario, oracle};

#[test]
fn fresh_device_provisioning_round_trip() {
    let result = Scenario::new("fresh device provisioning")
        .digits("1234")
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::provisioned(),
            oracle::stored_credential("1234"),
            oracle::at_main_menu(),
            Box::new(|world| {
                if !world.ever_displayed("Password Saved!") {
                    return Err("save confirmation was never displayed".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn provisioned_credential_opens_the_door() {
    // Continue past setup: the credential stored moments ago verifies, and
    // the unprovisioned device's default timeout reaches the actuator.
    let result = Scenario::new("setup then open")
        .digits("1234")
        .digits("1234")
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::door_opens(vec![DEFAULT_TIMEOUT_SECS]),
            oracle::alarm_count(0),
            oracle::at_main_menu(),
            Box::new(|world| {
                if !world.ever_displayed("Door Unlocked") {
                    return Err("unlock confirmation was never displayed".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn mismatched_setup_entries_never_transmit() {
    let result = Scenario::new("setup mismatch")
        .digits("1234")
        .digits("9999")
        .oracle(Box::new(|world| {
            if world.controller().store().is_provisioned() {
                return Err("mismatched entry must not provision".to_string());
            }
            if !world.ever_displayed("Passwords") {
                return Err("mismatch error was never displayed".to_string());
            }
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn setup_retries_after_mismatch() {
    let result = Scenario::new("setup mismatch then success")
        .digits("1234")
        .digits("9999")
        .digits("5678")
        .digits("5678")
        .oracle(oracle::all_of(vec![
            oracle::provisioned(),
            oracle::stored_credential("5678"),
            oracle::at_main_menu(),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn changed_credential_supersedes_the_old_one() {
    let result = Scenario::new("change password end to end")
        .provisioned("1234")
        .press(Key::ChangePassword)
        .digits("1234")
        .digits("4321")
        .digits("4321")
        .press(Key::OpenDoor)
        .digits("4321")
        .oracle(oracle::all_of(vec![
            oracle::stored_credential("4321"),
            oracle::door_opens(vec![DEFAULT_TIMEOUT_SECS]),
            oracle::alarm_count(0),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
