//! Auto-lock timeout configuration: the potentiometer-driven flow, range
//! validation, and the read-modify-write lane preservation invariant.

use std::time::Duration;

use latchkey_core::peripherals::Key;
use latchkey_core::store::DEFAULT_TIMEOUT_SECS;
use latchkey_harness::scenario::{Scenario, Step, oracle};
use latchkey_proto::{Command, END_MARKER};

#[test]
fn pot_flow_commits_behind_password_confirmation() {
    let result = Scenario::new("set timeout via pot")
        .provisioned("1234")
        .press(Key::SetTimeout)
        .step(Step::SetPot(20))
        // The sampling loop is tick-driven; one tick refreshes the draft.
        .advance(Duration::from_millis(200))
        .press(Key::Confirm)
        .digits("1234")
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::at_main_menu(),
            // The unlock that followed read the new value fresh.
            oracle::door_opens(vec![20]),
            Box::new(|world| {
                if world.controller().store().read_timeout() != 20 {
                    return Err(format!(
                        "stored timeout should be 20, got {}",
                        world.controller().store().read_timeout()
                    ));
                }
                if !world.ever_displayed("Timeout Saved!") {
                    return Err("save confirmation was never displayed".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn timeout_write_preserves_untouched_byte_lanes() {
    let result = Scenario::new("lane preservation")
        .provisioned("1234")
        .with_nvm(|nvm| nvm.set_word(1, 0xAABB_CC00))
        .press(Key::SetTimeout)
        .step(Step::SetPot(20))
        .advance(Duration::from_millis(200))
        .press(Key::Confirm)
        .digits("1234")
        .oracle(Box::new(|world| {
            let word = world.stored_word(1);
            if word != 0xAABB_CC14 {
                return Err(format!("timeout word should be 0xAABBCC14, got {word:#010x}"));
            }
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn out_of_range_timeout_fails_and_preserves_prior_value() {
    // A compliant Terminal cannot produce the value 3 (the pot mapping
    // clamps), so inject the request as a misbehaving peer would.
    let result = Scenario::new("reject timeout 3")
        .provisioned("1234")
        .with_stored_timeout(10)
        .step(Step::Raw(vec![Command::SetTimeout.to_u8(), b'3', END_MARKER]))
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            // The prior value is intact and still drives the actuator.
            oracle::door_opens(vec![10]),
            Box::new(|world| {
                if world.controller().store().read_timeout() != 10 {
                    return Err(format!(
                        "stored timeout should be unchanged, got {}",
                        world.controller().store().read_timeout()
                    ));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn pot_samples_clamp_to_the_legal_range() {
    let result = Scenario::new("pot clamping")
        .provisioned("1234")
        .press(Key::SetTimeout)
        .step(Step::SetPot(255))
        .advance(Duration::from_millis(200))
        .press(Key::Confirm)
        .digits("1234")
        .oracle(Box::new(|world| {
            if world.controller().store().read_timeout() != 30 {
                return Err(format!(
                    "stored timeout should clamp to 30, got {}",
                    world.controller().store().read_timeout()
                ));
            }
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn cancelled_adjustment_leaves_the_store_alone() {
    let result = Scenario::new("cancel timeout flow")
        .provisioned("1234")
        .press(Key::SetTimeout)
        .step(Step::SetPot(25))
        .advance(Duration::from_millis(200))
        .press(Key::Cancel)
        .oracle(oracle::all_of(vec![
            oracle::at_main_menu(),
            Box::new(|world| {
                if world.controller().store().read_timeout() != DEFAULT_TIMEOUT_SECS {
                    return Err("cancelled draft must not be stored".to_string());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
