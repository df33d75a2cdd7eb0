//! Dispatcher liveness under garbage input.
//!
//! No byte stream may halt the Controller: unknown octets are answered
//! `Unknown`, oversized messages fail closed, and after any amount of
//! chaos a valid exchange still succeeds.

use std::time::Duration;

use latchkey_core::peripherals::Key;
use latchkey_harness::scenario::{Scenario, Step, World, oracle};
use latchkey_proto::{Command, END_MARKER, MAX_PAYLOAD};
use proptest::prelude::*;

#[test]
fn unknown_octet_is_answered_and_dispatch_continues() {
    let result = Scenario::new("unknown octet")
        .provisioned("1234")
        .step(Step::Raw(vec![0x00]))
        .step(Step::Raw(vec![0xFF]))
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::door_opens(vec![10]),
            Box::new(|world| {
                // 2 Ready + status + 2 Unknown + verdict + unlock Ack.
                if world.controller_commands() != 7 {
                    return Err(format!(
                        "controller should have sent 7 commands, got {}",
                        world.controller_commands()
                    ));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn oversized_message_fails_closed_and_dispatch_continues() {
    let mut garbage = vec![Command::SendPassword.to_u8()];
    garbage.extend(std::iter::repeat_n(b'7', MAX_PAYLOAD + 8));
    garbage.push(END_MARKER);

    let result = Scenario::new("framing overrun")
        .provisioned("1234")
        .step(Step::Raw(garbage))
        .press(Key::OpenDoor)
        .digits("1234")
        .oracle(oracle::all_of(vec![
            oracle::door_opens(vec![10]),
            oracle::alarm_count(0),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Arbitrary byte streams never wedge the dispatcher: after a
    /// terminator flush and an ack-barrier expiry, a door-unlock probe is
    /// always answered.
    #[test]
    fn chaos_bytes_never_wedge_the_dispatcher(
        chaos in proptest::collection::vec(any::<u8>(), 0..256)
    ) {
        let mut world = World::new(latchkey_core::store::MemoryNvm::new());
        world.start();

        world.send_raw(&chaos);

        // Close any partial message the chaos left open, then let the ack
        // barrier (if the chaos tripped one) expire.
        world.send_raw(&[END_MARKER]);
        world.advance(Duration::from_millis(200));

        let before = world.controller_commands();
        world.send_raw(&[Command::DoorUnlock.to_u8()]);

        prop_assert!(
            world.controller_commands() > before,
            "dispatcher stopped answering after {} chaos bytes",
            chaos.len(),
        );
    }
}
