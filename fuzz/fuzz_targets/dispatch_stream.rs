//! Random byte streams through the Controller dispatcher.
//!
//! The dispatch loop must be unconditionally live: no stream may make it
//! panic, and after a terminator flush plus barrier expiry it must answer
//! a well-formed command again.

#![no_main]

use std::time::{Duration, Instant};

use latchkey_core::controller::{Controller, ControllerAction, ControllerConfig};
use latchkey_core::store::{CredentialStore, MemoryNvm};
use latchkey_proto::{Command, END_MARKER};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut store = CredentialStore::new(MemoryNvm::new());
    store.write_credential(b"1234").expect("seed credential");
    store.mark_provisioned().expect("seed flag");

    let mut controller = Controller::new(store, ControllerConfig::default());
    let t0 = Instant::now();

    let _ = controller.start();
    let _ = controller.on_byte(Command::Ready.to_u8(), t0);

    for &byte in data {
        // INVARIANT 1: no input byte panics the dispatcher.
        let _ = controller.on_byte(byte, t0);
    }

    // Flush any partial message, expire any ack barrier.
    let _ = controller.on_byte(END_MARKER, t0);
    let _ = controller.tick(t0 + Duration::from_secs(1));

    // INVARIANT 2: a well-formed command is still answered.
    let actions = controller.on_byte(Command::DoorUnlock.to_u8(), t0 + Duration::from_secs(1));
    assert!(
        actions.contains(&ControllerAction::Send(Command::Ack)),
        "dispatcher stopped answering"
    );
});
