//! Blocking driver loops wiring the state machines to their peripherals.
//!
//! The state machines are pure; these loops are the only place in the core
//! that touches a clock or an I/O trait. Each node is single-threaded and
//! cooperative: the loop runs to completion between bounded waits on the
//! wire, and nothing preempts it.
//!
//! Both loops run forever on hardware. They return only when the wire
//! reports [`WireError::Disconnected`], which an integration maps to its
//! reset action.

use std::time::{Duration, Instant};

use latchkey_proto::encode_message;
use tracing::error;

use crate::controller::{Controller, ControllerAction};
use crate::error::WireError;
use crate::peripherals::{
    AlarmActuator, AnalogInput, Display, DoorActuator, Indicator, InputDevice, WireLink,
};
use crate::store::Nvm;
use crate::terminal::{Terminal, TerminalAction};

/// Bounded wire wait per loop iteration, so deadlines are observed promptly
/// without busy-spinning the link.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run the Controller dispatch loop forever.
///
/// The alarm actuator is polled to completion in-line: while it sounds, no
/// wire traffic is pumped. That backpressure is deliberate and observable
/// from the peer.
///
/// # Errors
///
/// Returns [`WireError::Disconnected`] when the link goes away; every other
/// failure is absorbed by the dispatcher as a protocol reply.
pub fn run_controller<N, W, D, A>(
    controller: &mut Controller<N>,
    wire: &mut W,
    door: &mut D,
    alarm: &mut A,
) -> Result<(), WireError>
where
    N: Nvm,
    W: WireLink,
    D: DoorActuator,
    A: AlarmActuator,
{
    for action in controller.start() {
        execute_controller_action(action, wire, door, alarm)?;
    }

    loop {
        let actions = match wire.try_recv_byte(POLL_INTERVAL)? {
            Some(byte) => controller.on_byte(byte, Instant::now()),
            None => controller.tick(Instant::now()),
        };

        for action in actions {
            execute_controller_action(action, wire, door, alarm)?;
        }
    }
}

fn execute_controller_action<W, D, A>(
    action: ControllerAction,
    wire: &mut W,
    door: &mut D,
    alarm: &mut A,
) -> Result<(), WireError>
where
    W: WireLink,
    D: DoorActuator,
    A: AlarmActuator,
{
    match action {
        ControllerAction::Send(command) => wire.send_byte(command.to_u8()),
        ControllerAction::StartDoor { open_secs } => {
            door.start_door(open_secs);
            Ok(())
        },
        ControllerAction::LockDoor => {
            door.lock_door();
            Ok(())
        },
        ControllerAction::StartAlarm => {
            alarm.start_alarm();
            // Freeze until the sequence finishes; the dispatch loop resumes
            // only after the actuator reports idle.
            while alarm.is_alarm_active() {
                std::hint::spin_loop();
            }
            Ok(())
        },
    }
}

/// Run the Terminal interaction loop forever.
///
/// The wire drains before the keypad: a pending reply always lands in the
/// state that requested it, so a fast-fingered user cannot slip a key in
/// between a request and its response.
///
/// # Errors
///
/// Returns [`WireError::Disconnected`] when the link goes away.
pub fn run_terminal<W, I, D, L, P>(
    terminal: &mut Terminal,
    wire: &mut W,
    input: &mut I,
    display: &mut D,
    leds: &mut L,
    pot: &mut P,
) -> Result<(), WireError>
where
    W: WireLink,
    I: InputDevice,
    D: Display,
    L: Indicator,
    P: AnalogInput,
{
    let mut pending = terminal.start(Instant::now());

    loop {
        while let Some(action) = take_first(&mut pending) {
            execute_terminal_action(action, terminal, wire, display, leds, pot, &mut pending)?;
        }

        if let Some(byte) = wire.try_recv_byte(POLL_INTERVAL)? {
            pending = terminal.on_command(byte, Instant::now());
            continue;
        }

        if let Some(key) = input.get_key() {
            pending = terminal.on_key(key, Instant::now());
            continue;
        }

        pending = terminal.tick(Instant::now());
    }
}

fn take_first(pending: &mut Vec<TerminalAction>) -> Option<TerminalAction> {
    if pending.is_empty() { None } else { Some(pending.remove(0)) }
}

#[allow(clippy::too_many_arguments)]
fn execute_terminal_action<W, D, L, P>(
    action: TerminalAction,
    terminal: &mut Terminal,
    wire: &mut W,
    display: &mut D,
    leds: &mut L,
    pot: &mut P,
    pending: &mut Vec<TerminalAction>,
) -> Result<(), WireError>
where
    W: WireLink,
    D: Display,
    L: Indicator,
    P: AnalogInput,
{
    match action {
        TerminalAction::Send(command) => wire.send_byte(command.to_u8()),
        TerminalAction::SendPayload(payload) => {
            let mut framed = Vec::with_capacity(payload.len() + 1);
            if let Err(err) = encode_message(&payload, &mut framed) {
                // Digits and config bytes never contain a terminator, so
                // this is unreachable in practice; drop the frame rather
                // than corrupt the stream.
                error!(%err, "unencodable payload dropped");
                return Ok(());
            }
            for byte in framed {
                wire.send_byte(byte)?;
            }
            Ok(())
        },
        TerminalAction::Show { line1, line2 } => {
            display.show(&line1, &line2);
            Ok(())
        },
        TerminalAction::SetLed(led) => {
            leds.set_led(led);
            Ok(())
        },
        TerminalAction::ReadPot { min, max } => {
            let value = pot.read_mapped(min, max);
            pending.extend(terminal.on_analog(value, Instant::now()));
            Ok(())
        },
    }
}
