//! World state for scenario execution.
//!
//! The World wires one Terminal and one Controller together over a
//! [`SimWire`] pair, executes every action the state machines emit against
//! the recording fakes, and tracks enough history for oracles to verify
//! global consistency.
//!
//! Time is virtual: the world holds a single `Instant` that only moves when
//! a scenario step advances it, so timeout behavior is deterministic.

use std::time::{Duration, Instant};

use latchkey_core::controller::{Controller, ControllerAction, ControllerConfig};
use latchkey_core::peripherals::{
    AlarmActuator, AnalogInput, Display as _, DoorActuator, Indicator as _, InputDevice, Key,
    WireLink,
};
use latchkey_core::store::{CredentialStore, MemoryNvm};
use latchkey_core::terminal::{Terminal, TerminalAction, TerminalConfig};
use latchkey_proto::encode_message;
use tracing::debug;

use crate::fakes::{FakeAlarm, FakeDisplay, FakeDoor, FakeKeypad, FakeLeds, FakePot};
use crate::wire::SimWire;

/// World state containing a connected Terminal/Controller pair, their
/// fakes, and interaction history.
///
/// # Panics
///
/// World methods panic if the in-memory wire fails, which cannot happen
/// while the world owns both endpoints. This is acceptable for test code.
pub struct World {
    now: Instant,
    terminal: Terminal,
    controller: Controller<MemoryNvm>,
    terminal_wire: SimWire,
    controller_wire: SimWire,
    keypad: FakeKeypad,
    display: FakeDisplay,
    leds: FakeLeds,
    pot: FakePot,
    door: FakeDoor,
    alarm: FakeAlarm,
    terminal_commands: usize,
    controller_commands: usize,
}

impl World {
    /// Build a world around a seeded NVM device, using default protocol
    /// configurations.
    #[must_use]
    pub fn new(nvm: MemoryNvm) -> Self {
        let (terminal_wire, controller_wire) = SimWire::pair();
        Self {
            now: Instant::now(),
            terminal: Terminal::new(TerminalConfig::default()),
            controller: Controller::new(
                CredentialStore::new(nvm),
                ControllerConfig::default(),
            ),
            terminal_wire,
            controller_wire,
            keypad: FakeKeypad::new(),
            display: FakeDisplay::new(),
            leds: FakeLeds::new(),
            pot: FakePot::default(),
            door: FakeDoor::new(),
            alarm: FakeAlarm::new(),
            terminal_commands: 0,
            controller_commands: 0,
        }
    }

    /// Boot both nodes and run the handshake to quiescence.
    pub fn start(&mut self) {
        let actions = self.controller.start();
        self.exec_controller(actions);

        let actions = self.terminal.start(self.now);
        self.exec_terminal(actions);

        self.pump();
    }

    /// Queue one key press and run to quiescence.
    pub fn press(&mut self, key: Key) {
        self.keypad.press(key);
        self.pump();
    }

    /// Enter a digit string one key at a time.
    ///
    /// # Panics
    ///
    /// Panics if `digits` contains a non-keypad character.
    pub fn digits(&mut self, digits: &str) {
        for c in digits.chars() {
            let key = Key::from_char(c).expect("digit key");
            self.press(key);
        }
    }

    /// Move the potentiometer wiper.
    pub fn set_pot(&mut self, value: u8) {
        self.pot.set(value);
    }

    /// Advance virtual time, deliver one clock tick to each node, and run
    /// to quiescence.
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;

        let actions = self.terminal.tick(self.now);
        self.exec_terminal(actions);

        let actions = self.controller.tick(self.now);
        self.exec_controller(actions);

        self.pump();
    }

    /// Inject raw bytes on the Terminal-to-Controller direction, as a
    /// corrupted or malicious peer would, and run to quiescence.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.terminal_wire.send_byte(byte).expect("wire closed");
        }
        self.pump();
    }

    /// Process queued bytes and keys until both nodes are quiescent.
    pub fn pump(&mut self) {
        loop {
            // The Controller drains its inbound bytes first: it is the
            // responding peer, and the Terminal blocks on its replies.
            if let Some(byte) = self.recv_controller_side() {
                let actions = self.controller.on_byte(byte, self.now);
                self.exec_controller(actions);
                continue;
            }

            if let Some(byte) = self.recv_terminal_side() {
                let actions = self.terminal.on_command(byte, self.now);
                self.exec_terminal(actions);
                continue;
            }

            if let Some(key) = self.keypad.get_key() {
                let actions = self.terminal.on_key(key, self.now);
                self.exec_terminal(actions);
                continue;
            }

            return;
        }
    }

    fn recv_controller_side(&mut self) -> Option<u8> {
        self.controller_wire.try_recv_byte(Duration::ZERO).expect("wire closed")
    }

    fn recv_terminal_side(&mut self) -> Option<u8> {
        self.terminal_wire.try_recv_byte(Duration::ZERO).expect("wire closed")
    }

    fn exec_controller(&mut self, actions: Vec<ControllerAction>) {
        for action in actions {
            debug!(?action, "controller action");
            match action {
                ControllerAction::Send(command) => {
                    self.controller_commands += 1;
                    self.controller_wire.send_byte(command.to_u8()).expect("wire closed");
                },
                ControllerAction::StartDoor { open_secs } => self.door.start_door(open_secs),
                ControllerAction::LockDoor => self.door.lock_door(),
                ControllerAction::StartAlarm => {
                    // Poll-to-completion, exactly like the hardware driver:
                    // dispatch stays frozen while the buzzer sounds.
                    self.alarm.start_alarm();
                    while self.alarm.is_alarm_active() {}
                },
            }
        }
    }

    fn exec_terminal(&mut self, actions: Vec<TerminalAction>) {
        let mut queue: std::collections::VecDeque<TerminalAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            debug!(?action, "terminal action");
            match action {
                TerminalAction::Send(command) => {
                    self.terminal_commands += 1;
                    self.terminal_wire.send_byte(command.to_u8()).expect("wire closed");
                },
                TerminalAction::SendPayload(payload) => {
                    let mut framed = Vec::with_capacity(payload.len() + 1);
                    encode_message(&payload, &mut framed).expect("unencodable payload");
                    for byte in framed {
                        self.terminal_wire.send_byte(byte).expect("wire closed");
                    }
                },
                TerminalAction::Show { line1, line2 } => self.display.show(&line1, &line2),
                TerminalAction::SetLed(led) => self.leds.set_led(led),
                TerminalAction::ReadPot { min, max } => {
                    let value = self.pot.read_mapped(min, max);
                    for follow_up in self.terminal.on_analog(value, self.now) {
                        queue.push_back(follow_up);
                    }
                },
            }
        }
    }

    /// The Terminal under test.
    #[must_use]
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// The Controller under test.
    #[must_use]
    pub fn controller(&self) -> &Controller<MemoryNvm> {
        &self.controller
    }

    /// The display history.
    #[must_use]
    pub fn display(&self) -> &FakeDisplay {
        &self.display
    }

    /// The indicator LED history.
    #[must_use]
    pub fn leds(&self) -> &FakeLeds {
        &self.leds
    }

    /// The door actuator record.
    #[must_use]
    pub fn door(&self) -> &FakeDoor {
        &self.door
    }

    /// Number of alarm sequences the Controller ran.
    #[must_use]
    pub fn alarm_count(&self) -> usize {
        self.alarm.count()
    }

    /// Command octets the Terminal has sent (payload bytes not counted).
    #[must_use]
    pub fn terminal_commands(&self) -> usize {
        self.terminal_commands
    }

    /// Command octets the Controller has sent.
    #[must_use]
    pub fn controller_commands(&self) -> usize {
        self.controller_commands
    }

    /// Raw NVM word, for lane-preservation oracles.
    #[must_use]
    pub fn stored_word(&self, offset: u32) -> u32 {
        self.controller.store().nvm().word(offset)
    }

    /// True if some screen in the history has this first line.
    #[must_use]
    pub fn ever_displayed(&self, line1: &str) -> bool {
        self.display.screens().iter().any(|(l1, _)| l1 == line1)
    }
}
