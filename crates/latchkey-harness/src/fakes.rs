//! Recording fakes for the peripheral traits.
//!
//! Each fake implements one `latchkey-core` peripheral trait and records
//! what the state machines asked of it, so oracles can assert on actuator
//! and display behavior without any hardware.

use std::cell::Cell;
use std::collections::VecDeque;

use latchkey_core::peripherals::{
    AlarmActuator, AnalogInput, Display, DoorActuator, Indicator, InputDevice, Key, Led,
};

/// Door motor fake: records every open request and relock.
#[derive(Debug, Default)]
pub struct FakeDoor {
    opens: Vec<u8>,
    locks: usize,
}

impl FakeDoor {
    /// A door that has never moved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open durations handed to the actuator, in order.
    #[must_use]
    pub fn opens(&self) -> &[u8] {
        &self.opens
    }

    /// Number of immediate relock requests.
    #[must_use]
    pub fn locks(&self) -> usize {
        self.locks
    }
}

impl DoorActuator for FakeDoor {
    fn start_door(&mut self, open_secs: u8) {
        self.opens.push(open_secs);
    }

    fn lock_door(&mut self) {
        self.locks += 1;
    }
}

/// Buzzer fake: sounds for a fixed number of polls per alarm, so the
/// poll-to-completion backpressure path is actually exercised.
#[derive(Debug)]
pub struct FakeAlarm {
    started: usize,
    polls_per_alarm: u32,
    remaining: Cell<u32>,
}

impl FakeAlarm {
    /// An alarm that reports active for three polls after each start.
    #[must_use]
    pub fn new() -> Self {
        Self { started: 0, polls_per_alarm: 3, remaining: Cell::new(0) }
    }

    /// Number of alarm sequences started.
    #[must_use]
    pub fn count(&self) -> usize {
        self.started
    }
}

impl Default for FakeAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmActuator for FakeAlarm {
    fn start_alarm(&mut self) {
        self.started += 1;
        self.remaining.set(self.polls_per_alarm);
    }

    fn is_alarm_active(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining > 0 {
            self.remaining.set(remaining - 1);
            return true;
        }
        false
    }
}

/// Keypad fake fed by the test script.
#[derive(Debug, Default)]
pub struct FakeKeypad {
    queue: VecDeque<Key>,
}

impl FakeKeypad {
    /// An idle keypad.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one debounced key press.
    pub fn press(&mut self, key: Key) {
        self.queue.push_back(key);
    }
}

impl InputDevice for FakeKeypad {
    fn get_key(&mut self) -> Option<Key> {
        self.queue.pop_front()
    }
}

/// Display fake: records every screen ever shown.
#[derive(Debug, Default)]
pub struct FakeDisplay {
    screens: Vec<(String, String)>,
}

impl FakeDisplay {
    /// A blank display.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every screen shown, oldest first.
    #[must_use]
    pub fn screens(&self) -> &[(String, String)] {
        &self.screens
    }

    /// The screen currently visible.
    #[must_use]
    pub fn last(&self) -> Option<&(String, String)> {
        self.screens.last()
    }
}

impl Display for FakeDisplay {
    fn show(&mut self, line1: &str, line2: &str) {
        self.screens.push((line1.to_string(), line2.to_string()));
    }
}

/// Indicator LED fake: records the lighting history.
#[derive(Debug, Default)]
pub struct FakeLeds {
    history: Vec<Led>,
}

impl FakeLeds {
    /// All LEDs dark.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The LED currently lit.
    #[must_use]
    pub fn last(&self) -> Option<Led> {
        self.history.last().copied()
    }

    /// Full lighting history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Led] {
        &self.history
    }
}

impl Indicator for FakeLeds {
    fn set_led(&mut self, led: Led) {
        self.history.push(led);
    }
}

/// Potentiometer fake: returns a scripted value, clamped into the
/// requested range the way the real sample-and-map does.
#[derive(Debug)]
pub struct FakePot {
    value: u8,
}

impl FakePot {
    /// A pot resting at `value`.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    /// Move the wiper.
    pub fn set(&mut self, value: u8) {
        self.value = value;
    }
}

impl Default for FakePot {
    fn default() -> Self {
        Self::new(10)
    }
}

impl AnalogInput for FakePot {
    fn read_mapped(&mut self, min: u8, max: u8) -> u8 {
        self.value.clamp(min, max)
    }
}
