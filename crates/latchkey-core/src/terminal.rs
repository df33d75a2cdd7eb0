//! Terminal interaction state machine.
//!
//! The Terminal owns user interaction: it collects credentials one masked
//! digit at a time, performs exactly one `SendPassword` round trip per flow,
//! and only then issues the flow-specific follow-up command. It always
//! initiates; the Controller only answers.
//!
//! # Architecture: Action-Based State Machine
//!
//! Like the dispatcher, this is pure logic following the action pattern:
//! events (key presses, reply octets, analog samples, clock ticks) come in
//! as method calls with `Instant` parameters, and display/wire effects come
//! out as [`TerminalAction`] values for a driver to execute.
//!
//! Drivers pace consecutive [`TerminalAction::Show`] updates (the hardware
//! inserted fixed delays between transient messages); the machine itself
//! never sleeps.
//!
//! # Flows
//!
//! ```text
//! Init ──> AwaitReady ──> AwaitStatus ──┬─ Success ──> MainMenu
//!                                       └─ Fail ─────> FirstTimeSetup
//!
//! MainMenu ──> {OpenDoor, ChangePassword, SetTimeout} ──> MainMenu
//!                  │ 3rd consecutive PasswordWrong
//!                  v
//!               Lockout (countdown, Alarm notice, input ignored)
//! ```
//!
//! Every reply wait carries a deadline; a quiet Controller is a link stall,
//! rendered to the user and reset to the main menu rather than blocking
//! forever. The Terminal never silently swallows a `Fail` or `Unknown`
//! reply.

use std::time::{Duration, Instant};

use latchkey_proto::Command;
use tracing::{debug, info, warn};

use crate::lockout::MAX_ATTEMPTS;
use crate::peripherals::{Key, Led};
use crate::store::{CREDENTIAL_LEN, DEFAULT_TIMEOUT_SECS, TIMEOUT_MAX, TIMEOUT_MIN};

/// Actions returned by the state machine for the driver to execute in
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    /// Write this command octet to the wire.
    Send(Command),

    /// Frame and write this message payload to the wire.
    SendPayload(Vec<u8>),

    /// Replace both display lines.
    Show {
        /// First display line.
        line1: String,
        /// Second display line.
        line2: String,
    },

    /// Light one indicator LED.
    SetLed(Led),

    /// Sample the potentiometer mapped into `[min, max]` and feed the
    /// result back through [`Terminal::on_analog`].
    ReadPot {
        /// Lower bound of the mapped range.
        min: u8,
        /// Upper bound of the mapped range.
        max: u8,
    },
}

/// Coarse interaction phase, exposed for tests and oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalPhase {
    /// Handshaking with the Controller.
    Startup,
    /// Collecting the initial credential on a fresh device.
    FirstTimeSetup,
    /// Waiting for a menu selection.
    MainMenu,
    /// Door-opening flow.
    OpenDoorFlow,
    /// Credential-change flow.
    ChangePasswordFlow,
    /// Auto-lock timeout flow.
    SetTimeoutFlow,
    /// Locked out; counting down.
    Lockout,
}

/// What the pending verification round trip will unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    OpenDoor,
    ChangePassword,
    CommitTimeout(u8),
}

#[derive(Debug)]
enum State {
    Init,
    AwaitReady { deadline: Instant },
    AwaitStatus { deadline: Instant },
    MainMenu,
    CollectPassword { purpose: Purpose, buf: Vec<u8> },
    AwaitVerdict { purpose: Purpose, deadline: Instant },
    EnterNew { first_entry: Option<Vec<u8>>, buf: Vec<u8>, first_time: bool },
    AwaitSaveReply { first_time: bool, deadline: Instant },
    AwaitUnlockAck { deadline: Instant },
    AdjustTimeout { draft: u8 },
    AwaitTimeoutReply { deadline: Instant },
    Lockout { until: Instant, last_shown: u64 },
}

/// Terminal configuration.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Bounded wait for any Controller reply before the stall reset.
    pub reply_timeout: Duration,
    /// Cooldown after the local attempt counter reaches the threshold.
    pub lockout_duration: Duration,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(1),
            lockout_duration: Duration::from_secs(60),
        }
    }
}

/// The Terminal state machine.
///
/// Holds only transient, locally entered candidate values and a local
/// mirror of the attempt counter; the durable credential lives on the
/// Controller and is reached exclusively through the protocol.
#[derive(Debug)]
pub struct Terminal {
    state: State,
    attempts: u8,
    config: TerminalConfig,
}

impl Terminal {
    /// Create a Terminal in its pre-handshake state.
    #[must_use]
    pub fn new(config: TerminalConfig) -> Self {
        Self { state: State::Init, attempts: 0, config }
    }

    /// Coarse current phase.
    #[must_use]
    pub fn phase(&self) -> TerminalPhase {
        match &self.state {
            State::Init | State::AwaitReady { .. } | State::AwaitStatus { .. } => {
                TerminalPhase::Startup
            },
            State::EnterNew { first_time: true, .. }
            | State::AwaitSaveReply { first_time: true, .. } => TerminalPhase::FirstTimeSetup,
            State::MainMenu => TerminalPhase::MainMenu,
            State::CollectPassword { purpose, .. } | State::AwaitVerdict { purpose, .. } => {
                match purpose {
                    Purpose::OpenDoor => TerminalPhase::OpenDoorFlow,
                    Purpose::ChangePassword => TerminalPhase::ChangePasswordFlow,
                    Purpose::CommitTimeout(_) => TerminalPhase::SetTimeoutFlow,
                }
            },
            State::AwaitUnlockAck { .. } => TerminalPhase::OpenDoorFlow,
            State::EnterNew { first_time: false, .. }
            | State::AwaitSaveReply { first_time: false, .. } => {
                TerminalPhase::ChangePasswordFlow
            },
            State::AdjustTimeout { .. } | State::AwaitTimeoutReply { .. } => {
                TerminalPhase::SetTimeoutFlow
            },
            State::Lockout { .. } => TerminalPhase::Lockout,
        }
    }

    /// Local mirror of the consecutive-wrong counter.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Boot: greet, light the wait LED, announce readiness.
    pub fn start(&mut self, now: Instant) -> Vec<TerminalAction> {
        info!("terminal starting");
        self.state = State::AwaitReady { deadline: now + self.config.reply_timeout };
        vec![
            show("Door Locker", "System v1.0"),
            TerminalAction::SetLed(Led::Blue),
            TerminalAction::Send(Command::Ready),
        ]
    }

    /// Consume one reply octet from the wire.
    pub fn on_command(&mut self, byte: u8, now: Instant) -> Vec<TerminalAction> {
        let Some(command) = Command::from_u8(byte) else {
            debug!(byte, "ignoring unclassifiable reply octet");
            return Vec::new();
        };

        match &self.state {
            State::AwaitReady { .. } => {
                if command == Command::Ready {
                    self.state =
                        State::AwaitStatus { deadline: now + self.config.reply_timeout };
                }
                Vec::new()
            },
            State::AwaitStatus { .. } => self.route_by_status(command),
            State::AwaitVerdict { purpose, .. } => {
                let purpose = *purpose;
                self.handle_verdict(purpose, command, now)
            },
            State::AwaitUnlockAck { .. } => match command {
                Command::Ack => {
                    info!("door unlocked");
                    self.state = State::MainMenu;
                    let mut actions =
                        vec![TerminalAction::SetLed(Led::Green), show("Door Unlocked", "")];
                    actions.extend(menu_actions());
                    actions
                },
                Command::Fail | Command::Unknown => self.link_error(),
                _ => Vec::new(),
            },
            State::AwaitSaveReply { first_time, .. } => {
                let first_time = *first_time;
                self.handle_save_reply(first_time, command)
            },
            State::AwaitTimeoutReply { .. } => match command {
                Command::Success => {
                    info!("auto-lock timeout saved");
                    self.state = State::MainMenu;
                    let mut actions =
                        vec![TerminalAction::SetLed(Led::Green), show("Timeout Saved!", "")];
                    actions.extend(menu_actions());
                    actions
                },
                Command::Fail | Command::Unknown => {
                    warn!("timeout rejected by controller");
                    self.state = State::MainMenu;
                    let mut actions =
                        vec![TerminalAction::SetLed(Led::Red), show("Error Saving", "Timeout")];
                    actions.extend(menu_actions());
                    actions
                },
                _ => Vec::new(),
            },
            _ => {
                debug!(?command, "reply octet outside a reply wait");
                Vec::new()
            },
        }
    }

    /// Consume one debounced key press.
    pub fn on_key(&mut self, key: Key, now: Instant) -> Vec<TerminalAction> {
        match &mut self.state {
            State::MainMenu => match key {
                Key::OpenDoor => {
                    self.collect_password(Purpose::OpenDoor)
                },
                Key::ChangePassword => {
                    self.collect_password(Purpose::ChangePassword)
                },
                Key::SetTimeout => {
                    self.state = State::AdjustTimeout { draft: DEFAULT_TIMEOUT_SECS };
                    vec![
                        TerminalAction::SetLed(Led::Blue),
                        show("Adjust Timeout", "(# Save, D Exit)"),
                    ]
                },
                _ => Vec::new(),
            },
            State::CollectPassword { purpose, buf } => match key {
                Key::Digit(d) => {
                    buf.push(b'0' + d);
                    let (line1, _) = verify_prompt(*purpose);
                    let masked = "*".repeat(buf.len());
                    if buf.len() == CREDENTIAL_LEN {
                        let candidate = std::mem::take(buf);
                        let purpose = *purpose;
                        self.state = State::AwaitVerdict {
                            purpose,
                            deadline: now + self.config.reply_timeout,
                        };
                        return vec![
                            show(line1, &masked),
                            TerminalAction::Send(Command::SendPassword),
                            TerminalAction::SendPayload(candidate),
                        ];
                    }
                    vec![show(line1, &masked)]
                },
                Key::Cancel => self.back_to_menu(),
                _ => Vec::new(),
            },
            State::EnterNew { first_entry, buf, first_time } => match key {
                Key::Digit(d) => {
                    buf.push(b'0' + d);
                    let confirming = first_entry.is_some();
                    let first_time = *first_time;
                    let (line1, _) = entry_prompt(confirming, first_time);
                    let masked = "*".repeat(buf.len());

                    if buf.len() < CREDENTIAL_LEN {
                        return vec![show(line1, &masked)];
                    }

                    let entered = std::mem::take(buf);
                    match first_entry.take() {
                        None => {
                            *first_entry = Some(entered);
                            let (l1, l2) = entry_prompt(true, first_time);
                            vec![show(line1, &masked), show(l1, l2)]
                        },
                        Some(first) if first == entered => {
                            self.state = State::AwaitSaveReply {
                                first_time,
                                deadline: now + self.config.reply_timeout,
                            };
                            vec![
                                show(line1, &masked),
                                TerminalAction::Send(Command::ChangePassword),
                                TerminalAction::SendPayload(entered),
                            ]
                        },
                        Some(_) => {
                            warn!("credential confirmation mismatch");
                            let mut actions = vec![
                                TerminalAction::SetLed(Led::Red),
                                show("Passwords", "Don't Match!"),
                            ];
                            if first_time {
                                actions.extend(self.restart_setup());
                            } else {
                                actions.extend(self.back_to_menu());
                            }
                            actions
                        },
                    }
                },
                Key::Cancel => {
                    // Setup cannot be abandoned; the device would stay
                    // unprovisioned with no way back in.
                    let first_time = *first_time;
                    if first_time { Vec::new() } else { self.back_to_menu() }
                },
                _ => Vec::new(),
            },
            State::AdjustTimeout { draft } => match key {
                Key::Confirm => {
                    let draft = *draft;
                    self.collect_password(Purpose::CommitTimeout(draft))
                },
                Key::Cancel => {
                    let mut actions = vec![show("Cancelled", "")];
                    self.state = State::MainMenu;
                    actions.extend(menu_actions());
                    actions
                },
                _ => Vec::new(),
            },
            // Lockout ignores input entirely; reply waits ignore keys.
            _ => Vec::new(),
        }
    }

    /// Consume a mapped potentiometer sample requested by
    /// [`TerminalAction::ReadPot`].
    pub fn on_analog(&mut self, value: u8, _now: Instant) -> Vec<TerminalAction> {
        if let State::AdjustTimeout { draft } = &mut self.state {
            let clamped = value.clamp(TIMEOUT_MIN, TIMEOUT_MAX);
            *draft = clamped;
            return vec![show("Timeout:", &format!("{clamped} seconds"))];
        }
        Vec::new()
    }

    /// Observe the clock: reply deadlines, the lockout countdown, and the
    /// live potentiometer sampling loop.
    pub fn tick(&mut self, now: Instant) -> Vec<TerminalAction> {
        match &mut self.state {
            State::AwaitReady { deadline } | State::AwaitStatus { deadline } => {
                if now >= *deadline {
                    // Keep knocking until the Controller answers.
                    debug!("re-announcing ready");
                    self.state =
                        State::AwaitReady { deadline: now + self.config.reply_timeout };
                    return vec![TerminalAction::Send(Command::Ready)];
                }
                Vec::new()
            },
            State::AwaitVerdict { deadline, .. }
            | State::AwaitUnlockAck { deadline }
            | State::AwaitTimeoutReply { deadline } => {
                if now >= *deadline {
                    return self.stall_reset();
                }
                Vec::new()
            },
            State::AwaitSaveReply { first_time, deadline } => {
                if now >= *deadline {
                    warn!("no reply from controller; resetting");
                    if *first_time {
                        let mut actions =
                            vec![TerminalAction::SetLed(Led::Red), show("No Response", "From Controller")];
                        actions.extend(self.restart_setup());
                        return actions;
                    }
                    return self.stall_reset();
                }
                Vec::new()
            },
            State::AdjustTimeout { .. } => {
                vec![TerminalAction::ReadPot { min: TIMEOUT_MIN, max: TIMEOUT_MAX }]
            },
            State::Lockout { until, last_shown } => {
                if now >= *until {
                    info!("lockout ended");
                    self.state = State::MainMenu;
                    let mut actions =
                        vec![show("Lockout Ended", ""), TerminalAction::SetLed(Led::Green)];
                    actions.extend(menu_actions());
                    return actions;
                }

                let remaining = remaining_secs(*until, now);
                if remaining != *last_shown {
                    *last_shown = remaining;
                    return vec![show("LOCKED OUT!", &format!("{remaining} seconds"))];
                }
                Vec::new()
            },
            _ => Vec::new(),
        }
    }

    fn route_by_status(&mut self, command: Command) -> Vec<TerminalAction> {
        match command {
            Command::Success => {
                info!("controller provisioned; entering main menu");
                self.state = State::MainMenu;
                let mut actions = vec![show("Connected!", "")];
                actions.extend(menu_actions());
                actions
            },
            Command::Fail => {
                info!("controller unprovisioned; entering first-time setup");
                let mut actions =
                    vec![show("Connected!", ""), TerminalAction::SetLed(Led::Blue)];
                actions.extend(self.restart_setup());
                actions
            },
            _ => Vec::new(),
        }
    }

    fn handle_verdict(
        &mut self,
        purpose: Purpose,
        command: Command,
        now: Instant,
    ) -> Vec<TerminalAction> {
        match command {
            Command::PasswordCorrect => {
                self.attempts = 0;
                let mut actions = vec![TerminalAction::Send(Command::Ack)];
                match purpose {
                    Purpose::OpenDoor => {
                        self.state = State::AwaitUnlockAck {
                            deadline: now + self.config.reply_timeout,
                        };
                        actions.push(TerminalAction::Send(Command::DoorUnlock));
                    },
                    Purpose::ChangePassword => {
                        self.state = State::EnterNew {
                            first_entry: None,
                            buf: Vec::new(),
                            first_time: false,
                        };
                        actions.push(TerminalAction::SetLed(Led::Blue));
                        actions.push(show("Enter New", "Password:"));
                    },
                    Purpose::CommitTimeout(draft) => {
                        self.state = State::AwaitTimeoutReply {
                            deadline: now + self.config.reply_timeout,
                        };
                        actions.push(TerminalAction::Send(Command::SetTimeout));
                        // ASCII decimal; raw bytes 10 and 13 would collide
                        // with the message terminators.
                        actions.push(TerminalAction::SendPayload(
                            draft.to_string().into_bytes(),
                        ));
                    },
                }
                actions
            },
            Command::PasswordWrong => {
                self.attempts += 1;
                warn!(attempts = self.attempts, "password rejected");
                let mut actions =
                    vec![TerminalAction::Send(Command::Ack), TerminalAction::SetLed(Led::Red)];

                if self.attempts >= MAX_ATTEMPTS {
                    self.attempts = 0;
                    actions.extend(self.enter_lockout(now));
                } else {
                    actions.push(show("Incorrect", "Password!"));
                    self.state = State::MainMenu;
                    actions.extend(menu_actions());
                }
                actions
            },
            Command::Fail | Command::Unknown => self.link_error(),
            _ => Vec::new(),
        }
    }

    fn handle_save_reply(&mut self, first_time: bool, command: Command) -> Vec<TerminalAction> {
        match command {
            Command::Ack => {
                info!("credential saved");
                self.state = State::MainMenu;
                let mut actions =
                    vec![TerminalAction::SetLed(Led::Green), show("Password Saved!", "")];
                actions.extend(menu_actions());
                actions
            },
            Command::Fail | Command::Unknown => {
                warn!("credential save rejected");
                let mut actions =
                    vec![TerminalAction::SetLed(Led::Red), show("Error Saving", "Password")];
                if first_time {
                    // The device is still unprovisioned; setup must finish.
                    actions.extend(self.restart_setup());
                } else {
                    self.state = State::MainMenu;
                    actions.extend(menu_actions());
                }
                actions
            },
            _ => Vec::new(),
        }
    }

    fn enter_lockout(&mut self, now: Instant) -> Vec<TerminalAction> {
        warn!("entering lockout");
        let secs = self.config.lockout_duration.as_secs();
        self.state = State::Lockout {
            until: now + self.config.lockout_duration,
            last_shown: secs,
        };
        vec![
            TerminalAction::Send(Command::Alarm),
            show("LOCKED OUT!", &format!("{secs} seconds")),
            TerminalAction::SetLed(Led::Red),
        ]
    }

    fn collect_password(&mut self, purpose: Purpose) -> Vec<TerminalAction> {
        let (line1, line2) = verify_prompt(purpose);
        self.state = State::CollectPassword { purpose, buf: Vec::new() };
        vec![TerminalAction::SetLed(Led::Blue), show(line1, line2)]
    }

    fn restart_setup(&mut self) -> Vec<TerminalAction> {
        self.state =
            State::EnterNew { first_entry: None, buf: Vec::new(), first_time: true };
        let (line1, line2) = entry_prompt(false, true);
        vec![show(line1, line2)]
    }

    fn back_to_menu(&mut self) -> Vec<TerminalAction> {
        self.state = State::MainMenu;
        menu_actions()
    }

    fn stall_reset(&mut self) -> Vec<TerminalAction> {
        warn!("no reply from controller; resetting");
        self.state = State::MainMenu;
        let mut actions =
            vec![TerminalAction::SetLed(Led::Red), show("No Response", "From Controller")];
        actions.extend(menu_actions());
        actions
    }

    fn link_error(&mut self) -> Vec<TerminalAction> {
        warn!("controller refused the exchange");
        self.state = State::MainMenu;
        let mut actions =
            vec![TerminalAction::SetLed(Led::Red), show("Link Error", "Try Again")];
        actions.extend(menu_actions());
        actions
    }
}

fn show(line1: &str, line2: &str) -> TerminalAction {
    TerminalAction::Show { line1: line1.to_string(), line2: line2.to_string() }
}

fn menu_actions() -> Vec<TerminalAction> {
    vec![TerminalAction::SetLed(Led::Green), show("A:Open  B:Chg", "C:Time  D:Canc")]
}

fn verify_prompt(purpose: Purpose) -> (&'static str, &'static str) {
    match purpose {
        Purpose::OpenDoor => ("Enter Password", "to Open Door:"),
        Purpose::ChangePassword => ("Enter Old", "Password:"),
        Purpose::CommitTimeout(_) => ("Enter Password", "to Confirm:"),
    }
}

fn entry_prompt(confirming: bool, first_time: bool) -> (&'static str, &'static str) {
    match (confirming, first_time) {
        (false, true) => ("Set New", "Password:"),
        (false, false) => ("Enter New", "Password:"),
        (true, _) => ("Re-enter", "Password:"),
    }
}

fn remaining_secs(until: Instant, now: Instant) -> u64 {
    let remaining = until.duration_since(now);
    let whole = remaining.as_secs();
    if remaining.subsec_nanos() > 0 { whole + 1 } else { whole }
}
