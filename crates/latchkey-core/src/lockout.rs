//! Consecutive-failure lockout policy.
//!
//! Pure counter/threshold logic, owned by the Controller. The policy decides
//! *when* to escalate to the alarm; actually driving the buzzer belongs to
//! the alarm actuator, and the dispatch loop blocks on that sequence before
//! resuming command processing.
//!
//! # Invariants
//!
//! - Exactly [`MAX_ATTEMPTS`] consecutive wrong results produce exactly one
//!   [`LockoutAction::TriggerAlarm`]; the counter resets as part of the same
//!   transition.
//! - Any correct result resets the counter, so a wrong attempt after a
//!   success starts a fresh streak.
//! - The counter is transient: it lives and dies with the dispatch loop and
//!   is never persisted.

use tracing::warn;

/// Consecutive wrong attempts that trigger the alarm.
pub const MAX_ATTEMPTS: u8 = 3;

/// Escalation decision for one authentication result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutAction {
    /// Keep serving.
    None,
    /// Run the alarm actuator to completion before the next command.
    TriggerAlarm,
}

/// Attempt counter with a fixed escalation threshold.
#[derive(Debug, Default)]
pub struct LockoutPolicy {
    consecutive_wrong: u8,
}

impl LockoutPolicy {
    /// A policy with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current streak of consecutive wrong results.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.consecutive_wrong
    }

    /// Record one authentication result and decide whether to escalate.
    pub fn on_result(&mut self, correct: bool) -> LockoutAction {
        if correct {
            self.consecutive_wrong = 0;
            return LockoutAction::None;
        }

        self.consecutive_wrong += 1;
        if self.consecutive_wrong >= MAX_ATTEMPTS {
            warn!(attempts = self.consecutive_wrong, "lockout threshold reached");
            self.consecutive_wrong = 0;
            return LockoutAction::TriggerAlarm;
        }

        LockoutAction::None
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn three_consecutive_wrongs_trigger_one_alarm() {
        let mut policy = LockoutPolicy::new();

        assert_eq!(policy.on_result(false), LockoutAction::None);
        assert_eq!(policy.on_result(false), LockoutAction::None);
        assert_eq!(policy.on_result(false), LockoutAction::TriggerAlarm);

        // The counter reset with the alarm; the next wrong attempt starts a
        // fresh streak.
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.on_result(false), LockoutAction::None);
    }

    #[test]
    fn correct_result_resets_the_streak() {
        let mut policy = LockoutPolicy::new();

        assert_eq!(policy.on_result(false), LockoutAction::None);
        assert_eq!(policy.on_result(false), LockoutAction::None);
        assert_eq!(policy.on_result(true), LockoutAction::None);
        assert_eq!(policy.attempts(), 0);

        // The fourth wrong attempt overall is only the first of its streak.
        assert_eq!(policy.on_result(false), LockoutAction::None);
    }

    #[test]
    fn repeated_streaks_each_alarm_once() {
        let mut policy = LockoutPolicy::new();
        let mut alarms = 0;

        for _ in 0..6 {
            if policy.on_result(false) == LockoutAction::TriggerAlarm {
                alarms += 1;
            }
        }

        assert_eq!(alarms, 2);
    }

    proptest! {
        /// The policy agrees with a straightforward reference model for any
        /// result sequence.
        #[test]
        fn matches_reference_model(results in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut policy = LockoutPolicy::new();
            let mut streak = 0u8;

            for correct in results {
                let expected = if correct {
                    streak = 0;
                    LockoutAction::None
                } else {
                    streak += 1;
                    if streak == MAX_ATTEMPTS {
                        streak = 0;
                        LockoutAction::TriggerAlarm
                    } else {
                        LockoutAction::None
                    }
                };

                prop_assert_eq!(policy.on_result(correct), expected);
                prop_assert_eq!(policy.attempts(), streak);
            }
        }
    }
}
