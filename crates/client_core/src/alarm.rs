//! Dose alarm state machine.
//!
//! Driven once per second. At most one alarm is active system-wide; every
//! confirmation is remembered per minute so the same medication cannot
//! re-trigger within that minute, regardless of what the network does
//! afterwards.

use std::collections::HashSet;

use shared::domain::{Medication, MedicationId};

/// Source of the current wall-clock minute. Injected so ticks are testable
/// without real waits.
pub trait Clock: Send + Sync {
    /// Current local time as `"HH:MM"`.
    fn now_minute(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_minute(&self) -> String {
        chrono::Local::now().format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Active(MedicationId),
}

/// Per-minute confirmation set. Replaced wholesale on minute rollover; ids in
/// `confirmed` are only ever valid for `minute_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationWindow {
    pub minute_key: String,
    pub confirmed: HashSet<MedicationId>,
}

impl ConfirmationWindow {
    fn empty(minute_key: impl Into<String>) -> Self {
        Self {
            minute_key: minute_key.into(),
            confirmed: HashSet::new(),
        }
    }
}

#[derive(Debug)]
pub struct AlarmScheduler {
    state: AlarmState,
    window: ConfirmationWindow,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self {
            state: AlarmState::Idle,
            window: ConfirmationWindow::empty(""),
        }
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn window(&self) -> &ConfirmationWindow {
        &self.window
    }

    /// One scheduler tick. Rolls the confirmation window when the minute
    /// changed, then, if no alarm is active, selects the first medication in
    /// cache order that is due now and not yet confirmed this minute.
    ///
    /// Returns the id of a newly activated alarm. At most one activation per
    /// tick: further matches wait for later ticks within the same minute.
    pub fn tick(&mut self, now_minute: &str, medications: &[Medication]) -> Option<MedicationId> {
        if self.window.minute_key != now_minute {
            self.window = ConfirmationWindow::empty(now_minute);
        }
        if matches!(self.state, AlarmState::Active(_)) {
            return None;
        }
        let due = medications
            .iter()
            .find(|m| m.is_due_at(now_minute) && !self.window.confirmed.contains(&m.id))?;
        self.state = AlarmState::Active(due.id.clone());
        Some(due.id.clone())
    }

    /// Confirms the active alarm: the id is recorded in the current window
    /// and the machine returns to idle. This happens before any network call
    /// so a failed dose submission can never re-arm the alarm.
    pub fn confirm(&mut self) -> Option<MedicationId> {
        let AlarmState::Active(id) = &self.state else {
            return None;
        };
        let id = id.clone();
        self.window.confirmed.insert(id.clone());
        self.state = AlarmState::Idle;
        Some(id)
    }

    /// Drops the active alarm and the confirmation window, used when the
    /// session is torn down.
    pub fn reset(&mut self) {
        self.state = AlarmState::Idle;
        self.window = ConfirmationWindow::empty("");
    }
}

#[cfg(test)]
#[path = "tests/alarm_tests.rs"]
mod tests;
