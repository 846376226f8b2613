//! Pomodoro session timer.
//!
//! [`SessionTimer`] is a pure state machine over four phases:
//!
//! ```text
//! IDLE --start--> FOCUS --tick to 0--> FOCUS (suspended, emits focus-finished)
//!   ^                                        |
//!   |                                   start-break
//!   |                                        v
//!   +------tick to 0 (emits break-finished)-- BREAK
//!
//! FOCUS/BREAK --pause--> PAUSED --resume--> previous phase
//! any --completed--> IDLE
//! ```
//!
//! The timer never performs I/O. It is advanced by [`SessionTimer::tick`]
//! once per second and driven by the signals of [`crate::signal`].

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::signal::{SessionRef, Signal};

/// Seconds per minute.
const SECONDS_PER_MINUTE: u32 = 60;

/// Current mode of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Focus,
    Break,
    Paused,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "Idle",
            Phase::Focus => "Focus",
            Phase::Break => "Break",
            Phase::Paused => "Paused",
        };
        f.write_str(label)
    }
}

/// Countdown state for one focus or break phase.
///
/// Invariants: `remaining_seconds <= total_seconds`, and `is_running()` is
/// only true in [`Phase::Focus`] or [`Phase::Break`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTimer {
    phase: Phase,
    /// Phase to return to on resume.
    paused_from: Option<Phase>,
    total_seconds: u32,
    remaining_seconds: u32,
    running: bool,
    target: SessionRef,
    task_title: String,
}

impl SessionTimer {
    /// Creates an idle timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Session and task of the current focus phase.
    #[must_use]
    pub fn target(&self) -> &SessionRef {
        &self.target
    }

    #[must_use]
    pub fn task_title(&self) -> &str {
        &self.task_title
    }

    /// Phase a paused timer returns to on resume.
    #[must_use]
    pub fn resumes_into(&self) -> Option<Phase> {
        self.paused_from
    }

    /// True once a focus countdown has expired and a break has not started.
    #[must_use]
    pub fn awaiting_break(&self) -> bool {
        self.phase == Phase::Focus && !self.running && self.remaining_seconds == 0
    }

    /// Fraction of the cup that is full.
    ///
    /// Drains from 1 to 0 during FOCUS and fills from 0 to 1 during BREAK.
    /// PAUSED reports the phase it paused from; IDLE reports 0. A zero-length
    /// phase reports 0 for FOCUS and 1 for BREAK.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let phase = match self.phase {
            Phase::Paused => self.paused_from.unwrap_or(Phase::Idle),
            other => other,
        };

        match phase {
            Phase::Focus if self.total_seconds == 0 => 0.0,
            Phase::Focus => f64::from(self.remaining_seconds) / f64::from(self.total_seconds),
            Phase::Break if self.total_seconds == 0 => 1.0,
            Phase::Break => {
                1.0 - f64::from(self.remaining_seconds) / f64::from(self.total_seconds)
            }
            Phase::Idle | Phase::Paused => 0.0,
        }
    }

    /// Starts a FOCUS countdown of `minutes`.
    pub fn start_focus(&mut self, minutes: u32, task_title: &str, target: SessionRef) {
        self.begin(Phase::Focus, minutes);
        self.task_title = task_title.to_string();
        self.target = target;
        debug!(
            minutes,
            session_id = ?self.target.session_id,
            task_id = ?self.target.task_id,
            "Focus started"
        );
    }

    /// Starts a BREAK countdown of `minutes`.
    ///
    /// Allowed from any phase; a break already in progress restarts with the
    /// new length.
    pub fn start_break(&mut self, minutes: u32) {
        self.begin(Phase::Break, minutes);
        debug!(minutes, "Break started");
    }

    /// Stops a running FOCUS or BREAK countdown. Returns false otherwise.
    pub fn pause(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.paused_from = Some(self.phase);
        self.phase = Phase::Paused;
        self.running = false;
        debug!(remaining = self.remaining_seconds, "Timer paused");
        true
    }

    /// Resumes the paused phase if it has time left. Returns false otherwise.
    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused || self.remaining_seconds == 0 {
            return false;
        }
        let Some(previous) = self.paused_from.take() else {
            return false;
        };
        self.phase = previous;
        self.running = true;
        debug!(phase = %previous, remaining = self.remaining_seconds, "Timer resumed");
        true
    }

    /// Returns to IDLE from any phase.
    pub fn complete(&mut self) {
        self.phase = Phase::Idle;
        self.paused_from = None;
        self.remaining_seconds = 0;
        self.running = false;
        debug!("Timer completed");
    }

    /// Advances the countdown by one second.
    ///
    /// The tick that brings the remaining time to zero ends the phase and
    /// returns its finished signal. Does nothing unless running.
    pub fn tick(&mut self) -> Option<Signal> {
        if !self.running {
            return None;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return None;
        }

        self.running = false;
        match self.phase {
            Phase::Focus => Some(Signal::FocusFinished {
                target: self.target.clone(),
            }),
            Phase::Break => {
                self.phase = Phase::Idle;
                Some(Signal::BreakFinished {
                    target: self.target.clone(),
                })
            }
            Phase::Idle | Phase::Paused => None,
        }
    }

    /// Applies a bus signal. Returns true if the state changed.
    ///
    /// `focus-finished` and `break-finished` originate here and are ignored.
    pub fn apply(&mut self, signal: &Signal) -> bool {
        match signal {
            Signal::Start {
                minutes,
                task_title,
                target,
            } => {
                self.start_focus(*minutes, task_title, target.clone());
                true
            }
            Signal::StartBreak { minutes } => {
                self.start_break(*minutes);
                true
            }
            Signal::Pause { .. } => self.pause(),
            Signal::Resume { .. } => self.resume(),
            Signal::Completed { .. } => {
                self.complete();
                true
            }
            Signal::FocusFinished { .. } | Signal::BreakFinished { .. } => false,
        }
    }

    fn begin(&mut self, phase: Phase, minutes: u32) {
        self.phase = phase;
        self.paused_from = None;
        self.total_seconds = minutes.saturating_mul(SECONDS_PER_MINUTE);
        self.remaining_seconds = self.total_seconds;
        self.running = true;
    }
}

/// Formats seconds as a `MM:SS` clock label.
///
/// Minutes are not wrapped into hours, so 3600 seconds is `60:00`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!(
        "{:02}:{:02}",
        seconds / SECONDS_PER_MINUTE,
        seconds % SECONDS_PER_MINUTE
    )
}
