//! Shared timer state.
//!
//! A [`Timer`] is a cheap, cloneable handle. The registry, the engine running
//! the timer and every event referencing it all point at the same state.
//! Progress fields are written only by the engine; control flags (suspend,
//! stop, talk, name) are written by the manager.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::schedule::{ExecutionSchedule, TimeUnit};
use crate::error::{TimerError, TransitionReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    Inactive,
    Active,
    AtBreak,
    Suspended,
    Stopped,
    Ended,
}

impl TimerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerStatus::Stopped | TimerStatus::Ended)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TimerStatus::Active,
            2 => TimerStatus::AtBreak,
            5 => TimerStatus::Ended,
            _ => TimerStatus::Inactive,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TimerStatus::Inactive => 0,
            TimerStatus::Active => 1,
            TimerStatus::AtBreak => 2,
            TimerStatus::Suspended => 3,
            TimerStatus::Stopped => 4,
            TimerStatus::Ended => 5,
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerStatus::Inactive => "INACTIVE",
            TimerStatus::Active => "ACTIVE",
            TimerStatus::AtBreak => "AT_BREAK",
            TimerStatus::Suspended => "SUSPENDED",
            TimerStatus::Stopped => "STOPPED",
            TimerStatus::Ended => "ENDED",
        };
        f.write_str(name)
    }
}

struct TimerState {
    name: RwLock<String>,
    schedule: ExecutionSchedule,
    time_unit: TimeUnit,
    /// Natural progression only: Inactive, Active, AtBreak or Ended.
    progress: AtomicU8,
    pomodoro_count: AtomicU32,
    suspended: AtomicBool,
    talk: AtomicBool,
    stop: CancellationToken,
}

/// Handle to one named interval timer.
#[derive(Clone)]
pub struct Timer {
    state: Arc<TimerState>,
}

impl Timer {
    pub(crate) fn new(
        name: String,
        talk: bool,
        schedule: ExecutionSchedule,
        time_unit: TimeUnit,
        stop: CancellationToken,
    ) -> Self {
        Self {
            state: Arc::new(TimerState {
                name: RwLock::new(name),
                schedule,
                time_unit,
                progress: AtomicU8::new(TimerStatus::Inactive.as_u8()),
                pomodoro_count: AtomicU32::new(0),
                suspended: AtomicBool::new(false),
                talk: AtomicBool::new(talk),
                stop,
            }),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn name(&self) -> String {
        self.state
            .name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pomodoro_count(&self) -> u32 {
        self.state.pomodoro_count.load(Ordering::Acquire)
    }

    /// Current status. `Ended` is final; otherwise a stop overrides a
    /// suspension, which overrides natural progress.
    pub fn status(&self) -> TimerStatus {
        let progress = TimerStatus::from_u8(self.state.progress.load(Ordering::Acquire));
        if progress == TimerStatus::Ended {
            return progress;
        }
        if self.is_stopped() {
            return TimerStatus::Stopped;
        }
        if self.is_suspended() {
            return TimerStatus::Suspended;
        }
        progress
    }

    pub fn schedule(&self) -> &ExecutionSchedule {
        &self.state.schedule
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.state.time_unit
    }

    pub fn is_suspended(&self) -> bool {
        self.state.suspended.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stop.is_cancelled()
    }

    pub fn talk_enabled(&self) -> bool {
        self.state.talk.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same timer.
    pub fn same_as(&self, other: &Timer) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    // ── Engine-side mutation ─────────────────────────────────────────

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.state.stop
    }

    pub(crate) fn set_progress(&self, status: TimerStatus) {
        debug_assert!(matches!(
            status,
            TimerStatus::Active | TimerStatus::AtBreak | TimerStatus::Ended
        ));
        self.state.progress.store(status.as_u8(), Ordering::Release);
    }

    /// Record completion of slot `index`. Finishing activity `k` (or the
    /// break that follows it) brings the count to `k + 1`; it never drops.
    pub(crate) fn complete_slot(&self, index: usize) {
        let count = (index / 2 + 1) as u32;
        self.state.pomodoro_count.fetch_max(count, Ordering::AcqRel);
    }

    // ── Manager-side mutation ────────────────────────────────────────

    pub(crate) fn set_name(&self, name: String) {
        *self
            .state
            .name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = name;
    }

    pub(crate) fn set_talk(&self, talk: bool) {
        self.state.talk.store(talk, Ordering::Release);
    }

    pub(crate) fn suspend(&self) -> Result<(), TimerError> {
        self.ensure_live("suspend")?;
        self.state
            .suspended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| self.refuse("suspend", TransitionReason::AlreadySuspended))
    }

    pub(crate) fn resume(&self) -> Result<(), TimerError> {
        self.ensure_live("resume")?;
        self.state
            .suspended
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| self.refuse("resume", TransitionReason::NotSuspended))
    }

    /// One-way stop signal. Idempotent.
    pub(crate) fn stop(&self) {
        self.state.stop.cancel();
    }

    fn ensure_live(&self, action: &'static str) -> Result<(), TimerError> {
        match self.status() {
            TimerStatus::Stopped => Err(self.refuse(action, TransitionReason::Stopped)),
            TimerStatus::Ended => Err(self.refuse(action, TransitionReason::Ended)),
            _ => Ok(()),
        }
    }

    fn refuse(&self, action: &'static str, reason: TransitionReason) -> TimerError {
        TimerError::IllegalTransition {
            name: self.name(),
            action,
            reason,
        }
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Timer {}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name())
            .field("status", &self.status())
            .field("pomodoro_count", &self.pomodoro_count())
            .finish()
    }
}
