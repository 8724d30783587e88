//! Timer engine implementation.
//!
//! One engine drives one [`Timer`] through its execution schedule. Engines
//! run as tasks on the manager's runtime and must hold a pool permit while
//! they make progress, so at most `max_active_timers` advance at once.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive -> Active <-> AtBreak -> Ended
//!     \__________\__________\______> Stopped
//! ```
//!
//! Suspension freezes progress without leaving the current slot. A stop
//! (remove, clear, shutdown) is observed at every wait step and ends the
//! run without further progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::handle::{Timer, TimerStatus};
use super::schedule::{SlotKind, TimeUnit};
use crate::bus::EventSink;
use crate::events::TimerEvent;

/// How often a waiting engine wakes to integrate elapsed time and look at
/// its suspend/stop flags.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Ended,
    Stopped,
}

pub(crate) struct TimerEngine {
    timer: Timer,
    sink: EventSink,
    pool: Arc<Semaphore>,
    poll_interval: Duration,
}

impl TimerEngine {
    pub(crate) fn new(timer: Timer, sink: EventSink, pool: Arc<Semaphore>) -> Self {
        Self {
            timer,
            sink,
            pool,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Wait for a pool slot, then walk the schedule to completion or stop.
    pub(crate) async fn run(self) -> RunOutcome {
        let stop = self.timer.stop_token().clone();
        let permit = tokio::select! {
            biased;
            _ = stop.cancelled() => return self.announce_stop().await,
            permit = Arc::clone(&self.pool).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.timer.stop();
                    return self.announce_stop().await;
                }
            },
        };

        tracing::debug!(timer = %self.timer.name(), "timer started");
        let outcome = self.execute().await;
        drop(permit);
        outcome
    }

    async fn execute(&self) -> RunOutcome {
        let unit = self.timer.time_unit();
        let slots = self.timer.schedule().slots();

        for (index, &duration) in slots.iter().enumerate() {
            if self.timer.is_stopped() {
                return self.announce_stop().await;
            }

            let status = match SlotKind::of(index) {
                SlotKind::Activity => {
                    self.timer.set_progress(TimerStatus::Active);
                    self.sink
                        .emit(TimerEvent::ActivityStarted {
                            timer: self.timer.clone(),
                            duration,
                            unit,
                        })
                        .await;
                    TimerStatus::Active
                }
                SlotKind::Break => {
                    self.timer.set_progress(TimerStatus::AtBreak);
                    self.sink
                        .emit(TimerEvent::ActivityEnded {
                            timer: self.timer.clone(),
                            pomodoro_count: self.timer.pomodoro_count(),
                        })
                        .await;
                    self.sink
                        .emit(TimerEvent::BreakStarted {
                            timer: self.timer.clone(),
                            duration,
                            unit,
                        })
                        .await;
                    TimerStatus::AtBreak
                }
            };
            tracing::debug!(timer = %self.timer.name(), slot = index, %status, duration, "slot entered");

            if !self.wait_slot(status, duration, unit).await || self.timer.is_stopped() {
                return self.announce_stop().await;
            }
            self.timer.complete_slot(index);
        }

        if self.timer.is_stopped() {
            return self.announce_stop().await;
        }
        self.timer.set_progress(TimerStatus::Ended);
        let pomodoro_count = self.timer.pomodoro_count();
        tracing::debug!(timer = %self.timer.name(), pomodoro_count, "timer ended");
        self.sink
            .emit(TimerEvent::Ended {
                timer: self.timer.clone(),
                pomodoro_count,
            })
            .await;
        RunOutcome::Ended
    }

    /// Wait until `duration` units of non-suspended time have elapsed.
    /// Returns `false` if the timer was stopped first.
    async fn wait_slot(&self, status: TimerStatus, duration: u64, unit: TimeUnit) -> bool {
        let target = unit.span(duration);
        if target.is_zero() {
            return true;
        }

        let stop = self.timer.stop_token();
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let unit_secs = unit.as_secs();
        let mut checkpoint = Instant::now();
        let mut accumulated = Duration::ZERO;
        let mut ticks_sent = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            let now = Instant::now();
            let delta = now.saturating_duration_since(checkpoint);
            checkpoint = now;
            if self.timer.is_suspended() {
                continue;
            }
            accumulated += delta;

            let whole_units = (accumulated.as_secs() / unit_secs).min(duration);
            if whole_units > ticks_sent {
                ticks_sent = whole_units;
                self.sink
                    .emit(TimerEvent::Tick {
                        timer: self.timer.clone(),
                        status,
                        elapsed: whole_units,
                        total: duration,
                        unit,
                    })
                    .await;
            }

            if accumulated >= target {
                return true;
            }
        }
    }

    async fn announce_stop(&self) -> RunOutcome {
        let pomodoro_count = self.timer.pomodoro_count();
        tracing::debug!(timer = %self.timer.name(), pomodoro_count, "timer stopped");
        self.sink
            .emit(TimerEvent::Stopped {
                timer: self.timer.clone(),
                pomodoro_count,
            })
            .await;
        RunOutcome::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::events::{EventKind, FnListener, Listener};
    use crate::timer::ExecutionSchedule;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        bus: EventBus,
        seen: Arc<Mutex<Vec<(EventKind, Option<u32>)>>>,
        pool: Arc<Semaphore>,
    }

    impl Harness {
        fn new(permits: usize) -> Self {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let record = Arc::clone(&seen);
            let listener: Arc<dyn Listener> = Arc::new(FnListener(move |e: &TimerEvent| {
                record.lock().unwrap().push((e.kind(), e.pomodoro_count()));
            }));
            Self {
                bus: EventBus::start(vec![listener], 64, true).unwrap(),
                seen,
                pool: Arc::new(Semaphore::new(permits)),
            }
        }

        fn engine(&self, timer: &Timer) -> TimerEngine {
            TimerEngine::new(timer.clone(), self.bus.sink().unwrap(), Arc::clone(&self.pool))
        }

        fn finish(self) -> Vec<(EventKind, Option<u32>)> {
            self.bus.close();
            assert!(self.bus.join(Duration::from_secs(2)));
            let seen = self.seen.lock().unwrap().clone();
            seen
        }
    }

    fn timer(slots: Vec<u64>) -> Timer {
        Timer::new(
            "sam".into(),
            true,
            ExecutionSchedule::new(slots),
            TimeUnit::Seconds,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn empty_schedule_ends_immediately() {
        let harness = Harness::new(1);
        let t = timer(vec![]);
        assert_eq!(harness.engine(&t).run().await, RunOutcome::Ended);
        assert_eq!(t.status(), TimerStatus::Ended);
        assert_eq!(t.pomodoro_count(), 0);
        assert_eq!(harness.finish(), vec![(EventKind::Ended, Some(0))]);
    }

    #[tokio::test]
    async fn zero_slots_emit_transitions_without_ticks() {
        let harness = Harness::new(1);
        let t = timer(vec![0, 0, 0, 0]);
        assert_eq!(harness.engine(&t).run().await, RunOutcome::Ended);
        assert_eq!(t.pomodoro_count(), 2);
        let seen = harness.finish();
        assert!(seen.iter().all(|(kind, _)| *kind != EventKind::Tick));
        assert_eq!(
            seen,
            vec![
                (EventKind::ActivityStarted, None),
                (EventKind::ActivityEnded, Some(1)),
                (EventKind::BreakStarted, None),
                (EventKind::ActivityStarted, None),
                (EventKind::ActivityEnded, Some(2)),
                (EventKind::BreakStarted, None),
                (EventKind::Ended, Some(2)),
            ]
        );
    }

    #[tokio::test]
    async fn one_second_slot_ticks_once() {
        let harness = Harness::new(1);
        let t = timer(vec![1]);
        assert_eq!(harness.engine(&t).run().await, RunOutcome::Ended);
        assert_eq!(t.pomodoro_count(), 1);
        let ticks = harness
            .finish()
            .into_iter()
            .filter(|(kind, _)| *kind == EventKind::Tick)
            .count();
        assert_eq!(ticks, 1);
    }

    #[tokio::test]
    async fn stop_before_permit_reports_stopped() {
        let harness = Harness::new(0);
        let t = timer(vec![5]);
        let run = tokio::spawn(harness.engine(&t).run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(t.status(), TimerStatus::Inactive);
        t.stop();
        assert_eq!(run.await.unwrap(), RunOutcome::Stopped);
        assert_eq!(t.status(), TimerStatus::Stopped);
        assert_eq!(harness.finish(), vec![(EventKind::Stopped, Some(0))]);
    }

    #[tokio::test]
    async fn stop_mid_activity_keeps_zero_pomodoros() {
        let harness = Harness::new(1);
        let t = timer(vec![30, 5]);
        let run = tokio::spawn(harness.engine(&t).run());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(t.status(), TimerStatus::Active);
        t.stop();
        assert_eq!(run.await.unwrap(), RunOutcome::Stopped);
        assert_eq!(t.pomodoro_count(), 0);
        assert_eq!(t.status(), TimerStatus::Stopped);
        let seen = harness.finish();
        assert_eq!(seen.last(), Some(&(EventKind::Stopped, Some(0))));
        assert!(!seen.iter().any(|(kind, _)| *kind == EventKind::Ended));
    }

    #[tokio::test]
    async fn suspended_time_does_not_count() {
        let harness = Harness::new(1);
        let t = timer(vec![1]);
        t.suspend().unwrap();
        let run = tokio::spawn(harness.engine(&t).run());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(t.status(), TimerStatus::Suspended);
        assert_eq!(t.pomodoro_count(), 0);
        t.resume().unwrap();
        assert_eq!(run.await.unwrap(), RunOutcome::Ended);
        assert_eq!(t.pomodoro_count(), 1);
        harness.finish();
    }
}
