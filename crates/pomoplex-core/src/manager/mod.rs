//! Timer manager: registry of live timers, bounded engine pool and the
//! public control surface.
//!
//! Lifecycle is `build -> use -> shutdown`. The manager owns its own tokio
//! runtime, so every control operation is a plain synchronous call.
//! Shutdown (explicit or on drop) stops all timers and waits a bounded
//! grace period for engines and event delivery to drain.

mod builder;

pub use builder::TimerManagerBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::bus::{outside_runtime, EventBus};
use crate::error::TimerError;
use crate::events::TimerEvent;
use crate::timer::{ExecutionSchedule, TimeUnit, Timer, TimerEngine};

/// What [`TimerManager::shutdown`] managed to do within its grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Live timers that were stopped and removed.
    pub timers_stopped: usize,
    /// Every engine exited before the grace period ran out.
    pub workers_drained: bool,
    /// The delivery thread drained its queue before the grace period ran out.
    pub delivery_drained: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.workers_drained && self.delivery_drained
    }
}

pub struct TimerManager {
    timers: RwLock<Vec<Timer>>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    engines: TaskTracker,
    pool: Arc<Semaphore>,
    root: CancellationToken,
    bus: EventBus,
    default_schedule: ExecutionSchedule,
    time_unit: TimeUnit,
    max_active_timers: usize,
    shutdown_grace: Duration,
    shut_down: AtomicBool,
}

impl TimerManager {
    pub fn builder() -> TimerManagerBuilder {
        TimerManagerBuilder::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Snapshot of the live timers in insertion order. The returned vector
    /// is detached from the registry.
    pub fn list(&self) -> Vec<Timer> {
        self.read_timers().clone()
    }

    pub fn get(&self, name: &str) -> Result<Timer, TimerError> {
        find(&self.read_timers(), name).cloned()
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn default_schedule(&self) -> &ExecutionSchedule {
        &self.default_schedule
    }

    pub fn max_active_timers(&self) -> usize {
        self.max_active_timers
    }

    /// Manager-wide talk flag.
    pub fn is_talking(&self) -> bool {
        self.bus.talk()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Add a talking timer. `None` runs the manager's default schedule.
    pub fn add(
        &self,
        name: &str,
        schedule: Option<ExecutionSchedule>,
    ) -> Result<Timer, TimerError> {
        self.add_with(name, true, schedule)
    }

    /// Add a timer and queue its engine on the pool. If every pool slot is
    /// busy the timer stays `Inactive` until one frees up.
    pub fn add_with(
        &self,
        name: &str,
        talk: bool,
        schedule: Option<ExecutionSchedule>,
    ) -> Result<Timer, TimerError> {
        validate_name("name", name)?;

        let timer = {
            let mut timers = self.write_timers();
            if self.is_shut_down() {
                return Err(TimerError::ShutDown);
            }
            let sink = self.bus.sink().ok_or(TimerError::ShutDown)?;
            if timers.iter().any(|t| t.name() == name) {
                return Err(TimerError::DuplicateName(name.to_string()));
            }

            let timer = Timer::new(
                name.to_string(),
                talk,
                schedule.unwrap_or_else(|| self.default_schedule.clone()),
                self.time_unit,
                self.root.child_token(),
            );
            timers.push(timer.clone());
            let engine = TimerEngine::new(timer.clone(), sink, Arc::clone(&self.pool));
            self.engines.spawn_on(engine.run(), &self.handle);
            timer
        };

        tracing::info!(
            timer = %name,
            slots = timer.schedule().len(),
            unit = %self.time_unit,
            "timer added"
        );
        Ok(timer)
    }

    pub fn suspend(&self, name: &str) -> Result<(), TimerError> {
        let timer = self.get(name)?;
        timer.suspend()?;
        tracing::debug!(timer = %name, "timer suspended");
        self.publish(TimerEvent::Suspended { timer });
        Ok(())
    }

    pub fn resume(&self, name: &str) -> Result<(), TimerError> {
        let timer = self.get(name)?;
        timer.resume()?;
        tracing::debug!(timer = %name, "timer resumed");
        self.publish(TimerEvent::Resumed { timer });
        Ok(())
    }

    /// Stop a timer and drop it from the registry. Does not wait for its
    /// engine to exit.
    pub fn remove(&self, name: &str) -> Result<Timer, TimerError> {
        let timer = {
            let mut timers = self.write_timers();
            let index = position(&timers, name)?;
            let timer = timers.remove(index);
            timer.stop();
            timer
        };
        tracing::info!(timer = %name, "timer removed");
        self.publish(TimerEvent::Removed {
            timer: timer.clone(),
        });
        Ok(timer)
    }

    /// Relabel a live timer. The new name must be non-blank and must not
    /// belong to another live timer.
    pub fn rename(&self, name: &str, new_name: &str) -> Result<(), TimerError> {
        validate_name("new_name", new_name)?;
        let timers = self.write_timers();
        let timer = find(&timers, name)?;
        if name != new_name && timers.iter().any(|t| t.name() == new_name) {
            return Err(TimerError::DuplicateName(new_name.to_string()));
        }
        timer.set_name(new_name.to_string());
        tracing::debug!(from = %name, to = %new_name, "timer renamed");
        Ok(())
    }

    /// Let events through manager-wide (each timer's own flag still applies).
    pub fn talk(&self) {
        self.bus.set_talk(true);
    }

    /// Mute every timer.
    pub fn stfu(&self) {
        self.bus.set_talk(false);
    }

    pub fn talk_timer(&self, name: &str) -> Result<(), TimerError> {
        self.get(name)?.set_talk(true);
        Ok(())
    }

    pub fn stfu_timer(&self, name: &str) -> Result<(), TimerError> {
        self.get(name)?.set_talk(false);
        Ok(())
    }

    /// Stop and remove every live timer. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed: Vec<Timer> = self.write_timers().drain(..).collect();
        for timer in &removed {
            timer.stop();
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "timers cleared");
        }
        removed.len()
    }

    /// Stop everything, then wait up to the grace period for the engine
    /// pool and, separately, for event delivery to drain. Idempotent; a
    /// repeated call returns a clean, empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        let timers_stopped = {
            let mut timers = self.write_timers();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return ShutdownReport {
                    timers_stopped: 0,
                    workers_drained: true,
                    delivery_drained: true,
                };
            }
            let removed: Vec<Timer> = timers.drain(..).collect();
            removed.len()
        };
        self.root.cancel();
        self.engines.close();

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let grace = self.shutdown_grace;
        let engines = self.engines.clone();
        let workers_drained = match runtime {
            Some(runtime) => outside_runtime(move || {
                let drained = runtime
                    .block_on(async { tokio::time::timeout(grace, engines.wait()).await })
                    .is_ok();
                runtime.shutdown_background();
                drained
            })
            .unwrap_or(false),
            None => true,
        };

        self.bus.close();
        let bus = &self.bus;
        let delivery_drained = outside_runtime(|| bus.join(grace)).unwrap_or(false);

        let report = ShutdownReport {
            timers_stopped,
            workers_drained,
            delivery_drained,
        };
        if report.is_clean() {
            tracing::info!(timers_stopped, "timer manager shut down");
        } else {
            tracing::warn!(
                timers_stopped,
                workers_drained,
                delivery_drained,
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "timer manager shut down with work abandoned"
            );
        }
        report
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn publish(&self, event: TimerEvent) {
        if let Some(sink) = self.bus.sink() {
            sink.emit_blocking(event);
        }
    }

    fn read_timers(&self) -> RwLockReadGuard<'_, Vec<Timer>> {
        self.timers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_timers(&self) -> RwLockWriteGuard<'_, Vec<Timer>> {
        self.timers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_name(field: &str, name: &str) -> Result<(), TimerError> {
    if name.trim().is_empty() {
        return Err(TimerError::invalid(field, "Illegal timer name."));
    }
    Ok(())
}

fn position(timers: &[Timer], name: &str) -> Result<usize, TimerError> {
    timers
        .iter()
        .position(|t| t.name() == name)
        .ok_or_else(|| TimerError::NotFound(name.to_string()))
}

fn find<'a>(timers: &'a [Timer], name: &str) -> Result<&'a Timer, TimerError> {
    position(timers, name).map(|index| &timers[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransitionReason};
    use crate::timer::TimerStatus;

    fn manager(schedule: impl Into<ExecutionSchedule>) -> TimerManager {
        TimerManager::builder()
            .max_active_timers(3)
            .time_unit(TimeUnit::Seconds)
            .execution_schedule(schedule)
            .talk()
            .shutdown_grace(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let m = manager([60]);
        m.add("sam", None).unwrap();
        m.add("per", None).unwrap();
        let err = m.add("sam", None).unwrap_err();
        assert_eq!(err, TimerError::DuplicateName("sam".into()));
        assert_eq!(m.list().len(), 2);
        m.shutdown();
    }

    #[test]
    fn blank_names_are_rejected() {
        let m = manager([60]);
        assert_eq!(m.add("  ", None).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(m.list().is_empty());
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let m = manager([60]);
        m.add("sam", None).unwrap();
        m.add("per", None).unwrap();
        let mut snapshot = m.list();
        let first = snapshot[0].clone();
        m.remove(&first.name()).unwrap();
        snapshot.push(first);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(m.list().len(), 1);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let m = manager([60]);
        for result in [
            m.suspend("ghost"),
            m.resume("ghost"),
            m.remove("ghost").map(|_| ()),
            m.rename("ghost", "spook"),
            m.talk_timer("ghost"),
            m.stfu_timer("ghost"),
        ] {
            assert_eq!(result.unwrap_err(), TimerError::NotFound("ghost".into()));
        }
    }

    #[test]
    fn suspend_resume_cycle() {
        let m = manager([60]);
        m.add("sam", None).unwrap();
        m.suspend("sam").unwrap();
        assert_eq!(m.get("sam").unwrap().status(), TimerStatus::Suspended);
        let err = m.suspend("sam").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
        m.resume("sam").unwrap();
        assert!(matches!(
            m.resume("sam"),
            Err(TimerError::IllegalTransition {
                reason: TransitionReason::NotSuspended,
                ..
            })
        ));
    }

    #[test]
    fn rename_keeps_names_unique() {
        let m = manager([60]);
        let sam = m.add("sam", None).unwrap();
        m.add("per", None).unwrap();
        assert_eq!(
            m.rename("sam", "per").unwrap_err(),
            TimerError::DuplicateName("per".into())
        );
        m.rename("sam", "sam").unwrap();
        m.rename("sam", "lin").unwrap();
        assert_eq!(sam.name(), "lin");
        assert!(m.get("sam").is_err());
        assert!(m.get("lin").unwrap().same_as(&sam));
        assert_eq!(m.rename("lin", " ").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn remove_stops_the_timer() {
        let m = manager([60]);
        let sam = m.add("sam", None).unwrap();
        let removed = m.remove("sam").unwrap();
        assert!(removed.same_as(&sam));
        assert_eq!(sam.status(), TimerStatus::Stopped);
        assert!(m.get("sam").is_err());
        assert_eq!(
            m.suspend("sam").unwrap_err(),
            TimerError::NotFound("sam".into())
        );
    }

    #[test]
    fn clear_removes_everything() {
        let m = manager([60]);
        let timers: Vec<Timer> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| m.add(n, None).unwrap())
            .collect();
        assert_eq!(m.clear(), 4);
        assert!(m.list().is_empty());
        assert!(timers.iter().all(|t| t.status() == TimerStatus::Stopped));
        assert_eq!(m.clear(), 0);
    }

    #[test]
    fn talk_flags_toggle() {
        let m = manager([60]);
        let sam = m.add_with("sam", false, None).unwrap();
        assert!(!sam.talk_enabled());
        m.talk_timer("sam").unwrap();
        assert!(sam.talk_enabled());
        m.stfu_timer("sam").unwrap();
        assert!(!sam.talk_enabled());
        assert!(m.is_talking());
        m.stfu();
        assert!(!m.is_talking());
        m.talk();
        assert!(m.is_talking());
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let m = manager([60]);
        let sam = m.add("sam", None).unwrap();
        let report = m.shutdown();
        assert_eq!(report.timers_stopped, 1);
        assert!(report.is_clean());
        assert_eq!(sam.status(), TimerStatus::Stopped);

        let again = m.shutdown();
        assert_eq!(again.timers_stopped, 0);
        assert!(again.is_clean());
        assert_eq!(m.add("late", None).unwrap_err(), TimerError::ShutDown);
        assert!(m.is_shut_down());
    }

    #[tokio::test]
    async fn async_callers_lose_no_control_events() {
        use crate::events::{EventKind, FnListener};
        use std::sync::atomic::AtomicUsize;

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let m = TimerManager::builder()
            .time_unit(TimeUnit::Seconds)
            .execution_schedule([60])
            .talk()
            .event_queue_capacity(1)
            .shutdown_grace(Duration::from_secs(3))
            .listener(FnListener(move |e: &TimerEvent| {
                std::thread::sleep(Duration::from_millis(50));
                if matches!(e.kind(), EventKind::Suspended | EventKind::Resumed) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .build()
            .unwrap();
        m.add("sam", None).unwrap();
        for _ in 0..3 {
            m.suspend("sam").unwrap();
            m.resume("sam").unwrap();
        }

        let report = m.shutdown();
        assert!(report.workers_drained);
        assert!(report.delivery_drained);
        assert_eq!(delivered.load(Ordering::SeqCst), 6);
    }
}
