use std::fmt;

use crate::timer::{TimeUnit, Timer, TimerStatus};

/// Every observable change of a timer produces a TimerEvent.
/// Engines and the manager publish them; listeners consume them on the
/// delivery thread.
#[derive(Debug, Clone)]
pub enum TimerEvent {
    /// One whole time unit of progress within the current slot.
    Tick {
        timer: Timer,
        status: TimerStatus,
        elapsed: u64,
        total: u64,
        unit: TimeUnit,
    },
    Removed {
        timer: Timer,
    },
    Suspended {
        timer: Timer,
    },
    Resumed {
        timer: Timer,
    },
    ActivityStarted {
        timer: Timer,
        duration: u64,
        unit: TimeUnit,
    },
    /// Activity slot finished; carries the count including it.
    ActivityEnded {
        timer: Timer,
        pomodoro_count: u32,
    },
    BreakStarted {
        timer: Timer,
        duration: u64,
        unit: TimeUnit,
    },
    Stopped {
        timer: Timer,
        pomodoro_count: u32,
    },
    Ended {
        timer: Timer,
        pomodoro_count: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    Removed,
    Suspended,
    Resumed,
    ActivityStarted,
    ActivityEnded,
    BreakStarted,
    Stopped,
    Ended,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Tick => "onTick",
            EventKind::Removed => "onTimerRemoved",
            EventKind::Suspended => "onTimerSuspended",
            EventKind::Resumed => "onTimerResumed",
            EventKind::ActivityStarted => "onActivityStarted",
            EventKind::ActivityEnded => "onActivityEnded",
            EventKind::BreakStarted => "onBreakStarted",
            EventKind::Stopped => "onTimerStopped",
            EventKind::Ended => "onTimerEnded",
        };
        f.write_str(name)
    }
}

impl TimerEvent {
    pub fn timer(&self) -> &Timer {
        match self {
            TimerEvent::Tick { timer, .. }
            | TimerEvent::Removed { timer }
            | TimerEvent::Suspended { timer }
            | TimerEvent::Resumed { timer }
            | TimerEvent::ActivityStarted { timer, .. }
            | TimerEvent::ActivityEnded { timer, .. }
            | TimerEvent::BreakStarted { timer, .. }
            | TimerEvent::Stopped { timer, .. }
            | TimerEvent::Ended { timer, .. } => timer,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            TimerEvent::Tick { .. } => EventKind::Tick,
            TimerEvent::Removed { .. } => EventKind::Removed,
            TimerEvent::Suspended { .. } => EventKind::Suspended,
            TimerEvent::Resumed { .. } => EventKind::Resumed,
            TimerEvent::ActivityStarted { .. } => EventKind::ActivityStarted,
            TimerEvent::ActivityEnded { .. } => EventKind::ActivityEnded,
            TimerEvent::BreakStarted { .. } => EventKind::BreakStarted,
            TimerEvent::Stopped { .. } => EventKind::Stopped,
            TimerEvent::Ended { .. } => EventKind::Ended,
        }
    }

    /// Pomodoro count carried by the event, for the kinds that carry one.
    pub fn pomodoro_count(&self) -> Option<u32> {
        match self {
            TimerEvent::ActivityEnded { pomodoro_count, .. }
            | TimerEvent::Stopped { pomodoro_count, .. }
            | TimerEvent::Ended { pomodoro_count, .. } => Some(*pomodoro_count),
            _ => None,
        }
    }

    /// Invoke the callback of `listener` matching this event.
    pub fn dispatch<L: Listener + ?Sized>(&self, listener: &L) {
        match self {
            TimerEvent::Tick {
                timer,
                status,
                elapsed,
                total,
                unit,
            } => listener.on_tick(timer, *status, *elapsed, *total, *unit),
            TimerEvent::Removed { timer } => listener.on_timer_removed(timer),
            TimerEvent::Suspended { timer } => listener.on_timer_suspended(timer),
            TimerEvent::Resumed { timer } => listener.on_timer_resumed(timer),
            TimerEvent::ActivityStarted {
                timer,
                duration,
                unit,
            } => listener.on_activity_started(timer, *duration, *unit),
            TimerEvent::ActivityEnded {
                timer,
                pomodoro_count,
            } => listener.on_activity_ended(timer, *pomodoro_count),
            TimerEvent::BreakStarted {
                timer,
                duration,
                unit,
            } => listener.on_break_started(timer, *duration, *unit),
            TimerEvent::Stopped {
                timer,
                pomodoro_count,
            } => listener.on_timer_stopped(timer, *pomodoro_count),
            TimerEvent::Ended {
                timer,
                pomodoro_count,
            } => listener.on_timer_ended(timer, *pomodoro_count),
        }
    }
}

/// Observer of timer lifecycle events.
///
/// Every callback defaults to a no-op, so implementors override only what
/// they care about. Callbacks run on the single delivery thread: a slow
/// callback delays every later event of the manager.
#[allow(unused_variables)]
pub trait Listener: Send + Sync {
    /// Entry point used by the event bus. Routes to the typed callbacks
    /// unless overridden.
    fn on_event(&self, event: &TimerEvent) {
        event.dispatch(self);
    }

    fn on_tick(&self, timer: &Timer, status: TimerStatus, elapsed: u64, total: u64, unit: TimeUnit) {
    }

    fn on_timer_removed(&self, timer: &Timer) {}

    fn on_timer_suspended(&self, timer: &Timer) {}

    fn on_timer_resumed(&self, timer: &Timer) {}

    fn on_activity_started(&self, timer: &Timer, duration: u64, unit: TimeUnit) {}

    fn on_activity_ended(&self, timer: &Timer, pomodoro_count: u32) {}

    fn on_break_started(&self, timer: &Timer, duration: u64, unit: TimeUnit) {}

    fn on_timer_stopped(&self, timer: &Timer, pomodoro_count: u32) {}

    fn on_timer_ended(&self, timer: &Timer, pomodoro_count: u32) {}
}

/// Listener receiving every event through a single closure.
pub struct FnListener<F>(pub F);

impl<F> Listener for FnListener<F>
where
    F: Fn(&TimerEvent) + Send + Sync,
{
    fn on_event(&self, event: &TimerEvent) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ExecutionSchedule;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct EndCounter {
        ended: Mutex<Vec<u32>>,
    }

    impl Listener for EndCounter {
        fn on_timer_ended(&self, _timer: &Timer, pomodoro_count: u32) {
            self.ended.lock().unwrap().push(pomodoro_count);
        }
    }

    fn timer() -> Timer {
        Timer::new(
            "sam".into(),
            true,
            ExecutionSchedule::empty(),
            TimeUnit::Seconds,
            CancellationToken::new(),
        )
    }

    #[test]
    fn dispatch_routes_to_matching_callback_only() {
        let listener = EndCounter::default();
        let t = timer();
        TimerEvent::Ended {
            timer: t.clone(),
            pomodoro_count: 3,
        }
        .dispatch(&listener);
        TimerEvent::Removed { timer: t }.dispatch(&listener);
        assert_eq!(*listener.ended.lock().unwrap(), vec![3]);
    }

    #[test]
    fn fn_listener_sees_every_kind() {
        let seen = Mutex::new(Vec::new());
        let listener = FnListener(|e: &TimerEvent| seen.lock().unwrap().push(e.kind()));
        let t = timer();
        listener.on_event(&TimerEvent::Suspended { timer: t.clone() });
        listener.on_event(&TimerEvent::Resumed { timer: t });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::Suspended, EventKind::Resumed]
        );
    }

    #[test]
    fn kind_names_match_callbacks() {
        assert_eq!(EventKind::Tick.to_string(), "onTick");
        assert_eq!(EventKind::Ended.to_string(), "onTimerEnded");
    }
}
