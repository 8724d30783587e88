//! Event bus between producers (engines, manager) and listeners.
//!
//! One bounded queue, one delivery thread. Events are delivered strictly in
//! enqueue order and every listener sees an event before the next one is
//! taken off the queue. A full queue blocks the producer, including
//! synchronous callers sitting inside some other runtime; nothing is
//! dropped. There is no per-listener isolation: a listener that stalls
//! delays every later event, and one that never returns wedges delivery
//! until shutdown gives up on it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::events::{Listener, TimerEvent};
use crate::timer::Timer;

const DELIVERY_THREAD_NAME: &str = "pomoplex-events";

/// Producer side of the bus. Cheap to clone; one per engine.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<TimerEvent>,
    global_talk: Arc<AtomicBool>,
}

impl EventSink {
    /// Events reach listeners only when both the manager-wide and the
    /// timer's own talk flags are set.
    pub(crate) fn is_talking(&self, timer: &Timer) -> bool {
        self.global_talk.load(Ordering::Acquire) && timer.talk_enabled()
    }

    /// Queue an event from async context, waiting for room if the queue
    /// is full.
    pub(crate) async fn emit(&self, event: TimerEvent) {
        if !self.is_talking(event.timer()) {
            return;
        }
        if self.tx.send(event).await.is_err() {
            tracing::trace!("event delivery closed, dropping event");
        }
    }

    /// Queue an event from synchronous code, blocking while the queue is
    /// full.
    pub(crate) fn emit_blocking(&self, event: TimerEvent) {
        if !self.is_talking(event.timer()) {
            return;
        }
        let sent = outside_runtime(|| self.tx.blocking_send(event).is_ok());
        if sent != Some(true) {
            tracing::trace!("event delivery closed, dropping event");
        }
    }
}

/// Run a blocking closure where blocking is allowed. Inside an async context
/// the closure runs on a scoped helper thread and the caller waits for it.
/// Returns `None` if the closure panicked.
pub(crate) fn outside_runtime<T, F>(f: F) -> Option<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if Handle::try_current().is_err() {
        return Some(f());
    }
    thread::scope(|scope| scope.spawn(f).join().ok())
}

struct DeliveryWorker {
    handle: thread::JoinHandle<()>,
    done: std_mpsc::Receiver<()>,
}

pub(crate) struct EventBus {
    sink: Mutex<Option<EventSink>>,
    worker: Mutex<Option<DeliveryWorker>>,
    global_talk: Arc<AtomicBool>,
}

impl EventBus {
    /// Spawn the delivery thread.
    pub(crate) fn start(
        listeners: Vec<Arc<dyn Listener>>,
        capacity: usize,
        talk: bool,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (done_tx, done) = std_mpsc::channel();
        let handle = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.into())
            .spawn(move || {
                deliver(rx, &listeners);
                let _ = done_tx.send(());
            })?;

        let global_talk = Arc::new(AtomicBool::new(talk));
        Ok(Self {
            sink: Mutex::new(Some(EventSink {
                tx,
                global_talk: Arc::clone(&global_talk),
            })),
            worker: Mutex::new(Some(DeliveryWorker { handle, done })),
            global_talk,
        })
    }

    /// A producer handle, or `None` once the bus has been closed.
    pub(crate) fn sink(&self) -> Option<EventSink> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_talk(&self, talk: bool) {
        self.global_talk.store(talk, Ordering::Release);
    }

    pub(crate) fn talk(&self) -> bool {
        self.global_talk.load(Ordering::Acquire)
    }

    /// Drop the bus' own producer handle. Delivery finishes once every
    /// other sink is gone and the queue is drained.
    pub(crate) fn close(&self) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Wait up to `grace` for the delivery thread to drain and exit.
    /// Returns `false` if it is still busy; the thread is then detached.
    pub(crate) fn join(&self, grace: Duration) -> bool {
        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return true;
        };

        match worker.done.recv_timeout(grace) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                true
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "event delivery did not drain in time, abandoning it"
                );
                false
            }
        }
    }
}

fn deliver(mut rx: mpsc::Receiver<TimerEvent>, listeners: &[Arc<dyn Listener>]) {
    while let Some(event) = rx.blocking_recv() {
        for (index, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if let Err(payload) = outcome {
                tracing::warn!(
                    listener = index,
                    event = %event.kind(),
                    timer = %event.timer().name(),
                    "listener panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    tracing::debug!("event delivery finished");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, FnListener};
    use crate::timer::{ExecutionSchedule, TimeUnit};
    use tokio_util::sync::CancellationToken;

    fn timer(name: &str, talk: bool) -> Timer {
        Timer::new(
            name.into(),
            talk,
            ExecutionSchedule::empty(),
            TimeUnit::Seconds,
            CancellationToken::new(),
        )
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Listener>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn Listener> = Arc::new(FnListener(move |e: &TimerEvent| {
            sink.lock()
                .unwrap()
                .push(format!("{}:{}", e.timer().name(), e.kind()));
        }));
        (seen, listener)
    }

    #[test]
    fn delivers_in_order_to_every_listener() {
        let (first, a) = recorder();
        let (second, b) = recorder();
        let bus = EventBus::start(vec![a, b], 8, true).unwrap();
        let sink = bus.sink().unwrap();
        let t = timer("sam", true);
        sink.emit_blocking(TimerEvent::Suspended { timer: t.clone() });
        sink.emit_blocking(TimerEvent::Resumed { timer: t });
        drop(sink);
        bus.close();
        assert!(bus.join(Duration::from_secs(2)));

        let expected = vec!["sam:onTimerSuspended", "sam:onTimerResumed"];
        assert_eq!(*first.lock().unwrap(), expected);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[test]
    fn muted_events_are_not_delivered() {
        let (seen, listener) = recorder();
        let bus = EventBus::start(vec![listener], 8, true).unwrap();
        let sink = bus.sink().unwrap();
        sink.emit_blocking(TimerEvent::Removed {
            timer: timer("quiet", false),
        });
        bus.set_talk(false);
        sink.emit_blocking(TimerEvent::Removed {
            timer: timer("loud", true),
        });
        bus.set_talk(true);
        sink.emit_blocking(TimerEvent::Removed {
            timer: timer("heard", true),
        });
        drop(sink);
        bus.close();
        assert!(bus.join(Duration::from_secs(2)));
        assert_eq!(*seen.lock().unwrap(), vec!["heard:onTimerRemoved"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let (seen, recorder) = recorder();
        let boom: Arc<dyn Listener> = Arc::new(FnListener(|e: &TimerEvent| {
            if e.kind() == EventKind::Suspended {
                panic!("listener failure");
            }
        }));
        let bus = EventBus::start(vec![boom, recorder], 8, true).unwrap();
        let sink = bus.sink().unwrap();
        let t = timer("sam", true);
        sink.emit_blocking(TimerEvent::Suspended { timer: t.clone() });
        sink.emit_blocking(TimerEvent::Resumed { timer: t });
        drop(sink);
        bus.close();
        assert!(bus.join(Duration::from_secs(2)));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["sam:onTimerSuspended", "sam:onTimerResumed"]
        );
    }

    #[test]
    fn stalled_listener_is_abandoned_after_grace() {
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let stall: Arc<dyn Listener> = Arc::new(FnListener(move |_: &TimerEvent| {
            let _ = release_rx.lock().unwrap().recv();
        }));
        let bus = EventBus::start(vec![stall], 8, true).unwrap();
        let sink = bus.sink().unwrap();
        sink.emit_blocking(TimerEvent::Removed {
            timer: timer("sam", true),
        });
        drop(sink);
        bus.close();
        assert!(!bus.join(Duration::from_millis(200)));
        // A second join has nothing left to wait for.
        assert!(bus.join(Duration::from_millis(10)));
        drop(release_tx);
    }

    #[tokio::test]
    async fn full_queue_blocks_async_callers_instead_of_dropping() {
        let (seen, recorder) = recorder();
        let slow: Arc<dyn Listener> = Arc::new(FnListener(|_: &TimerEvent| {
            thread::sleep(Duration::from_millis(50));
        }));
        let bus = EventBus::start(vec![slow, recorder], 1, true).unwrap();
        let sink = bus.sink().unwrap();
        let t = timer("sam", true);
        for _ in 0..3 {
            sink.emit_blocking(TimerEvent::Suspended { timer: t.clone() });
            sink.emit_blocking(TimerEvent::Resumed { timer: t.clone() });
        }
        drop(sink);
        bus.close();
        assert!(bus.join(Duration::from_secs(2)));
        assert_eq!(seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn closed_bus_hands_out_no_sink() {
        let bus = EventBus::start(Vec::new(), 1, true).unwrap();
        bus.close();
        assert!(bus.sink().is_none());
        assert!(bus.join(Duration::from_secs(1)));
    }
}
