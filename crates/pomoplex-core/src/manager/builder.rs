use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::TimerManager;
use crate::bus::EventBus;
use crate::error::ConfigError;
use crate::events::Listener;
use crate::storage::ManagerConfig;
use crate::timer::{ExecutionSchedule, TimeUnit};

const DEFAULT_MAX_ACTIVE_TIMERS: usize = 5;
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Event queue slots per pool slot when no capacity is configured.
const QUEUE_SLOTS_PER_WORKER: usize = 100;

/// Configures and builds a [`TimerManager`].
pub struct TimerManagerBuilder {
    listeners: Vec<Arc<dyn Listener>>,
    max_active_timers: usize,
    time_unit: TimeUnit,
    schedule: ExecutionSchedule,
    talk: bool,
    shutdown_grace: Duration,
    event_queue_capacity: Option<usize>,
}

impl Default for TimerManagerBuilder {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            max_active_timers: DEFAULT_MAX_ACTIVE_TIMERS,
            time_unit: TimeUnit::Minutes,
            schedule: ExecutionSchedule::classic(),
            talk: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            event_queue_capacity: None,
        }
    }
}

impl TimerManagerBuilder {
    /// Start from a loaded configuration. Listeners still have to be added.
    pub fn from_config(config: &ManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            listeners: Vec::new(),
            max_active_timers: config.max_active_timers,
            time_unit: config.time_unit,
            schedule: config.schedule()?,
            talk: config.talk,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            event_queue_capacity: config.event_queue_capacity,
        })
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Register a listener the caller keeps a handle to.
    pub fn shared_listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Upper bound on timers making progress at the same time.
    pub fn max_active_timers(mut self, max_active_timers: usize) -> Self {
        self.max_active_timers = max_active_timers;
        self
    }

    pub fn time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Schedule used by timers added without one.
    pub fn execution_schedule(mut self, schedule: impl Into<ExecutionSchedule>) -> Self {
        self.schedule = schedule.into();
        self
    }

    pub fn talk(self) -> Self {
        self.talk_enabled(true)
    }

    pub fn talk_enabled(mut self, talk: bool) -> Self {
        self.talk = talk;
        self
    }

    /// How long shutdown waits for engines, and then for event delivery.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Result<TimerManager, ConfigError> {
        if self.max_active_timers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_active_timers".into(),
                message: "must be a positive integer".into(),
            });
        }
        let capacity = match self.event_queue_capacity {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "event_queue_capacity".into(),
                    message: "must be a positive integer".into(),
                })
            }
            Some(capacity) => capacity,
            None => self.max_active_timers.saturating_mul(QUEUE_SLOTS_PER_WORKER),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.max_active_timers)
            .thread_name("pomoplex-timer")
            .enable_time()
            .build()
            .map_err(|e| ConfigError::Runtime(e.to_string()))?;
        let bus = EventBus::start(self.listeners, capacity, self.talk)
            .map_err(|e| ConfigError::Runtime(e.to_string()))?;

        tracing::debug!(
            max_active_timers = self.max_active_timers,
            unit = %self.time_unit,
            queue_capacity = capacity,
            "timer manager built"
        );

        Ok(TimerManager {
            timers: RwLock::new(Vec::new()),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            engines: TaskTracker::new(),
            pool: Arc::new(Semaphore::new(self.max_active_timers)),
            root: CancellationToken::new(),
            bus,
            default_schedule: self.schedule,
            time_unit: self.time_unit,
            max_active_timers: self.max_active_timers,
            shutdown_grace: self.shutdown_grace,
            shut_down: AtomicBool::new(false),
        })
    }
}
