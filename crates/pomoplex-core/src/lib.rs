//! # pomoplex Core Library
//!
//! This library runs many independently named interval timers at once. Each
//! timer walks a fixed schedule of alternating activity and break spans and
//! reports its progress to any number of listeners.
//!
//! ## Architecture
//!
//! - **Timer Engine**: per-timer async state machine stepping through the
//!   schedule on a monotonic clock, honouring suspend and stop signals
//! - **Timer Manager**: name-keyed registry, bounded engine pool and the
//!   synchronous control surface
//! - **Event Bus**: one bounded queue and one delivery thread so engines never
//!   wait on listener code, only on queue space
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerManager`]: Build, control and shut down a set of timers
//! - [`Timer`]: Read-only view of one timer
//! - [`Listener`]: Observer trait with no-op defaults
//! - [`Config`]: Application configuration management
//!
//! ## Usage
//!
//! ```no_run
//! use pomoplex_core::{ExecutionSchedule, FnListener, TimeUnit, TimerEvent, TimerManager};
//!
//! let manager = TimerManager::builder()
//!     .time_unit(TimeUnit::Seconds)
//!     .max_active_timers(3)
//!     .talk()
//!     .listener(FnListener(|e: &TimerEvent| println!("{}: {}", e.timer().name(), e.kind())))
//!     .build()?;
//! manager.add("sam", Some(ExecutionSchedule::from([2, 1])))?;
//! manager.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bus;
pub mod error;
pub mod events;
pub mod manager;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, ErrorKind, Result, TimerError, TransitionReason, ValidationError};
pub use events::{EventKind, FnListener, Listener, TimerEvent};
pub use manager::{ShutdownReport, TimerManager, TimerManagerBuilder};
pub use storage::{CliConfig, Config, ManagerConfig};
pub use timer::{ExecutionSchedule, SlotKind, TimeUnit, Timer, TimerStatus};
