mod engine;
mod handle;
mod schedule;

pub(crate) use engine::TimerEngine;
pub use handle::{Timer, TimerStatus};
pub use schedule::{ExecutionSchedule, SlotKind, TimeUnit};
