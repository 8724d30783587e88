use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Unit every slot duration of a manager is expressed in.
///
/// Only whole-second (or coarser) units exist; sub-second names are
/// rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn as_secs(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }

    /// Duration of `units` whole units.
    ///
    /// Uses saturating arithmetic so huge schedules cannot overflow.
    pub fn span(self, units: u64) -> Duration {
        Duration::from_secs(units.saturating_mul(self.as_secs()))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            "ms" | "milli" | "millis" | "millisecond" | "milliseconds" | "us" | "micro"
            | "micros" | "microsecond" | "microseconds" | "ns" | "nano" | "nanos"
            | "nanosecond" | "nanoseconds" => Err(ValidationError::InvalidValue {
                field: "time_unit".into(),
                message: "Time units shorter than a second are not allowed.".into(),
            }),
            other => Err(ValidationError::InvalidValue {
                field: "time_unit".into(),
                message: format!("unknown time unit '{other}'"),
            }),
        }
    }
}

impl Serialize for TimeUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Activity,
    Break,
}

impl SlotKind {
    pub fn of(index: usize) -> Self {
        if index % 2 == 0 {
            SlotKind::Activity
        } else {
            SlotKind::Break
        }
    }
}

/// Ordered slot durations, alternating activity (even index) and break
/// (odd index). Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionSchedule {
    slots: Vec<u64>,
}

impl ExecutionSchedule {
    pub fn new(slots: Vec<u64>) -> Self {
        Self { slots }
    }

    pub fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    /// Build from signed input, rejecting negative durations.
    pub fn try_from_signed(slots: &[i64]) -> Result<Self, ValidationError> {
        let slots = slots
            .iter()
            .map(|&d| {
                u64::try_from(d).map_err(|_| ValidationError::InvalidValue {
                    field: "execution_schedule".into(),
                    message: "No negative values allowed.".into(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    /// The classic four-pomodoro set with a closing long break.
    pub fn classic() -> Self {
        Self::new(vec![25, 5, 25, 5, 25, 5, 25, 5, 15])
    }

    pub fn slots(&self) -> &[u64] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<u64> {
        self.slots.get(index).copied()
    }

    pub fn kind(&self, index: usize) -> SlotKind {
        SlotKind::of(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of activity slots, which is the pomodoro count a timer
    /// reaches when it runs to completion.
    pub fn activity_count(&self) -> u32 {
        self.slots.len().div_ceil(2) as u32
    }

    pub fn total_units(&self) -> u64 {
        self.slots.iter().fold(0u64, |acc, d| acc.saturating_add(*d))
    }
}

impl Default for ExecutionSchedule {
    fn default() -> Self {
        Self::classic()
    }
}

impl From<Vec<u64>> for ExecutionSchedule {
    fn from(slots: Vec<u64>) -> Self {
        Self::new(slots)
    }
}

impl<const N: usize> From<[u64; N]> for ExecutionSchedule {
    fn from(slots: [u64; N]) -> Self {
        Self::new(slots.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_schedule_has_nine_slots() {
        let s = ExecutionSchedule::default();
        assert_eq!(s.len(), 9);
        assert_eq!(s.activity_count(), 5);
        assert_eq!(s.total_units(), 25 * 4 + 5 * 4 + 15);
    }

    #[test]
    fn activity_count_rounds_toward_activity() {
        assert_eq!(ExecutionSchedule::empty().activity_count(), 0);
        assert_eq!(ExecutionSchedule::from([1]).activity_count(), 1);
        assert_eq!(ExecutionSchedule::from([2, 1]).activity_count(), 1);
        assert_eq!(ExecutionSchedule::from([0, 0, 0, 0]).activity_count(), 2);
        assert_eq!(ExecutionSchedule::from([2, 1, 2, 1, 2]).activity_count(), 3);
    }

    #[test]
    fn slot_kinds_alternate() {
        let s = ExecutionSchedule::from([25, 5, 25]);
        assert_eq!(s.kind(0), SlotKind::Activity);
        assert_eq!(s.kind(1), SlotKind::Break);
        assert_eq!(s.kind(2), SlotKind::Activity);
    }

    #[test]
    fn negative_durations_are_rejected() {
        let err = ExecutionSchedule::try_from_signed(&[25, -5, 25]).unwrap_err();
        assert!(err.to_string().contains("No negative values allowed."));
        let ok = ExecutionSchedule::try_from_signed(&[0, 3]).unwrap();
        assert_eq!(ok.slots(), &[0, 3]);
    }

    #[test]
    fn time_unit_parsing() {
        assert_eq!("seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("MIN".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
        assert_eq!("h".parse::<TimeUnit>().unwrap(), TimeUnit::Hours);
        let err = "millis".parse::<TimeUnit>().unwrap_err();
        assert!(err.to_string().contains("shorter than a second"));
        assert!("fortnights".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn time_unit_span_saturates() {
        assert_eq!(TimeUnit::Minutes.span(2), Duration::from_secs(120));
        assert_eq!(TimeUnit::Days.span(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
