// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedules and the due-time trigger.
//!
//! Everything here is a pure function of a schedule and a timestamp; the
//! scheduler loop owns the clock and the sleeping.

use crate::calendar::CalendarExpr;
use crate::time_fmt::{format_duration, parse_duration};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Malformed cadence. Fatal at configuration load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("empty schedule")]
    Empty,
    #[error("invalid interval '{0}': {1}")]
    InvalidInterval(String, String),
    #[error("interval must be at least 1ms")]
    ZeroInterval,
    #[error("calendar expression needs 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown schedule macro '{0}'")]
    UnknownMacro(String),
    #[error("calendar expression '{0}' never fires")]
    NeverFires(String),
    #[error("only calendar schedules take a timezone")]
    TimezoneOnInterval,
}

/// When a job is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every `every`, aligned to multiples of `every` since `anchor`.
    Interval {
        every: Duration,
        anchor: DateTime<Utc>,
    },
    /// Minute-resolution calendar pattern, evaluated in its time zone
    /// (UTC unless configured).
    Calendar(CalendarExpr),
}

impl Schedule {
    /// Interval schedule aligned to the Unix epoch.
    pub fn every(every: Duration) -> Result<Self, ScheduleError> {
        Self::every_from(every, DateTime::UNIX_EPOCH)
    }

    /// Interval schedule aligned to a custom anchor.
    pub fn every_from(every: Duration, anchor: DateTime<Utc>) -> Result<Self, ScheduleError> {
        if every.as_millis() == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        Ok(Schedule::Interval { every, anchor })
    }

    /// Parse `"60s"`-style intervals, 5-field calendar patterns and `@daily`-style macros.
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if s.starts_with('@') || s.split_whitespace().count() > 1 {
            return CalendarExpr::parse(s).map(Schedule::Calendar);
        }
        let every =
            parse_duration(s).map_err(|e| ScheduleError::InvalidInterval(s.to_string(), e))?;
        Self::every(every)
    }

    /// Evaluate a calendar schedule in `tz`.
    ///
    /// Interval schedules are absolute and have no time zone.
    pub fn with_timezone(self, tz: Tz) -> Result<Self, ScheduleError> {
        match self {
            Schedule::Calendar(expr) => Ok(Schedule::Calendar(expr.with_timezone(tz))),
            Schedule::Interval { .. } => Err(ScheduleError::TimezoneOnInterval),
        }
    }

    /// Next due time strictly after `after`.
    ///
    /// `None` only when a calendar pattern has no further match or the
    /// result would overflow the representable range.
    pub fn next_due(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Interval { every, anchor } => {
                let every_ms = i64::try_from(every.as_millis()).ok()?;
                if after < *anchor {
                    return Some(*anchor);
                }
                let elapsed_ms = (after - *anchor).num_milliseconds();
                let ticks = elapsed_ms.div_euclid(every_ms).checked_add(1)?;
                let offset = chrono::Duration::try_milliseconds(ticks.checked_mul(every_ms)?)?;
                anchor.checked_add_signed(offset)
            }
            Schedule::Calendar(expr) => expr.next_after(after),
        }
    }

    /// First due time at or after `at`.
    pub fn first_due(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Interval { .. } => {
                let prev = at.checked_sub_signed(chrono::Duration::milliseconds(1))?;
                self.next_due(prev)
                    .map(|due| if due < at { self.next_due(at) } else { Some(due) })?
            }
            Schedule::Calendar(expr) => expr.first_at_or_after(at),
        }
    }

    /// Initial due time at startup given the last dispatched due time.
    ///
    /// If one or more due times were missed while the daemon was down,
    /// a single catch-up run is due immediately; the backlog is not replayed.
    pub fn resume_due(
        &self,
        last_due: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DueTime> {
        match last_due {
            Some(last) => match self.next_due(last) {
                Some(missed) if missed <= now => Some(DueTime::catch_up(now)),
                other => other.map(DueTime::regular),
            },
            None => self.first_due(now).map(DueTime::regular),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval { every, .. } => write!(f, "every {}", format_duration(*every)),
            Schedule::Calendar(expr) if expr.timezone() == Tz::UTC => {
                write!(f, "cron '{}'", expr)
            }
            Schedule::Calendar(expr) => write!(f, "cron '{}' {}", expr, expr.timezone()),
        }
    }
}

/// A due time, flagged when it stands in for missed ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DueTime {
    pub at: DateTime<Utc>,
    pub catch_up: bool,
}

impl DueTime {
    pub fn regular(at: DateTime<Utc>) -> Self {
        Self {
            at,
            catch_up: false,
        }
    }

    pub fn catch_up(at: DateTime<Utc>) -> Self {
        Self { at, catch_up: true }
    }
}

/// Free-function form of [`Schedule::next_due`].
pub fn next_due(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.next_due(after)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
