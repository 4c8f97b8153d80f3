// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calendar patterns in the classic 5-field cron layout.
//!
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12 or JAN-DEC)
//! │ │ │ │ ┌───────────── day of week (0-7 or SUN-SAT, 0 and 7 = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Matching is a pure predicate over a [`CalendarTime`], so it can be tested
//! without driving the search loop.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::fmt;

use crate::schedule::ScheduleError;

/// Longest gap searched for the next match (covers leap-day-only patterns).
const MAX_SEARCH_DAYS: u32 = 8 * 366;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// A timestamp decomposed into the fields a calendar pattern inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
    /// 0 = Sunday
    pub weekday: u32,
}

impl CalendarTime {
    pub fn from_utc(dt: &DateTime<Utc>) -> Self {
        Self::from_local(dt)
    }

    /// Decompose `dt` in its own time zone.
    pub fn from_local<T: TimeZone>(dt: &DateTime<T>) -> Self {
        Self {
            minute: dt.minute(),
            hour: dt.hour(),
            day: dt.day(),
            month: dt.month(),
            weekday: dt.weekday().num_days_from_sunday(),
        }
    }
}

/// One field of a calendar pattern: the set of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarField {
    values: BTreeSet<u32>,
    /// False when written as `*` (matters for day-of-month / day-of-week).
    restricted: bool,
}

impl CalendarField {
    fn parse(
        name: &'static str,
        expr: &str,
        min: u32,
        max: u32,
        names: &[&str],
    ) -> Result<Self, ScheduleError> {
        let invalid = |reason: String| ScheduleError::InvalidField {
            field: name,
            value: expr.to_string(),
            reason,
        };

        let mut values = BTreeSet::new();
        let restricted = !expr.trim().starts_with('*');

        for part in expr.split(',') {
            let part = part.trim();
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| invalid(format!("invalid step '{step}'")))?;
                    if step == 0 {
                        return Err(invalid("step must be positive".to_string()));
                    }
                    (range, step)
                }
                None => (part, 1),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((lo, hi)) = range.split_once('-') {
                let lo = parse_value(lo, names, min).map_err(&invalid)?;
                let hi = parse_value(hi, names, min).map_err(&invalid)?;
                if lo > hi {
                    return Err(invalid(format!("range {lo}-{hi} is reversed")));
                }
                (lo, hi)
            } else {
                let v = parse_value(range, names, min).map_err(&invalid)?;
                // `5/15` means "from 5 to the end, every 15"
                if step > 1 {
                    (v, max)
                } else {
                    (v, v)
                }
            };

            if start < min || end > max {
                return Err(invalid(format!("out of range [{min}, {max}]")));
            }

            values.extend((start..=end).step_by(step as usize));
        }

        Ok(Self { values, restricted })
    }

    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    /// Smallest allowed value >= `value`.
    fn next_from(&self, value: u32) -> Option<u32> {
        self.values.range(value..).next().copied()
    }
}

fn parse_value(raw: &str, names: &[&str], offset: u32) -> Result<u32, String> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(v);
    }
    let lower = raw.to_ascii_lowercase();
    names
        .iter()
        .position(|n| *n == lower)
        .map(|i| i as u32 + offset)
        .ok_or_else(|| format!("invalid value '{raw}'"))
}

/// A parsed calendar pattern, matched against wall-clock time in `tz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarExpr {
    source: String,
    tz: Tz,
    minute: CalendarField,
    hour: CalendarField,
    day_of_month: CalendarField,
    month: CalendarField,
    day_of_week: CalendarField,
}

impl CalendarExpr {
    /// Parse a 5-field expression or one of the `@hourly`-style macros.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let trimmed = expr.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            "@weekly" => "0 0 * * 0",
            "@monthly" => "0 0 1 * *",
            "@yearly" | "@annually" => "0 0 1 1 *",
            s if s.starts_with('@') => {
                return Err(ScheduleError::UnknownMacro(trimmed.to_string()));
            }
            _ => trimmed,
        };

        let parts: Vec<&str> = expanded.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ScheduleError::FieldCount(parts.len()));
        }

        let mut day_of_week = CalendarField::parse("day-of-week", parts[4], 0, 7, &WEEKDAY_NAMES)?;
        // 7 is an alias for Sunday
        if day_of_week.values.remove(&7) {
            day_of_week.values.insert(0);
        }

        let parsed = Self {
            source: trimmed.to_string(),
            tz: Tz::UTC,
            minute: CalendarField::parse("minute", parts[0], 0, 59, &[])?,
            hour: CalendarField::parse("hour", parts[1], 0, 23, &[])?,
            day_of_month: CalendarField::parse("day-of-month", parts[2], 1, 31, &[])?,
            month: CalendarField::parse("month", parts[3], 1, 12, &MONTH_NAMES)?,
            day_of_week,
        };

        // Reject patterns such as "0 0 31 2 *" that can never fire
        let epoch = DateTime::from_timestamp(946_684_800, 0);
        if epoch.and_then(|p| parsed.next_after(p)).is_none() {
            return Err(ScheduleError::NeverFires(trimmed.to_string()));
        }
        Ok(parsed)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the pattern in `tz` instead of UTC.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Pure predicate: does this decomposed time satisfy the pattern?
    pub fn matches(&self, t: &CalendarTime) -> bool {
        self.minute.matches(t.minute)
            && self.hour.matches(t.hour)
            && self.month.matches(t.month)
            && self.day_matches(t.day, t.weekday)
    }

    /// Cron day semantics: when both day fields are restricted either may match.
    fn day_matches(&self, day: u32, weekday: u32) -> bool {
        let dom = self.day_of_month.matches(day);
        let dow = self.day_of_week.matches(weekday);
        match (self.day_of_month.restricted, self.day_of_week.restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        }
    }

    /// Smallest minute-aligned time strictly after `after` matching the pattern.
    ///
    /// Wall-clock times repeated by a DST fall-back fire on their first
    /// occurrence only; times skipped by a spring-forward fire an hour later.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.tz).naive_local();
        let floor = local.with_second(0)?.with_nanosecond(0)?;
        let start = floor + Duration::minutes(1);

        let mut date = start.date();
        let mut earliest = (start.hour(), start.minute());

        for _ in 0..MAX_SEARCH_DAYS {
            if self.date_matches(date) {
                let mut from = earliest;
                while let Some((h, m)) = self.first_time_from(from) {
                    let candidate = date.and_hms_opt(h, m, 0)?;
                    if let Some(at) = self.resolve(candidate).filter(|at| *at > after) {
                        return Some(at);
                    }
                    from = (h, m + 1);
                }
            }
            date = date.succ_opt()?;
            earliest = (0, 0);
        }
        None
    }

    /// Map a wall-clock time in `tz` to an instant.
    fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        let at = match self.tz.from_local_datetime(&local) {
            LocalResult::Single(at) => at,
            LocalResult::Ambiguous(first, _) => first,
            LocalResult::None => self
                .tz
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()?,
        };
        Some(at.with_timezone(&Utc))
    }

    /// Smallest matching time >= `at`.
    pub fn first_at_or_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let aligned = at.second() == 0 && at.nanosecond() == 0;
        if aligned && self.matches(&CalendarTime::from_local(&at.with_timezone(&self.tz))) {
            return Some(at);
        }
        self.next_after(at)
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        self.month.matches(date.month())
            && self.day_matches(date.day(), date.weekday().num_days_from_sunday())
    }

    fn first_time_from(&self, (hour, minute): (u32, u32)) -> Option<(u32, u32)> {
        let mut h = self.hour.next_from(hour)?;
        loop {
            let from_minute = if h == hour { minute } else { 0 };
            if let Some(m) = self.minute.next_from(from_minute) {
                return Some((h, m));
            }
            h = self.hour.next_from(h + 1)?;
        }
    }
}

impl fmt::Display for CalendarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
#[path = "calendar_tests.rs"]
mod tests;
