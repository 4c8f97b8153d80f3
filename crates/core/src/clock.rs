// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so scheduling decisions can be driven by tests.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic time, used for measuring durations.
    fn now(&self) -> Instant;

    /// Wall-clock time, used for due times and generation timestamps.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct FakeClockState {
    instant: Instant,
    utc: DateTime<Utc>,
}

/// Manually advanced clock for tests.
///
/// Both the monotonic and the wall-clock readings move together on `advance`.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

impl FakeClock {
    /// Start at 2026-01-01T00:00:00Z.
    pub fn new() -> Self {
        let utc = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self::at(utc)
    }

    /// Start at the given wall-clock time.
    pub fn at(utc: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                instant: Instant::now(),
                utc,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock();
        state.instant += by;
        state.utc += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }

    /// Jump the wall clock to `utc`, advancing the monotonic reading by the same amount.
    pub fn set_utc(&self, utc: DateTime<Utc>) {
        let mut state = self.inner.lock();
        if let Ok(delta) = (utc - state.utc).to_std() {
            state.instant += delta;
        }
        state.utc = utc;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().instant
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.inner.lock().utc
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
