// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff and start jitter

use rand::Rng;
use rollcron_core::RetryConfig;
use std::time::Duration;

/// Upper bound on a single backoff delay, before jitter.
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Delay before retry number `retry` (1-based), without jitter.
///
/// Doubles per retry starting from `delay`, capped at [`MAX_BACKOFF`].
pub fn base_delay(delay: Duration, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(31);
    delay
        .checked_mul(1u32 << exponent)
        .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

/// Full delay before retry number `retry`: exponential base plus random jitter.
pub fn retry_delay(config: &RetryConfig, retry: u32) -> Duration {
    base_delay(config.delay, retry) + random_jitter(config.jitter)
}

/// Uniform random duration in `[0, max]`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
