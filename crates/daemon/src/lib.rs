// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rollcron daemon library
//!
//! Lifecycle (lock, logging, signal loop) and the one-shot commands behind
//! the `rollcron` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod commands;
pub mod env;
pub mod lifecycle;

pub use lifecycle::{
    acquire_lock, setup_logging, Daemon, DaemonRuntime, LifecycleError, Paths,
    STARTUP_MARKER_PREFIX,
};
