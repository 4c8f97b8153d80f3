// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rollcron configuration: TOML job definitions and runner settings

mod def;
mod parser;

pub use def::{ConfigFile, JobDef, RetentionDef, RetryDef, RunnerDef};
pub use parser::{load_config, parse_config, Config, ConfigError, RunnerSettings};

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "rollcron.toml";
