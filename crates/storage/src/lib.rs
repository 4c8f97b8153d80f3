// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for rollcron: generation registry and audit log

mod audit;
mod registry;
mod state_file;

pub use audit::{
    read_entries, read_job_entries, AuditEntry, AuditError, AuditLog, AUDIT_ROTATIONS,
    MAX_AUDIT_SIZE,
};
pub use registry::{JobHistory, Registry, RegistryError, RegistryStore, REGISTRY_VERSION};
pub use state_file::{
    numbered_path, rotate_bak_path, rotate_if_larger, tmp_path_for, write_atomic, FsStateWriter,
    StateWriter,
};
