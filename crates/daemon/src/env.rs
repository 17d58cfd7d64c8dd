// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the master.

use std::os::fd::RawFd;
use std::path::PathBuf;

/// Listener executable the master spawns; set by the deployment (or by
/// the specs, which point it at a stub).
pub const LISTENER_EXEC: &str = "RESQUED_LISTENER";

/// Numeric descriptor of the inherited status pipe, when a supervisor
/// wants lifecycle events.
pub const STATUS_FD: &str = "RESQUED_STATUS_FD";

/// Tracing filter directive (defaults to `info`).
pub const LOG_FILTER: &str = "RESQUED_LOG";

pub fn listener_exec() -> Option<PathBuf> {
    std::env::var_os(LISTENER_EXEC).map(PathBuf::from)
}

pub fn status_fd() -> Option<RawFd> {
    std::env::var(STATUS_FD).ok().and_then(|s| s.parse().ok())
}
