// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events fed to the master loop by the per-listener pump tasks.
//!
//! Ordering contract: a listener's `Line` events arrive in emission order,
//! and its `Reaped` event arrives only after the socket reached EOF and
//! every buffered line was delivered. Nothing is guaranteed across
//! listeners.

use std::process::ExitStatus;

#[derive(Debug)]
pub enum MasterEvent {
    /// One newline-terminated report read from a listener's status socket.
    Line { pid: u32, line: String },
    /// The listener child exited and was waited on.
    Reaped { pid: u32, status: ExitStatus },
}
