// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events emitted on the outward status pipe.
//!
//! Wire form: `<kind>,<pid>,<state>` — comma separated, newline
//! terminated, ASCII. `ready` is emitted for listeners only, which the
//! constructors enforce.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Listener,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Start,
    Ready,
    Stop,
}

/// One line of the status stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub pid: u32,
    pub state: StatusState,
}

impl StatusEvent {
    pub fn listener_start(pid: u32) -> Self {
        Self {
            kind: StatusKind::Listener,
            pid,
            state: StatusState::Start,
        }
    }

    pub fn listener_ready(pid: u32) -> Self {
        Self {
            kind: StatusKind::Listener,
            pid,
            state: StatusState::Ready,
        }
    }

    pub fn listener_stop(pid: u32) -> Self {
        Self {
            kind: StatusKind::Listener,
            pid,
            state: StatusState::Stop,
        }
    }

    pub fn worker_start(pid: u32) -> Self {
        Self {
            kind: StatusKind::Worker,
            pid,
            state: StatusState::Start,
        }
    }

    pub fn worker_stop(pid: u32) -> Self {
        Self {
            kind: StatusKind::Worker,
            pid,
            state: StatusState::Stop,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Listener => f.write_str("listener"),
            StatusKind::Worker => f.write_str("worker"),
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusState::Start => f.write_str("start"),
            StatusState::Ready => f.write_str("ready"),
            StatusState::Stop => f.write_str("stop"),
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.kind, self.pid, self.state)
    }
}
