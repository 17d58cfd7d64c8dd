// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire grammar for the listener status socket.
//!
//! Listeners write newline-terminated ASCII reports upstream; the master
//! writes `worker <pid> stop` forwards back down the same socket. Parsing
//! is total: an unrecognised line is an error the master logs and drops,
//! never a reason to kill the listener.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One report read from (or written to) a listener socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerReport {
    /// The listener finished booting and is ready to accept workers.
    Running,
    /// The listener forked a worker with this pid.
    WorkerStart(u32),
    /// A worker finished its job.
    WorkerStop(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportParseError {
    #[error("empty report line")]
    Empty,

    #[error("unrecognised report: {0:?}")]
    Unrecognised(String),

    #[error("invalid worker pid: {0:?}")]
    InvalidPid(String),
}

impl FromStr for ListenerReport {
    type Err = ReportParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ReportParseError::Empty);
        }

        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next(), words.next()) {
            (Some("running"), None, ..) => Ok(ListenerReport::Running),
            (Some("worker"), Some(pid), Some(verb), None) => {
                let pid: u32 = pid
                    .parse()
                    .map_err(|_| ReportParseError::InvalidPid(pid.to_string()))?;
                match verb {
                    "start" => Ok(ListenerReport::WorkerStart(pid)),
                    "stop" => Ok(ListenerReport::WorkerStop(pid)),
                    _ => Err(ReportParseError::Unrecognised(line.to_string())),
                }
            }
            _ => Err(ReportParseError::Unrecognised(line.to_string())),
        }
    }
}

impl fmt::Display for ListenerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerReport::Running => write!(f, "running"),
            ListenerReport::WorkerStart(pid) => write!(f, "worker {pid} start"),
            ListenerReport::WorkerStop(pid) => write!(f, "worker {pid} stop"),
        }
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
