// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outward status pipe for an external observer.
//!
//! Best-effort by contract: the first write failure is logged, everything
//! after that is dropped silently, and the loop never stops for it.

use std::fs::File;
use std::io::Write;
use std::os::fd::{FromRawFd, RawFd};

use tracing::warn;

use resqued_core::StatusEvent;

enum Sink {
    File(File),
    #[cfg(test)]
    Memory(std::sync::Arc<parking_lot::Mutex<Vec<String>>>),
}

pub struct StatusReporter {
    sink: Option<Sink>,
    failed: bool,
}

impl StatusReporter {
    /// Reporter with nowhere to write; every emit is a no-op.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            failed: false,
        }
    }

    /// Adopt the descriptor inherited from a supervisor. Returns `None`
    /// when the fd is not actually open, so the caller can log and run
    /// without a reporter instead of writing into the void.
    pub fn from_fd(fd: RawFd) -> Option<Self> {
        // SAFETY: F_GETFD only probes the descriptor; no ownership yet.
        let open = unsafe { libc::fcntl(fd, libc::F_GETFD) } != -1;
        if !open {
            return None;
        }
        // SAFETY: the fd is open (checked above) and was handed to this
        // process for exactly this purpose; ownership is taken once, here.
        let file = unsafe { File::from_raw_fd(fd) };
        Some(Self {
            sink: Some(Sink::File(file)),
            failed: false,
        })
    }

    /// In-memory reporter for unit tests.
    #[cfg(test)]
    pub fn memory() -> (Self, std::sync::Arc<parking_lot::Mutex<Vec<String>>>) {
        let lines = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        (
            Self {
                sink: Some(Sink::Memory(lines.clone())),
                failed: false,
            },
            lines,
        )
    }

    pub fn emit(&mut self, event: StatusEvent) {
        if self.failed {
            return;
        }
        let Some(sink) = &mut self.sink else {
            return;
        };
        let result = match sink {
            Sink::File(file) => writeln!(file, "{event}"),
            #[cfg(test)]
            Sink::Memory(lines) => {
                lines.lock().push(event.to_string());
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(error = %err, "status pipe write failed, dropping further events");
            self.failed = true;
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
