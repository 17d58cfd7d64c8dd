// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log setup with a reopenable destination so `HUP` plays nicely with
//! logrotate.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

enum Target {
    Stdout,
    File { path: PathBuf, file: File },
}

/// Shared handle to the active log destination. The master keeps a clone
/// to reopen the file on `HUP`.
#[derive(Clone)]
pub struct LogHandle {
    target: Arc<Mutex<Target>>,
}

impl LogHandle {
    pub fn stdout() -> Self {
        Self {
            target: Arc::new(Mutex::new(Target::Stdout)),
        }
    }

    pub fn file(path: &Path) -> io::Result<Self> {
        let file = open_log(path)?;
        Ok(Self {
            target: Arc::new(Mutex::new(Target::File {
                path: path.to_path_buf(),
                file,
            })),
        })
    }

    /// Reopen the destination; no-op for stdout. A failed reopen keeps the
    /// old handle so logging never goes dark mid-rotation.
    pub fn reopen(&self) {
        let mut target = self.target.lock();
        let Target::File { path, file } = &mut *target else {
            return;
        };
        match open_log(path) {
            Ok(reopened) => *file = reopened,
            Err(err) => {
                // tracing would recurse into this writer; report in-band
                let _ = writeln!(
                    file,
                    "resqued: failed to reopen log {}: {err}",
                    path.display()
                );
            }
        }
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl io::Write for LogHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.target.lock() {
            Target::Stdout => io::stdout().write(buf),
            Target::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.target.lock() {
            Target::Stdout => io::stdout().flush(),
            Target::File { file, .. } => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogHandle {
    type Writer = LogHandle;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber. Returns the handle the master keeps for
/// `HUP` reopens.
pub fn init(logfile: Option<&Path>) -> io::Result<LogHandle> {
    let handle = match logfile {
        Some(path) => LogHandle::file(path)?,
        None => LogHandle::stdout(),
    };

    let filter = EnvFilter::try_from_env(crate::env::LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(handle.clone())
        .init();

    Ok(handle)
}
