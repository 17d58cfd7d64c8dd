// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive pidfile guard.
//!
//! The lock, not the file contents, is what keeps two masters apart: a
//! stale file left by a crashed master carries no lock and is simply taken
//! over. The guard removes the file on drop when it still holds our pid.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PidfileError {
    #[error("pidfile {path} is held by a running master")]
    Held {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pidfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Holds the lock for the life of the master.
#[derive(Debug)]
pub struct Pidfile {
    path: PathBuf,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    file: File,
}

impl Pidfile {
    pub fn acquire(path: &Path) -> Result<Self, PidfileError> {
        let io_err = |source| PidfileError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Open without truncating so losing the race below does not wipe
        // the winner's pid.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        file.try_lock_exclusive()
            .map_err(|source| PidfileError::Held {
                path: path.to_path_buf(),
                source,
            })?;

        file.set_len(0).map_err(io_err)?;
        write!(file, "{}", std::process::id()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        let ours = std::fs::read_to_string(&self.path)
            .map(|contents| contents.trim() == std::process::id().to_string())
            .unwrap_or(false);
        if !ours {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove pidfile");
        }
        // the lock itself releases when the file handle closes
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
