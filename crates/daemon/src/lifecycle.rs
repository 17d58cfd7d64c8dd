// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master startup: lock, plumbing, and the assembled supervision loop.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use resqued_core::{Backoff, SystemClock};

use crate::env;
use crate::logging::LogHandle;
use crate::master::{Master, MasterDeps};
use crate::pidfile::{Pidfile, PidfileError};
use crate::procline;
use crate::signals;
use crate::spawn::ProcessSpawner;
use crate::status::StatusReporter;

/// Master configuration assembled by the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configuration files, opaque to the master, handed to each listener.
    pub config_paths: Vec<PathBuf>,
    pub pidfile: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Pidfile(#[from] PidfileError),

    #[error("{} is not set; the master cannot spawn listeners", env::LISTENER_EXEC)]
    ListenerExecUnset,

    #[error("listener executable {0} does not exist")]
    ListenerExecMissing(PathBuf),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

/// Everything `main` needs to run the master.
pub struct Startup {
    pub master: Master<ProcessSpawner, SystemClock>,
    /// Held for the life of the process; dropping releases the lock and
    /// removes the file.
    pub pidfile: Option<Pidfile>,
}

/// Wire the master together. Signal handlers are installed before the
/// pidfile is taken so a signal arriving during acquisition is queued for
/// the loop rather than lost.
pub fn startup(config: Config, log: LogHandle) -> Result<Startup, LifecycleError> {
    let signals = signals::watch().map_err(LifecycleError::Signals)?;

    let pidfile = config
        .pidfile
        .as_deref()
        .map(Pidfile::acquire)
        .transpose()?;

    let exec = env::listener_exec().ok_or(LifecycleError::ListenerExecUnset)?;
    if !exec.is_file() {
        return Err(LifecycleError::ListenerExecMissing(exec));
    }

    let status = match env::status_fd() {
        Some(fd) => StatusReporter::from_fd(fd).unwrap_or_else(|| {
            warn!(fd, "status fd is not open, reporting disabled");
            StatusReporter::disabled()
        }),
        None => StatusReporter::disabled(),
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let spawner = ProcessSpawner::new(exec, events_tx);

    procline::set("resqued master");
    info!(
        pid = std::process::id(),
        configs = ?config.config_paths,
        "resqued master starting"
    );

    let master = Master::new(
        config.config_paths,
        MasterDeps {
            spawner,
            backoff: Backoff::new(),
            status,
            log,
        },
        events_rx,
        signals,
    );

    Ok(Startup { master, pidfile })
}
