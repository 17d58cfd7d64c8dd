// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Double-fork detachment for `-D`.
//!
//! The operator-facing process blocks on a ready pipe and exits 0 only
//! once the detached master has written its pid there, so `resqued -D`
//! failing at startup is visible as a non-zero exit instead of a silent
//! orphan.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::process::exit;

use nix::sys::wait::waitpid;
use nix::unistd::{fork, pipe, setsid, ForkResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonizeError {
    #[error("pipe failed: {0}")]
    Pipe(#[source] nix::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("setsid failed: {0}")]
    Setsid(#[source] nix::Error),

    #[error("failed to redirect stdio to /dev/null: {0}")]
    Stdio(#[source] std::io::Error),
}

/// Detach from the controlling terminal. Returns, in the daemon child,
/// the write end of the ready pipe for the master to announce its pid on.
/// The calling process does not return: it exits 0 when a pid arrives and
/// 1 when the pipe closes without one.
pub fn detach() -> Result<File, DaemonizeError> {
    let (ready_read, ready_write) = pipe().map_err(DaemonizeError::Pipe)?;

    // SAFETY: still single-threaded — called before the runtime or any
    // other thread exists, so fork is not racing any lock holders.
    match unsafe { fork() }.map_err(DaemonizeError::Fork)? {
        ForkResult::Parent { child } => {
            drop(ready_write);
            let mut announced = String::new();
            let mut ready = File::from(ready_read);
            let _ = ready.read_to_string(&mut announced);
            let _ = waitpid(child, None);
            if announced.trim().parse::<u32>().is_ok() {
                exit(0);
            }
            eprintln!("resqued: master did not start; check the logs");
            exit(1);
        }
        ForkResult::Child => {}
    }

    drop(ready_read);
    setsid().map_err(DaemonizeError::Setsid)?;

    // Second fork: give up session leadership so the daemon can never
    // reacquire a controlling terminal.
    // SAFETY: still single-threaded, as above.
    match unsafe { fork() }.map_err(DaemonizeError::Fork)? {
        ForkResult::Parent { .. } => exit(0),
        ForkResult::Child => {}
    }

    redirect_stdio().map_err(DaemonizeError::Stdio)?;
    Ok(File::from(ready_write))
}

fn redirect_stdio() -> std::io::Result<()> {
    let devnull = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")?;
    let fd = devnull.as_raw_fd();
    for stdio in 0..=2 {
        // SAFETY: remapping the three standard descriptors onto /dev/null;
        // both descriptors are open and owned by this process.
        if unsafe { libc::dup2(fd, stdio) } == -1 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
