// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning and signalling listener children.
//!
//! The master talks to this through [`ListenerSpawner`] so the supervision
//! logic can be exercised against [`FakeSpawner`] without forking anything.
//!
//! A real spawn wires up a socketpair, remaps the child's end onto a fixed
//! descriptor across exec, and starts two tasks: a pump that reads status
//! reports until EOF and then reaps the child, and a writer that drains
//! the proxy's downstream channel into the socket.

use std::io;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::process::ExitStatus;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::warn;

use resqued_core::{MasterEvent, MasterSignal};

/// Descriptor number the child finds its status socket on; also passed as
/// the `--socket-fd` argument so the listener does not hard-code it.
pub const LISTENER_SOCKET_FD: i32 = 3;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("socketpair failed: {0}")]
    Socketpair(#[source] nix::Error),

    #[error("failed to spawn {exec}: {source}")]
    Spawn {
        exec: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("spawned listener has no pid")]
    NoPid,

    #[error("kill({pid}) failed: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("{signal} cannot be forwarded to a child")]
    Unforwardable { signal: MasterSignal },
}

/// What a new listener is told on its command line.
pub struct SpawnRequest<'a> {
    pub listener_id: u64,
    pub config_paths: &'a [PathBuf],
    /// Live worker pids across all listeners, for adoption.
    pub old_workers: &'a [u32],
}

pub struct SpawnedListener {
    pub pid: u32,
    /// Lines sent here are written down the child's socket by the writer
    /// task; dropping the sender severs the socket.
    pub downstream: mpsc::UnboundedSender<String>,
}

pub trait ListenerSpawner {
    fn spawn(&mut self, req: SpawnRequest<'_>) -> Result<SpawnedListener, SpawnError>;
    fn kill(&self, pid: u32, signal: MasterSignal) -> Result<(), SpawnError>;
}

/// Spawner backed by fork/exec of the configured listener executable.
pub struct ProcessSpawner {
    exec: PathBuf,
    events: mpsc::UnboundedSender<MasterEvent>,
}

impl ProcessSpawner {
    pub fn new(exec: PathBuf, events: mpsc::UnboundedSender<MasterEvent>) -> Self {
        Self { exec, events }
    }
}

impl ListenerSpawner for ProcessSpawner {
    fn spawn(&mut self, req: SpawnRequest<'_>) -> Result<SpawnedListener, SpawnError> {
        let io_err = |source| SpawnError::Spawn {
            exec: self.exec.clone(),
            source,
        };

        // Both ends close-on-exec: the master's end must never leak into a
        // later listener (the child would then never see EOF), and the
        // child's end is remapped below before exec.
        let (master_end, child_end) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::SOCK_CLOEXEC,
        )
        .map_err(SpawnError::Socketpair)?;

        let stream = std::os::unix::net::UnixStream::from(master_end);
        stream.set_nonblocking(true).map_err(io_err)?;
        let stream = UnixStream::from_std(stream).map_err(io_err)?;

        let mut cmd = Command::new(&self.exec);
        cmd.arg("--socket-fd")
            .arg(LISTENER_SOCKET_FD.to_string())
            .arg("--listener-id")
            .arg(req.listener_id.to_string());
        for worker in req.old_workers {
            cmd.arg("--worker").arg(worker.to_string());
        }
        cmd.args(req.config_paths);

        let child_fd = child_end.as_raw_fd();
        // SAFETY: the closure runs in the forked child before exec and
        // only calls async-signal-safe functions (dup2/fcntl) to put the
        // socket on the advertised descriptor.
        unsafe {
            cmd.pre_exec(move || {
                if child_fd == LISTENER_SOCKET_FD {
                    // already on the right number; just clear close-on-exec
                    let flags = libc::fcntl(child_fd, libc::F_GETFD);
                    if flags == -1
                        || libc::fcntl(child_fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1
                    {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(child_fd, LISTENER_SOCKET_FD) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(io_err)?;
        drop(child_end);
        let pid = child.id().ok_or(SpawnError::NoPid)?;

        let (down_tx, down_rx) = mpsc::unbounded_channel();
        let (read_half, write_half) = stream.into_split();
        tokio::spawn(pump(pid, read_half, child, self.events.clone()));
        tokio::spawn(write_downstream(pid, write_half, down_rx));

        Ok(SpawnedListener {
            pid,
            downstream: down_tx,
        })
    }

    fn kill(&self, pid: u32, signal: MasterSignal) -> Result<(), SpawnError> {
        let unix = unix_signal(signal).ok_or(SpawnError::Unforwardable { signal })?;
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), unix)
            .map_err(|source| SpawnError::Kill { pid, source })
    }
}

/// Unix signal a master signal forwards as. `INFO` is master-local.
fn unix_signal(signal: MasterSignal) -> Option<nix::sys::signal::Signal> {
    use nix::sys::signal::Signal;
    match signal {
        MasterSignal::Hup => Some(Signal::SIGHUP),
        MasterSignal::Usr2 => Some(Signal::SIGUSR2),
        MasterSignal::Cont => Some(Signal::SIGCONT),
        MasterSignal::Int => Some(Signal::SIGINT),
        MasterSignal::Term => Some(Signal::SIGTERM),
        MasterSignal::Quit => Some(Signal::SIGQUIT),
        MasterSignal::Info => None,
    }
}

/// Read reports until EOF, then wait for the child and emit the reap.
/// Running both on one task is what guarantees a listener's lines always
/// precede its reap event.
async fn pump(
    pid: u32,
    read_half: OwnedReadHalf,
    mut child: Child,
    events: mpsc::UnboundedSender<MasterEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if events.send(MasterEvent::Line { pid, line }).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(listener = pid, error = %err, "error reading listener socket");
                break;
            }
        }
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => {
            warn!(listener = pid, error = %err, "wait on listener failed");
            // treat an unwaitable child as a clean exit; the proxy still
            // has to be reaped from the master's tables
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(0)
        }
    };
    let _ = events.send(MasterEvent::Reaped { pid, status });
}

/// Drain the proxy's downstream channel into the socket. Ends when the
/// proxy is disposed (sender dropped) or the socket goes away.
async fn write_downstream(
    pid: u32,
    mut write_half: OwnedWriteHalf,
    mut lines: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = lines.recv().await {
        if let Err(err) = write_half.write_all(line.as_bytes()).await {
            warn!(listener = pid, error = %err, "error writing to listener socket");
            break;
        }
    }
}

#[cfg(test)]
pub use fake::{FakeSpawn, FakeSpawner};
