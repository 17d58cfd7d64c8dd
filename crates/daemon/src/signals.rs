// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator signal watcher.
//!
//! Handler context does nothing but the runtime's own self-pipe write; a
//! watcher task per signal kind turns deliveries into tokens on one FIFO,
//! which the master drains in arrival order. A full queue drops the token
//! — a burst of identical signals collapsing into one iteration is fine,
//! the loop is level-triggered.
//!
//! `CHLD` is not subscribed: child exits wake the loop through the reap
//! events emitted by the per-listener pump tasks.

use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::trace;

use resqued_core::MasterSignal;

/// Tokens buffered between delivery and the loop.
const QUEUE_DEPTH: usize = 64;

/// Install a watcher per subscribed signal, all feeding one queue. Must be
/// called inside the runtime. Returns the consuming end.
pub fn watch() -> io::Result<mpsc::Receiver<MasterSignal>> {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);

    subscribe(SignalKind::hangup(), MasterSignal::Hup, &tx)?;
    subscribe(SignalKind::user_defined2(), MasterSignal::Usr2, &tx)?;
    subscribe(SignalKind::from_raw(libc::SIGCONT), MasterSignal::Cont, &tx)?;
    subscribe(SignalKind::interrupt(), MasterSignal::Int, &tx)?;
    subscribe(SignalKind::terminate(), MasterSignal::Term, &tx)?;
    subscribe(SignalKind::quit(), MasterSignal::Quit, &tx)?;
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    subscribe(SignalKind::from_raw(libc::SIGINFO), MasterSignal::Info, &tx)?;

    Ok(rx)
}

fn subscribe(
    kind: SignalKind,
    token: MasterSignal,
    tx: &mpsc::Sender<MasterSignal>,
) -> io::Result<()> {
    let mut stream = signal(kind)?;
    let tx = tx.clone();
    tokio::spawn(async move {
        while stream.recv().await.is_some() {
            match tx.try_send(token) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(signal = %token, "signal queue full, token coalesced");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    });
    Ok(())
}
