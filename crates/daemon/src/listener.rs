// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-master handle for one spawned listener child.

use std::collections::HashSet;
use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use resqued_core::ListenerReport;

/// Lifecycle of a listener as the master sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Spawned, has not yet reported `running`.
    Booting,
    /// Reported `running`; presumed to be accepting workers.
    Ready,
    /// Signalled to quit; still alive until reaped.
    Dying,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Booting => f.write_str("booting"),
            ListenerState::Ready => f.write_str("ready"),
            ListenerState::Dying => f.write_str("dying"),
        }
    }
}

pub struct ListenerProxy {
    pid: u32,
    listener_id: u64,
    state: ListenerState,
    running_workers: HashSet<u32>,
    downstream: Option<mpsc::UnboundedSender<String>>,
}

impl ListenerProxy {
    pub fn new(pid: u32, listener_id: u64, downstream: mpsc::UnboundedSender<String>) -> Self {
        Self {
            pid,
            listener_id,
            state: ListenerState::Booting,
            running_workers: HashSet::new(),
            downstream: Some(downstream),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn listener_id(&self) -> u64 {
        self.listener_id
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// First `running` report. A listener already told to die stays dying.
    pub fn mark_ready(&mut self) {
        if self.state == ListenerState::Booting {
            self.state = ListenerState::Ready;
        }
    }

    pub fn mark_dying(&mut self) {
        self.state = ListenerState::Dying;
    }

    /// Returns false when the pid was already tracked.
    pub fn worker_started(&mut self, worker: u32) -> bool {
        self.running_workers.insert(worker)
    }

    /// Returns true when this listener was tracking the pid.
    pub fn worker_finished(&mut self, worker: u32) -> bool {
        self.running_workers.remove(&worker)
    }

    pub fn running_workers(&self) -> impl Iterator<Item = u32> + '_ {
        self.running_workers.iter().copied()
    }

    pub fn worker_count(&self) -> usize {
        self.running_workers.len()
    }

    /// Send a `worker <pid> stop` down the child's socket so it drops the
    /// pid from its own accounting.
    pub fn forward_worker_stop(&self, worker: u32) {
        let Some(downstream) = &self.downstream else {
            return;
        };
        let line = format!("{}\n", ListenerReport::WorkerStop(worker));
        if downstream.send(line).is_err() {
            debug!(listener = self.pid, "downstream channel closed");
        }
    }

    /// Sever the socket. The writer task exits, its half closes, and the
    /// child (if somehow still alive) sees EOF.
    pub fn dispose(&mut self) {
        self.downstream = None;
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
