// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision loop.
//!
//! One long-lived task owns every piece of master state; the pump tasks
//! and the signal watcher only feed channels. Each iteration starts a
//! listener when one is due, then waits for the next event or signal
//! token, bounded by the backoff deadline or an idle timeout.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use resqued_core::{Backoff, Clock, ListenerReport, MasterEvent, MasterSignal, StatusEvent};

use crate::census::Census;
use crate::listener::{ListenerProxy, ListenerState};
use crate::logging::LogHandle;
use crate::procline;
use crate::spawn::{ListenerSpawner, SpawnRequest};
use crate::status::StatusReporter;

/// Upper bound on one blocked iteration; keeps the loop re-checking the
/// world even when nothing is happening.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Collaborators the master is assembled from.
pub struct MasterDeps<S, C: Clock> {
    pub spawner: S,
    pub backoff: Backoff<C>,
    pub status: StatusReporter,
    pub log: LogHandle,
}

pub struct Master<S, C: Clock> {
    config_paths: Vec<PathBuf>,
    spawner: S,
    backoff: Backoff<C>,
    status: StatusReporter,
    log: LogHandle,
    census: Census,

    /// Every listener spawned and not yet reaped, by pid.
    listeners: HashMap<u32, ListenerProxy>,
    /// The listener presumed to be accepting new work.
    current: Option<u32>,
    /// The previous listener, kept through a rotation until the
    /// replacement reports ready.
    last_good: Option<u32>,
    listeners_created: u64,
    paused: bool,

    events: mpsc::UnboundedReceiver<MasterEvent>,
    signals: mpsc::Receiver<MasterSignal>,
}

impl<S: ListenerSpawner, C: Clock> Master<S, C> {
    pub fn new(
        config_paths: Vec<PathBuf>,
        deps: MasterDeps<S, C>,
        events: mpsc::UnboundedReceiver<MasterEvent>,
        signals: mpsc::Receiver<MasterSignal>,
    ) -> Self {
        Self {
            config_paths,
            spawner: deps.spawner,
            backoff: deps.backoff,
            status: deps.status,
            log: deps.log,
            census: Census::new(),
            listeners: HashMap::new(),
            current: None,
            last_good: None,
            listeners_created: 0,
            paused: false,
            events,
            signals,
        }
    }

    /// Run until a terminal signal has been honored. Exhausts the process
    /// table before returning: every listener is reaped.
    pub async fn run(mut self, ready_pipe: Option<File>) {
        if let Some(pipe) = ready_pipe {
            announce_ready(pipe);
        }

        let terminal = loop {
            self.start_listener_if_needed();

            let wait = self
                .backoff
                .how_long()
                .map_or(IDLE_TIMEOUT, |due| due.min(IDLE_TIMEOUT));

            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    // all pump senders gone; nothing left to supervise
                    None => break None,
                },
                signal = self.signals.recv() => match signal {
                    Some(signal) => {
                        if let Some(terminal) = self.handle_signal(signal) {
                            break Some(terminal);
                        }
                    }
                    None => break None,
                },
                _ = tokio::time::sleep(wait) => {}
            }
        };

        if let Some(signal) = terminal {
            self.wait_for_workers(signal).await;
        }
        info!("master stopped");
    }

    /// Blocking reap of every remaining listener. A second terminal signal
    /// arriving here is forwarded so children can escalate on their own.
    async fn wait_for_workers(&mut self, signal: MasterSignal) {
        info!(%signal, remaining = self.listeners.len(), "waiting for listeners to exit");
        while !self.listeners.is_empty() {
            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                extra = self.signals.recv() => {
                    if let Some(extra) = extra {
                        if extra.is_terminal() {
                            self.forward_to_all(extra);
                        }
                    }
                }
            }
        }
    }

    fn handle_signal(&mut self, signal: MasterSignal) -> Option<MasterSignal> {
        debug!(%signal, "processing signal");
        match signal {
            MasterSignal::Hup => {
                info!("HUP: reopening logs and rotating the listener");
                self.log.reopen();
                self.begin_rotation();
                None
            }
            MasterSignal::Usr2 => {
                info!("USR2: pausing");
                self.paused = true;
                if let Some(pid) = self.current.take() {
                    self.quit_listener(pid);
                }
                None
            }
            MasterSignal::Cont => {
                info!("CONT: resuming");
                self.paused = false;
                self.forward_to_all(MasterSignal::Cont);
                None
            }
            MasterSignal::Info => {
                let counts = self.census_counts();
                self.census.dump(counts);
                None
            }
            MasterSignal::Int | MasterSignal::Term | MasterSignal::Quit => {
                info!(%signal, "shutting down");
                self.forward_to_all(signal);
                Some(signal)
            }
        }
    }

    /// HUP state machine: retire the current listener — or discard a
    /// booting replacement when a rotation is already in flight — so the
    /// next iteration spawns against the current config paths.
    fn begin_rotation(&mut self) {
        if self.last_good.is_some() {
            if let Some(pid) = self.current.take() {
                self.quit_listener(pid);
            }
        } else {
            self.last_good = self.current.take();
        }
    }

    fn handle_event(&mut self, event: MasterEvent) {
        match event {
            MasterEvent::Line { pid, line } => self.handle_line(pid, &line),
            MasterEvent::Reaped { pid, status } => self.handle_reaped(pid, status),
        }
    }

    fn handle_line(&mut self, pid: u32, line: &str) {
        let report = match line.parse::<ListenerReport>() {
            Ok(report) => report,
            Err(err) => {
                warn!(listener = pid, line, error = %err, "discarding malformed report");
                return;
            }
        };
        match report {
            ListenerReport::Running => self.listener_running(pid),
            ListenerReport::WorkerStart(worker) => self.worker_started(pid, worker),
            ListenerReport::WorkerStop(worker) => self.worker_stopped(pid, worker),
        }
    }

    fn listener_running(&mut self, pid: u32) {
        if self.current != Some(pid) {
            // A QUIT sent before the child installed its traps can be
            // lost; a retired listener announcing readiness is signalled
            // again rather than adopted.
            warn!(listener = pid, "ready from a non-current listener, quitting it");
            self.quit_listener(pid);
            return;
        }

        if let Some(proxy) = self.listeners.get_mut(&pid) {
            proxy.mark_ready();
        }
        info!(listener = pid, "listener ready");
        self.status.emit(StatusEvent::listener_ready(pid));

        if let Some(retired) = self.last_good.take() {
            info!(listener = retired, "replacement ready, quitting previous listener");
            self.quit_listener(retired);
        }
    }

    fn worker_started(&mut self, pid: u32, worker: u32) {
        let Some(proxy) = self.listeners.get_mut(&pid) else {
            warn!(listener = pid, worker, "worker start from unknown listener");
            return;
        };
        proxy.worker_started(worker);
        debug!(listener = pid, worker, "worker started");
        self.status.emit(StatusEvent::worker_start(worker));
    }

    fn worker_stopped(&mut self, reporter: u32, worker: u32) {
        let mut known = false;
        for proxy in self.listeners.values_mut() {
            known |= proxy.worker_finished(worker);
        }
        if !known {
            warn!(listener = reporter, worker, "stop for a worker no listener owns, dropping");
            return;
        }

        debug!(listener = reporter, worker, "worker finished");
        self.status.emit(StatusEvent::worker_stop(worker));

        // every other listener learns the pid is gone, so workers it
        // adopted across a rotation fall out of its accounting
        for proxy in self.listeners.values() {
            if proxy.pid() != reporter {
                proxy.forward_worker_stop(worker);
            }
        }
    }

    fn handle_reaped(&mut self, pid: u32, status: ExitStatus) {
        let Some(mut proxy) = self.listeners.remove(&pid) else {
            debug!(listener = pid, "reap for unknown listener");
            return;
        };

        if status.success() {
            info!(listener = pid, "listener exited");
        } else {
            warn!(listener = pid, %status, "listener died");
        }

        if self.current == Some(pid) {
            self.current = None;
            self.backoff.died();
        }
        if self.last_good == Some(pid) {
            self.last_good = None;
        }

        self.status.emit(StatusEvent::listener_stop(pid));
        proxy.dispose();
    }

    fn start_listener_if_needed(&mut self) {
        if self.current.is_some() || self.paused {
            return;
        }
        if self.backoff.how_long().is_some() {
            return;
        }

        let listener_id = self.listeners_created + 1;
        let old_workers = self.old_workers();
        let spawned = self.spawner.spawn(SpawnRequest {
            listener_id,
            config_paths: &self.config_paths,
            old_workers: &old_workers,
        });

        match spawned {
            Ok(listener) => {
                let pid = listener.pid;
                self.listeners_created = listener_id;
                self.listeners
                    .insert(pid, ListenerProxy::new(pid, listener_id, listener.downstream));
                self.current = Some(pid);
                self.backoff.started();
                info!(
                    listener = pid,
                    listener_id,
                    adopted = old_workers.len(),
                    "listener started"
                );
                self.status.emit(StatusEvent::listener_start(pid));
                procline::set(&format!("resqued gen {listener_id}"));
            }
            Err(err) => {
                warn!(error = %err, "failed to start listener");
                self.backoff.died();
            }
        }
    }

    /// Live worker pids across all listeners, handed to the next listener
    /// so it adopts them instead of respawning.
    fn old_workers(&self) -> Vec<u32> {
        let mut workers: Vec<u32> = self
            .listeners
            .values()
            .flat_map(|proxy| proxy.running_workers())
            .collect();
        workers.sort_unstable();
        workers
    }

    fn quit_listener(&mut self, pid: u32) {
        if let Some(proxy) = self.listeners.get_mut(&pid) {
            proxy.mark_dying();
        }
        if let Err(err) = self.spawner.kill(pid, MasterSignal::Quit) {
            warn!(listener = pid, error = %err, "failed to quit listener");
        }
    }

    fn forward_to_all(&mut self, signal: MasterSignal) {
        let pids: Vec<u32> = self.listeners.keys().copied().collect();
        for pid in pids {
            if signal.is_terminal() {
                if let Some(proxy) = self.listeners.get_mut(&pid) {
                    proxy.mark_dying();
                }
            }
            if let Err(err) = self.spawner.kill(pid, signal) {
                warn!(listener = pid, %signal, error = %err, "failed to forward signal");
            }
        }
    }

    fn census_counts(&self) -> BTreeMap<String, i64> {
        let mut counts = BTreeMap::new();
        for state in [
            ListenerState::Booting,
            ListenerState::Ready,
            ListenerState::Dying,
        ] {
            let tally = self
                .listeners
                .values()
                .filter(|proxy| proxy.state() == state)
                .count() as i64;
            counts.insert(format!("listener.{state}"), tally);
        }
        counts.insert(
            "worker.running".to_string(),
            self.listeners
                .values()
                .map(|proxy| proxy.worker_count() as i64)
                .sum(),
        );
        counts.insert(
            "listener.spawned_total".to_string(),
            self.listeners_created as i64,
        );
        counts
    }
}

fn announce_ready(mut pipe: File) {
    // the daemonizing parent blocks until this arrives (or the pipe closes)
    if let Err(err) = write!(pipe, "{}", std::process::id()) {
        warn!(error = %err, "failed to announce pid on the ready pipe");
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
