// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart throttle for the listener child.
//!
//! The wait grows exponentially while listeners die shortly after starting
//! and falls back to the base once a listener has run long enough to count
//! as stable. [`Backoff::how_long`] is what the master consults before
//! spawning a replacement.

use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

/// First wait after a crash.
const BASE_WAIT: Duration = Duration::from_secs(1);

/// Ceiling for the doubled wait.
const MAX_WAIT: Duration = Duration::from_secs(64);

/// A death within this long of the previous start counts as a rapid flap.
const RECENT_START: Duration = Duration::from_secs(60);

/// Tracks listener start/death times and computes the restart delay.
#[derive(Debug)]
pub struct Backoff<C: Clock = SystemClock> {
    clock: C,
    wait: Duration,
    last_started: Option<Instant>,
    restart_at: Option<Instant>,
}

impl Backoff<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Backoff<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Backoff<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            wait: Duration::ZERO,
            last_started: None,
            restart_at: None,
        }
    }

    /// A listener was spawned. Clears any pending delay; the wait itself is
    /// kept so a quick death after this start doubles from it.
    pub fn started(&mut self) {
        self.last_started = Some(self.clock.now());
        self.restart_at = None;
    }

    /// The current listener died. Doubles the wait when the death came soon
    /// after the last start, otherwise resets it to the base.
    pub fn died(&mut self) {
        let now = self.clock.now();
        let flapping = self
            .last_started
            .is_some_and(|started| now.duration_since(started) < RECENT_START);

        self.wait = if flapping {
            self.wait.saturating_mul(2).clamp(BASE_WAIT, MAX_WAIT)
        } else {
            BASE_WAIT
        };
        self.restart_at = Some(now + self.wait);
    }

    /// Remaining delay before a restart is allowed, or `None` when one may
    /// happen immediately.
    pub fn how_long(&self) -> Option<Duration> {
        let at = self.restart_at?;
        at.checked_duration_since(self.clock.now())
            .filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
