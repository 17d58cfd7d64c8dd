// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! resqued master: supervisor for a pool of background job workers.
//!
//! The master owns a tree of child processes. It spawns one listener at a
//! time, rotates listeners when configuration changes, hands running
//! workers across rotations so jobs are never needlessly killed, throttles
//! respawns after crashes, and propagates operator signals. It never
//! touches queues or jobs itself.
//!
//! Architecture:
//! - Pump tasks: one per listener child, reading status reports and
//!   waiting on the process, emitting events to the master channel
//! - Signal watcher: one task per subscribed signal, feeding a FIFO
//! - Master loop: current-thread task processing events sequentially

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod census;
pub mod daemonize;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod master;
pub mod panic_report;
pub mod pidfile;
pub mod procline;
pub mod signals;
pub mod spawn;
pub mod status;
