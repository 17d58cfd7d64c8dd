// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision specs: boot, worker passthrough, rotation, pause, shutdown.

use crate::prelude::*;

use nix::sys::signal::Signal;

#[test]
fn clean_boot_then_term_exits_zero() {
    let mut master = master().start();

    let started = master.expect_listener("start");
    let ready = master.expect_listener("ready");
    assert_eq!(started.pid, ready.pid);

    master.signal(Signal::SIGTERM);
    let stopped = master.expect_listener("stop");
    assert_eq!(stopped.pid, started.pid);
    assert_eq!(master.wait_exit(), 0);
}

#[test]
fn quit_is_honored_like_term() {
    let mut master = master().start();
    master.expect_listener("ready");
    master.signal(Signal::SIGQUIT);
    master.expect_listener("stop");
    assert_eq!(master.wait_exit(), 0);
}

#[test]
fn worker_events_pass_through_to_the_status_pipe() {
    let master = master().env("STUB_WORKER", "100").start();
    master.expect_listener("ready");
    master.expect_worker(100, "start");
    master.expect_worker(100, "stop");
}

#[test]
fn hup_rotates_to_a_new_listener() {
    let master = master().start();

    let first = master.expect_listener("start").pid;
    master.expect_listener("ready");

    master.signal(Signal::SIGHUP);

    let second = master.expect_listener("start").pid;
    assert_ne!(second, first);

    // the replacement becomes ready, then the old listener goes away
    let ready = master.expect_line("second listener ready", |l| {
        l.kind == "listener" && l.state == "ready" && l.pid == second
    });
    assert_eq!(ready.pid, second);

    let stopped = master.expect_listener("stop");
    assert_eq!(stopped.pid, first);
}

#[test]
fn usr2_pauses_and_cont_resumes_with_a_new_listener() {
    let master = master().start();

    let first = master.expect_listener("start").pid;
    master.expect_listener("ready");

    master.signal(Signal::SIGUSR2);
    let stopped = master.expect_listener("stop");
    assert_eq!(stopped.pid, first);

    master.signal(Signal::SIGCONT);
    let second = master.expect_listener("start").pid;
    assert_ne!(second, first);
    master.expect_line("second listener ready", |l| {
        l.kind == "listener" && l.state == "ready" && l.pid == second
    });
}
