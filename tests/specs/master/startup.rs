// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup failure and pidfile specs.

use crate::prelude::*;

use nix::sys::signal::Signal;

#[test]
fn missing_config_file_fails_fast() {
    let output = resqued_cmd()
        .arg("/nonexistent/resqued.conf")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn unset_listener_exec_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("resqued.conf");
    std::fs::write(&config, "# spec config\n").unwrap();

    let output = resqued_cmd()
        .env_remove("RESQUED_LISTENER")
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_listener_exec_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("resqued.conf");
    std::fs::write(&config, "# spec config\n").unwrap();

    let output = resqued_cmd()
        .env("RESQUED_LISTENER", "/nonexistent/listener")
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn pidfile_holds_the_master_pid_and_is_removed_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("resqued.pid");

    let mut master = master()
        .arg("--pidfile")
        .arg(pidfile.to_str().unwrap())
        .start();
    master.expect_listener("ready");

    let contents = std::fs::read_to_string(&pidfile).unwrap();
    assert_eq!(contents.trim(), master.pid().to_string());

    master.signal(Signal::SIGTERM);
    assert_eq!(master.wait_exit(), 0);
    assert!(!pidfile.exists());
}

#[test]
fn second_master_on_the_same_pidfile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("resqued.pid");

    let mut first = master()
        .arg("--pidfile")
        .arg(pidfile.to_str().unwrap())
        .start();
    first.expect_listener("ready");

    // a second master contending for the same pidfile must exit 1
    let config = first.config_path.clone();
    let listener = first.dir().join("stub-listener.sh");
    let output = resqued_cmd()
        .env("RESQUED_LISTENER", &listener)
        .arg("--pidfile")
        .arg(pidfile.to_str().unwrap())
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    first.signal(Signal::SIGTERM);
    assert_eq!(first.wait_exit(), 0);
}
