// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface specs: help, version, and usage errors.

use crate::prelude::*;

#[test]
fn help_prints_usage_and_exits_zero() {
    let output = resqued_cmd().arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--pidfile"));
    assert!(stdout.contains("--daemonize"));
}

#[test]
fn short_help_works_too() {
    let output = resqued_cmd().arg("-h").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn version_prints_and_exits_zero() {
    for flag in ["--version", "-v"] {
        let output = resqued_cmd().arg(flag).output().unwrap();
        assert_eq!(output.status.code(), Some(0));
        assert!(String::from_utf8_lossy(&output.stdout).contains("resqued"));
    }
}

#[test]
fn no_arguments_is_a_usage_error() {
    let output = resqued_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let output = resqued_cmd().arg("--frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
