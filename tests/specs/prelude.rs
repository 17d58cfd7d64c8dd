// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for the resqued behavioral specs.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Outer bound on any one wait in the specs.
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);

/// Returns the path to a built binary. Works for standard builds; falls
/// back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where resqued is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn resqued_binary() -> PathBuf {
    binary_path("resqued")
}

pub fn resqued_cmd() -> Command {
    Command::new(resqued_binary())
}

/// Write the stub listener the master will spawn. It honors the listener
/// contract: announces `running`, optionally emits one worker's lifecycle
/// (`$STUB_WORKER`), and exits on QUIT/TERM/INT.
pub fn write_stub_listener(dir: &Path) -> PathBuf {
    let path = dir.join("stub-listener.sh");
    let script = r#"#!/usr/bin/env bash
fd=""
while [ $# -gt 0 ]; do
  case "$1" in
    --socket-fd) fd="$2"; shift 2 ;;
    --listener-id) shift 2 ;;
    --worker) shift 2 ;;
    *) shift ;;
  esac
done
eval "exec 9>&$fd"
trap 'exit 0' QUIT TERM INT
echo running >&9
if [ -n "$STUB_WORKER" ]; then
  echo "worker $STUB_WORKER start" >&9
  echo "worker $STUB_WORKER stop" >&9
fi
while :; do sleep 0.1; done
"#;
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A running master plus the read side of its status pipe.
pub struct MasterSpec {
    child: Child,
    lines: mpsc::Receiver<String>,
    pub config_path: PathBuf,
    // kept alive so the stub listener and config survive the test
    tempdir: tempfile::TempDir,
}

/// Builder for a master under spec.
pub struct MasterBuilder {
    envs: Vec<(String, String)>,
    args: Vec<String>,
}

pub fn master() -> MasterBuilder {
    MasterBuilder {
        envs: Vec::new(),
        args: Vec::new(),
    }
}

impl MasterBuilder {
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Spawn the master with a stub listener and an inherited status pipe.
    pub fn start(self) -> MasterSpec {
        let tempdir = tempfile::tempdir().unwrap();
        let config_path = tempdir.path().join("resqued.conf");
        std::fs::write(&config_path, "# spec config\n").unwrap();
        let listener = write_stub_listener(tempdir.path());

        let (read_fd, write_fd) = nix::unistd::pipe().unwrap();

        let mut cmd = resqued_cmd();
        cmd.env("RESQUED_LISTENER", &listener)
            .env("RESQUED_STATUS_FD", write_fd.as_raw_fd().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.args(&self.args);
        cmd.arg(&config_path);

        let child = cmd.spawn().unwrap();
        drop(write_fd); // the master now holds the only write end

        let (tx, rx) = mpsc::channel();
        let pipe = File::from(read_fd);
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        MasterSpec {
            child,
            lines: rx,
            config_path,
            tempdir,
        }
    }
}

impl MasterSpec {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn dir(&self) -> &Path {
        self.tempdir.path()
    }

    pub fn signal(&self, signal: Signal) {
        kill(Pid::from_raw(self.child.id() as i32), signal).unwrap();
    }

    /// Next status line matching the predicate; lines that do not match
    /// are discarded. Panics after [`SPEC_WAIT_MAX`].
    pub fn expect_line(&self, what: &str, pred: impl Fn(&StatusLine) -> bool) -> StatusLine {
        let deadline = Instant::now() + SPEC_WAIT_MAX;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for {what}"));
            match self.lines.recv_timeout(remaining) {
                Ok(raw) => {
                    let line = StatusLine::parse(&raw);
                    if pred(&line) {
                        return line;
                    }
                }
                Err(_) => panic!("status pipe closed or timed out waiting for {what}"),
            }
        }
    }

    pub fn expect_listener(&self, state: &str) -> StatusLine {
        self.expect_line(&format!("listener {state}"), |l| {
            l.kind == "listener" && l.state == state
        })
    }

    pub fn expect_worker(&self, pid: u32, state: &str) -> StatusLine {
        self.expect_line(&format!("worker {pid} {state}"), |l| {
            l.kind == "worker" && l.pid == pid && l.state == state
        })
    }

    /// Wait for the master to exit; panics after [`SPEC_WAIT_MAX`].
    pub fn wait_exit(&mut self) -> i32 {
        let deadline = Instant::now() + SPEC_WAIT_MAX;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.code().unwrap_or(-1);
            }
            if Instant::now() > deadline {
                panic!("master did not exit in time");
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for MasterSpec {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            // graceful first, so the master can quit its listener
            let _ = kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM);
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Ok(Some(_)) = self.child.try_wait() {
                    return;
                }
                thread::sleep(Duration::from_millis(20));
            }
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// One parsed `<kind>,<pid>,<state>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: String,
    pub pid: u32,
    pub state: String,
}

impl StatusLine {
    pub fn parse(raw: &str) -> Self {
        let mut fields = raw.split(',');
        let kind = fields.next().unwrap_or_default().to_string();
        let pid = fields.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let state = fields.next().unwrap_or_default().to_string();
        Self { kind, pid, state }
    }
}
