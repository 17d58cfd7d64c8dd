// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-chance reporting for unexpected unwinds.

use std::backtrace::Backtrace;

use tracing::error;

/// Log any panic with a backtrace before the default hook runs, so an
/// unintended unwind of the supervision loop is diagnosed even when stderr
/// went to /dev/null at daemonize time.
pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::force_capture();
        error!("master panicked: {info}\n{backtrace}");
        default_hook(info);
    }));
}
