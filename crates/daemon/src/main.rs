// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! resqued binary entry point.
//!
//! Everything before the runtime starts is deliberately plain: parse,
//! validate, maybe detach, open logs. The supervision itself lives in
//! [`resqued::master`].

use std::path::PathBuf;
use std::process::exit;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;

use resqued::daemonize;
use resqued::lifecycle::{self, Config, Startup};
use resqued::logging;
use resqued::panic_report;

#[derive(Parser, Debug)]
#[command(
    name = "resqued",
    about = "Master supervisor for a pool of background job workers"
)]
struct Args {
    /// Print version and exit
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Write master pid to PATH; released on exit
    #[arg(short = 'p', long = "pidfile", value_name = "PATH")]
    pidfile: Option<PathBuf>,

    /// Redirect log output to PATH instead of standard output
    #[arg(short = 'l', long = "logfile", value_name = "PATH")]
    logfile: Option<PathBuf>,

    /// Detach from the controlling terminal
    #[arg(short = 'D', long = "daemonize")]
    daemonize: bool,

    /// Configuration files handed to each listener
    #[arg(value_name = "CONFIG")]
    config_paths: Vec<PathBuf>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap exits 2 on usage errors; resqued promises 1
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            exit(code);
        }
    };

    if args.version {
        println!("resqued {}", env!("CARGO_PKG_VERSION"));
        exit(0);
    }

    if args.config_paths.is_empty() {
        eprintln!("resqued: no configuration files given; see resqued --help");
        exit(1);
    }

    for path in &args.config_paths {
        if !path.exists() {
            eprintln!("resqued: config file {} does not exist", path.display());
            exit(1);
        }
    }

    // Detach before the runtime exists: forking a threaded process is not
    // an option.
    let ready_pipe = if args.daemonize {
        match daemonize::detach() {
            Ok(pipe) => Some(pipe),
            Err(err) => {
                eprintln!("resqued: {err}");
                exit(1);
            }
        }
    } else {
        None
    };

    let log = match logging::init(args.logfile.as_deref()) {
        Ok(log) => log,
        Err(err) => {
            eprintln!("resqued: cannot open log file: {err}");
            exit(1);
        }
    };
    panic_report::install();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build runtime");
            exit(1);
        }
    };

    let config = Config {
        config_paths: args.config_paths,
        pidfile: args.pidfile,
    };

    let code = runtime.block_on(async move {
        match lifecycle::startup(config, log) {
            Ok(Startup { master, pidfile }) => {
                // held across the whole run; drop removes the pidfile
                let _pidfile = pidfile;
                master.run(ready_pipe).await;
                0
            }
            Err(err) => {
                error!(error = %err, "startup failed");
                eprintln!("resqued: {err}");
                1
            }
        }
    });
    exit(code);
}
