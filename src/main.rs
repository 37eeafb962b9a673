// IOCost Guard - Main entry point

use iocost_guard::config::{Args, Config};
use iocost_guard::daemon;
use nix::sys::mman::{mlockall, MlockAllFlags};
use std::process;

/// Setup logging based on configuration
fn setup_logging(debug: bool, use_syslog: bool) {
    let log_level = if debug { "debug" } else { "info" };

    if use_syslog {
        #[cfg(feature = "syslog")]
        {
            use syslog::{BasicLogger, Facility, Formatter3164};
            let formatter = Formatter3164 {
                facility: Facility::LOG_DAEMON,
                hostname: None,
                process: "iocost_guard".into(),
                pid: std::process::id(),
            };

            match syslog::unix(formatter) {
                Ok(logger) => {
                    let level = if debug {
                        log::LevelFilter::Debug
                    } else {
                        log::LevelFilter::Info
                    };
                    if log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
                        .map(|()| log::set_max_level(level))
                        .is_ok()
                    {
                        return;
                    }
                }
                Err(e) => eprintln!("Failed to connect to syslog: {e}"),
            }
        }

        #[cfg(not(feature = "syslog"))]
        eprintln!("Warning: --syslog requires the 'syslog' feature to be enabled");
    }

    // Fallback to env_logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

/// Keep the daemon resident so it can still act while the system is thrashing on IO
fn lock_memory() {
    if let Err(e) = mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        log::warn!("Failed to lock memory: {e}. Daemon may be slow under IO pressure.");
    } else {
        log::debug!("Memory locked");
    }
}

fn main() {
    let args = Args::parse_args();
    let use_syslog = args.syslog;

    // The environment may enable debug mode, so logging waits for the full config
    let config = match Config::from_args(args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    setup_logging(config.debug, use_syslog);
    lock_memory();

    if let Err(e) = daemon::run(config) {
        log::error!("{e:#}");
        eprintln!("Fatal error: {e:#}");
        process::exit(1);
    }
}
