// Command-line argument parsing

use crate::daemon::PressureResource;
use clap::Parser;
use std::path::PathBuf;

/// IOCost Guard - cgroup kill policy daemon
///
/// Watches pressure stall information and, once it crosses the configured
/// threshold, kills the cgroup generating the most IO cost among the
/// configured cgroups and anything outside their parent.
#[derive(Parser, Debug)]
#[command(name = "iocost-guard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kill the highest IO cost cgroup under pressure", long_about = None)]
pub struct Args {
    /// Comma-separated cgroups the policy may act on (globs allowed), e.g. "workload.slice/*"
    #[arg(short = 'c', long = "cgroup", value_name = "CGROUP[,CGROUP...]")]
    pub cgroup: Option<String>,

    /// Seconds to hold off further action after a kill (default: 0)
    #[arg(long = "post-action-delay", value_name = "SECONDS", allow_hyphen_values = true)]
    pub post_action_delay: Option<String>,

    /// Dry run mode - don't actually kill anything, just report what would be killed
    #[arg(long = "dry")]
    pub dry: bool,

    /// Enable debug logging and full candidate dumps
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Mount point of the cgroup v2 hierarchy
    #[arg(long = "cgroup-fs", value_name = "PATH", default_value = "/sys/fs/cgroup")]
    pub cgroup_fs: PathBuf,

    /// Evaluation interval in seconds (default: 5)
    #[arg(short = 'i', long = "interval", value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Additional cgroups to monitor (can be used multiple times)
    #[arg(long = "monitor", value_name = "CGROUP")]
    pub monitor: Vec<String>,

    /// Pressure source that triggers the policy
    #[arg(long = "pressure-resource", value_enum, default_value_t = PressureResource::Io)]
    pub pressure_resource: PressureResource,

    /// Trigger when pressure avg10 reaches this percentage (default: 60)
    #[arg(long = "pressure-threshold", value_name = "PERCENT")]
    pub pressure_threshold: Option<f64>,

    /// Read pressure from this cgroup instead of system-wide PSI
    #[arg(long = "pressure-cgroup", value_name = "CGROUP")]
    pub pressure_cgroup: Option<String>,

    /// Ruleset name reported in kill records
    #[arg(long = "ruleset", value_name = "NAME", default_value = "io cost protection")]
    pub ruleset: String,

    /// Use syslog instead of stdout/stderr for logging
    #[arg(long = "syslog")]
    pub syslog: bool,
}

impl Args {
    /// Parse arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
