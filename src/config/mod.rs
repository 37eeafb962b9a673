// Configuration module

mod args;
mod env;
mod policy;

pub use args::Args;
pub use policy::{
    parse_flag, ConfigError, PluginArgs, PolicyConfig, TargetScope, ARG_CGROUP, ARG_DEBUG,
    ARG_DRY, ARG_POST_ACTION_DELAY,
};

use crate::daemon::PressureResource;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration plus the raw options for the kill policy
#[derive(Debug, Clone)]
pub struct Config {
    // Cgroup hierarchy
    pub cgroup_fs: PathBuf,      // cgroup v2 mount point
    pub monitor: Vec<String>,    // Extra cgroups to monitor

    // Evaluation
    pub check_interval: Duration, // How often to evaluate

    // Trigger
    pub pressure_resource: PressureResource,
    pub pressure_threshold: f64,          // avg10 percentage
    pub pressure_cgroup: Option<String>,  // None = system-wide PSI

    // Reporting
    pub ruleset: String,
    pub debug: bool,

    // Options handed to the kill policy
    pub plugin_args: PluginArgs,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let mut config = Self::default();

        config.cgroup_fs = args.cgroup_fs;
        config.monitor = args.monitor;

        if let Some(interval) = args.interval {
            config.check_interval = Duration::from_secs(interval);
        }

        config.pressure_resource = args.pressure_resource;
        if let Some(threshold) = args.pressure_threshold {
            config.pressure_threshold = threshold;
        }
        config.pressure_cgroup = args.pressure_cgroup;

        config.ruleset = args.ruleset;
        config.debug = args.debug;

        // Policy options travel as strings; the policy validates them
        if let Some(cgroup) = args.cgroup {
            config.plugin_args.insert(ARG_CGROUP.to_string(), cgroup);
        }
        if let Some(delay) = args.post_action_delay {
            config
                .plugin_args
                .insert(ARG_POST_ACTION_DELAY.to_string(), delay);
        }
        if args.dry {
            config.plugin_args.insert(ARG_DRY.to_string(), "true".to_string());
        }
        if args.debug {
            config.plugin_args.insert(ARG_DEBUG.to_string(), "true".to_string());
        }

        // Apply environment variable overrides
        config = env::apply_env_overrides(config)?;
        config.finish()
    }

    /// Derive daemon settings from the merged policy options, then validate
    fn finish(mut self) -> Result<Self> {
        if let Some(debug) = self.plugin_args.get(ARG_DEBUG) {
            self.debug |= parse_flag(debug);
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            bail!("interval must be at least 1 second");
        }
        if !(0.0..=100.0).contains(&self.pressure_threshold) {
            bail!("pressure threshold must be between 0 and 100");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cgroup_fs: PathBuf::from("/sys/fs/cgroup"),
            monitor: Vec::new(),
            check_interval: Duration::from_secs(5),
            pressure_resource: PressureResource::Io,
            pressure_threshold: 60.0,
            pressure_cgroup: None,
            ruleset: "io cost protection".to_string(),
            debug: false,
            plugin_args: PluginArgs::new(),
        }
    }
}
