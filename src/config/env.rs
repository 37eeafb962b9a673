// Environment variable configuration support

use super::policy::{ARG_CGROUP, ARG_DEBUG, ARG_DRY, ARG_POST_ACTION_DELAY};
use super::Config;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Plugin options that may come from the environment, keyed by variable name
const PLUGIN_ARG_VARS: [(&str, &str); 4] = [
    ("IOCOST_GUARD_CGROUP", ARG_CGROUP),
    ("IOCOST_GUARD_POST_ACTION_DELAY", ARG_POST_ACTION_DELAY),
    ("IOCOST_GUARD_DRY", ARG_DRY),
    ("IOCOST_GUARD_DEBUG", ARG_DEBUG),
];

/// Apply environment variable overrides to configuration
pub fn apply_env_overrides(config: Config) -> Result<Config> {
    apply_overrides(config, |name| env::var(name).ok())
}

/// Plugin options set on the command line win over the environment;
/// daemon settings from the environment replace the defaults.
fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    for (var, option) in PLUGIN_ARG_VARS {
        if let Some(val) = lookup(var) {
            config.plugin_args.entry(option.to_string()).or_insert(val);
        }
    }

    if let Some(val) = lookup("IOCOST_GUARD_INTERVAL") {
        let secs = val
            .parse()
            .with_context(|| format!("Invalid IOCOST_GUARD_INTERVAL: {val}"))?;
        config.check_interval = Duration::from_secs(secs);
    }
    if let Some(val) = lookup("IOCOST_GUARD_PRESSURE_THRESHOLD") {
        config.pressure_threshold = val
            .parse()
            .with_context(|| format!("Invalid IOCOST_GUARD_PRESSURE_THRESHOLD: {val}"))?;
    }

    Ok(config)
}
