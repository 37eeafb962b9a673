// Kill policy options

use crate::cgroup::{CgroupPath, CgroupPattern};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// String-keyed options handed to a plugin at init
pub type PluginArgs = HashMap<String, String>;

pub const ARG_CGROUP: &str = "cgroup";
pub const ARG_POST_ACTION_DELAY: &str = "post_action_delay";
pub const ARG_DRY: &str = "dry";
pub const ARG_DEBUG: &str = "debug";

/// Why a plugin refused to initialize
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Argument={option} not present")]
    MissingRequiredOption { option: &'static str },

    #[error("Argument={option} has invalid value \"{value}\": {reason}")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(option: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            option,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// "true", "True" and "1" enable a flag; anything else leaves it off
pub fn parse_flag(value: &str) -> bool {
    matches!(value, "true" | "True" | "1")
}

/// The cgroups an operator allows a policy to act on. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScope {
    patterns: Vec<CgroupPattern>,
}

impl TargetScope {
    /// Parse a comma-separated list of cgroup patterns relative to `cgroup_fs`
    pub fn parse(cgroup_fs: &Path, list: &str) -> Result<Self, ConfigError> {
        let mut patterns: Vec<CgroupPattern> = Vec::new();

        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = CgroupPattern::new(cgroup_fs, raw)
                .map_err(|e| ConfigError::invalid(ARG_CGROUP, raw, e.to_string()))?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        if patterns.is_empty() {
            return Err(ConfigError::invalid(ARG_CGROUP, list, "no cgroups listed"));
        }

        Ok(Self { patterns })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CgroupPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// In the scope itself or a descendant of a scope member
    pub fn covers(&self, cgroup: &CgroupPath) -> bool {
        self.patterns.iter().any(|p| p.covers(cgroup))
    }
}

/// Validated options of the io cost kill policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub target_scope: TargetScope,
    pub post_action_delay: Duration,
    pub dry_run: bool,
    pub debug: bool,
}

impl PolicyConfig {
    pub fn from_args(args: &PluginArgs, cgroup_fs: &Path) -> Result<Self, ConfigError> {
        let list = args
            .get(ARG_CGROUP)
            .ok_or(ConfigError::MissingRequiredOption { option: ARG_CGROUP })?;
        let target_scope = TargetScope::parse(cgroup_fs, list)?;

        let post_action_delay = match args.get(ARG_POST_ACTION_DELAY) {
            Some(raw) => {
                let secs: i64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::invalid(ARG_POST_ACTION_DELAY, raw, e.to_string())
                })?;
                let secs = u64::try_from(secs).map_err(|_| {
                    ConfigError::invalid(ARG_POST_ACTION_DELAY, raw, "must be non-negative")
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::ZERO,
        };

        Ok(Self {
            target_scope,
            post_action_delay,
            dry_run: args.get(ARG_DRY).is_some_and(|v| parse_flag(v)),
            debug: args.get(ARG_DEBUG).is_some_and(|v| parse_flag(v)),
        })
    }
}
