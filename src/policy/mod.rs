// Kill policies and the plugin interface the daemon drives them through

mod cooldown;
mod kill_io_cost;

pub use cooldown::{Cooldown, CooldownGate};
pub use kill_io_cost::{rank_by_io_cost, remove_sibling_cgroups, KillIoCost};

use crate::cgroup::CgroupSnapshot;
use crate::config::{ConfigError, PluginArgs};
use crate::monitor::MonitoredResources;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which rule triggered an action, carried into kill audit records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionContext {
    pub ruleset: String,
    pub detector_group: String,
}

impl ActionContext {
    pub fn new(ruleset: impl Into<String>, detector_group: impl Into<String>) -> Self {
        Self {
            ruleset: ruleset.into(),
            detector_group: detector_group.into(),
        }
    }
}

/// Everything a plugin sees during one evaluation cycle
#[derive(Debug, Clone)]
pub struct PolicyContext {
    pub snapshot: Arc<CgroupSnapshot>,
    pub action: ActionContext,
}

/// Information available while a plugin is constructed
#[derive(Debug, Clone)]
pub struct PluginConstructionContext {
    cgroup_fs: PathBuf,
}

impl PluginConstructionContext {
    pub fn new(cgroup_fs: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_fs: cgroup_fs.into(),
        }
    }

    /// Mount point of the cgroup v2 hierarchy
    pub fn cgroup_fs(&self) -> &std::path::Path {
        &self.cgroup_fs
    }
}

/// Outcome of running a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginRet {
    /// Nothing was done, let the next plugin run
    Continue,
    /// Action taken; halt the chain and hold off for `cooldown`
    Stop { cooldown: Duration },
}

pub trait Plugin {
    fn name(&self) -> &str;

    /// Validate options and register the cgroups the plugin needs monitored
    fn init(
        &mut self,
        resources: &mut MonitoredResources,
        args: &PluginArgs,
        context: &PluginConstructionContext,
    ) -> Result<(), ConfigError>;

    fn run(&mut self, ctx: &PolicyContext) -> PluginRet;
}
