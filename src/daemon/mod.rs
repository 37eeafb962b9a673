// Daemon module - evaluation loop and service

mod service;
mod trigger;

pub use service::{CycleOutcome, DaemonService};
pub use trigger::{PressureResource, PressureTrigger};

use crate::cgroup::CgroupPattern;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::killer::CgroupKiller;
use crate::monitor::{CgroupMonitor, MonitoredResources};
use crate::policy::{KillIoCost, Plugin, PluginConstructionContext};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Initialize the kill policy, wire up the monitor and run until shutdown
pub fn run(config: Config) -> Result<()> {
    let context = PluginConstructionContext::new(&config.cgroup_fs);
    let mut resources = MonitoredResources::default();

    for raw in &config.monitor {
        resources.insert(CgroupPattern::new(&config.cgroup_fs, raw)?);
    }

    let trigger_cgroup = config
        .pressure_cgroup
        .as_deref()
        .map(|raw| CgroupPattern::new(&config.cgroup_fs, raw))
        .transpose()
        .context("Invalid pressure cgroup")?;
    if let Some(pattern) = &trigger_cgroup {
        resources.insert(pattern.clone());
    }
    if config.pressure_threshold == 0.0 {
        log::warn!("pressure threshold is 0 - the policy will run every interval");
    }
    let trigger = PressureTrigger::new(
        config.pressure_resource,
        config.pressure_threshold,
        trigger_cgroup,
    );

    let mut plugin = KillIoCost::new(Box::new(CgroupKiller::new()));
    plugin
        .init(&mut resources, &config.plugin_args, &context)
        .with_context(|| format!("Failed to initialize {}", plugin.name()))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = CgroupMonitor::new(resources, Arc::clone(&clock));

    let mut service = DaemonService::new(
        &config,
        Box::new(monitor),
        trigger,
        vec![Box::new(plugin)],
        clock,
    );
    service.run()
}
