// Kill the cgroup generating the most IO cost

use super::{ActionContext, Cooldown, Plugin, PluginConstructionContext, PluginRet, PolicyContext};
use crate::cgroup::{CgroupContext, CgroupSnapshot};
use crate::config::{ConfigError, PluginArgs, PolicyConfig, TargetScope};
use crate::killer::KillMechanism;
use crate::monitor::MonitoredResources;
use std::collections::BTreeSet;

/// NaN rates rank below everything else
fn cost_key(entry: &CgroupContext) -> f64 {
    let rate = entry.metrics.io_cost_rate;
    if rate.is_nan() {
        f64::NEG_INFINITY
    } else {
        rate
    }
}

/// Order every snapshot entry by io cost rate, highest first.
/// Equal rates fall back to path order so the ranking is deterministic.
pub fn rank_by_io_cost(snapshot: &CgroupSnapshot) -> Vec<&CgroupContext> {
    let mut ranked = snapshot.rankable();
    ranked.sort_by(|a, b| {
        cost_key(b)
            .total_cmp(&cost_key(a))
            .then_with(|| a.path.cmp(&b.path))
    });
    ranked
}

/// Drop candidates that are siblings of a scope member without being inside the scope
pub fn remove_sibling_cgroups(
    scope: &TargetScope,
    snapshot: &CgroupSnapshot,
    candidates: &mut Vec<&CgroupContext>,
) {
    let siblings: BTreeSet<_> = scope
        .iter()
        .flat_map(|pattern| snapshot.siblings_of(pattern))
        .collect();

    candidates.retain(|c| !siblings.contains(&c.path) || scope.covers(&c.path));
}

/// Log a ranking; negligible entries (no memory, no io) are skipped unless `verbose`
fn dump_candidates(candidates: &[&CgroupContext], verbose: bool) {
    log::info!("Dumping {} candidate cgroup(s):", candidates.len());
    for entry in candidates {
        if !verbose && entry.metrics.current_usage == 0 && entry.metrics.io_cost_rate == 0.0 {
            continue;
        }
        log::info!("  {entry}");
    }
}

/// Kills the highest io cost cgroup, staying out of peers of the configured cgroups
pub struct KillIoCost {
    killer: Box<dyn KillMechanism>,
    config: Option<PolicyConfig>,
}

impl KillIoCost {
    pub const NAME: &'static str = "kill_by_io_cost";

    pub fn new(killer: Box<dyn KillMechanism>) -> Self {
        Self {
            killer,
            config: None,
        }
    }

    pub fn config(&self) -> Option<&PolicyConfig> {
        self.config.as_ref()
    }

    /// Walk the filtered ranking until one kill succeeds
    fn try_to_kill_something(
        &self,
        config: &PolicyConfig,
        snapshot: &CgroupSnapshot,
        action: &ActionContext,
    ) -> bool {
        let mut candidates = rank_by_io_cost(snapshot);
        if config.debug {
            dump_candidates(&candidates, true);
            log::info!("Removed sibling cgroups");
        }
        remove_sibling_cgroups(&config.target_scope, snapshot, &mut candidates);
        dump_candidates(&candidates, config.debug);

        for entry in candidates {
            log::info!(
                "Picked \"{}\" ({}MiB) based on io cost generation at {:.2}",
                entry.path,
                entry.metrics.usage_mib(),
                entry.metrics.io_cost_rate
            );

            let kill_id =
                self.killer
                    .try_to_kill_cgroup(&entry.path.absolute_path(), true, config.dry_run);
            if let Some(kill_id) = kill_id {
                self.killer.log_kill(
                    &entry.path,
                    &entry.metrics,
                    action,
                    &kill_id,
                    config.dry_run,
                );
                return true;
            }
        }

        false
    }
}

impl Plugin for KillIoCost {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(
        &mut self,
        resources: &mut MonitoredResources,
        args: &PluginArgs,
        context: &PluginConstructionContext,
    ) -> Result<(), ConfigError> {
        let config = PolicyConfig::from_args(args, context.cgroup_fs())?;
        for pattern in config.target_scope.iter() {
            resources.insert(pattern.clone());
        }
        if config.dry_run {
            log::warn!("{}: DRY RUN MODE - will not actually kill cgroups", Self::NAME);
        }
        self.config = Some(config);
        Ok(())
    }

    fn run(&mut self, ctx: &PolicyContext) -> PluginRet {
        let Some(config) = &self.config else {
            log::error!("{} run before init", Self::NAME);
            return PluginRet::Continue;
        };

        let killed = self.try_to_kill_something(config, &ctx.snapshot, &ctx.action);
        Cooldown::new(config.post_action_delay).after_attempt(killed)
    }
}
