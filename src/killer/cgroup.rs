// Killing every process in a cgroup

use super::signals::{process_name, sigkill, KillResult};
use super::{KillId, KillMechanism};
use crate::cgroup::{CgroupMetrics, CgroupPath};
use crate::monitor::cgroupfs::{self, CGROUP_KILL};
use crate::policy::ActionContext;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Kills cgroups through cgroup.kill when available, SIGKILL otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct CgroupKiller;

impl CgroupKiller {
    pub fn new() -> Self {
        Self
    }

    /// Collect pids of the cgroup, and of every descendant when `recursive`
    fn collect_pids(cgroup_path: &Path, recursive: bool, pids: &mut Vec<i32>) -> Result<()> {
        pids.extend(cgroupfs::read_procs(cgroup_path)?);

        if recursive {
            for child in cgroupfs::child_cgroups(cgroup_path)? {
                let child_path = cgroup_path.join(child);
                // A child may exit between listing and reading
                if let Err(e) = Self::collect_pids(&child_path, true, pids) {
                    log::debug!("Skipping {}: {e}", child_path.display());
                }
            }
        }

        Ok(())
    }

    /// Returns the number of processes killed (or that would be killed)
    fn kill_cgroup(cgroup_path: &Path, recursive: bool, dry: bool) -> Result<usize> {
        let mut pids = Vec::new();
        Self::collect_pids(cgroup_path, recursive, &mut pids)?;

        if pids.is_empty() {
            log::debug!("No processes in {}", cgroup_path.display());
            return Ok(0);
        }

        if dry {
            for pid in &pids {
                log::info!(
                    "DRY RUN: Would kill process {} ({})",
                    pid,
                    process_name(*pid)
                );
            }
            return Ok(pids.len());
        }

        let kill_file = cgroup_path.join(CGROUP_KILL);
        if recursive && kill_file.exists() {
            fs::write(&kill_file, "1")
                .with_context(|| format!("Failed to write {}", kill_file.display()))?;
            log::info!(
                "Killed {} process(es) via {}",
                pids.len(),
                kill_file.display()
            );
            return Ok(pids.len());
        }

        let mut killed = 0;
        for pid in pids {
            let name = process_name(pid);
            match sigkill(pid) {
                KillResult::Success => {
                    log::info!("Sent SIGKILL to process {pid} ({name})");
                    killed += 1;
                }
                result => log::warn!(
                    "Failed to send SIGKILL to process {pid} ({name}): {}",
                    result.description()
                ),
            }
        }

        Ok(killed)
    }
}

impl KillMechanism for CgroupKiller {
    fn try_to_kill_cgroup(&self, cgroup_path: &Path, recursive: bool, dry: bool) -> Option<KillId> {
        log::debug!(
            "Attempting to kill cgroup {} (recursive: {}, dry: {})",
            cgroup_path.display(),
            recursive,
            dry
        );

        match Self::kill_cgroup(cgroup_path, recursive, dry) {
            Ok(0) => None,
            Ok(_) => Some(KillId::generate()),
            Err(e) => {
                log::warn!("Failed to kill cgroup {}: {e:#}", cgroup_path.display());
                None
            }
        }
    }

    fn log_kill(
        &self,
        target: &CgroupPath,
        metrics: &CgroupMetrics,
        action: &ActionContext,
        kill_id: &KillId,
        dry: bool,
    ) {
        let fmt_pressure = |p: Option<crate::cgroup::Pressure>| {
            p.map_or_else(|| "-".to_string(), |p| p.to_string())
        };

        log::warn!(
            "{}kill_id={} cgroup={} usage={}MiB io_cost_rate={:.2} mem_pressure={} io_pressure={} ruleset=\"{}\" detectorgroup=\"{}\"",
            if dry { "DRY RUN: " } else { "" },
            kill_id,
            target,
            metrics.usage_mib(),
            metrics.io_cost_rate,
            fmt_pressure(metrics.memory_pressure),
            fmt_pressure(metrics.io_pressure),
            action.ruleset,
            action.detector_group,
        );
    }
}
