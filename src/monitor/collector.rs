// Snapshot collection from the cgroup v2 filesystem

use super::cgroupfs::{self, IoCostCoeffs};
use super::pressure;
use super::{MonitoredResources, SnapshotSource};
use crate::cgroup::{CgroupContext, CgroupMetrics, CgroupPath, CgroupPattern, CgroupSnapshot};
use crate::clock::Clock;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Builds snapshots of every monitored cgroup and its descendants
pub struct CgroupMonitor {
    proc_root: PathBuf,
    resources: MonitoredResources,
    coeffs: IoCostCoeffs,
    clock: Arc<dyn Clock>,
    previous: HashMap<CgroupPath, (Instant, f64)>,
}

impl CgroupMonitor {
    pub fn new(resources: MonitoredResources, clock: Arc<dyn Clock>) -> Self {
        Self::with_proc_path(resources, "/proc", clock)
    }

    /// Create a monitor with a custom proc path (for testing)
    pub fn with_proc_path(
        resources: MonitoredResources,
        proc_root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            resources,
            coeffs: IoCostCoeffs::default(),
            clock,
            previous: HashMap::new(),
        }
    }

    /// Existing cgroups matched by `pattern`, walking the hierarchy one component at a time
    fn resolve(pattern: &CgroupPattern) -> Vec<CgroupPath> {
        let root = CgroupPath::from_components(pattern.path().cgroup_fs_arc(), Vec::new());
        let mut current = vec![root];

        for index in 0..pattern.depth() {
            let mut next = Vec::new();
            for cgroup in &current {
                let Ok(children) = cgroupfs::child_cgroups(&cgroup.absolute_path()) else {
                    continue;
                };
                next.extend(
                    children
                        .iter()
                        .filter(|name| pattern.component_matches(index, name))
                        .map(|name| cgroup.child(name)),
                );
            }
            current = next;
        }

        current
    }

    /// Pre-order walk: the cgroup first, then its descendants
    fn collect_tree(cgroup: CgroupPath, seen: &mut HashSet<CgroupPath>, out: &mut Vec<CgroupPath>) {
        if !seen.insert(cgroup.clone()) {
            return;
        }
        let children = cgroupfs::child_cgroups(&cgroup.absolute_path()).unwrap_or_default();
        out.push(cgroup.clone());
        for name in children {
            Self::collect_tree(cgroup.child(&name), seen, out);
        }
    }

    fn read_metrics(&mut self, cgroup: &CgroupPath, now: Instant) -> Result<CgroupMetrics> {
        let dir = cgroup.absolute_path();
        if !dir.is_dir() {
            bail!("cgroup {cgroup} no longer exists");
        }

        // The root cgroup has neither memory.current nor io.stat
        let current_usage = cgroupfs::read_memory_current(&dir).unwrap_or(0);
        let io_cost_cumulative = cgroupfs::read_io_stat(&dir)
            .map(|stat| stat.cost(&self.coeffs))
            .unwrap_or(0.0);

        let io_cost_rate = match self.previous.get(cgroup) {
            Some(&(at, prev)) if io_cost_cumulative >= prev => {
                let secs = now.saturating_duration_since(at).as_secs_f64();
                if secs > 0.0 {
                    (io_cost_cumulative - prev) / secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        self.previous
            .insert(cgroup.clone(), (now, io_cost_cumulative));

        Ok(CgroupMetrics {
            current_usage,
            io_cost_cumulative,
            io_cost_rate,
            memory_pressure: pressure::read_pressure(&dir.join(cgroupfs::MEMORY_PRESSURE)).ok(),
            io_pressure: pressure::read_pressure(&dir.join(cgroupfs::IO_PRESSURE)).ok(),
        })
    }
}

impl SnapshotSource for CgroupMonitor {
    fn refresh(&mut self) -> Result<Arc<CgroupSnapshot>> {
        let now = self.clock.now();

        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for pattern in self.resources.iter() {
            for cgroup in Self::resolve(pattern) {
                Self::collect_tree(cgroup, &mut seen, &mut paths);
            }
        }

        let mut entries = Vec::with_capacity(paths.len());
        for cgroup in paths {
            match self.read_metrics(&cgroup, now) {
                Ok(metrics) => entries.push(CgroupContext::new(cgroup, metrics)),
                Err(e) => log::debug!("Skipping {cgroup}: {e}"),
            }
        }

        // Forget cgroups that went away so a recreated one starts fresh
        self.previous.retain(|cgroup, _| seen.contains(cgroup));

        let system = pressure::read_system_pressure(&self.proc_root);
        log::debug!("Collected {} cgroups", entries.len());

        Ok(Arc::new(CgroupSnapshot::new(entries, system)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn make_cgroup(root: &Path, rel: &str, usage: u64, io_stat: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(cgroupfs::MEMORY_CURRENT), format!("{usage}\n")).unwrap();
        fs::write(dir.join(cgroupfs::IO_STAT), io_stat).unwrap();
    }

    fn monitor_for(root: &Path, patterns: &[&str], clock: Arc<ManualClock>) -> CgroupMonitor {
        let mut resources = MonitoredResources::default();
        for p in patterns {
            resources.insert(CgroupPattern::new(root, p).unwrap());
        }
        CgroupMonitor::with_proc_path(resources, root.join("proc"), clock)
    }

    #[test]
    fn test_glob_resolution_and_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        make_cgroup(root, "workload.slice/a.service", 1024, "");
        make_cgroup(root, "workload.slice/b.service/worker", 2048, "");
        make_cgroup(root, "workload.slice/c.scope", 0, "");
        make_cgroup(root, "system.slice/d.service", 0, "");

        let clock = Arc::new(ManualClock::new());
        let mut monitor = monitor_for(root, &["workload.slice/*.service"], clock);
        let snapshot = monitor.refresh().unwrap();

        let names: Vec<String> = snapshot
            .rankable()
            .iter()
            .map(|e| e.path.relative_path())
            .collect();
        assert_eq!(
            names,
            vec![
                "workload.slice/a.service",
                "workload.slice/b.service",
                "workload.slice/b.service/worker",
            ]
        );
        let worker = CgroupPath::new(root, "workload.slice/b.service/worker");
        assert_eq!(snapshot.get(&worker).unwrap().metrics.current_usage, 2048);
    }

    #[test]
    fn test_io_cost_rate_from_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        make_cgroup(root, "app", 0, "8:0 rios=100\n");

        let clock = Arc::new(ManualClock::new());
        let mut monitor = monitor_for(root, &["app"], Arc::clone(&clock));
        let app = CgroupPath::new(root, "app");

        let first = monitor.refresh().unwrap();
        assert_eq!(first.get(&app).unwrap().metrics.io_cost_rate, 0.0);
        assert_eq!(first.get(&app).unwrap().metrics.io_cost_cumulative, 100.0);

        fs::write(root.join("app").join(cgroupfs::IO_STAT), "8:0 rios=300\n").unwrap();
        clock.advance(Duration::from_secs(2));

        let second = monitor.refresh().unwrap();
        assert_eq!(second.get(&app).unwrap().metrics.io_cost_rate, 100.0);
    }

    #[test]
    fn test_counter_reset_yields_zero_rate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        make_cgroup(root, "app", 0, "8:0 rios=500\n");

        let clock = Arc::new(ManualClock::new());
        let mut monitor = monitor_for(root, &["app"], Arc::clone(&clock));
        monitor.refresh().unwrap();

        fs::write(root.join("app").join(cgroupfs::IO_STAT), "8:0 rios=10\n").unwrap();
        clock.advance(Duration::from_secs(1));

        let snapshot = monitor.refresh().unwrap();
        let app = CgroupPath::new(root, "app");
        assert_eq!(snapshot.get(&app).unwrap().metrics.io_cost_rate, 0.0);
    }

    #[test]
    fn test_missing_cgroup_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let mut monitor = monitor_for(dir.path(), &["gone.slice"], clock);

        let snapshot = monitor.refresh().unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.system().io.is_none());
    }
}
