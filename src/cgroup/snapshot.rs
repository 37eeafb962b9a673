// Point-in-time view of every monitored cgroup

use super::{CgroupPath, CgroupPattern};
use std::collections::BTreeSet;
use std::fmt;

/// Pressure stall averages (percent), as found on the "some" line of a PSI file
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pressure {
    pub avg10: f64,
    pub avg60: f64,
    pub avg300: f64,
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}:{:.2}:{:.2}", self.avg10, self.avg60, self.avg300)
    }
}

/// Measurements for a single cgroup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CgroupMetrics {
    /// memory.current in bytes
    pub current_usage: u64,
    /// Weighted io.stat counters since cgroup creation
    pub io_cost_cumulative: f64,
    /// Cost generated per second since the previous sample
    pub io_cost_rate: f64,
    pub memory_pressure: Option<Pressure>,
    pub io_pressure: Option<Pressure>,
}

impl CgroupMetrics {
    pub const fn usage_mib(&self) -> u64 {
        self.current_usage / 1024 / 1024
    }
}

/// A cgroup paired with its metrics
#[derive(Debug, Clone, PartialEq)]
pub struct CgroupContext {
    pub path: CgroupPath,
    pub metrics: CgroupMetrics,
}

impl CgroupContext {
    pub fn new(path: CgroupPath, metrics: CgroupMetrics) -> Self {
        Self { path, metrics }
    }
}

impl fmt::Display for CgroupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_pressure =
            |p: Option<Pressure>| p.map_or_else(|| "-".to_string(), |p| p.to_string());
        write!(
            f,
            "{}: usage={}MiB io_cost_rate={:.2} mem_pressure={} io_pressure={}",
            self.path,
            self.metrics.usage_mib(),
            self.metrics.io_cost_rate,
            fmt_pressure(self.metrics.memory_pressure),
            fmt_pressure(self.metrics.io_pressure),
        )
    }
}

/// System-wide PSI from /proc/pressure
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemPressure {
    pub memory: Option<Pressure>,
    pub io: Option<Pressure>,
}

/// Immutable snapshot handed to plugins for one evaluation cycle.
///
/// Entries keep the order in which the monitor discovered them.
#[derive(Debug, Clone, Default)]
pub struct CgroupSnapshot {
    entries: Vec<CgroupContext>,
    system: SystemPressure,
}

impl CgroupSnapshot {
    pub fn new(entries: Vec<CgroupContext>, system: SystemPressure) -> Self {
        Self { entries, system }
    }

    pub fn system(&self) -> SystemPressure {
        self.system
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &CgroupPath) -> Option<&CgroupContext> {
        self.entries.iter().find(|e| &e.path == path)
    }

    /// Every entry, in discovery order
    pub fn rankable(&self) -> Vec<&CgroupContext> {
        self.entries.iter().collect()
    }

    /// Entries matched exactly by `pattern`
    pub fn matching<'a>(
        &'a self,
        pattern: &'a CgroupPattern,
    ) -> impl Iterator<Item = &'a CgroupContext> + 'a {
        self.entries.iter().filter(move |e| pattern.matches(&e.path))
    }

    /// Entries sharing a parent with a match of `pattern` but not matched by it
    pub fn siblings_of(&self, pattern: &CgroupPattern) -> BTreeSet<CgroupPath> {
        self.entries
            .iter()
            .filter(|e| pattern.is_sibling(&e.path))
            .map(|e| e.path.clone())
            .collect()
    }
}
