// Pressure detector that gates the plugin chain

use crate::cgroup::{CgroupMetrics, CgroupPattern, CgroupSnapshot, Pressure};
use std::fmt;

/// Which PSI file the trigger watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PressureResource {
    Memory,
    Io,
}

impl PressureResource {
    fn of_cgroup(self, metrics: &CgroupMetrics) -> Option<Pressure> {
        match self {
            Self::Memory => metrics.memory_pressure,
            Self::Io => metrics.io_pressure,
        }
    }
}

impl fmt::Display for PressureResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Io => f.write_str("io"),
        }
    }
}

/// Fires when avg10 pressure reaches the threshold
#[derive(Debug, Clone)]
pub struct PressureTrigger {
    resource: PressureResource,
    threshold: f64,
    cgroup: Option<CgroupPattern>,
}

impl PressureTrigger {
    /// `cgroup` of `None` watches system-wide PSI
    pub fn new(resource: PressureResource, threshold: f64, cgroup: Option<CgroupPattern>) -> Self {
        Self {
            resource,
            threshold,
            cgroup,
        }
    }

    /// Name reported as the detector group in kill records
    pub fn describe(&self) -> String {
        match &self.cgroup {
            Some(cgroup) => format!("{}_pressure {} >= {}", self.resource, cgroup, self.threshold),
            None => format!("{}_pressure >= {}", self.resource, self.threshold),
        }
    }

    pub fn fired(&self, snapshot: &CgroupSnapshot) -> bool {
        let pressure = match &self.cgroup {
            None => {
                let system = snapshot.system();
                match self.resource {
                    PressureResource::Memory => system.memory,
                    PressureResource::Io => system.io,
                }
            }
            // Highest pressure among matching cgroups
            Some(pattern) => snapshot
                .matching(pattern)
                .filter_map(|e| self.resource.of_cgroup(&e.metrics))
                .max_by(|a, b| a.avg10.total_cmp(&b.avg10)),
        };

        match pressure {
            Some(p) if p.avg10 >= self.threshold => {
                log::info!(
                    "{} pressure {} at or above threshold {}",
                    self.resource,
                    p,
                    self.threshold
                );
                true
            }
            Some(p) => {
                log::debug!("{} pressure {} below threshold", self.resource, p);
                false
            }
            None => {
                log::debug!("No {} pressure available", self.resource);
                false
            }
        }
    }
}
