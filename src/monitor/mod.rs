// Cgroup monitoring module

pub mod cgroupfs;
mod collector;
pub mod pressure;

pub use collector::CgroupMonitor;

use crate::cgroup::{CgroupPattern, CgroupSnapshot};
use anyhow::Result;
use std::sync::Arc;

/// Produces a fresh, immutable snapshot for each evaluation cycle
pub trait SnapshotSource {
    fn refresh(&mut self) -> Result<Arc<CgroupSnapshot>>;
}

/// Cgroup patterns plugins asked to have monitored
#[derive(Debug, Clone, Default)]
pub struct MonitoredResources {
    patterns: Vec<CgroupPattern>,
}

impl MonitoredResources {
    /// Register a pattern; duplicates are ignored
    pub fn insert(&mut self, pattern: CgroupPattern) -> bool {
        if self.patterns.contains(&pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
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
}
