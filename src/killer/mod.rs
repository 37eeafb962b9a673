// Cgroup killer module

mod cgroup;
pub mod signals;

pub use cgroup::CgroupKiller;
pub use signals::KillResult;

use crate::cgroup::{CgroupMetrics, CgroupPath};
use crate::policy::ActionContext;
use std::fmt;
use std::path::Path;

/// Opaque identifier of a successful kill, time-sortable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KillId(String);

impl KillId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KillId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for KillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kill and audit mechanics shared by every kill policy
pub trait KillMechanism {
    /// Kill everything in the cgroup at `cgroup_path`.
    ///
    /// Returns `None` when nothing was killed (empty, vanished or protected cgroup).
    fn try_to_kill_cgroup(&self, cgroup_path: &Path, recursive: bool, dry: bool) -> Option<KillId>;

    /// Record a successful kill
    fn log_kill(
        &self,
        target: &CgroupPath,
        metrics: &CgroupMetrics,
        action: &ActionContext,
        kill_id: &KillId,
        dry: bool,
    );
}
