// Cgroup identities, patterns and snapshots

mod path;
mod pattern;
mod snapshot;

pub use path::CgroupPath;
pub use pattern::CgroupPattern;
pub use snapshot::{CgroupContext, CgroupMetrics, CgroupSnapshot, Pressure, SystemPressure};
