// IOCost Guard - cgroup kill policy library

pub mod cgroup;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod killer;
pub mod monitor;
pub mod policy;

// Re-export commonly used types
pub use cgroup::{CgroupPath, CgroupSnapshot};
pub use config::{Config, PolicyConfig};
pub use policy::{KillIoCost, Plugin, PluginRet};
