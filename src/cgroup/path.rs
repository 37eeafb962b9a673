// Cgroup identity

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A cgroup inside a cgroup v2 hierarchy.
///
/// Holds the mount point of the hierarchy plus the path components below it,
/// so both the scope-relative name and the absolute filesystem path can be
/// derived without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgroupPath {
    cgroup_fs: Arc<Path>,
    components: Vec<String>,
}

impl CgroupPath {
    /// Build a path from a mount point and a relative path like "system.slice/foo.service"
    pub fn new(cgroup_fs: impl AsRef<Path>, relative: &str) -> Self {
        let components = relative
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect();

        Self {
            cgroup_fs: Arc::from(cgroup_fs.as_ref()),
            components,
        }
    }

    pub(crate) fn from_components(cgroup_fs: Arc<Path>, components: Vec<String>) -> Self {
        Self {
            cgroup_fs,
            components,
        }
    }

    pub fn cgroup_fs(&self) -> &Path {
        &self.cgroup_fs
    }

    pub(crate) fn cgroup_fs_arc(&self) -> Arc<Path> {
        Arc::clone(&self.cgroup_fs)
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Scope-relative path, "/" for the root cgroup
    pub fn relative_path(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            self.components.join("/")
        }
    }

    /// Absolute filesystem path, used for kill operations
    pub fn absolute_path(&self) -> PathBuf {
        let mut path = self.cgroup_fs.to_path_buf();
        path.extend(&self.components);
        path
    }

    /// Last component, empty for the root
    pub fn name(&self) -> &str {
        self.components.last().map_or("", String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let components = self.components[..self.components.len() - 1].to_vec();
        Some(Self::from_components(self.cgroup_fs_arc(), components))
    }

    pub fn child(&self, name: &str) -> Self {
        let mut components = self.components.clone();
        components.push(name.to_string());
        Self::from_components(self.cgroup_fs_arc(), components)
    }

    /// True if `other` lives strictly below this cgroup
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.components.len() > self.components.len()
            && other.components.starts_with(&self.components)
    }
}

impl fmt::Display for CgroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}
