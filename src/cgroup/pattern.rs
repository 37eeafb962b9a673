// Glob patterns over cgroup paths

use super::CgroupPath;
use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::path::Path;

/// Maximum allowed length for a single pattern component
const MAX_COMPONENT_LENGTH: usize = 255;

/// Maximum compiled regex size in bytes (1MB) per component
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Translate one shell-style glob component (`*`, `?`) into an anchored regex.
fn compile_component(component: &str) -> Result<Regex> {
    if component.len() > MAX_COMPONENT_LENGTH {
        bail!(
            "Cgroup pattern component too long (max {} bytes): {}...",
            MAX_COMPONENT_LENGTH,
            component.chars().take(50).collect::<String>()
        );
    }

    let mut expr = String::with_capacity(component.len() + 8);
    expr.push('^');
    for c in component.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .context(format!("Invalid cgroup pattern component: {component}"))
}

/// A cgroup path whose components may contain globs.
///
/// Plain paths (no glob characters) behave as an exact cgroup reference.
#[derive(Debug, Clone)]
pub struct CgroupPattern {
    path: CgroupPath,
    matchers: Vec<Regex>,
}

impl CgroupPattern {
    pub fn new(cgroup_fs: impl AsRef<Path>, raw: &str) -> Result<Self> {
        let path = CgroupPath::new(cgroup_fs, raw);
        let matchers = path
            .components()
            .iter()
            .map(|c| compile_component(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { path, matchers })
    }

    /// The pattern as written, anchored at the cgroup mount point
    pub fn path(&self) -> &CgroupPath {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.matchers.len()
    }

    /// Does component `index` of the pattern accept `name`?
    pub(crate) fn component_matches(&self, index: usize, name: &str) -> bool {
        self.matchers.get(index).is_some_and(|re| re.is_match(name))
    }

    fn prefix_matches(&self, components: &[String], len: usize) -> bool {
        components.len() >= len
            && self.matchers[..len]
                .iter()
                .zip(components)
                .all(|(re, c)| re.is_match(c))
    }

    /// Exact match: same depth, every component accepted
    pub fn matches(&self, cgroup: &CgroupPath) -> bool {
        cgroup.components().len() == self.depth()
            && self.prefix_matches(cgroup.components(), self.depth())
    }

    /// Matched by the pattern itself or lives below a match
    pub fn covers(&self, cgroup: &CgroupPath) -> bool {
        self.prefix_matches(cgroup.components(), self.depth())
    }

    /// Shares a parent with a match of this pattern without being one
    pub fn is_sibling(&self, cgroup: &CgroupPath) -> bool {
        let depth = self.depth();
        if depth == 0 || cgroup.components().len() != depth {
            return false;
        }
        self.prefix_matches(cgroup.components(), depth - 1)
            && !self.component_matches(depth - 1, cgroup.name())
    }
}

impl PartialEq for CgroupPattern {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for CgroupPattern {}

impl fmt::Display for CgroupPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}
