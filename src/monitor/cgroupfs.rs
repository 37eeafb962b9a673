// Readers for cgroup v2 interface files

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const MEMORY_CURRENT: &str = "memory.current";
pub const MEMORY_PRESSURE: &str = "memory.pressure";
pub const IO_STAT: &str = "io.stat";
pub const IO_PRESSURE: &str = "io.pressure";
pub const CGROUP_PROCS: &str = "cgroup.procs";
pub const CGROUP_KILL: &str = "cgroup.kill";

/// Weights applied to io.stat counters to derive a single cost figure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoCostCoeffs {
    pub rbytes: f64,
    pub wbytes: f64,
    pub dbytes: f64,
    pub rios: f64,
    pub wios: f64,
    pub dios: f64,
}

impl Default for IoCostCoeffs {
    fn default() -> Self {
        // One operation costs as much as one 4KiB page of transfer
        let per_byte = 1.0 / 4096.0;
        Self {
            rbytes: per_byte,
            wbytes: per_byte,
            dbytes: per_byte,
            rios: 1.0,
            wios: 1.0,
            dios: 1.0,
        }
    }
}

/// io.stat counters summed over all devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStat {
    pub rbytes: u64,
    pub wbytes: u64,
    pub dbytes: u64,
    pub rios: u64,
    pub wios: u64,
    pub dios: u64,
}

impl IoStat {
    /// Parse io.stat contents, one line per device:
    /// `8:16 rbytes=1459200 wbytes=314773504 rios=192 wios=353 dbytes=0 dios=0`
    pub fn parse(content: &str) -> Self {
        let mut stat = Self::default();

        for line in content.lines() {
            for field in line.split_whitespace().skip(1) {
                let Some((key, value)) = field.split_once('=') else {
                    continue;
                };
                let Ok(value) = value.parse::<u64>() else {
                    continue;
                };
                let slot = match key {
                    "rbytes" => &mut stat.rbytes,
                    "wbytes" => &mut stat.wbytes,
                    "dbytes" => &mut stat.dbytes,
                    "rios" => &mut stat.rios,
                    "wios" => &mut stat.wios,
                    "dios" => &mut stat.dios,
                    _ => continue,
                };
                *slot = slot.saturating_add(value);
            }
        }

        stat
    }

    pub fn cost(&self, coeffs: &IoCostCoeffs) -> f64 {
        self.rbytes as f64 * coeffs.rbytes
            + self.wbytes as f64 * coeffs.wbytes
            + self.dbytes as f64 * coeffs.dbytes
            + self.rios as f64 * coeffs.rios
            + self.wios as f64 * coeffs.wios
            + self.dios as f64 * coeffs.dios
    }
}

/// Read memory.current in bytes
pub fn read_memory_current(cgroup_dir: &Path) -> Result<u64> {
    let path = cgroup_dir.join(MEMORY_CURRENT);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {MEMORY_CURRENT} value"))
}

pub fn read_io_stat(cgroup_dir: &Path) -> Result<IoStat> {
    let path = cgroup_dir.join(IO_STAT);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(IoStat::parse(&content))
}

/// Pids listed in cgroup.procs
pub fn read_procs(cgroup_dir: &Path) -> Result<Vec<i32>> {
    let path = cgroup_dir.join(CGROUP_PROCS);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse().with_context(|| format!("Invalid pid in {}: {l}", path.display())))
        .collect()
}

/// Names of the child cgroups of `cgroup_dir`, sorted
pub fn child_cgroups(cgroup_dir: &Path) -> Result<Vec<String>> {
    let mut children = Vec::new();

    for entry in fs::read_dir(cgroup_dir)
        .with_context(|| format!("Failed to list {}", cgroup_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            children.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    children.sort();
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_io_stat_sums_devices() {
        let content = "8:16 rbytes=4096 wbytes=8192 rios=1 wios=2 dbytes=0 dios=0\n\
                       253:0 rbytes=4096 wbytes=0 rios=3 wios=0 dbytes=4096 dios=1\n";
        let stat = IoStat::parse(content);
        assert_eq!(stat.rbytes, 8192);
        assert_eq!(stat.wbytes, 8192);
        assert_eq!(stat.rios, 4);
        assert_eq!(stat.wios, 2);
        assert_eq!(stat.dbytes, 4096);
        assert_eq!(stat.dios, 1);

        // 5 pages + 7 ops
        assert_eq!(stat.cost(&IoCostCoeffs::default()), 12.0);
    }

    #[test]
    fn test_parse_io_stat_ignores_unknown_fields() {
        let stat = IoStat::parse("8:0 rbytes=10 cost.usage=99 bogus\n");
        assert_eq!(stat.rbytes, 10);
        assert_eq!(stat.wbytes, 0);
    }

    #[test]
    fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MEMORY_CURRENT), "1048576\n").unwrap();
        fs::write(dir.path().join(CGROUP_PROCS), "12\n34\n").unwrap();
        fs::create_dir(dir.path().join("b.service")).unwrap();
        fs::create_dir(dir.path().join("a.service")).unwrap();

        assert_eq!(read_memory_current(dir.path()).unwrap(), 1_048_576);
        assert_eq!(read_procs(dir.path()).unwrap(), vec![12, 34]);
        assert_eq!(
            child_cgroups(dir.path()).unwrap(),
            vec!["a.service".to_string(), "b.service".to_string()]
        );
        assert!(read_io_stat(dir.path()).is_err());
    }
}
