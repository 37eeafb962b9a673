// Pressure stall information parsing (PSI)

use crate::cgroup::{Pressure, SystemPressure};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse the "some" line of a PSI file:
///
/// ```text
/// some avg10=1.53 avg60=0.87 avg300=0.22 total=123456
/// full avg10=0.00 avg60=0.00 avg300=0.00 total=0
/// ```
pub fn parse_pressure(content: &str) -> Result<Pressure> {
    let line = content
        .lines()
        .find(|l| l.starts_with("some "))
        .context("Missing 'some' line in pressure file")?;

    let mut pressure = Pressure::default();
    let mut found = 0;

    for field in line.split_whitespace().skip(1) {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let slot = match key {
            "avg10" => &mut pressure.avg10,
            "avg60" => &mut pressure.avg60,
            "avg300" => &mut pressure.avg300,
            _ => continue,
        };
        *slot = value
            .parse()
            .with_context(|| format!("Failed to parse value for {key}"))?;
        found += 1;
    }

    if found < 3 {
        anyhow::bail!("Incomplete pressure line: {line}");
    }

    Ok(pressure)
}

/// Read and parse a PSI file
pub fn read_pressure(path: &Path) -> Result<Pressure> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_pressure(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read system-wide memory and io pressure from `<proc_root>/pressure`.
/// Kernels without PSI yield `None` for both.
pub fn read_system_pressure(proc_root: &Path) -> SystemPressure {
    let dir = proc_root.join("pressure");
    SystemPressure {
        memory: read_pressure(&dir.join("memory")).ok(),
        io: read_pressure(&dir.join("io")).ok(),
    }
}
