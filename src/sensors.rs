// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! CPU temperature and usage sampling.
//!
//! Temperature is the peak over every `/sys/class/thermal/thermal_zone*`
//! entry. Usage is derived from the aggregate `cpu` line of `/proc/stat`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const THERMAL_ROOT: &str = "/sys/class/thermal";
pub const PROC_STAT: &str = "/proc/stat";

/// Something the control loop can poll once per tick.
pub trait TemperatureSource: Send {
    /// Current peak temperature in degrees Celsius, 0 on failure.
    fn temperature(&mut self) -> f64;

    /// Busy fraction (0-1) since the previous call, -1 on failure.
    fn usage_fraction(&mut self) -> f64;
}

/// Reads the kernel's thermal zones and CPU counters.
#[derive(Debug)]
pub struct SysSource {
    thermal_root: PathBuf,
    stat_path: PathBuf,
    last: CpuTimes,
}

impl SysSource {
    pub fn new() -> Self {
        Self::with_paths(THERMAL_ROOT, PROC_STAT)
    }

    pub fn with_paths(thermal_root: impl Into<PathBuf>, stat_path: impl Into<PathBuf>) -> Self {
        Self {
            thermal_root: thermal_root.into(),
            stat_path: stat_path.into(),
            last: CpuTimes::default(),
        }
    }
}

impl Default for SysSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSource for SysSource {
    fn temperature(&mut self) -> f64 {
        match read_peak_temperature(&self.thermal_root) {
            Ok(Some(t)) => t,
            Ok(None) => {
                log::warn!("No readable thermal zone under {}", self.thermal_root.display());
                0.0
            }
            Err(e) => {
                log::error!("Failed to read {}: {e}", self.thermal_root.display());
                0.0
            }
        }
    }

    fn usage_fraction(&mut self) -> f64 {
        let Some(now) = fs::read_to_string(&self.stat_path)
            .ok()
            .and_then(|s| parse_cpu_times(&s))
        else {
            return -1.0;
        };
        let fraction = now.busy_fraction_since(&self.last);
        self.last = now;
        fraction
    }
}

/// Peak temperature across all thermal zones under `root`.
///
/// Zones that cannot be read or parsed are skipped; `None` when none was
/// read. Negative peaks are reported as 0.
pub fn read_peak_temperature(root: &Path) -> io::Result<Option<f64>> {
    let mut max_milli: Option<i64> = None;

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with("thermal_zone") {
            continue;
        }
        let Some(milli) = read_trimmed(&entry.path().join("temp"))
            .and_then(|s| s.parse::<i64>().ok())
        else {
            continue;
        };
        max_milli = Some(max_milli.map_or(milli, |m| m.max(milli)));
    }

    Ok(max_milli.map(|m| m.max(0) as f64 / 1000.0))
}

/// Cumulative idle and non-idle jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub busy: u64,
}

impl CpuTimes {
    pub fn busy_fraction_since(&self, prev: &CpuTimes) -> f64 {
        let idle = self.idle.saturating_sub(prev.idle);
        let busy = self.busy.saturating_sub(prev.busy);
        if idle + busy == 0 {
            return 0.0;
        }
        busy as f64 / (idle + busy) as f64
    }
}

/// Parse the aggregate `cpu` line of a `/proc/stat` dump.
///
/// Fields are user, nice, system, idle, iowait, irq, softirq, steal, ...;
/// idle and iowait count as idle, the rest as busy.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))?;

    let mut times = CpuTimes::default();
    for (i, field) in line.split_whitespace().skip(1).enumerate() {
        let v: u64 = field.parse().ok()?;
        if i == 3 || i == 4 {
            times.idle += v;
        } else {
            times.busy += v;
        }
    }
    Some(times)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
