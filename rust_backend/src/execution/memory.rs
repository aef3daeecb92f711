//! Memory sampling for strategy selection and pressure monitoring.
//!
//! The engine only reads memory figures; it never blocks workers on them.
//! A [`MemoryProbe`] is injected so tests can pin the numbers.

use std::sync::{Arc, Mutex};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// System usage above which the engine relieves memory between chunks.
pub const HIGH_WATER_PERCENT: f64 = 80.0;

/// Source of memory figures, all in bytes.
pub trait MemoryProbe: Send + Sync {
    fn available_bytes(&self) -> u64;
    fn total_bytes(&self) -> u64;
    /// Resident memory of the current process.
    fn process_bytes(&self) -> u64;
}

/// [`MemoryProbe`] backed by `sysinfo`. The `System` handle is reused between samples.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    pid: Pid,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        let mut guard = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn available_bytes(&self) -> u64 {
        self.with_system(|sys| {
            sys.refresh_memory();
            sys.available_memory()
        })
    }

    fn total_bytes(&self) -> u64 {
        self.with_system(|sys| {
            sys.refresh_memory();
            sys.total_memory()
        })
    }

    fn process_bytes(&self) -> u64 {
        let pid = self.pid;
        self.with_system(|sys| {
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                ProcessRefreshKind::new().with_memory(),
            );
            sys.process(pid).map(|p| p.memory()).unwrap_or(0)
        })
    }
}

/// Probe returning fixed figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemoryProbe {
    pub available: u64,
    pub total: u64,
    pub process: u64,
}

impl FixedMemoryProbe {
    pub fn with_available(available: u64) -> Self {
        Self {
            available,
            total: available.saturating_mul(2),
            process: 0,
        }
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn available_bytes(&self) -> u64 {
        self.available
    }

    fn total_bytes(&self) -> u64 {
        self.total
    }

    fn process_bytes(&self) -> u64 {
        self.process
    }
}

/// One reading of the probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    pub process_bytes: u64,
    pub system_percent: f64,
}

impl MemorySample {
    pub fn process_mb(&self) -> f64 {
        self.process_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Watches system memory usage against [`HIGH_WATER_PERCENT`].
#[derive(Clone)]
pub struct MemoryMonitor {
    probe: Arc<dyn MemoryProbe>,
    enabled: bool,
}

impl MemoryMonitor {
    /// A disabled monitor still samples; it just never reports pressure.
    pub fn new(probe: Arc<dyn MemoryProbe>, enabled: bool) -> Self {
        Self { probe, enabled }
    }

    pub fn probe(&self) -> &Arc<dyn MemoryProbe> {
        &self.probe
    }

    pub fn sample(&self) -> MemorySample {
        let total = self.probe.total_bytes();
        let available = self.probe.available_bytes();
        let system_percent = if total == 0 {
            0.0
        } else {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        };
        MemorySample {
            process_bytes: self.probe.process_bytes(),
            system_percent,
        }
    }

    /// True when monitoring is on and system usage is above the high-water mark.
    pub fn under_pressure(&self, sample: &MemorySample) -> bool {
        self.enabled && sample.system_percent > HIGH_WATER_PERCENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_sample_percent() {
        let probe = FixedMemoryProbe {
            available: 100 * MB,
            total: 1000 * MB,
            process: 50 * MB,
        };
        let monitor = MemoryMonitor::new(Arc::new(probe), true);
        let sample = monitor.sample();
        assert!((sample.system_percent - 90.0).abs() < 1e-9);
        assert!((sample.process_mb() - 50.0).abs() < 1e-9);
        assert!(monitor.under_pressure(&sample));
    }

    #[test]
    fn test_disabled_monitor_never_reports_pressure() {
        let probe = FixedMemoryProbe {
            available: 0,
            total: 1000 * MB,
            process: 0,
        };
        let monitor = MemoryMonitor::new(Arc::new(probe), false);
        assert!(!monitor.under_pressure(&monitor.sample()));
    }

    #[test]
    fn test_zero_total_is_not_pressure() {
        let monitor = MemoryMonitor::new(Arc::new(FixedMemoryProbe::default()), true);
        let sample = monitor.sample();
        assert_eq!(sample.system_percent, 0.0);
        assert!(!monitor.under_pressure(&sample));
    }

    #[test]
    fn test_system_probe_reports_something() {
        let probe = SystemMemoryProbe::new();
        assert!(probe.total_bytes() > 0);
        assert!(probe.available_bytes() <= probe.total_bytes());
    }
}
