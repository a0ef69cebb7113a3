//! System sampling behind a trait so tests can inject readings.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One point-in-time system reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemReading {
    /// CPU utilisation percent.
    pub cpu_percent: f64,
    /// Memory utilisation percent.
    pub memory_percent: f64,
    /// Disk utilisation percent (most-used mount).
    pub disk_percent: f64,
    /// Total bytes received across interfaces since start.
    pub network_received: u64,
}

/// Source of system readings.
pub trait SystemSampler: Send + Sync {
    /// Take one reading.
    fn sample(&self) -> SystemReading;
}

/// Production sampler backed by `sysinfo`.
pub struct SysinfoSampler {
    system: Mutex<sysinfo::System>,
}

impl SysinfoSampler {
    /// A sampler with a freshly initialised system handle.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new_all()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for SysinfoSampler {
    fn sample(&self) -> SystemReading {
        let mut system = self.system.lock().expect("system handle poisoned");
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_percent = f64::from(system.global_cpu_usage());
        let memory_percent = if system.total_memory() > 0 {
            system.used_memory() as f64 / system.total_memory() as f64 * 100.0
        } else {
            0.0
        };

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let disk_percent = disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space() - d.available_space();
                used as f64 / d.total_space() as f64 * 100.0
            })
            .fold(0.0_f64, f64::max);

        let networks = sysinfo::Networks::new_with_refreshed_list();
        let network_received = networks.iter().map(|(_, data)| data.total_received()).sum();

        SystemReading {
            cpu_percent,
            memory_percent,
            disk_percent,
            network_received,
        }
    }
}

/// Test sampler returning a fixed reading.
pub struct FixedSampler(pub SystemReading);

impl SystemSampler for FixedSampler {
    fn sample(&self) -> SystemReading {
        self.0
    }
}

/// CPU gauge with a 5-second cache so the adaptive queue strategy
/// cannot cause a sampling storm.
pub struct CpuGauge<S: SystemSampler> {
    sampler: S,
    cached: Mutex<Option<(f64, Instant)>>,
    ttl: Duration,
}

impl<S: SystemSampler> CpuGauge<S> {
    /// A gauge with the standard 5-second TTL.
    pub fn new(sampler: S) -> Self {
        Self::with_ttl(sampler, Duration::from_secs(5))
    }

    /// A gauge with a custom TTL.
    pub fn with_ttl(sampler: S, ttl: Duration) -> Self {
        Self {
            sampler,
            cached: Mutex::new(None),
            ttl,
        }
    }

    /// The cached CPU percentage, refreshed at most once per TTL.
    pub fn cpu_percent(&self) -> f64 {
        let mut cached = self.cached.lock().expect("gauge poisoned");
        if let Some((value, at)) = *cached {
            if at.elapsed() < self.ttl {
                return value;
            }
        }
        let value = self.sampler.sample().cpu_percent;
        *cached = Some((value, Instant::now()));
        value
    }
}
