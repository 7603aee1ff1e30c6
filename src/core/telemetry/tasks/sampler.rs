use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use crate::error::{GpumonError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub percent: f64,
}

/// Synchronous OS sampling primitive used by the CPU and memory workers.
pub trait SystemSampler: Send {
    /// Global CPU utilisation since the previous call, in percent.
    fn cpu_percent(&mut self) -> Result<f64>;

    fn memory(&mut self) -> Result<MemorySample>;
}

/// [`SystemSampler`] backed by `sysinfo`.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::nothing().with_ram());

        // The first usage reading is relative to this refresh
        let system = System::new_with_specifics(refresh_kind);

        Self { system }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for SysinfoSampler {
    fn cpu_percent(&mut self) -> Result<f64> {
        self.system.refresh_cpu_usage();
        let usage = self.system.global_cpu_usage() as f64;
        if !usage.is_finite() {
            return Err(GpumonError::sampling(format!("CPU usage is {}", usage)));
        }
        Ok(usage)
    }

    fn memory(&mut self) -> Result<MemorySample> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(GpumonError::sampling("total memory reported as zero"));
        }
        let used = self.system.used_memory();

        Ok(MemorySample {
            total_bytes: total,
            used_bytes: used,
            percent: (used as f64 / total as f64) * 100.0,
        })
    }
}
