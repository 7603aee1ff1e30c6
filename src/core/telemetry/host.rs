use serde::Serialize;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

/// Static description of the machine, shown above the device summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub hostname: String,
    pub os_name: String,
    pub kernel_release: String,
    pub architecture: String,
    pub physical_cores: Option<usize>,
    pub logical_cpus: Option<usize>,
    pub total_ram_bytes: u64,
}

impl HostSummary {
    pub fn collect() -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing())
            .with_memory(MemoryRefreshKind::nothing().with_ram());
        let system = System::new_with_specifics(refresh);

        let logical = system.cpus().len();

        Self {
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
            os_name: kernel_name(std::env::consts::OS),
            kernel_release: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            architecture: std::env::consts::ARCH.to_string(),
            physical_cores: System::physical_core_count(),
            logical_cpus: (logical > 0).then_some(logical),
            total_ram_bytes: system.total_memory(),
        }
    }

    pub fn render(&self) -> String {
        let count = |n: Option<usize>| n.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string());
        format!(
            "{}\n{} | {} | {}\nCPU Cores: {} | Logical CPUs: {} | Total RAM: {:.2} GB",
            self.hostname,
            self.os_name,
            self.kernel_release,
            self.architecture,
            count(self.physical_cores),
            count(self.logical_cpus),
            self.total_ram_bytes as f64 / 1e9
        )
    }
}

/// `uname -s` style name for a target OS; `System::name` would give the
/// distribution instead.
fn kernel_name(os: &str) -> String {
    match os {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        "windows" => "Windows".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}
