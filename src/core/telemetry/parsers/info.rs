//! `nvidia-smi -q` key/value block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Value used for any field the block does not contain.
pub const UNKNOWN: &str = "N/A";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Product Name\s+:\s+(.*)").expect("valid regex"));
static DRIVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Driver Version\s+:\s+([\d.]+)").expect("valid regex"));
static CUDA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CUDA Version\s+:\s+([\d.]+)").expect("valid regex"));
static MEMORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"FB Memory Usage[\s\S]*?Total\s+:\s+(\d+\s+[KMG]iB)").expect("valid regex")
});
static MAX_POWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Max Power Limit\s+:\s+([\d.]+\s+W)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub driver_version: String,
    pub cuda_version: String,
    /// e.g. `24576 MiB`
    pub total_memory: String,
    /// e.g. `450.00 W`
    pub max_power: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            driver_version: UNKNOWN.to_string(),
            cuda_version: UNKNOWN.to_string(),
            total_memory: UNKNOWN.to_string(),
            max_power: UNKNOWN.to_string(),
        }
    }
}

impl DeviceInfo {
    /// Total framebuffer memory in bytes (decimal multipliers, matching the
    /// memory formatter's thresholds).
    pub fn total_memory_bytes(&self) -> Option<f64> {
        let mut parts = self.total_memory.split_whitespace();
        let value: f64 = parts.next()?.parse().ok()?;
        let multiplier = match parts.next()? {
            "KiB" => 1e3,
            "MiB" => 1e6,
            "GiB" => 1e9,
            _ => return None,
        };
        Some(value * multiplier)
    }

    pub fn max_power_watts(&self) -> Option<f64> {
        self.max_power.split_whitespace().next()?.parse().ok()
    }

    /// One-line description shown under the host summary.
    pub fn summary(&self) -> String {
        format!(
            "{} | Driver: {} | CUDA: {} | VRAM: {}",
            self.name, self.driver_version, self.cuda_version, self.total_memory
        )
    }
}

/// Extract each field independently; missing ones stay [`UNKNOWN`].
pub fn parse_device_info(output: &str) -> DeviceInfo {
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };

    DeviceInfo {
        name: capture(&NAME_RE),
        driver_version: capture(&DRIVER_RE),
        cuda_version: capture(&CUDA_RE),
        total_memory: capture(&MEMORY_RE),
        max_power: capture(&MAX_POWER_RE),
    }
}
