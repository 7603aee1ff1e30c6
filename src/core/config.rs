use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::telemetry::DmonSchema;
use crate::error::GpumonError;

pub const DEFAULT_HISTORY: usize = 1000;
pub const DEFAULT_DMON_POLL_SECS: u64 = 1;
pub const DEFAULT_PROC_POLL_SECS: u64 = 5;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_PARSE_ERRORS: u32 = 20;
pub const DEFAULT_TOOL: &str = "nvidia-smi";

/// Immutable runtime configuration, built once at startup and shared by
/// every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub gpu_id: u32,
    pub history_size: usize,
    pub dmon_poll_interval_secs: u64,
    pub cpu_poll_interval_secs: u64,
    pub proc_poll_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub retry_interval_secs: u64,
    pub max_retries: u32,
    pub max_parse_errors: u32,
    pub timezone: TimezoneSetting,
    pub dmon_schema: SchemaVariant,
    /// Program used for every device query (`nvidia-smi` unless overridden)
    pub tool_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            gpu_id: 0,
            history_size: DEFAULT_HISTORY,
            dmon_poll_interval_secs: DEFAULT_DMON_POLL_SECS,
            cpu_poll_interval_secs: DEFAULT_DMON_POLL_SECS,
            proc_poll_interval_secs: DEFAULT_PROC_POLL_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            retry_interval_secs: DEFAULT_DMON_POLL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_parse_errors: DEFAULT_MAX_PARSE_ERRORS,
            timezone: TimezoneSetting::Local,
            dmon_schema: SchemaVariant::Standard,
            tool_path: DEFAULT_TOOL.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load the config file from the default location, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(MonitorConfig::default());
        }

        let data = fs::read(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // An empty file behaves like a missing one
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(MonitorConfig::default());
        }

        let config: MonitorConfig = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_vec_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("gpumon").join("config.json"))
    }

    /// Reject values the workers cannot run with.
    pub fn validate(&self) -> std::result::Result<(), GpumonError> {
        if self.history_size == 0 {
            return Err(GpumonError::config("history size must be at least 1"));
        }
        if self.dmon_poll_interval_secs == 0
            || self.cpu_poll_interval_secs == 0
            || self.proc_poll_interval_secs == 0
        {
            return Err(GpumonError::config("poll intervals must be at least 1 second"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(GpumonError::config("probe timeout must be at least 1 second"));
        }
        if self.max_retries == 0 {
            return Err(GpumonError::config("max retries must be at least 1"));
        }
        if self.tool_path.trim().is_empty() {
            return Err(GpumonError::config("tool path must not be empty"));
        }
        Ok(())
    }

    pub fn dmon_poll_interval(&self) -> Duration {
        Duration::from_secs(self.dmon_poll_interval_secs)
    }

    pub fn cpu_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cpu_poll_interval_secs)
    }

    pub fn proc_poll_interval(&self) -> Duration {
        Duration::from_secs(self.proc_poll_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn schema(&self) -> DmonSchema {
        self.dmon_schema.schema()
    }
}

/// Timezone used to stamp metric points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimezoneSetting {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl TimezoneSetting {
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self {
            TimezoneSetting::Local => Local::now().fixed_offset(),
            TimezoneSetting::Utc => Utc::now().fixed_offset(),
            TimezoneSetting::Fixed(offset) => Utc::now().with_timezone(offset),
        }
    }
}

impl FromStr for TimezoneSetting {
    type Err = GpumonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(TimezoneSetting::Local),
            "utc" | "z" => Ok(TimezoneSetting::Utc),
            other => FixedOffset::from_str(other)
                .map(TimezoneSetting::Fixed)
                .map_err(|_| {
                    GpumonError::config(format!(
                        "unknown timezone '{}' (expected local, utc or +HH:MM)",
                        s
                    ))
                }),
        }
    }
}

impl fmt::Display for TimezoneSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimezoneSetting::Local => write!(f, "local"),
            TimezoneSetting::Utc => write!(f, "utc"),
            TimezoneSetting::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl Serialize for TimezoneSetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimezoneSetting {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which dmon column layout to assume before a header line is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    #[default]
    Standard,
    Legacy,
}

impl SchemaVariant {
    pub fn schema(&self) -> DmonSchema {
        match self {
            SchemaVariant::Standard => DmonSchema::STANDARD,
            SchemaVariant::Legacy => DmonSchema::LEGACY,
        }
    }
}
