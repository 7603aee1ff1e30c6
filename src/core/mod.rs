// Core business logic module

pub mod config;
pub mod telemetry;

// Re-export commonly used items
pub use config::MonitorConfig;
pub use telemetry::{MonitorRuntime, MonitorSnapshot};
