// gpumon Library - Public API

// Re-export error types
pub mod error;
pub use error::{GpumonError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use crate::core::config::MonitorConfig;
pub use crate::core::telemetry::MonitorRuntime;

// Initialize logging (Info unless RUST_LOG says otherwise)
pub fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
