// UI and formatting module

pub mod snapshot_formatters;

pub use snapshot_formatters::{format_snapshot, format_worker_failure};
