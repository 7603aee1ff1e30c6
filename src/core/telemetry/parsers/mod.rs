//! Line and block parsers for `nvidia-smi` output.

pub mod dmon;
pub mod info;
pub mod processes;

pub use dmon::{parse_fields, DmonParser, DmonSample, DmonSchema, ParsedLine};
pub use info::{parse_device_info, DeviceInfo};
pub use processes::{parse_process_rows, ProcessListing, ProcessRow};
