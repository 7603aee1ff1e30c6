//! Invocations of the diagnostic tool. The argument shapes are what the
//! parsers expect, so keep them in sync.

use super::session::CommandSpec;
use crate::core::config::MonitorConfig;

pub const PROCESS_QUERY_ARGS: [&str; 2] = [
    "--query-compute-apps=pid,name,used_gpu_memory",
    "--format=csv,noheader,nounits",
];

/// `nvidia-smi dmon -d <secs> -i <gpu>`
pub fn dmon_command(config: &MonitorConfig) -> CommandSpec {
    CommandSpec::new(
        config.tool_path.as_str(),
        [
            "dmon".to_string(),
            "-d".to_string(),
            config.dmon_poll_interval_secs.to_string(),
            "-i".to_string(),
            config.gpu_id.to_string(),
        ],
    )
    .named("nvidia-dmon")
}

/// `nvidia-smi -q -i <gpu>`
pub fn info_command(config: &MonitorConfig) -> CommandSpec {
    CommandSpec::new(
        config.tool_path.as_str(),
        ["-q".to_string(), "-i".to_string(), config.gpu_id.to_string()],
    )
    .named("info-panel")
}

pub fn process_query_command(config: &MonitorConfig) -> CommandSpec {
    CommandSpec::new(config.tool_path.as_str(), PROCESS_QUERY_ARGS).named("process-list")
}
