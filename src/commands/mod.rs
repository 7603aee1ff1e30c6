// Command handlers module

pub mod monitor;

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

/// Command-line definition for the `gpumon` binary.
pub fn build_cli() -> Command {
    Command::new("gpumon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Monitor NVIDIA GPU metrics in real-time")
        .arg(
            Arg::new("gpu_id")
                .help("ID of the GPU to monitor [default: 0]")
                .value_parser(value_parser!(u32))
                .index(1),
        )
        .arg(
            Arg::new("history-size")
                .short('s')
                .long("history-size")
                .alias("history_size")
                .value_name("POINTS")
                .help("Number of historical data points to keep per series [default: 1000]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("dmon-poll-interval")
                .short('d')
                .long("dmon-poll-interval")
                .value_name("SECS")
                .help("Seconds between device monitor samples [default: 1]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("proc-poll-interval")
                .short('p')
                .long("proc-poll-interval")
                .value_name("SECS")
                .help("Seconds between process list refreshes [default: 5]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("local-timezone")
                .short('t')
                .long("local-timezone")
                .value_name("TZ")
                .help("Timezone for timestamps: local, utc or +HH:MM [default: local]"),
        )
        .arg(
            Arg::new("legacy-schema")
                .long("legacy-schema")
                .help("Read dmon output with the older column layout (no temperature)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file to load instead of the default location")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON snapshot per refresh")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .help("Stop after N refreshes")
                .value_parser(value_parser!(u64)),
        )
}
