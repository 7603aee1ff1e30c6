//! Monitor command handler.
//!
//! Streams GPU and host telemetry to the terminal, either as a refreshed text
//! block or as one JSON snapshot per line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::*;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::config::{MonitorConfig, SchemaVariant, TimezoneSetting};
use crate::core::telemetry::MonitorRuntime;
use crate::ui::{format_snapshot, format_worker_failure};

/// Status log lines shown under each text refresh.
const LOG_TAIL: usize = 8;

/// Output options that do not belong in [`MonitorConfig`].
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub json: bool,
    /// Stop after this many refreshes.
    pub ticks: Option<u64>,
}

/// Execute the monitor command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => MonitorConfig::load_from(path)?,
        None => MonitorConfig::load()?,
    };
    apply_overrides(&mut config, matches)?;
    config.validate().context("Invalid monitor configuration")?;

    let options = MonitorOptions {
        json: matches.get_flag("json"),
        ticks: matches.get_one::<u64>("ticks").copied(),
    };

    let stop = CancellationToken::new();
    let stop_on_signal = stop.clone();
    ctrlc::set_handler(move || {
        stop_on_signal.cancel();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(config, options, stop))
}

/// Layer command-line values over the loaded configuration.
pub fn apply_overrides(config: &mut MonitorConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(&gpu_id) = matches.get_one::<u32>("gpu_id") {
        config.gpu_id = gpu_id;
    }
    if let Some(&size) = matches.get_one::<usize>("history-size") {
        config.history_size = size;
    }
    if let Some(&secs) = matches.get_one::<u64>("dmon-poll-interval") {
        config.dmon_poll_interval_secs = secs;
    }
    if let Some(&secs) = matches.get_one::<u64>("proc-poll-interval") {
        config.proc_poll_interval_secs = secs;
    }
    if let Some(tz) = matches.get_one::<String>("local-timezone") {
        config.timezone = tz
            .parse::<TimezoneSetting>()
            .with_context(|| format!("Invalid timezone '{}'", tz))?;
    }
    if matches.get_flag("legacy-schema") {
        config.dmon_schema = SchemaVariant::Legacy;
    }
    Ok(())
}

/// Drive the runtime until `stop` fires or the tick budget is spent.
pub async fn run(config: MonitorConfig, options: MonitorOptions, stop: CancellationToken) -> Result<()> {
    let refresh = config.dmon_poll_interval();
    let mut runtime = MonitorRuntime::start(config).context("Failed to start telemetry")?;

    if !options.json {
        println!("{}", "Press Ctrl+C to stop".dimmed());
    }

    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = refresh_output(&mut runtime, &options) {
            outcome = Err(e);
            break;
        }

        ticks += 1;
        if options.ticks.is_some_and(|limit| ticks >= limit) {
            break;
        }
    }

    // Workers are joined on every exit path, including a failed refresh
    runtime.shutdown().await;
    outcome
}

fn refresh_output(runtime: &mut MonitorRuntime, options: &MonitorOptions) -> Result<()> {
    for failure in runtime.drain_failures() {
        if options.json {
            log::error!("{} stopped: {}", failure.worker, failure.error);
        } else {
            format_worker_failure(&failure);
        }
    }

    let snapshot = runtime.snapshot();
    if options.json {
        let line = serde_json::to_string(&snapshot.latest_only())
            .context("Failed to serialize snapshot")?;
        println!("{}", line);
    } else {
        let lines = runtime.status_log().lines();
        let tail = &lines[lines.len().saturating_sub(LOG_TAIL)..];
        format_snapshot(&snapshot, tail);
    }
    Ok(())
}
