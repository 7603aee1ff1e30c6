//! One-shot queries: spawn, wait with a deadline, decode stdout.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::parsers::{parse_device_info, parse_process_rows, DeviceInfo, ProcessRow};
use super::session::{with_session, CommandSpec};
use super::status_log::LogSink;
use crate::error::{GpumonError, Result};

/// Run `spec` to completion and return its trimmed stdout.
///
/// Every call owns a fresh session, closed before this returns, including
/// when `cancel` fires mid-query.
pub async fn probe(spec: &CommandSpec, timeout: Duration, cancel: &CancellationToken) -> Result<String> {
    let output = with_session(spec, cancel, |session| {
        Box::pin(async move { session.wait_with_output(timeout).await })
    })
    .await?;

    if !output.status.success() {
        return Err(GpumonError::ProcessExit {
            command: spec.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|e| GpumonError::parse(format!("`{}` wrote invalid UTF-8: {}", spec, e)))?;
    Ok(stdout.trim().to_string())
}

/// [`probe`] that logs failures and yields `None` instead of an error.
pub async fn run_probe(
    spec: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationToken,
    log: &dyn LogSink,
) -> Option<String> {
    match probe(spec, timeout, cancel).await {
        Ok(stdout) => Some(stdout),
        Err(GpumonError::Cancelled { command }) => {
            log::debug!("`{}` cancelled", command);
            None
        }
        Err(GpumonError::ProbeTimeout { timeout, .. }) => {
            log.warn(&spec.name, &format!("query timed out after {:?}", timeout));
            None
        }
        Err(GpumonError::ProcessExit { stderr, status, .. }) => {
            log.error(&spec.name, &format!("failed ({}): {}", status, stderr));
            None
        }
        Err(e) => {
            log.error(&spec.name, &e.to_string());
            None
        }
    }
}

pub async fn query_device_info(
    spec: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationToken,
    log: &dyn LogSink,
) -> Option<DeviceInfo> {
    let output = run_probe(spec, timeout, cancel, log).await?;
    Some(parse_device_info(&output))
}

/// Current compute processes. Any failure degrades to the placeholder row.
pub async fn query_processes(
    spec: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationToken,
    log: &dyn LogSink,
) -> Vec<ProcessRow> {
    let Some(output) = run_probe(spec, timeout, cancel, log).await else {
        return vec![ProcessRow::Placeholder];
    };

    let listing = parse_process_rows(&output);
    for line in &listing.malformed {
        log.warn(&spec.name, &format!("Malformed process line: {}", line));
    }
    listing.rows
}
