//! Streaming worker for `nvidia-smi dmon`.
//!
//! One session per cycle. Stdout and stderr are drained concurrently until
//! both reach EOF and the child exits, or until cancellation, in which case
//! the child is killed and reaped before the worker returns.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::watch;

use super::{handle_cycle_error, FailureTracker, ParseErrorCounter, WorkerContext, WorkerStatus};
use crate::core::telemetry::parsers::{DmonParser, DmonSample, ParsedLine};
use crate::core::telemetry::series::MetricSink;
use crate::core::telemetry::session::{CommandSpec, ProcessSession};
use crate::error::{GpumonError, Result};

pub const DMON_WORKER: &str = "nvidia-dmon";

/// Stderr lines kept for the exit error message.
const STDERR_TAIL: usize = 5;

/// Destinations for the four device metrics.
#[derive(Clone)]
pub struct DmonSinks {
    pub power: Arc<dyn MetricSink>,
    pub temperature: Arc<dyn MetricSink>,
    pub utilization: Arc<dyn MetricSink>,
    pub memory: Arc<dyn MetricSink>,
}

impl DmonSinks {
    fn push(&self, sample: &DmonSample) {
        self.power.append(sample.power_watts);
        if let Some(temp) = sample.temperature_celsius {
            self.temperature.append(temp as f64);
        }
        self.utilization.append(sample.utilization_percent as f64);
        self.memory.append(sample.memory_percent as f64);
    }
}

enum CycleEnd {
    /// Stream ended cleanly after producing samples.
    Completed,
    Cancelled,
}

pub async fn dmon_task(
    ctx: WorkerContext,
    spec: CommandSpec,
    sinks: DmonSinks,
    status: watch::Sender<WorkerStatus>,
) -> Result<()> {
    let mut tracker = ctx.tracker(DMON_WORKER, status);
    let mut parser = DmonParser::new(ctx.config.schema());
    let retry = ctx.config.retry_interval();

    while !ctx.cancel.is_cancelled() {
        match run_cycle(&ctx, &spec, &sinks, &mut parser, &mut tracker).await {
            Ok(CycleEnd::Cancelled) => break,
            Ok(CycleEnd::Completed) => {
                tracker.record_success();
                ctx.log.info(DMON_WORKER, "stream ended, restarting");
            }
            Err(e) => handle_cycle_error(&ctx, DMON_WORKER, &mut tracker, e)?,
        }

        if !ctx.sleep(retry).await {
            break;
        }
    }

    Ok(())
}

async fn run_cycle(
    ctx: &WorkerContext,
    spec: &CommandSpec,
    sinks: &DmonSinks,
    parser: &mut DmonParser,
    tracker: &mut FailureTracker,
) -> Result<CycleEnd> {
    let mut session = ProcessSession::open(spec)?;
    tracker.mark_running();

    let outcome = stream_session(ctx, &mut session, sinks, parser).await;
    session.close().await;
    outcome
}

async fn stream_session(
    ctx: &WorkerContext,
    session: &mut ProcessSession,
    sinks: &DmonSinks,
    parser: &mut DmonParser,
) -> Result<CycleEnd> {
    let (stdout, stderr) = session.take_streams().inspect_err(|_| {
        ctx.log.error(DMON_WORKER, "Failed to capture dmon output");
    })?;

    // The exit wait stays inside the race: a child can close both pipes and
    // keep running.
    let drained = async {
        let (out, err) = tokio::join!(
            consume_stdout(ctx, stdout, parser, sinks),
            consume_stderr(ctx, stderr),
        );
        let samples = out?;
        let stderr_tail = err?;
        let status = session.wait().await?;
        Ok::<_, GpumonError>((samples, stderr_tail, status))
    };

    let (samples, stderr_tail, status) = tokio::select! {
        _ = ctx.cancel.cancelled() => return Ok(CycleEnd::Cancelled),
        drained = drained => drained?,
    };

    if !status.success() {
        return Err(GpumonError::ProcessExit {
            command: session.command().to_string(),
            status: status.to_string(),
            stderr: stderr_tail,
        });
    }
    if samples == 0 {
        return Err(GpumonError::sampling(format!(
            "`{}` ended without producing samples",
            session.command()
        )));
    }

    Ok(CycleEnd::Completed)
}

/// Parse data lines into the sinks. Returns the number of samples appended.
async fn consume_stdout(
    ctx: &WorkerContext,
    stdout: ChildStdout,
    parser: &mut DmonParser,
    sinks: &DmonSinks,
) -> io::Result<u64> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut errors = ParseErrorCounter::new(ctx.config.max_parse_errors);
    let mut samples = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim();

        let before = parser.schema();
        match parser.parse_line(line) {
            ParsedLine::Metrics(sample) => {
                ctx.log.raw(DMON_WORKER, line);
                sinks.push(&sample);
                errors.reset();
                samples += 1;
            }
            ParsedLine::Header(schema) => {
                if schema != before {
                    ctx.log.info(
                        DMON_WORKER,
                        &format!("column layout changed: {:?}", schema),
                    );
                }
            }
            ParsedLine::Ignorable => {}
            ParsedLine::Malformed(raw) => {
                ctx.log.raw(DMON_WORKER, &raw);
                log::debug!("Unparseable dmon line: {}", raw);
                if errors.record_malformed() {
                    ctx.log.warn(
                        DMON_WORKER,
                        &format!(
                            "Too many parse errors in dmon output ({} in a row), last line: {}",
                            errors.consecutive(),
                            raw
                        ),
                    );
                }
            }
        }
    }

    Ok(samples)
}

/// Log every stderr line; returns the last few joined for error reporting.
async fn consume_stderr(ctx: &WorkerContext, stderr: ChildStderr) -> io::Result<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf).trim().to_string();
        if line.is_empty() {
            continue;
        }

        ctx.log.error(DMON_WORKER, &format!("DMON STDERR: {}", line));
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Ok(Vec::from(tail).join("\n"))
}
