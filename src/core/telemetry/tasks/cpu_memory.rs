//! CPU and system memory polling.

use std::sync::Arc;

use tokio::sync::watch;

use super::{handle_cycle_error, SystemSampler, WorkerContext, WorkerStatus};
use crate::core::telemetry::format::ValueFormat;
use crate::core::telemetry::series::{MetricSink, SeriesHandle};
use crate::error::Result;

pub const CPU_WORKER: &str = "cpu";
pub const MEMORY_WORKER: &str = "memory";

/// Append global CPU utilisation every `cpu_poll_interval`.
pub async fn cpu_task(
    ctx: WorkerContext,
    sink: Arc<dyn MetricSink>,
    mut sampler: Box<dyn SystemSampler>,
    status: watch::Sender<WorkerStatus>,
) -> Result<()> {
    let mut tracker = ctx.tracker(CPU_WORKER, status);
    let poll = ctx.config.cpu_poll_interval();
    let retry = ctx.config.retry_interval();

    while !ctx.cancel.is_cancelled() {
        let pause = match sampler.cpu_percent() {
            Ok(percent) => {
                sink.append(percent);
                tracker.record_success();
                poll
            }
            Err(e) => {
                handle_cycle_error(&ctx, CPU_WORKER, &mut tracker, e)?;
                retry
            }
        };

        if !ctx.sleep(pause).await {
            break;
        }
    }

    Ok(())
}

/// Append used-memory percentage. The first successful sample binds the
/// memory formatter with the reported total.
pub async fn memory_task(
    ctx: WorkerContext,
    series: SeriesHandle,
    mut sampler: Box<dyn SystemSampler>,
    status: watch::Sender<WorkerStatus>,
) -> Result<()> {
    let mut tracker = ctx.tracker(MEMORY_WORKER, status);
    let poll = ctx.config.cpu_poll_interval();
    let retry = ctx.config.retry_interval();

    while !ctx.cancel.is_cancelled() {
        let pause = match sampler.memory() {
            Ok(sample) => {
                if !series.format_is_set() {
                    series.bind_format_once(ValueFormat::memory(sample.total_bytes as f64));
                }
                series.append(sample.percent);
                tracker.record_success();
                poll
            }
            Err(e) => {
                handle_cycle_error(&ctx, MEMORY_WORKER, &mut tracker, e)?;
                retry
            }
        };

        if !ctx.sleep(pause).await {
            break;
        }
    }

    Ok(())
}
