//! Async polling workers.
//!
//! Each source runs in its own task. A worker returns `Err` only when it has
//! permanently failed; [`supervise`] turns that into a [`WorkerFailure`] for
//! the presentation layer.

mod cpu_memory;
mod dmon;
mod info;
mod processes;
mod sampler;
pub mod state;

pub use cpu_memory::{cpu_task, memory_task, CPU_WORKER, MEMORY_WORKER};
pub use dmon::{dmon_task, DmonSinks, DMON_WORKER};
pub use info::{info_panel_task, PanelInfo};
pub use processes::process_list_task;
pub use sampler::{MemorySample, SysinfoSampler, SystemSampler};
pub use state::{FailureTracker, ParseErrorCounter, WorkerState, WorkerStatus};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::status_log::LogSink;
use crate::core::config::MonitorConfig;
use crate::error::{GpumonError, Result};

/// What every worker gets from the runtime.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<MonitorConfig>,
    pub log: Arc<dyn LogSink>,
    pub cancel: CancellationToken,
}

impl WorkerContext {
    pub fn new(config: Arc<MonitorConfig>, log: Arc<dyn LogSink>, cancel: CancellationToken) -> Self {
        Self {
            config,
            log,
            cancel,
        }
    }

    /// Tracker for `worker`, publishing into `status`.
    pub fn tracker(&self, worker: &str, status: watch::Sender<WorkerStatus>) -> FailureTracker {
        FailureTracker::new(worker, self.config.max_retries).with_status(status)
    }

    /// Sleep for `duration` unless cancelled first. Returns false on cancel.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Terminal report from a worker that gave up.
#[derive(Debug)]
pub struct WorkerFailure {
    pub worker: String,
    pub error: GpumonError,
}

/// Run a worker future and report a permanent failure, if any.
pub async fn supervise<F>(
    worker: String,
    task: F,
    log: Arc<dyn LogSink>,
    failures: mpsc::UnboundedSender<WorkerFailure>,
) where
    F: Future<Output = Result<()>>,
{
    match task.await {
        Ok(()) => log::debug!("{} worker finished", worker),
        Err(error) => {
            log.error(&worker, &format!("stopped: {}", error));
            // The receiver may already be gone during shutdown
            let _ = failures.send(WorkerFailure { worker, error });
        }
    }
}

/// Log and count a failed cycle; returns the terminal error once the tracker
/// gives up.
pub(crate) fn handle_cycle_error(
    ctx: &WorkerContext,
    worker: &str,
    tracker: &mut FailureTracker,
    error: GpumonError,
) -> Result<()> {
    ctx.log.error(
        worker,
        &format!(
            "polling error (attempt {}): {}",
            tracker.consecutive_failures() + 1,
            error
        ),
    );
    tracker.record_failure(&error)
}
