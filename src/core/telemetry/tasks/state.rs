//! Failure accounting shared by all polling workers.

use serde::Serialize;
use tokio::sync::watch;

use crate::error::GpumonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Starting,
    Running,
    Backoff,
    /// Terminal; the worker does not restart.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            state: WorkerState::Starting,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Counts consecutive failed cycles and decides when a worker gives up.
#[derive(Debug)]
pub struct FailureTracker {
    worker: String,
    max_retries: u32,
    status: WorkerStatus,
    status_tx: Option<watch::Sender<WorkerStatus>>,
}

impl FailureTracker {
    pub fn new<S: Into<String>>(worker: S, max_retries: u32) -> Self {
        Self {
            worker: worker.into(),
            max_retries: max_retries.max(1),
            status: WorkerStatus::default(),
            status_tx: None,
        }
    }

    /// Publish every state change on `tx`.
    pub fn with_status(mut self, tx: watch::Sender<WorkerStatus>) -> Self {
        self.status_tx = Some(tx);
        self.publish();
        self
    }

    pub fn state(&self) -> WorkerState {
        self.status.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.status.consecutive_failures
    }

    pub fn is_failed(&self) -> bool {
        self.status.state == WorkerState::Failed
    }

    /// The source is up (session spawned) but no cycle has completed yet.
    /// Does not touch the failure count.
    pub fn mark_running(&mut self) {
        if self.is_failed() || self.status.state == WorkerState::Running {
            return;
        }
        self.status.state = WorkerState::Running;
        self.publish();
    }

    pub fn record_success(&mut self) {
        if self.is_failed() {
            return;
        }
        let changed =
            self.status.state != WorkerState::Running || self.status.consecutive_failures != 0;
        self.status.state = WorkerState::Running;
        self.status.consecutive_failures = 0;
        if changed {
            self.publish();
        }
    }

    /// Count a failed cycle. Returns the terminal error exactly once, when the
    /// count reaches the threshold; later calls are ignored.
    pub fn record_failure(&mut self, error: &GpumonError) -> Result<(), GpumonError> {
        if self.is_failed() {
            return Ok(());
        }

        self.status.consecutive_failures += 1;
        self.status.last_error = Some(error.to_string());

        if self.status.consecutive_failures >= self.max_retries {
            self.status.state = WorkerState::Failed;
            self.publish();
            return Err(GpumonError::RetryExhausted {
                worker: self.worker.clone(),
                attempts: self.status.consecutive_failures,
                last_error: error.to_string(),
            });
        }

        self.status.state = WorkerState::Backoff;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        if let Some(tx) = &self.status_tx {
            // No receivers is fine
            let _ = tx.send(self.status.clone());
        }
    }
}

/// Consecutive malformed lines within one streaming session.
#[derive(Debug, Clone)]
pub struct ParseErrorCounter {
    consecutive: u32,
    threshold: u32,
}

impl ParseErrorCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold: threshold.max(1),
        }
    }

    /// Returns true on the line that reaches the threshold.
    pub fn record_malformed(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive == self.threshold
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
