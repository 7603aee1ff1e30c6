//! Orchestration of the telemetry workers.
//!
//! [`MonitorRuntime::start`] spawns every worker on the current tokio runtime.
//! Presenters poll [`MonitorRuntime::snapshot`] and drain
//! [`MonitorRuntime::drain_failures`]; [`MonitorRuntime::shutdown`] cancels
//! all workers and returns once every child process has been reaped.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::format::ValueFormat;
use super::host::HostSummary;
use super::parsers::ProcessRow;
use super::series::{MetricSeries, SeriesHandle, SeriesSnapshot};
use super::sources::{dmon_command, info_command, process_query_command};
use super::status_log::{LogSink, StatusLog};
use super::tasks::{
    cpu_task, dmon_task, info_panel_task, memory_task, process_list_task, supervise, DmonSinks,
    PanelInfo, SysinfoSampler, SystemSampler, WorkerContext, WorkerFailure, WorkerStatus,
    CPU_WORKER, DMON_WORKER, MEMORY_WORKER,
};
use crate::core::config::MonitorConfig;
use crate::error::Result;

/// The six series a presenter draws.
#[derive(Debug, Clone)]
pub struct MonitorSeries {
    pub gpu_utilization: SeriesHandle,
    pub gpu_memory: SeriesHandle,
    pub gpu_power: SeriesHandle,
    pub gpu_temperature: SeriesHandle,
    pub cpu: SeriesHandle,
    pub system_memory: SeriesHandle,
}

impl MonitorSeries {
    pub fn new(config: &MonitorConfig) -> Self {
        let series = |name: &str| {
            MetricSeries::with_capacity(name, config.history_size, config.timezone)
        };

        Self {
            gpu_utilization: SeriesHandle::new(
                series("GPU Utilization")
                    .with_upper_bound(100.0)
                    .with_format(ValueFormat::Percent),
            ),
            // Formatter is bound once the device reports its memory size
            gpu_memory: SeriesHandle::new(series("GPU Memory").with_upper_bound(100.0)),
            // Upper bound comes from the device's max power limit
            gpu_power: SeriesHandle::new(series("GPU Power").with_format(ValueFormat::unit("W"))),
            gpu_temperature: SeriesHandle::new(
                series("GPU Temperature").with_format(ValueFormat::unit("°C")),
            ),
            cpu: SeriesHandle::new(
                series("CPU Usage")
                    .with_upper_bound(100.0)
                    .with_format(ValueFormat::Percent),
            ),
            system_memory: SeriesHandle::new(series("System Memory").with_upper_bound(100.0)),
        }
    }

    /// All series, in display order.
    pub fn all(&self) -> [&SeriesHandle; 6] {
        [
            &self.gpu_utilization,
            &self.gpu_memory,
            &self.gpu_power,
            &self.gpu_temperature,
            &self.cpu,
            &self.system_memory,
        ]
    }

    pub fn snapshots(&self) -> Vec<SeriesSnapshot> {
        self.all().iter().map(|s| s.snapshot()).collect()
    }

    fn dmon_sinks(&self) -> DmonSinks {
        DmonSinks {
            power: Arc::new(self.gpu_power.clone()),
            temperature: Arc::new(self.gpu_temperature.clone()),
            utilization: Arc::new(self.gpu_utilization.clone()),
            memory: Arc::new(self.gpu_memory.clone()),
        }
    }
}

/// OS samplers for the CPU and memory workers.
pub struct Samplers {
    pub cpu: Box<dyn SystemSampler>,
    pub memory: Box<dyn SystemSampler>,
}

impl Default for Samplers {
    fn default() -> Self {
        Self {
            cpu: Box::new(SysinfoSampler::new()),
            memory: Box::new(SysinfoSampler::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub name: String,
    #[serde(flatten)]
    pub status: WorkerStatus,
}

/// Everything a presenter needs for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub timestamp: DateTime<FixedOffset>,
    pub series: Vec<SeriesSnapshot>,
    pub workers: Vec<WorkerReport>,
    pub panel: PanelInfo,
    pub processes: Vec<ProcessRow>,
}

impl MonitorSnapshot {
    /// Drop all but the newest point of every series.
    pub fn latest_only(mut self) -> Self {
        for series in &mut self.series {
            let last = series.points.pop();
            series.points = last.into_iter().collect();
        }
        self
    }
}

pub struct MonitorRuntime {
    config: Arc<MonitorConfig>,
    series: MonitorSeries,
    log: StatusLog,
    cancel: CancellationToken,
    statuses: Vec<(String, watch::Receiver<WorkerStatus>)>,
    panel: watch::Receiver<PanelInfo>,
    processes: watch::Receiver<Arc<Vec<ProcessRow>>>,
    failures: mpsc::UnboundedReceiver<WorkerFailure>,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorRuntime {
    /// Validate `config` and spawn all workers with the `sysinfo` samplers.
    /// Must be called from within a tokio runtime.
    pub fn start(config: MonitorConfig) -> Result<Self> {
        Self::start_with(config, Samplers::default())
    }

    pub fn start_with(config: MonitorConfig, samplers: Samplers) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let series = MonitorSeries::new(&config);
        let log = StatusLog::default();
        let sink: Arc<dyn LogSink> = Arc::new(log.clone());
        let cancel = CancellationToken::new();
        let ctx = WorkerContext::new(config.clone(), sink.clone(), cancel.clone());

        let (failure_tx, failures) = mpsc::unbounded_channel();
        let (panel_tx, panel) = watch::channel(PanelInfo::querying(HostSummary::collect()));
        let (processes_tx, processes) = watch::channel(Arc::new(Vec::new()));

        let mut statuses = Vec::new();
        let mut handles = Vec::new();

        let (tx, rx) = watch::channel(WorkerStatus::default());
        statuses.push((DMON_WORKER.to_string(), rx));
        handles.push(tokio::spawn(supervise(
            DMON_WORKER.to_string(),
            dmon_task(ctx.clone(), dmon_command(&config), series.dmon_sinks(), tx),
            sink.clone(),
            failure_tx.clone(),
        )));

        let (tx, rx) = watch::channel(WorkerStatus::default());
        statuses.push((CPU_WORKER.to_string(), rx));
        handles.push(tokio::spawn(supervise(
            CPU_WORKER.to_string(),
            cpu_task(ctx.clone(), Arc::new(series.cpu.clone()), samplers.cpu, tx),
            sink.clone(),
            failure_tx.clone(),
        )));

        let (tx, rx) = watch::channel(WorkerStatus::default());
        statuses.push((MEMORY_WORKER.to_string(), rx));
        handles.push(tokio::spawn(supervise(
            MEMORY_WORKER.to_string(),
            memory_task(ctx.clone(), series.system_memory.clone(), samplers.memory, tx),
            sink.clone(),
            failure_tx,
        )));

        handles.push(tokio::spawn(process_list_task(
            ctx.clone(),
            process_query_command(&config),
            processes_tx,
        )));

        handles.push(tokio::spawn(info_panel_task(
            ctx,
            info_command(&config),
            series.gpu_memory.clone(),
            series.gpu_power.clone(),
            panel_tx,
        )));

        log::info!(
            "Telemetry started for GPU {} ({} workers)",
            config.gpu_id,
            handles.len()
        );

        Ok(Self {
            config,
            series,
            log,
            cancel,
            statuses,
            panel,
            processes,
            failures,
            handles,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn series(&self) -> &MonitorSeries {
        &self.series
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.log
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn statuses(&self) -> Vec<WorkerReport> {
        self.statuses
            .iter()
            .map(|(name, rx)| WorkerReport {
                name: name.clone(),
                status: rx.borrow().clone(),
            })
            .collect()
    }

    pub fn panel(&self) -> PanelInfo {
        self.panel.borrow().clone()
    }

    pub fn processes(&self) -> Vec<ProcessRow> {
        Vec::clone(&self.processes.borrow())
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            timestamp: self.config.timezone.now(),
            series: self.series.snapshots(),
            workers: self.statuses(),
            panel: self.panel(),
            processes: self.processes(),
        }
    }

    /// Wait for the next worker to give up. `None` once all supervised
    /// workers have finished.
    pub async fn next_failure(&mut self) -> Option<WorkerFailure> {
        self.failures.recv().await
    }

    /// Failures reported since the last call, without waiting.
    pub fn drain_failures(&mut self) -> Vec<WorkerFailure> {
        let mut drained = Vec::new();
        while let Ok(failure) = self.failures.try_recv() {
            drained.push(failure);
        }
        drained
    }

    /// Cancel every worker and wait for all of them, including the reaping
    /// of their child processes.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                log::error!("Telemetry worker panicked: {}", e);
            }
        }

        log::info!("Telemetry stopped");
    }
}

impl Drop for MonitorRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
