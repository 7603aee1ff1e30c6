//! GPU and host telemetry acquisition.
//!
//! External tools and OS samplers are polled by independent tokio workers
//! (see [`tasks`]), which append into bounded [`series`]. The
//! [`runtime::MonitorRuntime`] owns the workers, their cancellation token, and
//! every channel a presenter reads from.

pub mod format;
pub mod host;
pub mod parsers;
pub mod probe;
pub mod runtime;
pub mod series;
pub mod session;
pub mod sources;
pub mod status_log;
pub mod tasks;

pub use format::ValueFormat;
pub use host::HostSummary;
pub use parsers::{DeviceInfo, DmonSchema, ProcessRow};
pub use runtime::{MonitorRuntime, MonitorSeries, MonitorSnapshot, Samplers, WorkerReport};
pub use series::{MetricPoint, MetricSeries, MetricSink, SeriesHandle, SeriesSnapshot};
pub use session::{CommandSpec, ProcessSession};
pub use status_log::{LogLevel, LogLine, LogSink, StatusLog};
pub use tasks::{PanelInfo, WorkerFailure, WorkerState, WorkerStatus};
