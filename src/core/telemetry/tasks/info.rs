use serde::Serialize;
use tokio::sync::watch;

use super::WorkerContext;
use crate::core::telemetry::format::ValueFormat;
use crate::core::telemetry::host::HostSummary;
use crate::core::telemetry::parsers::DeviceInfo;
use crate::core::telemetry::probe::query_device_info;
use crate::core::telemetry::series::SeriesHandle;
use crate::core::telemetry::session::CommandSpec;

/// Headroom above the board's max power limit for the power chart.
const POWER_HEADROOM: f64 = 1.1;

/// Contents of the static information panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelInfo {
    pub host: HostSummary,
    pub device: Option<DeviceInfo>,
    pub text: String,
}

impl PanelInfo {
    pub fn querying(host: HostSummary) -> Self {
        let text = format!("{}\nQuerying GPU info...", host.render());
        Self {
            host,
            device: None,
            text,
        }
    }

    pub fn with_device(host: HostSummary, device: DeviceInfo) -> Self {
        let text = format!("{}\n{}", host.render(), device.summary());
        Self {
            host,
            device: Some(device),
            text,
        }
    }

    pub fn unavailable(host: HostSummary) -> Self {
        let text = format!("{}\nGPU info unavailable", host.render());
        Self {
            host,
            device: None,
            text,
        }
    }
}

/// One-shot device query. Publishes the panel text and binds the GPU memory
/// formatter and power chart bound from what the device reports.
pub async fn info_panel_task(
    ctx: WorkerContext,
    spec: CommandSpec,
    gpu_memory: SeriesHandle,
    gpu_power: SeriesHandle,
    publish: watch::Sender<PanelInfo>,
) {
    let host = HostSummary::collect();
    let _ = publish.send(PanelInfo::querying(host.clone()));

    let timeout = ctx.config.probe_timeout();
    let queried = query_device_info(&spec, timeout, &ctx.cancel, ctx.log.as_ref()).await;
    if ctx.cancel.is_cancelled() {
        return;
    }

    let Some(device) = queried else {
        let _ = publish.send(PanelInfo::unavailable(host));
        return;
    };

    match device.total_memory_bytes() {
        Some(total) => {
            gpu_memory.bind_format_once(ValueFormat::memory(total));
        }
        None => ctx.log.warn(
            &spec.name,
            &format!("unrecognised memory total: {}", device.total_memory),
        ),
    }
    if let Some(max_power) = device.max_power_watts() {
        gpu_power.set_upper_bound_once(max_power * POWER_HEADROOM);
    }

    ctx.log.info(&spec.name, &device.summary());
    let _ = publish.send(PanelInfo::with_device(host, device));
}
