use std::sync::Arc;

use tokio::sync::watch;

use super::WorkerContext;
use crate::core::telemetry::parsers::ProcessRow;
use crate::core::telemetry::probe::query_processes;
use crate::core::telemetry::session::CommandSpec;

/// Refresh the compute-process table every `proc_poll_interval`.
///
/// Never terminal: a failed query publishes the placeholder row and the next
/// refresh tries again.
pub async fn process_list_task(
    ctx: WorkerContext,
    spec: CommandSpec,
    publish: watch::Sender<Arc<Vec<ProcessRow>>>,
) {
    let timeout = ctx.config.probe_timeout();
    let poll = ctx.config.proc_poll_interval();

    loop {
        let refreshed = query_processes(&spec, timeout, &ctx.cancel, ctx.log.as_ref()).await;
        if ctx.cancel.is_cancelled() {
            break;
        }

        if publish.send(Arc::new(refreshed)).is_err() {
            log::debug!("process list receiver dropped, stopping");
            break;
        }

        if !ctx.sleep(poll).await {
            break;
        }
    }
}
