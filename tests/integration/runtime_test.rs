// End-to-end runtime tests against a fake `nvidia-smi`.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gpumon::commands::monitor::{run, MonitorOptions};
use gpumon::core::config::{MonitorConfig, TimezoneSetting};
use gpumon::core::telemetry::{
    MonitorRuntime, MonitorSnapshot, ProcessRow, ValueFormat, WorkerState,
};
use gpumon::GpumonError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const QUERY_OUTPUT: &str = "\
Driver Version                            : 550.54.14
CUDA Version                              : 12.4
GPU 00000000:01:00.0
    Product Name                          : NVIDIA GeForce RTX 4090
    FB Memory Usage
        Total                             : 24564 MiB
    Power Readings
        Max Power Limit                   : 600.00 W
";

/// Write an executable fake tool. `dmon_body` is the shell snippet run for
/// `nvidia-smi dmon ...`.
fn fake_tool(dir: &Path, dmon_body: &str) -> PathBuf {
    let query = dir.join("query.txt");
    std::fs::write(&query, QUERY_OUTPUT).unwrap();

    let script = format!(
        "#!/bin/sh\n\
         case \"$1\" in\n\
         dmon)\n{}\n;;\n\
         -q) cat '{}' ;;\n\
         --query-compute-apps=*) printf '1234, python, 512\\n' ;;\n\
         *) exit 2 ;;\n\
         esac\n",
        dmon_body,
        query.display()
    );

    let path = dir.join("nvidia-smi");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config_for(tool: &Path) -> MonitorConfig {
    MonitorConfig {
        tool_path: tool.display().to_string(),
        retry_interval_secs: 0,
        timezone: TimezoneSetting::Utc,
        ..Default::default()
    }
}

async fn wait_for<F>(runtime: &MonitorRuntime, cond: F) -> MonitorSnapshot
where
    F: Fn(&MonitorSnapshot) -> bool,
{
    for _ in 0..100 {
        let snapshot = runtime.snapshot();
        if cond(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("runtime did not reach the expected state");
}

fn series<'a>(snapshot: &'a MonitorSnapshot, name: &str) -> &'a gpumon::core::telemetry::SeriesSnapshot {
    snapshot
        .series
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no series named {}", name))
}

#[tokio::test]
async fn test_runtime_collects_from_tool() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(
        dir.path(),
        "printf '# gpu pwr gtemp mtemp sm mem\\n# Idx W C C %% %%\\n'\n\
         while :; do printf '    0   75.5   60    -   12    8\\n'; sleep 0.1; done",
    );

    let runtime = MonitorRuntime::start(config_for(&tool)).unwrap();

    let snapshot = wait_for(&runtime, |s| {
        series(s, "GPU Power").points.len() >= 2
            && s.panel.device.is_some()
            && !s.processes.is_empty()
    })
    .await;

    let power = series(&snapshot, "GPU Power");
    assert!(power.values().all(|v| v == 75.5));
    assert!((power.upper_bound.unwrap() - 660.0).abs() < 1e-9);
    assert_eq!(power.formatted_latest().as_deref(), Some("75.5 W"));

    let temp = series(&snapshot, "GPU Temperature");
    assert_eq!(temp.latest().map(|p| p.value), Some(60.0));

    let memory = series(&snapshot, "GPU Memory");
    assert_eq!(memory.value_format, Some(ValueFormat::memory(24564e6)));

    assert!(snapshot.panel.text.contains("NVIDIA GeForce RTX 4090 | Driver: 550.54.14"));
    assert_eq!(
        snapshot.processes,
        vec![ProcessRow::process("1234", "python", "512 MB")]
    );

    let dmon = snapshot.workers.iter().find(|w| w.name == "nvidia-dmon").unwrap();
    assert_eq!(dmon.status.state, WorkerState::Running);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_json_snapshot_keeps_latest_point() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(
        dir.path(),
        "while :; do printf '0 70 50 - 30 10\\n'; sleep 0.1; done",
    );
    let runtime = MonitorRuntime::start(config_for(&tool)).unwrap();

    let snapshot = wait_for(&runtime, |s| series(s, "GPU Utilization").points.len() >= 3).await;
    let json = serde_json::to_value(snapshot.latest_only()).unwrap();

    let utilization = json["series"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "GPU Utilization")
        .unwrap();
    assert_eq!(utilization["points"].as_array().unwrap().len(), 1);
    assert_eq!(utilization["points"][0]["value"], 30.0);
    assert_eq!(utilization["value_format"]["kind"], "percent");

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_missing_tool_fails_only_gpu_workers() {
    let config = MonitorConfig {
        tool_path: "/nonexistent/nvidia-smi".to_string(),
        retry_interval_secs: 0,
        ..Default::default()
    };
    let mut runtime = MonitorRuntime::start(config).unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(5), runtime.next_failure())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.worker, "nvidia-dmon");
    assert!(matches!(
        failure.error,
        GpumonError::RetryExhausted { attempts: 3, .. }
    ));

    let snapshot = wait_for(&runtime, |s| {
        s.panel.text.ends_with("GPU info unavailable") && !s.processes.is_empty()
    })
    .await;
    assert_eq!(snapshot.processes, vec![ProcessRow::Placeholder]);

    let states: Vec<_> = snapshot
        .workers
        .iter()
        .map(|w| (w.name.as_str(), w.status.state))
        .collect();
    assert!(states.contains(&("nvidia-dmon", WorkerState::Failed)));
    assert!(!states.contains(&("cpu", WorkerState::Failed)));
    assert!(!states.contains(&("memory", WorkerState::Failed)));

    // Only the one terminal report
    assert!(runtime.drain_failures().is_empty());
    assert!(runtime
        .status_log()
        .lines()
        .iter()
        .any(|l| l.message.contains("giving up")));

    runtime.shutdown().await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_shutdown_reaps_stream_child() {
    let dir = TempDir::new().unwrap();
    let pidfile = dir.path().join("dmon.pid");
    let tool = fake_tool(
        dir.path(),
        &format!(
            "echo $$ > '{}'\nprintf '0 75 60 - 12 8\\n'\nexec sleep 30",
            pidfile.display()
        ),
    );
    let runtime = MonitorRuntime::start(config_for(&tool)).unwrap();

    wait_for(&runtime, |s| !series(s, "GPU Power").points.is_empty()).await;
    let pid = std::fs::read_to_string(&pidfile).unwrap().trim().to_string();
    let proc_entry = PathBuf::from(format!("/proc/{}", pid));
    assert!(proc_entry.exists());

    runtime.shutdown().await;
    assert!(!proc_entry.exists(), "dmon child {} outlived shutdown", pid);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_monitor_run_joins_workers_before_returning() {
    let dir = TempDir::new().unwrap();
    let pidfile = dir.path().join("dmon.pid");
    let tool = fake_tool(
        dir.path(),
        &format!(
            "echo $$ > '{}'\nprintf '0 75 60 - 12 8\\n'\nexec sleep 30",
            pidfile.display()
        ),
    );
    let options = MonitorOptions {
        json: true,
        ticks: Some(2),
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        run(config_for(&tool), options, CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap();

    let pid = std::fs::read_to_string(&pidfile).unwrap().trim().to_string();
    assert!(
        !PathBuf::from(format!("/proc/{}", pid)).exists(),
        "dmon child {} outlived the monitor loop",
        pid
    );
}
