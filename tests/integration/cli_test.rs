use gpumon::commands::build_cli;
use gpumon::commands::monitor::apply_overrides;
use gpumon::core::config::{MonitorConfig, SchemaVariant, TimezoneSetting};

#[test]
fn test_no_flags_keep_loaded_config() {
    let matches = build_cli().try_get_matches_from(["gpumon"]).unwrap();
    let mut config = MonitorConfig {
        gpu_id: 3,
        history_size: 42,
        ..Default::default()
    };

    apply_overrides(&mut config, &matches).unwrap();
    assert_eq!(config.gpu_id, 3);
    assert_eq!(config.history_size, 42);
}

#[test]
fn test_flags_override_config() {
    let matches = build_cli()
        .try_get_matches_from([
            "gpumon",
            "1",
            "--history-size",
            "300",
            "-p",
            "10",
            "-t",
            "UTC",
            "--legacy-schema",
        ])
        .unwrap();
    let mut config = MonitorConfig::default();

    apply_overrides(&mut config, &matches).unwrap();
    assert_eq!(config.gpu_id, 1);
    assert_eq!(config.history_size, 300);
    assert_eq!(config.proc_poll_interval_secs, 10);
    assert_eq!(config.timezone, TimezoneSetting::Utc);
    assert_eq!(config.dmon_schema, SchemaVariant::Legacy);
}

#[test]
fn test_bad_timezone_flag_is_an_error() {
    let matches = build_cli()
        .try_get_matches_from(["gpumon", "-t", "nowhere"])
        .unwrap();
    let mut config = MonitorConfig::default();

    let err = apply_overrides(&mut config, &matches).unwrap_err();
    assert!(err.to_string().contains("Invalid timezone"));
}

#[test]
fn test_non_numeric_gpu_id_rejected() {
    assert!(build_cli().try_get_matches_from(["gpumon", "first"]).is_err());
}

#[test]
fn test_zero_history_fails_validation() {
    let matches = build_cli()
        .try_get_matches_from(["gpumon", "-s", "0"])
        .unwrap();
    let mut config = MonitorConfig::default();
    apply_overrides(&mut config, &matches).unwrap();
    assert!(config.validate().is_err());
}
