use gpumon::core::config::{MonitorConfig, SchemaVariant, TimezoneSetting};
use gpumon::core::telemetry::DmonSchema;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = MonitorConfig::default();
    assert_eq!(config.gpu_id, 0);
    assert_eq!(config.history_size, 1000);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.max_parse_errors, 20);
    assert_eq!(config.tool_path, "nvidia-smi");
    assert_eq!(config.schema(), DmonSchema::STANDARD);
}

#[test]
fn test_config_file_overrides_some_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "gpu_id": 2, "timezone": "+05:30", "dmon_schema": "legacy" }"#,
    )
    .unwrap();

    let config = MonitorConfig::load_from(&path).unwrap();
    assert_eq!(config.gpu_id, 2);
    assert_eq!(config.dmon_schema, SchemaVariant::Legacy);
    assert_eq!(config.schema(), DmonSchema::LEGACY);
    assert_eq!(config.timezone.to_string(), "+05:30");
    assert!(matches!(config.timezone, TimezoneSetting::Fixed(_)));
    // Untouched fields keep their defaults
    assert_eq!(config.proc_poll_interval_secs, 5);
}

#[test]
fn test_config_rejects_bad_timezone() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{ "timezone": "Mars/Olympus" }"#).unwrap();

    assert!(MonitorConfig::load_from(&path).is_err());
}

#[test]
fn test_config_rejects_malformed_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, "{ gpu_id: ").unwrap();

    let err = MonitorConfig::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_config_validate_rejects_zero_interval() {
    let config = MonitorConfig {
        proc_poll_interval_secs: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = MonitorConfig {
        tool_path: "  ".to_string(),
        ..Default::default()
    };
    assert!(config.validate().is_err());
}
