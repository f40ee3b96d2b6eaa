//! Integration tests for wsreaper-config

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;
use wsreaper_config::domains::logging::{LogFormat, LogLevel, LogTarget};
use wsreaper_config::*;

#[test]
fn test_default_config_validation() {
    let config = WsReaperConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("WSREAPER_STATUS_URL", Some("http://localhost/server-status")),
        ("WSREAPER_MODE", Some("terminate")),
        ("WSREAPER_STALENESS_THRESHOLD", Some("120")),
        ("WSREAPER_SERVICE_PORT", Some("8443")),
        ("WSREAPER_HTTP_TIMEOUT", Some("5")),
        ("WSREAPER_LOG_LEVEL", Some("debug")),
        ("WSREAPER_KILL_TOOL", Some("/sbin/ss")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(
            config.status.url.as_deref(),
            Some("http://localhost/server-status")
        );
        assert_eq!(config.reaper.mode, ReaperMode::Terminate);
        assert_eq!(config.reaper.staleness_threshold, Duration::from_secs(120));
        assert_eq!(config.reaper.service_port, 8443);
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.reaper.kill.tool_path, PathBuf::from("/sbin/ss"));
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    with_vars(vec![("WSREAPER_SERVICE_PORT", Some("https"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_env_url_is_validated() {
    with_vars(vec![("WSREAPER_STATUS_URL", Some("gopher://localhost"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::DomainError { .. })));
    });
}

#[test]
fn test_yaml_config_from_file() {
    let yaml = r#"
status:
  url: "https://127.0.0.1/server-status"

http:
  timeout: 10
  verify_ssl: true

reaper:
  mode: simulate
  staleness_threshold: 600
  service_port: 443
  concurrency: 4
  kill:
    tool_path: /usr/sbin/ss
    timeout: 3
  rehearsal:
    process_names: [apache2]
    sample_size: 2

logging:
  level: info
  format: json
  targets:
    - type: console
    - type: file
      path: /var/log/wsreaper.log
    - type: syslog
      facility: daemon
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    // A prefix nobody sets keeps this test independent of the env tests
    let loader = ConfigLoader::with_prefix("WSREAPER_FILE_TEST");
    let config = loader.from_file(file.path()).unwrap();

    assert_eq!(config.reaper.mode, ReaperMode::Simulate);
    assert_eq!(config.reaper.staleness_threshold, Duration::from_secs(600));
    assert_eq!(config.reaper.concurrency, 4);
    assert_eq!(config.reaper.kill.timeout, Duration::from_secs(3));
    assert_eq!(config.reaper.rehearsal.sample_size, Some(2));
    assert!(config.http.verify_ssl);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(matches!(
        config.logging.targets[1],
        LogTarget::File { ref path, .. } if path == "/var/log/wsreaper.log"
    ));
    assert!(matches!(
        config.logging.targets[2],
        LogTarget::Syslog { ref facility, ref ident, .. }
            if facility == "daemon" && ident == "websocket-reaper"
    ));
}

#[test]
fn test_invalid_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"reaper:\n  service_port: 0\n").unwrap();

    let loader = ConfigLoader::with_prefix("WSREAPER_FILE_TEST");
    assert!(loader.from_file(file.path()).is_err());
}

#[test]
fn test_missing_file() {
    let loader = ConfigLoader::with_prefix("WSREAPER_FILE_TEST");
    let result = loader.from_file("/nonexistent/wsreaper.yaml");
    assert!(matches!(result, Err(ConfigError::FileReadError(_))));
}
