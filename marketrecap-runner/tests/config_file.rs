//! Loading `RecapConfig` from disk.

use marketrecap_runner::{ConfigError, RecapConfig};
use std::io::Write;
use std::time::Duration;

#[test]
fn loads_config_file_and_builds_retry_policy() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[indices]]
code = "^GSPC"
name = "S&P 500"

[retry]
max_attempts = 4
min_wait_secs = 1.5
max_wait_secs = 6.0

[news]
enabled = false

[log]
level = "debug"
"#
    )
    .unwrap();

    let config = RecapConfig::from_file(file.path()).unwrap();

    assert_eq!(config.indices.len(), 1);
    assert!(!config.news.enabled);
    assert_eq!(config.log.level, "debug");

    let policy = config.retry.policy();
    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.min_wait, Duration::from_millis(1500));
    assert_eq!(policy.wait_after(1), Duration::from_millis(1500));
    assert_eq!(policy.wait_after(4), Duration::from_secs(6));
}

#[test]
fn saved_defaults_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recap.toml");
    std::fs::write(&path, RecapConfig::default().to_toml_string().unwrap()).unwrap();

    assert_eq!(RecapConfig::from_file(&path).unwrap(), RecapConfig::default());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RecapConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}
