//! Loading configuration from disk

use assert_matches::assert_matches;
use hawk_core::{HawkConfig, HawkError};
use std::io::Write;

#[test]
fn loads_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[repository]
eager_poll_persistence = false
poll_persistence_flush_time_ms = 500
max_entries_in_statement = 2

[controller]
polling_time = "00:01:00"
"#
    )
    .unwrap();

    let config = HawkConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.repository.poll_persistence_flush_time_ms, 500);
    assert_eq!(config.repository.max_entries_in_statement, 2);
    assert_eq!(config.controller.polling_time, "00:01:00");
}

#[test]
fn missing_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let err = HawkConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert_matches!(err, HawkError::Invalid { .. });
}

#[test]
fn rendered_config_round_trips() {
    let mut config = HawkConfig::default();
    config
        .policy
        .overrides
        .insert("system.usage".to_string(), "SYSTEM_ADMIN".to_string());

    let rendered = config.to_toml_string().unwrap();
    let parsed = HawkConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}
