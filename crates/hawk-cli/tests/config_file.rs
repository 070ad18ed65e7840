//! Commands driven by a configuration file on disk

#![allow(clippy::unwrap_used)]

use hawk_cli::commands::{load_config, policy};
use std::io::Write;

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_override_from_file_changes_check() {
    let file = config_file(
        r#"
[policy.overrides]
"system.usage" = "SYSTEM_ADMIN or READ_TARGET"
"#,
    );
    let config = load_config(Some(file.path())).unwrap();

    let command = policy::PolicyCommand::Check {
        operation: "system.usage".to_string(),
        authorities: vec!["READ_TARGET".to_string()],
        anonymous: false,
    };
    let mut out = Vec::new();
    assert!(policy::run(&command, &config, &mut out).unwrap());
    assert_eq!(String::from_utf8(out).unwrap(), "allow\n");
}

#[test]
fn test_invalid_override_is_reported() {
    let file = config_file(
        r#"
[policy.overrides]
"system.usage" = "SYSTEM_ADMIN and"
"#,
    );
    let config = load_config(Some(file.path())).unwrap();
    let result = policy::run(&policy::PolicyCommand::List, &config, &mut Vec::new());
    assert!(result.is_err());
}

#[test]
fn test_unreadable_file_names_the_path() {
    let err = load_config(Some(std::path::Path::new("/nonexistent/hawk.toml"))).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/hawk.toml"));
}
